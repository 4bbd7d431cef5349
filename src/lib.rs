//! # cpomcp
//!
//! An online planner for constrained POMDPs (CPOMDPs): belief-state Monte Carlo tree search that
//! maximizes expected discounted reward while keeping expected discounted cost under an
//! admissible bound, adapted each step via a Lagrangian dual.
//!
//! ## Features
//!
//! - Generic over any domain implementing [`Simulator`](simulator::Simulator) — a generative
//!   model, not a closed-form transition/observation distribution
//! - Scalarized UCB action selection (`Q_R - lambda * Q_C` plus an exploration bonus) with
//!   RAVE/AMAF statistics to speed up early estimates
//! - A stochastic [`Policy`](policy::Policy) that mixes between two actions so the *expected*
//!   cost of acting exactly meets the admissible bound, rather than rounding it away
//! - Particle-filter belief tracking with deprivation recovery via domain-supplied local moves
//! - A bundled [`domains::RockSample`] simulator and [`experiment`] driver for running the
//!   simulation-count doubling sweeps used to evaluate a planner end-to-end
//!
//! ## Basic usage
//!
//! ```
//! use cpomcp::config::SearchParams;
//! use cpomcp::domains::RockSample;
//! use cpomcp::mcts::Mcts;
//!
//! # fn main() -> cpomcp::Result<()> {
//! let sim = RockSample::new(5, 5, 42);
//! let params = SearchParams::default().with_num_simulations(64);
//! let mut planner = Mcts::new(sim, params)?;
//!
//! let policy = planner.select_action()?;
//! println!("chosen action: {}", policy.sample(&mut rand::thread_rng()));
//! # Ok(())
//! # }
//! ```
//!
//! ## How it works
//!
//! Each call to [`Mcts::select_action`](mcts::Mcts::select_action) runs a configured number of
//! simulations from the current belief, each one:
//!
//! 1. **Selection**: descend the tree from the root, at each node picking the action that
//!    maximizes the scalarized, UCB-biased value `Q_R(a) - lambda * Q_C(a) + bonus(a)`.
//! 2. **Expansion**: the first time a node is reached, create one child per legal action, seeding
//!    domain-preferred actions with an optimistic prior when running at
//!    [`KnowledgeLevel::Smart`](simulator::KnowledgeLevel::Smart).
//! 3. **Rollout**: once the descent falls off the tree, finish the simulation with a cheap default
//!    policy (legal-random or domain-preferred) rather than further tree expansion.
//! 4. **Backpropagation**: add the simulated reward/cost back up every node on the path, plus RAVE
//!    updates for every action seen later in the same simulation.
//!
//! After the simulation budget is spent, the root's [`Policy`](policy::Policy) is read off with
//! [`greedy_ucb`](policy::greedy_ucb) (no exploration bonus, stochastic tie-breaking), and the
//! Lagrange multiplier `lambda` has been nudged throughout by a subgradient step toward satisfying
//! the admissible cost bound.
//!
//! The planner itself never touches the real environment: an outer driver (see [`experiment`])
//! samples an action from the returned policy, steps the real simulator, and calls
//! [`Mcts::update`](mcts::Mcts::update) to advance the belief and commit the search tree.

pub mod belief;
pub mod config;
pub mod coord;
pub mod domains;
pub mod error;
pub mod experiment;
pub mod history;
pub mod mcts;
pub mod policy;
pub mod rc;
pub mod simulator;
pub mod stats;
pub mod tree;
pub mod utils;

pub use error::{MctsError, Result};
pub use mcts::Mcts;
pub use policy::Policy;
pub use simulator::Simulator;
