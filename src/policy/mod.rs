//! The four pieces of logic that operate on the search tree: prior installation
//! (expansion), the scalarized-UCB tree selector plus the final cost-constrained
//! policy (selection), the default-policy playout (simulation), and AMAF/RAVE
//! bookkeeping (backpropagation).

pub mod backpropagation;
pub mod expansion;
pub mod selection;
pub mod simulation;

pub use backpropagation::add_rave;
pub use expansion::expand_node;
pub use selection::{greedy_ucb, Policy, UcbTable};
pub use simulation::rollout;
