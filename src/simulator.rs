//! The generative-model contract the planner is built against.
//!
//! A concrete domain (see [`crate::domains`] for the bundled rock-sample example) implements
//! [`Simulator`] and the planner never needs to know anything else about it.

use crate::history::History;
use crate::rc::RC;

/// Which knowledge tier a prior or rollout policy is allowed to use.
///
/// Mirrors the reference algorithm's three-tier scheme: `Pure` never consults domain heuristics,
/// `Legal` restricts to actions the simulator reports as legal, `Smart` additionally seeds
/// domain-preferred actions with an optimistic prior.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum KnowledgeLevel {
    Pure,
    Legal,
    Smart,
}

/// Which half of a simulation step the planner is currently in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Tree,
    Rollout,
}

/// What happened the last time the belief was updated from a real observation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Particles {
    Consistent,
    Inconsistent,
    Resampled,
    OutOfParticles,
}

/// Planner-side context handed to simulator callbacks that need to know where in the search they
/// are being called from (tree descent vs. default-policy rollout) without threading extra
/// parameters through every call site.
#[derive(Clone, Copy, Debug)]
pub struct Status {
    pub phase: Phase,
    pub particles: Particles,
}

impl Status {
    pub fn new() -> Self {
        Status {
            phase: Phase::Tree,
            particles: Particles::Consistent,
        }
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::new()
    }
}

/// The generative model a CPOMDP planner is searching over.
///
/// `State` is an opaque particle type; the planner only ever clones, copies, and steps it through
/// this trait, never inspects its fields directly.
pub trait Simulator {
    type State: Clone;

    /// Number of distinct actions, densely indexed `0..num_actions()`.
    fn num_actions(&self) -> usize;

    /// Number of distinct observations, densely indexed `0..num_observations()`.
    fn num_observations(&self) -> usize;

    /// Per-step discount factor in `(0, 1]`.
    fn discount(&self) -> f64;

    /// An upper bound on `|reward|` in a single step, used to scale the UCB exploration constant
    /// when callers ask for it to be derived automatically.
    fn reward_range(&self) -> f64;

    /// A fresh particle drawn from the initial-state distribution.
    fn create_start_state(&self) -> Self::State;

    /// A deep copy of `state`. Kept distinct from relying on `Clone` directly so a simulator can
    /// special-case expensive copies if it ever needs to.
    fn copy(&self, state: &Self::State) -> Self::State {
        state.clone()
    }

    /// Advance `state` by one step under `action`. Returns `true` if the resulting state is
    /// terminal. Must write a densely-indexed observation and the immediate reward/cost.
    fn step(&self, state: &mut Self::State, action: usize, rc: &mut RC) -> (usize, bool);

    /// Optional sanity check on an internally-constructed state; default is a no-op.
    fn validate(&self, _state: &Self::State) {}

    /// Actions legal from `state`. Default: every action is legal.
    fn generate_legal(&self, _state: &Self::State, _history: &History, _status: &Status) -> Vec<usize> {
        (0..self.num_actions()).collect()
    }

    /// Domain-preferred actions from `state`, used only at `KnowledgeLevel::Smart`. Default:
    /// none.
    fn generate_preferred(&self, _state: &Self::State, _history: &History, _status: &Status) -> Vec<usize> {
        Vec::new()
    }

    /// Attempt to perturb `state` into one consistent with the just-observed `step_obs`, for
    /// particle-deprivation recovery. Default: no local structure to exploit, always succeeds
    /// without changing the state (a conservative identity transform).
    fn local_move(
        &self,
        _state: &mut Self::State,
        _history: &History,
        _step_obs: usize,
        _status: &Status,
    ) -> bool {
        true
    }

    /// Whether this simulator supplies alpha-vector value estimates. Default: no.
    fn has_alpha(&self) -> bool {
        false
    }

    /// Alpha-vector value estimate for `state` under `action`, if [`Simulator::has_alpha`].
    fn alpha_value(&self, _state: &Self::State, _action: usize) -> f64 {
        0.0
    }

    /// Update any alpha-vector state after observing a transition. Default: no-op.
    fn update_alpha(&self, _state: &Self::State, _action: usize) {}

    /// Planning horizon in steps for a desired value-estimate `accuracy`, falling back to
    /// `undiscounted_horizon` when `discount() == 1.0`.
    fn horizon(&self, accuracy: f64, undiscounted_horizon: usize) -> f64 {
        let gamma = self.discount();
        if gamma >= 1.0 {
            undiscounted_horizon as f64
        } else {
            accuracy.ln() / gamma.ln()
        }
    }

    /// Pick an action by `Smart -> Legal -> uniform` fallback, the same tiering `Prior` uses for
    /// the tree, used by the default rollout policy.
    fn select_random(
        &self,
        state: &Self::State,
        history: &History,
        status: &Status,
        level: KnowledgeLevel,
        rng: &mut impl rand::Rng,
    ) -> usize {
        if level >= KnowledgeLevel::Smart {
            let preferred = self.generate_preferred(state, history, status);
            if !preferred.is_empty() {
                return preferred[rng.gen_range(0..preferred.len())];
            }
        }
        if level >= KnowledgeLevel::Legal {
            let legal = self.generate_legal(state, history, status);
            if !legal.is_empty() {
                return legal[rng.gen_range(0..legal.len())];
            }
        }
        rng.gen_range(0..self.num_actions())
    }
}
