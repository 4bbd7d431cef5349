//! Owned multisets of simulator-state particles.

use crate::simulator::Simulator;
use rand::Rng;

/// A belief over hidden states, represented as an unordered collection of owned particles.
///
/// Each particle is logically owned by exactly one `BeliefState` at a time: `take_all` moves
/// ownership without copying, `copy_from` deep-copies, and dropping a `BeliefState` drops every
/// particle it still holds.
#[derive(Clone, Debug, Default)]
pub struct BeliefState<S> {
    samples: Vec<S>,
}

impl<S> BeliefState<S> {
    pub fn new() -> Self {
        BeliefState { samples: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }

    pub fn get_sample(&self, index: usize) -> &S {
        &self.samples[index]
    }

    /// Transfer ownership of a single already-owned particle into this belief.
    pub fn add_sample(&mut self, state: S) {
        self.samples.push(state);
    }

    /// Drop every particle this belief holds.
    pub fn free(&mut self) {
        self.samples.clear();
    }

    /// Transfer ownership of every particle from `other` into `self`, leaving `other` empty.
    pub fn take_all(&mut self, other: &mut BeliefState<S>) {
        self.samples.append(&mut other.samples);
    }

    pub fn iter(&self) -> impl Iterator<Item = &S> {
        self.samples.iter()
    }
}

impl<S: Clone> BeliefState<S> {
    /// Uniformly sample one particle and return an owned deep copy of it.
    ///
    /// Precondition: the belief is non-empty. Sampling an empty belief is a caller bug (it can
    /// only happen if particle-deprivation recovery was skipped), so it is guarded by a debug
    /// assertion rather than threaded through as a `Result`.
    pub fn create_sample(
        &self,
        sim: &impl Simulator<State = S>,
        rng: &mut impl Rng,
    ) -> S {
        debug_assert!(!self.samples.is_empty(), "create_sample on an empty belief");
        let idx = rng.gen_range(0..self.samples.len());
        sim.copy(&self.samples[idx])
    }

    /// Deep-copy every particle from `other` into `self`.
    pub fn copy_from(&mut self, other: &BeliefState<S>, sim: &impl Simulator<State = S>) {
        self.samples.clear();
        self.samples.reserve(other.samples.len());
        for s in &other.samples {
            self.samples.push(sim.copy(s));
        }
    }
}
