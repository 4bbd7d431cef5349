//! Bundled demonstration/integration-test simulators.
//!
//! These are fixtures for exercising the planner end-to-end, not part of the core search
//! engine: a real user of this crate plugs in their own [`crate::simulator::Simulator`].

pub mod rocksample;

pub use rocksample::RockSample;
