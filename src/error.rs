//! Error types for the planner.

/// Errors the planner can report to a caller.
///
/// Particle deprivation (`Mcts::update` returning `Ok(false)`) is deliberately not a variant
/// here: running out of particles is an expected, recoverable event in CPOMDP planning, not a
/// programmer or configuration error, so it is modeled as a plain boolean return.
#[derive(thiserror::Error, Debug)]
pub enum MctsError {
    /// The root has no legal actions to select from.
    #[error("no legal actions available from current state")]
    NoLegalActions,

    /// A `Policy` was sampled before it was ever assigned a concrete action.
    #[error("policy sampled before a concrete action was set")]
    PolicyNotSet,

    /// Construction-time configuration is internally inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The search was stopped before it could complete its planned simulation budget.
    #[error("search stopped early: {0}")]
    SearchStopped(String),
}

/// Result type for planner operations.
pub type Result<T> = std::result::Result<T, MctsError>;
