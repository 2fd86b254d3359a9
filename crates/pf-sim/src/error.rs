//! Error taxonomy of the simulation loop.
//!
//! Only fatal conditions are errors.  Recoverable conditions (failed
//! insertions, aborted maneuvers, solver timeouts, warn-policy collisions)
//! are counted on the statistics accumulator and never surface as `Err`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    /// Invalid parameter combination, rejected before `t = 0`.
    #[error("configuration error: {0}")]
    Config(String),

    /// A runtime invariant broke (overlap under the abort policy, speed
    /// bounds, dangling platoon links, member ordering).
    #[error("invariant violation: {0}")]
    Invariant(String),

    /// The external assignment solver failed hard (not a timeout).
    #[error("solver failure: {0}")]
    Solver(String),

    /// Graceful termination was requested and honoured at a phase boundary.
    #[error("run cancelled")]
    Cancelled,
}

impl SimError {
    /// Process exit code the binary maps this error to.
    pub fn exit_code(&self) -> i32 {
        match self {
            SimError::Config(_) => 1,
            SimError::Invariant(_) => 2,
            SimError::Solver(_) => 3,
            SimError::Cancelled => 130,
        }
    }
}

impl From<pf_formation::FormationError> for SimError {
    fn from(e: pf_formation::FormationError) -> Self {
        match e {
            pf_formation::FormationError::UnknownAlgorithm(_) => SimError::Config(e.to_string()),
            pf_formation::FormationError::Solver(msg) => SimError::Solver(msg),
        }
    }
}

pub type SimResult<T> = Result<T, SimError>;
