//! Error types for pf-formation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormationError {
    #[error("unknown formation algorithm {0:?}")]
    UnknownAlgorithm(String),

    #[error("assignment solver failed: {0}")]
    Solver(String),
}

pub type FormationResult<T> = Result<T, FormationError>;
