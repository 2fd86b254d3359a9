//! `pf-formation` — vehicle-to-platoon assignment for the pf simulator.
//!
//! # Crate layout
//!
//! | Module             | Contents                                            |
//! |--------------------|-----------------------------------------------------|
//! | [`view`]           | `FormationView<'a>` — read-only step snapshot       |
//! | [`command`]        | `FormationCommand` — the write-only command buffer  |
//! | [`algorithm`]      | `FormationAlgorithm` trait + name registration      |
//! | [`speed_position`] | The reference distributed speed-position policy     |
//! | [`centralized`]    | Centralized greedy and solver-backed optimal sweeps |
//! | [`solver`]         | `AssignmentProblem`, the blocking `AssignmentSolver`|
//! |                    | collaborator interface, and the greedy fallback     |
//! | [`error`]          | `FormationError`, `FormationResult<T>`              |
//!
//! # Design notes
//!
//! Algorithms are stateless collaborators: they receive a borrowed
//! [`FormationView`] each invocation and return commands; they never mutate
//! fleet or platoon state and never retain references across steps.  The
//! simulation loop applies the returned commands through the maneuver
//! coordinator at the action boundary, in ascending joiner-id order, which
//! is what makes conflicting requests resolve lower-id-first.

pub mod algorithm;
pub mod centralized;
pub mod command;
pub mod error;
pub mod solver;
pub mod speed_position;
pub mod view;

#[cfg(test)]
mod tests;

// ── Re-exports ────────────────────────────────────────────────────────────────

pub use algorithm::{algorithm_by_name, FormationAlgorithm, FormationOutcome, ScoringParams};
pub use centralized::{CentralizedFormation, CentralizedKind};
pub use command::{FormationCommand, JoinTarget};
pub use error::{FormationError, FormationResult};
pub use solver::{AssignmentProblem, AssignmentSolver, GreedySolver, SolverOutcome, REMAIN_ALONE_COST};
pub use speed_position::SpeedPosition;
pub use view::{FormationView, JoinCandidate};
