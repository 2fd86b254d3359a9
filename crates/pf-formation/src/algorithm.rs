//! The `FormationAlgorithm` trait — the main extension point for assignment
//! policies.

use crate::command::FormationCommand;
use crate::view::FormationView;
use crate::{FormationError, FormationResult, SpeedPosition};

/// Shared scoring parameters of the speed-position family.
#[derive(Clone, Debug)]
pub struct ScoringParams {
    /// Weight α of the speed deviation; position gets `1 − α`.
    pub alpha: f64,
    /// Maximum relative speed deviation (fraction of the searcher's desired
    /// speed).
    pub speed_deviation_threshold: f64,
    /// Maximum position deviation, metres.
    pub position_deviation_threshold: f64,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            alpha: 0.5,
            speed_deviation_threshold: 0.1,
            position_deviation_threshold: 300.0,
        }
    }
}

/// What one invocation of an algorithm produced.
#[derive(Debug, Default)]
pub struct FormationOutcome {
    pub commands: Vec<FormationCommand>,
    /// Join candidates considered across all searchers.
    pub candidates_found: u32,
    /// Candidates discarded by the position/speed/range filters.
    pub candidates_filtered: u32,
    /// Solver invocations that hit the wall-clock budget (centralized
    /// optimal only) — each one fell back to the greedy sweep.
    pub solver_timeouts: u32,
}

/// Pluggable vehicle-to-platoon assignment.
///
/// Implementations are stateless with respect to the simulation: all reads
/// go through the borrowed [`FormationView`] and all effects are commands in
/// the returned [`FormationOutcome`].  Internal tuning state (weights,
/// thresholds, a solver handle) is fine; borrowed simulation state is not.
pub trait FormationAlgorithm: Send + Sync {
    /// The registered name (what `formation-algorithm` selects).
    fn name(&self) -> &'static str;

    /// Run one scheduler invocation over the snapshot.
    fn on_step(&self, view: &FormationView<'_>) -> FormationResult<FormationOutcome>;
}

/// Resolve a configured algorithm name.
///
/// Names are registered here at build time; an unknown name is a
/// configuration error surfaced before `t = 0`.
pub fn algorithm_by_name(
    name: &str,
    params: ScoringParams,
) -> FormationResult<Box<dyn FormationAlgorithm>> {
    match name {
        "speedposition" => Ok(Box::new(SpeedPosition::new(params))),
        other => Err(FormationError::UnknownAlgorithm(other.to_string())),
    }
}
