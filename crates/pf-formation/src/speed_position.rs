//! The distributed speed-position policy.
//!
//! Every searching vehicle whose execution timer fires scores each reachable
//! join candidate by `α·|Δv| + (1−α)·|Δpos|`, filters by the speed and
//! position deviation thresholds, and requests a join at the back of the
//! cheapest one.  Two searchers picking the same target are serialized by
//! the command-application order (lower id wins; the loser's request is
//! rejected by the busy leader).

use tracing::debug;

use crate::algorithm::{FormationAlgorithm, FormationOutcome, ScoringParams};
use crate::command::FormationCommand;
use crate::view::{FormationView, JoinCandidate};
use crate::FormationResult;

pub struct SpeedPosition {
    params: ScoringParams,
}

impl SpeedPosition {
    pub fn new(params: ScoringParams) -> Self {
        Self { params }
    }

    #[inline]
    pub fn params(&self) -> &ScoringParams {
        &self.params
    }
}

/// Absolute desired-speed deviation between a searcher and a candidate.
pub(crate) fn speed_deviation(view: &FormationView<'_>, row: usize, c: &JoinCandidate) -> f64 {
    (view.fleet.desired_speed[row] - c.desired_speed).abs()
}

/// Absolute position deviation: distance to close to reach the candidate.
pub(crate) fn position_deviation(view: &FormationView<'_>, row: usize, c: &JoinCandidate) -> f64 {
    let rear = view.fleet.rear_position(row, view.types);
    if rear > c.position {
        rear - c.position
    } else {
        (c.rear_position - view.fleet.position[row]).abs()
    }
}

/// `α·Δv + (1−α)·Δpos`.
pub(crate) fn cost(params: &ScoringParams, ds: f64, dp: f64) -> f64 {
    params.alpha * ds + (1.0 - params.alpha) * dp
}

/// Score one searcher against one candidate; `None` when filtered out.
///
/// Filters, in order: self-assignment, join-at-back only (the searcher must
/// be behind the candidate's tail), communication range, speed deviation,
/// position deviation.
pub(crate) fn score(
    params: &ScoringParams,
    view: &FormationView<'_>,
    row: usize,
    c: &JoinCandidate,
) -> Option<f64> {
    if view.is_self(row, c) {
        return None;
    }
    if view.fleet.position[row] > c.rear_position {
        return None;
    }
    if view.distance_to(row, c) > view.communication_range {
        return None;
    }
    let ds = speed_deviation(view, row, c);
    if ds > params.speed_deviation_threshold * view.fleet.desired_speed[row] {
        return None;
    }
    let dp = position_deviation(view, row, c);
    if dp > params.position_deviation_threshold {
        return None;
    }
    Some(cost(params, ds, dp))
}

impl FormationAlgorithm for SpeedPosition {
    fn name(&self) -> &'static str {
        "speedposition"
    }

    fn on_step(&self, view: &FormationView<'_>) -> FormationResult<FormationOutcome> {
        let mut outcome = FormationOutcome::default();
        let candidates = view.join_candidates();

        for row in view.searching_rows() {
            if !view.timer_fires(row) {
                continue;
            }

            let mut best: Option<(f64, &JoinCandidate)> = None;
            for c in &candidates {
                match score(&self.params, view, row, c) {
                    Some(fx) => {
                        outcome.candidates_found += 1;
                        if best.map_or(true, |(b, _)| fx < b) {
                            best = Some((fx, c));
                        }
                    }
                    None => outcome.candidates_filtered += 1,
                }
            }

            if let Some((fx, c)) = best {
                debug!(
                    vehicle = %view.fleet.ids[row],
                    target = ?c.target,
                    cost = fx,
                    "speed-position pick"
                );
                outcome.commands.push(FormationCommand::Join {
                    vehicle: view.fleet.ids[row],
                    target: c.target,
                });
            }
        }

        Ok(outcome)
    }
}
