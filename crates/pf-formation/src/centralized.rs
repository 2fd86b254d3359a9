//! Centralized formation: an omniscient infrastructure assigns searchers to
//! platoons in one sweep.
//!
//! Two kinds exist.  **Greedy** walks searchers in arrival (id) order and
//! hands each its cheapest candidate; a vehicle consumed as a joiner stops
//! being a candidate and a vehicle consumed as a target stops searching for
//! the rest of the round.  **Optimal** assembles the full assignment problem
//! and dispatches it to an external [`AssignmentSolver`] under a wall-clock
//! budget; when the budget expires the round falls back to the greedy sweep
//! and the timeout is counted.

use std::collections::HashSet;
use std::time::Duration;

use pf_core::VehicleId;
use tracing::{debug, info, warn};

use crate::algorithm::{FormationAlgorithm, FormationOutcome, ScoringParams};
use crate::command::FormationCommand;
use crate::solver::{AssignmentProblem, AssignmentSolver, SolverOutcome, INFEASIBLE_COST, REMAIN_ALONE_COST};
use crate::speed_position::score;
use crate::view::FormationView;
use crate::FormationResult;

/// Which centralized strategy runs.
pub enum CentralizedKind {
    Greedy,
    Optimal {
        solver: Box<dyn AssignmentSolver>,
        budget: Duration,
    },
}

pub struct CentralizedFormation {
    kind: CentralizedKind,
    params: ScoringParams,
}

impl CentralizedFormation {
    pub fn new(kind: CentralizedKind, params: ScoringParams) -> Self {
        Self { kind, params }
    }

    /// Arrival-order greedy sweep with winner masking.
    fn greedy_sweep(&self, view: &FormationView<'_>, outcome: &mut FormationOutcome) {
        let candidates = view.join_candidates();
        // Vehicles that joined something this round (no longer joinable).
        let mut joined: HashSet<VehicleId> = HashSet::new();
        // Vehicles that received a joiner this round (no longer searching).
        let mut consumed_targets: HashSet<VehicleId> = HashSet::new();

        for row in view.searching_rows() {
            let vid = view.fleet.ids[row];
            if consumed_targets.contains(&vid) {
                continue;
            }

            let mut best: Option<(f64, usize)> = None;
            for (i, c) in candidates.iter().enumerate() {
                let Some(target_leader) = view.target_leader(c.target) else { continue };
                if joined.contains(&target_leader) {
                    outcome.candidates_filtered += 1;
                    continue;
                }
                match score(&self.params, view, row, c) {
                    Some(fx) => {
                        outcome.candidates_found += 1;
                        if best.map_or(true, |(b, _)| fx < b) {
                            best = Some((fx, i));
                        }
                    }
                    None => outcome.candidates_filtered += 1,
                }
            }

            if let Some((fx, i)) = best {
                let c = &candidates[i];
                let target_leader = view.target_leader(c.target).expect("scored candidates resolve");
                debug!(vehicle = %vid, target = ?c.target, cost = fx, "greedy assignment");
                outcome.commands.push(FormationCommand::Join { vehicle: vid, target: c.target });
                joined.insert(vid);
                consumed_targets.insert(target_leader);
            }
        }
    }

    /// Build the searcher × candidate cost matrix for the solver.
    fn build_problem(&self, view: &FormationView<'_>, outcome: &mut FormationOutcome) -> AssignmentProblem {
        let searcher_rows = view.searching_rows();
        let candidates = view.join_candidates();
        let columns = candidates.len() + 1;

        let mut cost = Vec::with_capacity(searcher_rows.len() * columns);
        for &row in &searcher_rows {
            for c in &candidates {
                match score(&self.params, view, row, c) {
                    Some(fx) => {
                        outcome.candidates_found += 1;
                        cost.push(fx);
                    }
                    None => {
                        outcome.candidates_filtered += 1;
                        cost.push(INFEASIBLE_COST);
                    }
                }
            }
            cost.push(REMAIN_ALONE_COST);
        }

        AssignmentProblem {
            searchers: searcher_rows.iter().map(|&r| view.fleet.ids[r]).collect(),
            targets: candidates.iter().map(|c| c.target).collect(),
            cost,
        }
    }
}

impl FormationAlgorithm for CentralizedFormation {
    fn name(&self) -> &'static str {
        match self.kind {
            CentralizedKind::Greedy => "centralized-greedy",
            CentralizedKind::Optimal { .. } => "centralized-optimal",
        }
    }

    fn on_step(&self, view: &FormationView<'_>) -> FormationResult<FormationOutcome> {
        let mut outcome = FormationOutcome::default();

        match &self.kind {
            CentralizedKind::Greedy => self.greedy_sweep(view, &mut outcome),
            CentralizedKind::Optimal { solver, budget } => {
                let problem = self.build_problem(view, &mut outcome);
                if problem.searchers.is_empty() {
                    return Ok(outcome);
                }
                info!(
                    searchers = problem.searchers.len(),
                    targets = problem.targets.len(),
                    "dispatching assignment problem to solver"
                );
                match solver.solve(&problem, *budget)? {
                    SolverOutcome::Solved(assignment) => {
                        let alone = problem.alone_column();
                        for (s, &col) in assignment.iter().enumerate() {
                            if col == alone {
                                continue;
                            }
                            outcome.commands.push(FormationCommand::Join {
                                vehicle: problem.searchers[s],
                                target: problem.targets[col],
                            });
                        }
                    }
                    SolverOutcome::TimedOut => {
                        warn!("solver budget expired, falling back to greedy sweep");
                        outcome.solver_timeouts += 1;
                        // The greedy fallback re-counts candidates; keep the
                        // counters from the problem build.
                        let mut fallback = FormationOutcome::default();
                        self.greedy_sweep(view, &mut fallback);
                        outcome.commands = fallback.commands;
                    }
                }
            }
        }

        Ok(outcome)
    }
}
