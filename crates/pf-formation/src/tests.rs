//! Unit tests for pf-formation.

use std::time::Duration;

use pf_core::{SimClock, Tick, VehicleId, VehicleTypeId};
use pf_fleet::{CfModel, Fleet, NewVehicle, VehicleType, VehicleTypeRegistry};
use pf_platoon::PlatoonRegistry;

use crate::algorithm::{FormationAlgorithm, ScoringParams};
use crate::centralized::{CentralizedFormation, CentralizedKind};
use crate::command::{FormationCommand, JoinTarget};
use crate::solver::{
    AssignmentProblem, AssignmentSolver, GreedySolver, SolverOutcome, REMAIN_ALONE_COST,
};
use crate::speed_position::SpeedPosition;
use crate::view::FormationView;
use crate::FormationResult;

// ── Helpers ───────────────────────────────────────────────────────────────────

struct World {
    types: VehicleTypeRegistry,
    car: VehicleTypeId,
    fleet: Fleet,
    platoons: PlatoonRegistry,
    clock: SimClock,
}

impl World {
    fn new() -> Self {
        let mut types = VehicleTypeRegistry::new();
        let car = types.register(VehicleType::passenger_car());
        Self {
            types,
            car,
            fleet: Fleet::new(),
            platoons: PlatoonRegistry::new(),
            clock: SimClock::new(1.0),
        }
    }

    fn add(&mut self, position: f64, desired: f64) -> VehicleId {
        self.fleet.spawn(NewVehicle {
            vtype: self.car,
            depart_time: 0.0,
            depart_position: position,
            depart_lane: 0,
            depart_speed: desired,
            depart_delay: 0.0,
            arrival_position: 100_000.0,
            desired_speed: desired,
            cf_model: CfModel::Acc,
            platooning: true,
            prefilled: false,
            formation_phase: 0.0,
            color: [0, 0, 0],
        })
    }

    fn view(&self) -> FormationView<'_> {
        FormationView {
            fleet: &self.fleet,
            types: &self.types,
            platoons: &self.platoons,
            clock: &self.clock,
            communication_range: 1_000.0,
            execution_interval: 30.0,
        }
    }
}

fn joins_of(commands: &[FormationCommand]) -> Vec<(VehicleId, JoinTarget)> {
    commands
        .iter()
        .filter_map(|c| match c {
            FormationCommand::Join { vehicle, target } => Some((*vehicle, *target)),
            FormationCommand::Leave { .. } => None,
        })
        .collect()
}

// ── View ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod view_tests {
    use super::*;

    #[test]
    fn timer_fires_on_own_grid_only() {
        let mut w = World::new();
        let a = w.add(100.0, 36.0);
        let row = w.fleet.row(a).unwrap();
        w.fleet.formation_phase[row] = 7.0;

        // fires at 7, 37, 67, … and nowhere else
        for tick in 0..70u64 {
            w.clock.current_tick = Tick(tick);
            let fires = w.view().timer_fires(row);
            let expected = tick == 7 || tick == 37 || tick == 67;
            assert_eq!(fires, expected, "tick {tick}");
        }
    }

    #[test]
    fn searching_rows_exclude_platoon_members() {
        let mut w = World::new();
        let a = w.add(1_000.0, 36.0);
        let b = w.add(900.0, 36.0);
        w.platoons.create(&mut w.fleet, a, 0.0).unwrap();

        let view = w.view();
        let rows = view.searching_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(view.fleet.ids[rows[0]], b);
    }

    #[test]
    fn join_candidates_cover_platoons_and_solo_vehicles() {
        let mut w = World::new();
        let a = w.add(1_000.0, 36.0);
        let b = w.add(900.0, 36.0);
        w.platoons.create(&mut w.fleet, a, 0.0).unwrap();

        let view = w.view();
        let candidates = view.join_candidates();
        assert_eq!(candidates.len(), 2);
        assert!(candidates
            .iter()
            .any(|c| matches!(c.target, JoinTarget::Platoon(_))));
        assert!(candidates
            .iter()
            .any(|c| matches!(c.target, JoinTarget::Vehicle(v) if v == b)));
    }
}

// ── Speed-position scoring ────────────────────────────────────────────────────

#[cfg(test)]
mod scoring_tests {
    use super::*;
    use crate::speed_position::score;

    #[test]
    fn prefers_closer_platoon_at_equal_speed() {
        let mut w = World::new();
        let near = w.add(1_000.0, 36.0);
        let far = w.add(1_200.0, 36.0);
        let searcher = w.add(900.0, 36.0);
        w.platoons.create(&mut w.fleet, near, 0.0).unwrap();
        w.platoons.create(&mut w.fleet, far, 0.0).unwrap();

        let algo = SpeedPosition::new(ScoringParams::default());
        let view = w.view();
        let outcome = algo.on_step(&view).unwrap();
        let joins = joins_of(&outcome.commands);
        assert_eq!(joins.len(), 1);
        assert_eq!(joins[0].0, searcher);
        let expected = JoinTarget::Platoon(w.fleet.platoon_id[w.fleet.row(near).unwrap()]);
        assert_eq!(joins[0].1, expected);
    }

    #[test]
    fn candidate_ahead_of_searcher_only() {
        // searcher in front of the candidate's tail is filtered out
        let mut w = World::new();
        let behind = w.add(800.0, 36.0);
        let searcher = w.add(900.0, 36.0);
        w.platoons.create(&mut w.fleet, behind, 0.0).unwrap();

        let view = w.view();
        let row = view.fleet.row(searcher).unwrap();
        let candidates = view.join_candidates();
        let c = candidates
            .iter()
            .find(|c| matches!(c.target, JoinTarget::Platoon(_)))
            .unwrap();
        assert!(score(&ScoringParams::default(), &view, row, c).is_none());
    }

    #[test]
    fn speed_threshold_filters() {
        let mut w = World::new();
        let fast = w.add(1_000.0, 50.0);
        let searcher = w.add(900.0, 36.0);
        w.platoons.create(&mut w.fleet, fast, 0.0).unwrap();

        let view = w.view();
        let row = view.fleet.row(searcher).unwrap();
        let candidates = view.join_candidates();
        let c = candidates
            .iter()
            .find(|c| matches!(c.target, JoinTarget::Platoon(_)))
            .unwrap();
        // |50 − 36| = 14 > 0.1 · 36
        assert!(score(&ScoringParams::default(), &view, row, c).is_none());
    }

    #[test]
    fn position_threshold_filters() {
        let mut w = World::new();
        let far = w.add(1_500.0, 36.0);
        let searcher = w.add(900.0, 36.0);
        w.platoons.create(&mut w.fleet, far, 0.0).unwrap();

        let view = w.view();
        let row = view.fleet.row(searcher).unwrap();
        let candidates = view.join_candidates();
        let c = candidates
            .iter()
            .find(|c| matches!(c.target, JoinTarget::Platoon(_)))
            .unwrap();
        // gap ≈ 596 m > 300 m threshold
        assert!(score(&ScoringParams::default(), &view, row, c).is_none());
    }

    #[test]
    fn alpha_trades_speed_against_position() {
        let mut w = World::new();
        // same-speed platoon farther away vs. slightly-faster platoon nearby
        let same_speed_far = w.add(1_150.0, 36.0);
        let faster_near = w.add(1_000.0, 38.0);
        let searcher = w.add(900.0, 36.0);
        w.platoons.create(&mut w.fleet, same_speed_far, 0.0).unwrap();
        w.platoons.create(&mut w.fleet, faster_near, 0.0).unwrap();

        // position-dominated: nearby wins despite the speed gap
        let algo = SpeedPosition::new(ScoringParams { alpha: 0.01, ..ScoringParams::default() });
        let outcome = algo.on_step(&w.view()).unwrap();
        let expected = JoinTarget::Platoon(w.fleet.platoon_id[w.fleet.row(faster_near).unwrap()]);
        assert_eq!(joins_of(&outcome.commands), vec![(searcher, expected)]);

        // speed-dominated: the same-speed platoon wins despite the distance
        let algo = SpeedPosition::new(ScoringParams { alpha: 0.99, ..ScoringParams::default() });
        let outcome = algo.on_step(&w.view()).unwrap();
        let expected = JoinTarget::Platoon(w.fleet.platoon_id[w.fleet.row(same_speed_far).unwrap()]);
        assert_eq!(joins_of(&outcome.commands), vec![(searcher, expected)]);
    }

    #[test]
    fn out_of_range_candidates_invisible() {
        let mut w = World::new();
        let leader = w.add(2_500.0, 36.0);
        let _searcher = w.add(100.0, 36.0);
        w.platoons.create(&mut w.fleet, leader, 0.0).unwrap();

        // communication range (1000 m) is checked before anything else
        let algo = SpeedPosition::new(ScoringParams {
            position_deviation_threshold: 1e9,
            ..ScoringParams::default()
        });
        let outcome = algo.on_step(&w.view()).unwrap();
        assert!(joins_of(&outcome.commands).is_empty());
    }
}

// ── Centralized greedy ────────────────────────────────────────────────────────

#[cfg(test)]
mod greedy_tests {
    use super::*;

    #[test]
    fn greedy_assigns_in_arrival_order_with_masking() {
        let mut w = World::new();
        let leader = w.add(1_000.0, 36.0);
        let first = w.add(900.0, 36.0);
        let second = w.add(880.0, 36.0);
        let pid = w.platoons.create(&mut w.fleet, leader, 0.0).unwrap();

        let algo = CentralizedFormation::new(CentralizedKind::Greedy, ScoringParams::default());
        let outcome = algo.on_step(&w.view()).unwrap();
        let joins = joins_of(&outcome.commands);

        // Both searchers request the platoon (an existing platoon may receive
        // several requests per round; the apply order serializes them), but
        // `first` is masked as a *candidate* once it has joined something —
        // `second` must not target it.
        assert!(joins.contains(&(first, JoinTarget::Platoon(pid))));
        assert!(joins.contains(&(second, JoinTarget::Platoon(pid))));
        assert!(!joins.contains(&(second, JoinTarget::Vehicle(first))));
    }

    #[test]
    fn two_solo_vehicles_pair_up() {
        let mut w = World::new();
        let front = w.add(1_000.0, 36.0);
        let back = w.add(950.0, 36.0);

        let algo = CentralizedFormation::new(CentralizedKind::Greedy, ScoringParams::default());
        let outcome = algo.on_step(&w.view()).unwrap();
        let joins = joins_of(&outcome.commands);
        assert_eq!(joins, vec![(back, JoinTarget::Vehicle(front))]);
    }
}

// ── Solver ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod solver_tests {
    use super::*;

    fn problem() -> AssignmentProblem {
        // two searchers, two targets; searcher 0 is cheap on target 0,
        // searcher 1 cheap on both but must yield target 0
        AssignmentProblem {
            searchers: vec![VehicleId(10), VehicleId(11)],
            targets: vec![
                JoinTarget::Vehicle(VehicleId(0)),
                JoinTarget::Vehicle(VehicleId(1)),
            ],
            cost: vec![
                1.0, 50.0, REMAIN_ALONE_COST, // searcher 10
                2.0, 3.0, REMAIN_ALONE_COST, // searcher 11
            ],
        }
    }

    #[test]
    fn greedy_solver_respects_one_joiner_per_target() {
        let outcome = GreedySolver
            .solve(&problem(), Duration::from_secs(1))
            .unwrap();
        assert_eq!(outcome, SolverOutcome::Solved(vec![0, 1]));
    }

    #[test]
    fn greedy_solver_falls_back_to_alone() {
        let p = AssignmentProblem {
            searchers: vec![VehicleId(10)],
            targets: vec![],
            cost: vec![REMAIN_ALONE_COST],
        };
        let outcome = GreedySolver.solve(&p, Duration::from_secs(1)).unwrap();
        assert_eq!(outcome, SolverOutcome::Solved(vec![0]));
    }

    struct AlwaysTimeout;
    impl AssignmentSolver for AlwaysTimeout {
        fn solve(
            &self,
            _problem: &AssignmentProblem,
            _budget: Duration,
        ) -> FormationResult<SolverOutcome> {
            Ok(SolverOutcome::TimedOut)
        }
    }

    #[test]
    fn optimal_times_out_into_greedy_fallback() {
        let mut w = World::new();
        let leader = w.add(1_000.0, 36.0);
        let searcher = w.add(900.0, 36.0);
        let pid = w.platoons.create(&mut w.fleet, leader, 0.0).unwrap();

        let algo = CentralizedFormation::new(
            CentralizedKind::Optimal {
                solver: Box::new(AlwaysTimeout),
                budget: Duration::from_millis(1),
            },
            ScoringParams::default(),
        );
        let outcome = algo.on_step(&w.view()).unwrap();
        assert_eq!(outcome.solver_timeouts, 1);
        assert_eq!(
            joins_of(&outcome.commands),
            vec![(searcher, JoinTarget::Platoon(pid))]
        );
    }

    #[test]
    fn optimal_applies_solver_assignment() {
        let mut w = World::new();
        let leader = w.add(1_000.0, 36.0);
        let searcher = w.add(900.0, 36.0);
        let pid = w.platoons.create(&mut w.fleet, leader, 0.0).unwrap();

        let algo = CentralizedFormation::new(
            CentralizedKind::Optimal {
                solver: Box::new(GreedySolver),
                budget: Duration::from_secs(1),
            },
            ScoringParams::default(),
        );
        let outcome = algo.on_step(&w.view()).unwrap();
        assert_eq!(outcome.solver_timeouts, 0);
        assert_eq!(
            joins_of(&outcome.commands),
            vec![(searcher, JoinTarget::Platoon(pid))]
        );
    }
}
