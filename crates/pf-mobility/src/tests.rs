//! Unit tests for pf-mobility.

use pf_core::{Road, SimRng, VehicleTypeId};
use pf_fleet::{CfModel, Fleet, NewVehicle, PlatoonRole, VehicleType, VehicleTypeRegistry};

use crate::cf::{compute_new_speeds, CfContext};
use crate::collision::{detect_collisions, separate};
use crate::gap::is_gap_safe;
use crate::lane_change::{commit_lane_changes, propose_lane_changes};
use crate::order::{lane_order, OPEN_ROAD};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn setup() -> (VehicleTypeRegistry, VehicleTypeId, Road) {
    let mut reg = VehicleTypeRegistry::new();
    let car = reg.register(VehicleType::passenger_car());
    let road = Road::new(100_000.0, 4, 1_000.0, 55.0).unwrap();
    (reg, car, road)
}

fn place(
    fleet: &mut Fleet,
    vtype: VehicleTypeId,
    position: f64,
    lane: u8,
    speed: f64,
    desired: f64,
    model: CfModel,
) -> usize {
    let id = fleet.spawn(NewVehicle {
        vtype,
        depart_time: 0.0,
        depart_position: position,
        depart_lane: lane,
        depart_speed: speed,
        depart_delay: 0.0,
        arrival_position: 100_000.0,
        desired_speed: desired,
        cf_model: model,
        platooning: model != CfModel::Human,
        prefilled: false,
        formation_phase: 0.0,
        color: [200, 200, 200],
    });
    fleet.row(id).unwrap()
}

fn ctx<'a>(reg: &'a VehicleTypeRegistry, road: &'a Road) -> CfContext<'a> {
    CfContext {
        types: reg,
        road,
        step_length: 1.0,
        acc_headway_time: 1.0,
        acc_lambda: 0.1,
        cacc_spacing: 5.0,
        speed_imperfection: 0.0,
    }
}

// ── Lane ordering ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod order_tests {
    use super::*;

    #[test]
    fn lanes_sorted_front_to_back() {
        let (reg, car, _road) = setup();
        let mut fleet = Fleet::new();
        place(&mut fleet, car, 100.0, 0, 30.0, 36.0, CfModel::Human);
        place(&mut fleet, car, 300.0, 0, 30.0, 36.0, CfModel::Human);
        place(&mut fleet, car, 200.0, 1, 30.0, 36.0, CfModel::Human);

        let order = lane_order(&fleet, 4);
        let lane0: Vec<f64> = order.lanes[0].iter().map(|&r| fleet.position[r]).collect();
        assert_eq!(lane0, vec![300.0, 100.0]);
        assert_eq!(order.lanes[1].len(), 1);
        assert!(order.lanes[2].is_empty());

        // lane head gets the open-road sentinel
        let (ps, pr) = order.predecessor_of(&fleet, &reg, 0, 0);
        assert_eq!(ps, OPEN_ROAD);
        assert_eq!(pr, OPEN_ROAD);

        // second vehicle sees the head's rear bumper
        let (_, pr) = order.predecessor_of(&fleet, &reg, 0, 1);
        assert_eq!(pr, 296.0); // 300 − 4 m length
    }

    #[test]
    fn position_ties_break_by_id() {
        let (_, car, _) = setup();
        let mut fleet = Fleet::new();
        let a = place(&mut fleet, car, 100.0, 0, 30.0, 36.0, CfModel::Human);
        let b = place(&mut fleet, car, 100.0, 0, 30.0, 36.0, CfModel::Human);
        let order = lane_order(&fleet, 1);
        assert_eq!(order.lanes[0], vec![a, b]);
    }
}

// ── Gap safety ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod gap_tests {
    use super::*;

    #[test]
    fn wide_gap_is_safe() {
        assert!(is_gap_safe(500.0, 30.0, 15.0, 4.0, 100.0, 30.0, 2.5, 1.0));
    }

    #[test]
    fn touching_gap_is_unsafe() {
        // back vehicle accelerating into a braking front vehicle 10 m ahead
        assert!(!is_gap_safe(110.0, 30.0, 15.0, 4.0, 100.0, 30.0, 2.5, 1.0));
    }

    #[test]
    fn standstill_pair_with_margin_is_safe() {
        assert!(is_gap_safe(110.0, 0.0, 15.0, 4.0, 100.0, 0.0, 2.5, 1.0));
    }
}

// ── Car-following ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod cf_tests {
    use super::*;

    #[test]
    fn human_accelerates_toward_desired_on_open_road() {
        let (reg, car, road) = setup();
        let mut fleet = Fleet::new();
        let r = place(&mut fleet, car, 100.0, 0, 30.0, 36.0, CfModel::Human);
        let order = lane_order(&fleet, 4);
        let mut rng = SimRng::new(1);
        let out = compute_new_speeds(&fleet, &order, &ctx(&reg, &road), &mut rng);
        assert_eq!(out.new_speed[r], 32.5); // 30 + 2.5 m/s² · 1 s
        assert!(!out.blocked[r]);
    }

    #[test]
    fn human_holds_desired_speed() {
        let (reg, car, road) = setup();
        let mut fleet = Fleet::new();
        let r = place(&mut fleet, car, 100.0, 0, 36.0, 36.0, CfModel::Human);
        let order = lane_order(&fleet, 4);
        let mut rng = SimRng::new(1);
        let out = compute_new_speeds(&fleet, &order, &ctx(&reg, &road), &mut rng);
        assert_eq!(out.new_speed[r], 36.0);
    }

    #[test]
    fn human_blocked_by_slow_predecessor() {
        let (reg, car, road) = setup();
        let mut fleet = Fleet::new();
        place(&mut fleet, car, 130.0, 0, 10.0, 36.0, CfModel::Human);
        let back = place(&mut fleet, car, 100.0, 0, 30.0, 36.0, CfModel::Human);
        let order = lane_order(&fleet, 4);
        let mut rng = SimRng::new(1);
        let out = compute_new_speeds(&fleet, &order, &ctx(&reg, &road), &mut rng);
        assert!(out.blocked[back]);
        assert!(out.new_speed[back] < 30.0, "must brake below current speed");
        assert!(out.new_speed[back] >= 30.0 - 15.0, "bounded by max deceleration");
    }

    #[test]
    fn speeds_never_negative_or_above_limits() {
        let (reg, car, road) = setup();
        let mut fleet = Fleet::new();
        // stopped vehicle right behind another stopped vehicle
        place(&mut fleet, car, 106.0, 0, 0.0, 36.0, CfModel::Human);
        let back = place(&mut fleet, car, 100.0, 0, 0.0, 36.0, CfModel::Human);
        // speeder beyond the road limit
        let fast = place(&mut fleet, car, 500.0, 1, 54.0, 80.0, CfModel::Human);
        let order = lane_order(&fleet, 4);
        let mut rng = SimRng::new(1);
        let out = compute_new_speeds(&fleet, &order, &ctx(&reg, &road), &mut rng);
        assert!(out.new_speed[back] >= 0.0);
        assert!(out.new_speed[fast] <= road.max_speed);
    }

    #[test]
    fn acc_free_driving_reaches_desired() {
        let (reg, car, road) = setup();
        let mut fleet = Fleet::new();
        let r = place(&mut fleet, car, 100.0, 0, 36.0, 36.0, CfModel::Acc);
        let order = lane_order(&fleet, 4);
        let mut rng = SimRng::new(1);
        let out = compute_new_speeds(&fleet, &order, &ctx(&reg, &road), &mut rng);
        assert_eq!(out.new_speed[r], 36.0);
        assert!(!out.blocked[r]);
    }

    #[test]
    fn acc_closes_on_slower_predecessor_without_collision_speed() {
        let (reg, car, road) = setup();
        let mut fleet = Fleet::new();
        place(&mut fleet, car, 140.0, 0, 20.0, 20.0, CfModel::Acc);
        let back = place(&mut fleet, car, 100.0, 0, 30.0, 36.0, CfModel::Acc);
        let order = lane_order(&fleet, 4);
        let mut rng = SimRng::new(1);
        let out = compute_new_speeds(&fleet, &order, &ctx(&reg, &road), &mut rng);
        assert!(out.new_speed[back] < 30.0, "must slow toward predecessor speed");
    }

    #[test]
    fn cacc_follower_copies_leader_speed_at_exact_spacing() {
        let (reg, car, road) = setup();
        let mut fleet = Fleet::new();
        // leader at 18, follower at 9: gap = 18 − 4 − 9 = 5 = spacing
        let leader_row = place(&mut fleet, car, 18.0, 0, 30.0, 30.0, CfModel::Acc);
        let follower_row = place(&mut fleet, car, 9.0, 0, 30.0, 30.0, CfModel::Cacc);
        let leader_id = fleet.ids[leader_row];
        fleet.platoon_role[leader_row] = PlatoonRole::Leader;
        fleet.platoon_role[follower_row] = PlatoonRole::Follower;
        fleet.platoon_leader[follower_row] = leader_id;

        let order = lane_order(&fleet, 4);
        let mut rng = SimRng::new(1);
        let out = compute_new_speeds(&fleet, &order, &ctx(&reg, &road), &mut rng);
        assert_eq!(out.new_speed[follower_row], out.new_speed[leader_row]);
        assert_eq!(out.new_speed[follower_row], 30.0);
    }

    #[test]
    fn cacc_follower_corrects_spacing_error() {
        let (reg, car, road) = setup();
        let mut fleet = Fleet::new();
        // gap is 7 m, spacing 5 m → u = (30 − 30 − 0.1·(5 − 7)) / 1 = 0.2
        let leader_row = place(&mut fleet, car, 20.0, 0, 30.0, 30.0, CfModel::Acc);
        let follower_row = place(&mut fleet, car, 9.0, 0, 30.0, 30.0, CfModel::Cacc);
        let leader_id = fleet.ids[leader_row];
        fleet.platoon_role[leader_row] = PlatoonRole::Leader;
        fleet.platoon_role[follower_row] = PlatoonRole::Follower;
        fleet.platoon_leader[follower_row] = leader_id;

        let order = lane_order(&fleet, 4);
        let mut rng = SimRng::new(1);
        let out = compute_new_speeds(&fleet, &order, &ctx(&reg, &road), &mut rng);
        assert!((out.new_speed[follower_row] - 30.2).abs() < 1e-9);
    }

    #[test]
    fn cacc_law_tracks_leader_with_gap_spring() {
        let (reg, car, road) = setup();
        let mut fleet = Fleet::new();
        // follower at 10 m/s, leader at 12 m/s, gap 4 m, spacing 5 m:
        // u = (12 − 10 − 0.1·(5 − 4)) / 1 = 1.9 → new speed 11.9
        let leader_row = place(&mut fleet, car, 18.0, 0, 12.0, 12.0, CfModel::Acc);
        let follower_row = place(&mut fleet, car, 10.0, 0, 10.0, 12.0, CfModel::Cacc);
        let leader_id = fleet.ids[leader_row];
        fleet.platoon_role[leader_row] = PlatoonRole::Leader;
        fleet.platoon_role[follower_row] = PlatoonRole::Follower;
        fleet.platoon_leader[follower_row] = leader_id;

        let order = lane_order(&fleet, 4);
        let mut rng = SimRng::new(1);
        let out = compute_new_speeds(&fleet, &order, &ctx(&reg, &road), &mut rng);
        assert!((out.new_speed[follower_row] - 11.9).abs() < 1e-9);
    }

    #[test]
    fn dawdling_reduces_speed_when_enabled() {
        let (reg, car, road) = setup();
        let mut fleet = Fleet::new();
        let r = place(&mut fleet, car, 100.0, 0, 36.0, 36.0, CfModel::Human);
        let order = lane_order(&fleet, 4);
        let mut cf_ctx = ctx(&reg, &road);
        cf_ctx.speed_imperfection = 1.0;
        let mut rng = SimRng::new(7);
        let out = compute_new_speeds(&fleet, &order, &cf_ctx, &mut rng);
        assert!(out.new_speed[r] < 36.0);
        assert!(out.new_speed[r] >= 35.0);
    }
}

// ── Lane changes ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod lane_change_tests {
    use super::*;
    use crate::lane_change::ChangeReason;

    #[test]
    fn free_vehicle_keeps_right() {
        let (reg, car, road) = setup();
        let mut fleet = Fleet::new();
        let r = place(&mut fleet, car, 100.0, 2, 30.0, 36.0, CfModel::Human);
        let proposals = propose_lane_changes(&fleet, &reg, &road, 1.0);
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].to, 1);
        assert_eq!(proposals[0].reason, ChangeReason::KeepRight);
        let applied = commit_lane_changes(&mut fleet, &reg, &proposals);
        assert_eq!(applied.len(), 1);
        assert_eq!(fleet.lane[r], 1);
    }

    #[test]
    fn blocked_vehicle_overtakes_left() {
        let (reg, car, road) = setup();
        let mut fleet = Fleet::new();
        let r = place(&mut fleet, car, 100.0, 0, 30.0, 36.0, CfModel::Human);
        fleet.blocked_front[r] = true;
        let proposals = propose_lane_changes(&fleet, &reg, &road, 1.0);
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].to, 1);
        assert_eq!(proposals[0].reason, ChangeReason::SpeedGain);
    }

    #[test]
    fn unsafe_target_lane_stays() {
        let (reg, car, road) = setup();
        let mut fleet = Fleet::new();
        // vehicle on lane 1 wants to keep right, but lane 0 is occupied
        let r = place(&mut fleet, car, 100.0, 1, 30.0, 36.0, CfModel::Human);
        place(&mut fleet, car, 105.0, 0, 30.0, 36.0, CfModel::Human);
        let proposals = propose_lane_changes(&fleet, &reg, &road, 1.0);
        assert!(proposals.iter().all(|p| !p.rows.contains(&r)));
    }

    #[test]
    fn follower_never_moves_alone() {
        let (reg, car, road) = setup();
        let mut fleet = Fleet::new();
        let r = place(&mut fleet, car, 100.0, 2, 30.0, 36.0, CfModel::Cacc);
        fleet.platoon_role[r] = PlatoonRole::Follower;
        let proposals = propose_lane_changes(&fleet, &reg, &road, 1.0);
        assert!(proposals.is_empty());
    }

    #[test]
    fn commit_drops_conflicting_move() {
        let (reg, car, road) = setup();
        let mut fleet = Fleet::new();
        // both co-located longitudinally, on lanes 1 and 3 of a 4-lane road;
        // the lane-1 car keeps right (→0) while the lane-3 car also keeps
        // right (→2): no conflict.  Force a conflict instead: both end on 2.
        let a = place(&mut fleet, car, 100.0, 3, 30.0, 36.0, CfModel::Human);
        let b = place(&mut fleet, car, 101.0, 1, 30.0, 36.0, CfModel::Human);
        fleet.blocked_front[b] = true; // b overtakes to lane 2
        let proposals = propose_lane_changes(&fleet, &reg, &road, 1.0);
        assert_eq!(proposals.len(), 2);
        let applied = commit_lane_changes(&mut fleet, &reg, &proposals);
        // a (lower id) wins lane 2; b's overlapping move is dropped whole
        assert_eq!(applied.len(), 1);
        assert_eq!(fleet.lane[a], 2);
        assert_eq!(fleet.lane[b], 1);
    }

    #[test]
    fn platoon_moves_atomically() {
        let (reg, car, road) = setup();
        let mut fleet = Fleet::new();
        use pf_core::PlatoonId;
        let leader = place(&mut fleet, car, 118.0, 1, 30.0, 30.0, CfModel::Acc);
        let follower = place(&mut fleet, car, 109.0, 1, 30.0, 30.0, CfModel::Cacc);
        let pid = PlatoonId(0);
        fleet.platoon_role[leader] = PlatoonRole::Leader;
        fleet.platoon_role[follower] = PlatoonRole::Follower;
        fleet.platoon_id[leader] = pid;
        fleet.platoon_id[follower] = pid;
        fleet.platoon_index[leader] = 0;
        fleet.platoon_index[follower] = 1;

        let proposals = propose_lane_changes(&fleet, &reg, &road, 1.0);
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].rows.len(), 2);
        commit_lane_changes(&mut fleet, &reg, &proposals);
        assert_eq!(fleet.lane[leader], 0);
        assert_eq!(fleet.lane[follower], 0);
    }

    #[test]
    fn platoon_stays_when_one_member_unsafe() {
        let (reg, car, road) = setup();
        let mut fleet = Fleet::new();
        use pf_core::PlatoonId;
        let leader = place(&mut fleet, car, 118.0, 1, 30.0, 30.0, CfModel::Acc);
        let follower = place(&mut fleet, car, 109.0, 1, 30.0, 30.0, CfModel::Cacc);
        // blocker on lane 0 right beside the follower
        place(&mut fleet, car, 110.0, 0, 30.0, 36.0, CfModel::Human);
        let pid = PlatoonId(0);
        fleet.platoon_role[leader] = PlatoonRole::Leader;
        fleet.platoon_role[follower] = PlatoonRole::Follower;
        fleet.platoon_id[leader] = pid;
        fleet.platoon_id[follower] = pid;
        fleet.platoon_index[leader] = 0;
        fleet.platoon_index[follower] = 1;

        let proposals = propose_lane_changes(&fleet, &reg, &road, 1.0);
        assert!(proposals.iter().all(|p| !p.rows.contains(&leader)));
        assert_eq!(fleet.lane[leader], 1);
        assert_eq!(fleet.lane[follower], 1);
    }
}

// ── Collisions ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod collision_tests {
    use super::*;

    #[test]
    fn clean_lane_reports_nothing() {
        let (reg, car, _) = setup();
        let mut fleet = Fleet::new();
        place(&mut fleet, car, 100.0, 0, 30.0, 36.0, CfModel::Human);
        place(&mut fleet, car, 200.0, 0, 30.0, 36.0, CfModel::Human);
        let order = lane_order(&fleet, 1);
        assert!(detect_collisions(&fleet, &reg, &order).is_empty());
    }

    #[test]
    fn overlap_detected_with_depth() {
        let (reg, car, _) = setup();
        let mut fleet = Fleet::new();
        let front = place(&mut fleet, car, 103.0, 0, 30.0, 36.0, CfModel::Human);
        let back = place(&mut fleet, car, 100.0, 0, 30.0, 36.0, CfModel::Human);
        let order = lane_order(&fleet, 1);
        let collisions = detect_collisions(&fleet, &reg, &order);
        assert_eq!(collisions.len(), 1);
        assert_eq!(collisions[0].front, fleet.ids[front]);
        assert_eq!(collisions[0].back, fleet.ids[back]);
        assert!((collisions[0].overlap - 1.0).abs() < 1e-9); // 100 − (103 − 4)
    }

    #[test]
    fn different_lanes_never_collide() {
        let (reg, car, _) = setup();
        let mut fleet = Fleet::new();
        place(&mut fleet, car, 103.0, 0, 30.0, 36.0, CfModel::Human);
        place(&mut fleet, car, 100.0, 1, 30.0, 36.0, CfModel::Human);
        let order = lane_order(&fleet, 2);
        assert!(detect_collisions(&fleet, &reg, &order).is_empty());
    }

    #[test]
    fn separate_restores_min_gap() {
        let (reg, car, _) = setup();
        let mut fleet = Fleet::new();
        let front = place(&mut fleet, car, 103.0, 0, 20.0, 36.0, CfModel::Human);
        let back = place(&mut fleet, car, 100.0, 0, 30.0, 36.0, CfModel::Human);
        let order = lane_order(&fleet, 1);
        let collisions = detect_collisions(&fleet, &reg, &order);
        separate(&mut fleet, &reg, &collisions[0]);

        // back bumper-to-bumper gap is now exactly the min gap
        let front_rear = fleet.position[front] - 4.0;
        assert!((front_rear - fleet.position[back] - 2.5).abs() < 1e-9);
        assert!(fleet.speed[back] <= fleet.speed[front]);

        let order = lane_order(&fleet, 1);
        assert!(detect_collisions(&fleet, &reg, &order).is_empty());
    }
}

// ── Emissions ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod emission_tests {
    use super::*;
    use crate::emissions::{instantaneous_rates, platoon_drag_reduction};
    use pf_fleet::EmissionClass;

    #[test]
    fn deceleration_emits_nothing() {
        let rates = instantaneous_rates(EmissionClass::PcGEu4, 30.0, -1.0);
        assert_eq!(rates.co2, 0.0);
        assert_eq!(rates.fuel, 0.0);
    }

    #[test]
    fn cruising_emits() {
        let rates = instantaneous_rates(EmissionClass::PcGEu4, 36.0, 0.0);
        assert!(rates.co2 > 0.0);
        assert!(rates.fuel > 0.0);
        assert!(rates.nox > 0.0);
    }

    #[test]
    fn rates_never_negative() {
        // low speed where the negative linear term dominates some pollutants
        let rates = instantaneous_rates(EmissionClass::PcGEu4, 2.0, 0.0);
        for r in [rates.co, rates.co2, rates.hc, rates.pmx, rates.nox, rates.fuel] {
            assert!(r >= 0.0);
        }
    }

    #[test]
    fn drag_reduction_by_slot() {
        assert_eq!(platoon_drag_reduction(PlatoonRole::None, false), 1.0);
        let leader = platoon_drag_reduction(PlatoonRole::Leader, false);
        let mid = platoon_drag_reduction(PlatoonRole::Follower, false);
        let tail = platoon_drag_reduction(PlatoonRole::Follower, true);
        assert!(leader < 1.0);
        assert!(mid < tail && tail < leader);
    }

    #[test]
    fn accumulate_scales_with_step_length() {
        use pf_fleet::EmissionTotals;
        let rates = instantaneous_rates(EmissionClass::PcGEu4, 30.0, 0.0);
        let mut a = EmissionTotals::default();
        let mut b = EmissionTotals::default();
        rates.accumulate_into(&mut a, 1.0);
        rates.accumulate_into(&mut b, 0.5);
        rates.accumulate_into(&mut b, 0.5);
        assert!((a.co2 - b.co2).abs() < 1e-9);
    }
}
