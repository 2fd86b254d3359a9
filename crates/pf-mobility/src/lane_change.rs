//! The lane-change model.
//!
//! Per vehicle, in priority order: stay when no move is safe; overtake to the
//! left (higher lane index) when a slower predecessor blocks the desired
//! speed; otherwise drift back to the right.  Platoon followers never move on
//! their own — the leader decides for the whole platoon and all members move
//! only if the move is safe for every one of them.
//!
//! Decisions are taken against the phase snapshot and returned as proposals;
//! [`commit_lane_changes`] applies them atomically, dropping any proposal
//! that would overlap an earlier-committed move (ascending-id priority, which
//! keeps the `(step, phase, id)` event order deterministic).

use pf_core::{PlatoonId, Road, VehicleId};
use pf_fleet::{CfModel, Fleet, PlatoonRole, VehicleTypeRegistry};
use tracing::debug;

use crate::order::{predecessor_on_lane, successor_on_lane};

/// Why a vehicle changed lanes (recorded in the `vehicle_changes` trace).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChangeReason {
    /// Overtaking a slower vehicle.
    SpeedGain,
    /// Returning to the rightmost usable lane.
    KeepRight,
}

impl ChangeReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeReason::SpeedGain => "speedGain",
            ChangeReason::KeepRight => "keepRight",
        }
    }
}

/// A staged move of one vehicle or one whole platoon.
#[derive(Clone, Debug)]
pub struct LaneChangeProposal {
    /// Rows that move together (singleton unless a platoon moves).
    pub rows: Vec<usize>,
    pub to: u8,
    pub reason: ChangeReason,
}

/// An applied lane change, for traces and statistics.
#[derive(Clone, Debug)]
pub struct LaneChange {
    pub vehicle: VehicleId,
    pub from: u8,
    pub to: u8,
    pub position: f64,
    pub speed: f64,
    pub reason: ChangeReason,
}

/// Headway time the safety predicate uses for a given row.
#[inline]
fn headway_time(fleet: &Fleet, types: &VehicleTypeRegistry, row: usize, acc_headway: f64) -> f64 {
    match fleet.cf_model[row] {
        CfModel::Human => types.get(fleet.vtype[row]).headway_time,
        CfModel::Acc | CfModel::Cacc => acc_headway,
    }
}

/// Whether `row` can move to `target_lane` without endangering anyone.
///
/// Safe means the front gap on the target lane exceeds the vehicle's own
/// headway distance and the rear gap exceeds the follower's headway distance
/// (both floored at the respective min-gap).
pub fn is_lane_change_safe(
    fleet: &Fleet,
    types: &VehicleTypeRegistry,
    row: usize,
    target_lane: u8,
    acc_headway: f64,
) -> bool {
    if fleet.lane[row] == target_lane {
        return true;
    }

    if let Some(p) = predecessor_on_lane(fleet, types, row, target_lane) {
        let gap_ahead = fleet.rear_position(p, types) - fleet.position[row];
        let vt = types.get(fleet.vtype[row]);
        let needed = vt.min_gap.max(fleet.speed[row] * headway_time(fleet, types, row, acc_headway));
        if gap_ahead <= needed {
            return false;
        }
    }

    if let Some(s) = successor_on_lane(fleet, types, row, target_lane) {
        let gap_behind = fleet.rear_position(row, types) - fleet.position[s];
        let vt_s = types.get(fleet.vtype[s]);
        let needed =
            vt_s.min_gap.max(fleet.speed[s] * headway_time(fleet, types, s, acc_headway));
        if gap_behind <= needed {
            return false;
        }
    }

    true
}

/// Rows of every member of `platoon`, leader first.
fn platoon_rows(fleet: &Fleet, platoon: PlatoonId) -> Vec<usize> {
    let mut rows: Vec<usize> = fleet
        .rows()
        .filter(|&r| fleet.platoon_id[r] == platoon)
        .collect();
    rows.sort_by_key(|&r| fleet.platoon_index[r]);
    rows
}

/// Decide lane changes for the whole fleet against the snapshot.
pub fn propose_lane_changes(
    fleet: &Fleet,
    types: &VehicleTypeRegistry,
    road: &Road,
    acc_headway: f64,
) -> Vec<LaneChangeProposal> {
    let mut by_id: Vec<usize> = fleet.rows().collect();
    by_id.sort_by_key(|&r| fleet.ids[r]);

    let mut proposals = Vec::new();
    for row in by_id {
        // Followers move only with their platoon.
        if fleet.platoon_role[row] == PlatoonRole::Follower {
            continue;
        }

        let lane = fleet.lane[row];
        let (target, reason) = if fleet.blocked_front[row] {
            if lane >= road.leftmost_lane() {
                continue;
            }
            (lane + 1, ChangeReason::SpeedGain)
        } else {
            if lane == 0 {
                continue;
            }
            (lane - 1, ChangeReason::KeepRight)
        };

        let rows = if fleet.platoon_role[row] == PlatoonRole::Leader {
            platoon_rows(fleet, fleet.platoon_id[row])
        } else {
            vec![row]
        };

        let all_safe = rows
            .iter()
            .all(|&r| is_lane_change_safe(fleet, types, r, target, acc_headway));
        if all_safe {
            proposals.push(LaneChangeProposal { rows, to: target, reason });
        } else {
            debug!(vehicle = %fleet.ids[row], target, "lane change not safe");
        }
    }
    proposals
}

/// Apply the proposals atomically.
///
/// Two movers whose snapshot-safe decisions would put them on top of each
/// other are serialized by ascending id: the later proposal is dropped whole
/// (a platoon never moves partially).
pub fn commit_lane_changes(
    fleet: &mut Fleet,
    types: &VehicleTypeRegistry,
    proposals: &[LaneChangeProposal],
) -> Vec<LaneChange> {
    let mut staged = fleet.lane.clone();
    let mut applied = Vec::new();

    'proposal: for p in proposals {
        for &row in &p.rows {
            let pos = fleet.position[row];
            let rear = fleet.rear_position(row, types);
            for other in fleet.rows() {
                if p.rows.contains(&other) || staged[other] != p.to {
                    continue;
                }
                let o_pos = fleet.position[other];
                let o_rear = fleet.rear_position(other, types);
                if pos.min(o_pos) - rear.max(o_rear) >= 0.0 {
                    debug!(vehicle = %fleet.ids[row], to = p.to, "lane change dropped at commit");
                    continue 'proposal;
                }
            }
        }
        for &row in &p.rows {
            let from = staged[row];
            staged[row] = p.to;
            applied.push(LaneChange {
                vehicle: fleet.ids[row],
                from,
                to: p.to,
                position: fleet.position[row],
                speed: fleet.speed[row],
                reason: p.reason,
            });
        }
    }

    fleet.lane = staged;
    applied
}
