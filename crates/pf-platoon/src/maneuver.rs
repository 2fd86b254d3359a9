//! Join and leave maneuvers.
//!
//! # The join state machine
//!
//! ```text
//! idle ──schedule──▶ joining ──commit──▶ follower (idle)
//!                      │
//!                      └──abort──▶ idle  (reason recorded)
//! ```
//!
//! A scheduled join waits out the *approach delay*
//! `τ_app = clamp(|gap to tail| / max(ε, v_des − p_des), 0, τ_max)` and then
//! relocates the joiner in one bounded teleport: position to the platoon
//! tail minus the CACC spacing, lane and speed of the platoon.  All commit
//! invariants are checked before any column is written — a failed commit
//! leaves the fleet exactly as it was.
//!
//! Pending joins live in a `BTreeMap<Tick, Vec<_>>` due-queue drained at
//! each step, so a step never scans maneuvers that are not due.
//!
//! Leaves are immediate membership changes; the vehicle spends one step in
//! `leaving` (the abstract lateral offset) before returning to `idle`.

use std::collections::BTreeMap;

use pf_core::{PlatoonId, Road, SimClock, Tick, VehicleId};
use pf_fleet::{Fleet, ManeuverState, PlatoonRole, VehicleTypeRegistry};
use pf_mobility::{is_gap_safe, is_lane_change_safe};
use tracing::{debug, info, warn};

use crate::registry::{LeaveKind, PlatoonRegistry};
use crate::{PlatoonError, PlatoonResult};

// ── Outcomes ──────────────────────────────────────────────────────────────────

/// Why a committed-to join gave up.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum JoinAbortReason {
    /// The target platoon no longer exists.
    TargetDisbanded,
    /// The teleport would exceed the configured maximum distance.
    TeleportTooFar,
    /// The destination is off the road or cannot be made safe.
    DestinationUnsafe,
    /// The destination stayed unsafe past the maneuver time budget.
    Budget,
}

impl JoinAbortReason {
    pub fn as_str(self) -> &'static str {
        match self {
            JoinAbortReason::TargetDisbanded => "targetDisbanded",
            JoinAbortReason::TeleportTooFar => "teleportTooFar",
            JoinAbortReason::DestinationUnsafe => "destinationUnsafe",
            JoinAbortReason::Budget => "budget",
        }
    }
}

/// Why a join request was refused at scheduling time (no state changed).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum JoinReject {
    AlreadyInPlatoon,
    InManeuver,
    LeaderBusy,
    UnknownVehicle,
    UnknownPlatoon,
    NotCapable,
}

/// Everything the simulation records about maneuver progress.
#[derive(Clone, Debug)]
pub enum ManeuverEvent {
    JoinScheduled {
        vehicle: VehicleId,
        platoon: PlatoonId,
        due: Tick,
    },
    JoinCompleted {
        vehicle: VehicleId,
        platoon: PlatoonId,
        teleport_distance: f64,
    },
    JoinAborted {
        vehicle: VehicleId,
        platoon: PlatoonId,
        reason: JoinAbortReason,
    },
    LeaveCompleted {
        vehicle: VehicleId,
        platoon: PlatoonId,
        kind: LeaveKind,
    },
}

// ── Coordinator ───────────────────────────────────────────────────────────────

/// Tunables of the maneuver component.
#[derive(Clone, Debug)]
pub struct ManeuverConfig {
    /// Constant CACC spacing, metres.
    pub cacc_spacing: f64,
    /// ACC headway time, used by the displacement safety check.
    pub acc_headway_time: f64,
    /// Longest allowed teleport, metres.
    pub teleport_max: f64,
    /// Maneuver time budget τ_max, seconds.
    pub tau_max: f64,
    /// ε of the approach-time denominator, m/s.
    pub approach_epsilon: f64,
    /// Recompute platoon desired speed on membership changes.
    pub update_desired_speed: bool,
}

impl Default for ManeuverConfig {
    fn default() -> Self {
        Self {
            cacc_spacing: 5.0,
            acc_headway_time: 1.0,
            teleport_max: 2_000.0,
            tau_max: 60.0,
            approach_epsilon: 0.1,
            update_desired_speed: true,
        }
    }
}

struct PendingJoin {
    vehicle: VehicleId,
    target: PlatoonId,
    requested_at: Tick,
}

/// Owns all in-flight joins and applies them when due.
pub struct ManeuverCoordinator {
    config: ManeuverConfig,
    due: BTreeMap<Tick, Vec<PendingJoin>>,
}

impl ManeuverCoordinator {
    pub fn new(config: ManeuverConfig) -> Self {
        Self {
            config,
            due: BTreeMap::new(),
        }
    }

    #[inline]
    pub fn config(&self) -> &ManeuverConfig {
        &self.config
    }

    /// Number of joins currently in flight.
    pub fn pending(&self) -> usize {
        self.due.values().map(Vec::len).sum()
    }

    /// Validate and schedule a join of `vehicle` at the back of `target`.
    ///
    /// On success the joiner enters `joining`, the platoon leader enters
    /// `being-joined`, and the commit is queued after the approach delay.
    pub fn schedule_join(
        &mut self,
        fleet: &mut Fleet,
        types: &VehicleTypeRegistry,
        registry: &PlatoonRegistry,
        clock: &SimClock,
        vehicle: VehicleId,
        target: PlatoonId,
    ) -> Result<Tick, JoinReject> {
        let row = fleet.row(vehicle).ok_or(JoinReject::UnknownVehicle)?;
        if !fleet.platooning[row] {
            return Err(JoinReject::NotCapable);
        }
        if fleet.platoon_role[row].is_in_platoon() {
            return Err(JoinReject::AlreadyInPlatoon);
        }
        if fleet.maneuver[row] != ManeuverState::Idle {
            return Err(JoinReject::InManeuver);
        }
        let platoon = registry.get(target).ok_or(JoinReject::UnknownPlatoon)?;
        let leader_row = fleet.row(platoon.leader()).ok_or(JoinReject::UnknownVehicle)?;
        if fleet.maneuver[leader_row] != ManeuverState::Idle {
            return Err(JoinReject::LeaderBusy);
        }

        let tail_row = fleet.row(platoon.tail()).ok_or(JoinReject::UnknownPlatoon)?;
        let distance = (fleet.position[row] - fleet.rear_position(tail_row, types)).abs();
        let closing = fleet.desired_speed[row] - platoon.desired_speed;
        let tau_app = if closing > self.config.approach_epsilon {
            (distance / (closing + self.config.approach_epsilon)).min(self.config.tau_max)
        } else {
            self.config.tau_max
        };

        let now = clock.current_tick;
        let due = now + clock.ticks_for_secs(tau_app).max(1);

        fleet.maneuver[row] = ManeuverState::Joining;
        fleet.maneuver_target[row] = target;
        fleet.maneuver[leader_row] = ManeuverState::BeingJoined;

        self.due.entry(due).or_default().push(PendingJoin {
            vehicle,
            target,
            requested_at: now,
        });
        debug!(vehicle = %vehicle, platoon = %target, %due, tau_app, "join scheduled");
        Ok(due)
    }

    /// Commit or abort every join due at `clock.current_tick`, and advance
    /// `leaving` rows back to `idle`.
    pub fn process_due(
        &mut self,
        fleet: &mut Fleet,
        types: &VehicleTypeRegistry,
        registry: &mut PlatoonRegistry,
        road: &Road,
        clock: &SimClock,
    ) -> Vec<ManeuverEvent> {
        let mut events = Vec::new();

        // One step of abstract lateral offset, then the row is idle again.
        for row in fleet.rows() {
            if fleet.maneuver[row] == ManeuverState::Leaving {
                fleet.maneuver[row] = ManeuverState::Idle;
            }
        }

        let now = clock.current_tick;
        let mut due_now = Vec::new();
        while let Some((&tick, _)) = self.due.iter().next() {
            if tick > now {
                break;
            }
            let (_, batch) = self.due.pop_first().expect("non-empty");
            due_now.extend(batch);
        }
        // Lower vehicle id first fixes the order in which same-step commits
        // contend for the same tail slot.
        due_now.sort_by_key(|p| p.vehicle);

        for pending in due_now {
            match self.try_commit(fleet, types, registry, road, clock, &pending) {
                CommitOutcome::Done(event) => events.push(event),
                CommitOutcome::Dropped => {}
                CommitOutcome::Retry => {
                    self.due.entry(now + 1).or_default().push(pending);
                }
            }
        }
        events
    }

    fn abort(
        &self,
        fleet: &mut Fleet,
        registry: &PlatoonRegistry,
        pending: &PendingJoin,
        reason: JoinAbortReason,
    ) -> ManeuverEvent {
        if let Some(row) = fleet.row(pending.vehicle) {
            fleet.maneuver[row] = ManeuverState::Idle;
            fleet.maneuver_target[row] = PlatoonId::INVALID;
        }
        if let Some(platoon) = registry.get(pending.target) {
            if let Some(lr) = fleet.row(platoon.leader()) {
                if fleet.maneuver[lr] == ManeuverState::BeingJoined {
                    fleet.maneuver[lr] = ManeuverState::Idle;
                }
            }
        }
        warn!(vehicle = %pending.vehicle, platoon = %pending.target, reason = reason.as_str(), "join aborted");
        ManeuverEvent::JoinAborted {
            vehicle: pending.vehicle,
            platoon: pending.target,
            reason,
        }
    }

    fn try_commit(
        &self,
        fleet: &mut Fleet,
        types: &VehicleTypeRegistry,
        registry: &mut PlatoonRegistry,
        road: &Road,
        clock: &SimClock,
        pending: &PendingJoin,
    ) -> CommitOutcome {
        // Joiner may have arrived while approaching; release the leader and
        // drop the pending entry without recording an abort.
        let Some(row) = fleet.row(pending.vehicle) else {
            if let Some(platoon) = registry.get(pending.target) {
                if let Some(lr) = fleet.row(platoon.leader()) {
                    if fleet.maneuver[lr] == ManeuverState::BeingJoined {
                        fleet.maneuver[lr] = ManeuverState::Idle;
                    }
                }
            }
            return CommitOutcome::Dropped;
        };

        let Some(platoon) = registry.get(pending.target) else {
            return CommitOutcome::Done(self.abort(
                fleet,
                registry,
                pending,
                JoinAbortReason::TargetDisbanded,
            ));
        };
        let Some(tail_row) = fleet.row(platoon.tail()) else {
            return CommitOutcome::Done(self.abort(
                fleet,
                registry,
                pending,
                JoinAbortReason::TargetDisbanded,
            ));
        };

        let length = types.get(fleet.vtype[row]).length;
        let dest_position = fleet.rear_position(tail_row, types) - self.config.cacc_spacing;
        let dest_lane = fleet.lane[tail_row];
        let dest_speed = fleet.speed[tail_row];

        if dest_position - length < 0.0 {
            // Destination hangs off the road start; approaching further will
            // not fix that.
            return CommitOutcome::Done(self.abort(
                fleet,
                registry,
                pending,
                JoinAbortReason::DestinationUnsafe,
            ));
        }

        let teleport_distance = (fleet.position[row] - dest_position).abs();
        if teleport_distance > self.config.teleport_max {
            return CommitOutcome::Done(self.abort(
                fleet,
                registry,
                pending,
                JoinAbortReason::TeleportTooFar,
            ));
        }

        let budget_exhausted = clock.secs_at(clock.current_tick)
            - clock.secs_at(pending.requested_at)
            > self.config.tau_max;

        // Make space: displace any vehicle occupying the destination span to
        // an adjacent lane, by the regular lane-change safety rules.
        let occupants = occupants_of_span(
            fleet,
            types,
            row,
            &platoon_member_rows(fleet, pending.target),
            dest_lane,
            dest_position,
            length,
        );
        let mut displacements: Vec<(usize, u8)> = Vec::new();
        for occ in occupants {
            match displacement_lane(fleet, types, road, occ, self.config.acc_headway_time) {
                Some(lane) => displacements.push((occ, lane)),
                None => {
                    return if budget_exhausted {
                        CommitOutcome::Done(self.abort(
                            fleet,
                            registry,
                            pending,
                            JoinAbortReason::Budget,
                        ))
                    } else {
                        debug!(vehicle = %pending.vehicle, "destination occupied, retrying join");
                        CommitOutcome::Retry
                    };
                }
            }
        }

        // The vehicle that ends up behind the joiner must not be overrun.
        let dest_rear = dest_position - length;
        if let Some(s) = successor_behind(fleet, row, dest_lane, dest_rear, &displacements) {
            let safe = is_gap_safe(
                dest_position,
                dest_speed,
                types.get(fleet.vtype[row]).max_deceleration,
                length,
                fleet.position[s],
                fleet.speed[s],
                types.get(fleet.vtype[s]).max_acceleration,
                clock.step_length,
            );
            if !safe {
                return if budget_exhausted {
                    CommitOutcome::Done(self.abort(
                        fleet,
                        registry,
                        pending,
                        JoinAbortReason::Budget,
                    ))
                } else {
                    CommitOutcome::Retry
                };
            }
        }

        // All checks passed — commit.
        for (occ, lane) in displacements {
            info!(vehicle = %fleet.ids[occ], from = fleet.lane[occ], to = lane, "displaced to make space");
            fleet.lane[occ] = lane;
        }
        fleet.position[row] = dest_position;
        fleet.lane[row] = dest_lane;
        fleet.speed[row] = dest_speed;
        fleet.maneuver[row] = ManeuverState::Idle;
        fleet.maneuver_target[row] = PlatoonId::INVALID;

        if let Some(platoon) = registry.get(pending.target) {
            if let Some(lr) = fleet.row(platoon.leader()) {
                fleet.maneuver[lr] = ManeuverState::Idle;
            }
        }
        registry
            .append_member(fleet, pending.target, pending.vehicle, self.config.update_desired_speed)
            .expect("commit checks guarantee a live platoon and an idle joiner");

        info!(vehicle = %pending.vehicle, platoon = %pending.target, teleport_distance, "join completed");
        CommitOutcome::Done(ManeuverEvent::JoinCompleted {
            vehicle: pending.vehicle,
            platoon: pending.target,
            teleport_distance,
        })
    }

    /// Execute a leave for `vehicle` right now.
    pub fn leave(
        &mut self,
        fleet: &mut Fleet,
        registry: &mut PlatoonRegistry,
        clock: &SimClock,
        vehicle: VehicleId,
    ) -> PlatoonResult<ManeuverEvent> {
        let row = fleet.row(vehicle).ok_or(PlatoonError::UnknownVehicle(vehicle))?;
        let pid = fleet.platoon_id[row];
        if !fleet.platoon_role[row].is_in_platoon() {
            return Err(PlatoonError::NotAMember(vehicle, pid));
        }

        fleet.maneuver[row] = ManeuverState::Leaving;
        let kind = registry.remove_member(
            fleet,
            vehicle,
            self.config.update_desired_speed,
            clock.now_secs(),
        )?;
        info!(vehicle = %vehicle, platoon = %pid, ?kind, "leave completed");
        Ok(ManeuverEvent::LeaveCompleted { vehicle, platoon: pid, kind })
    }
}

enum CommitOutcome {
    Done(ManeuverEvent),
    Dropped,
    Retry,
}

// ── Commit helpers ────────────────────────────────────────────────────────────

fn platoon_member_rows(fleet: &Fleet, platoon: PlatoonId) -> Vec<usize> {
    fleet
        .rows()
        .filter(|&r| fleet.platoon_id[r] == platoon)
        .collect()
}

/// Rows whose bounding box intersects the joiner's destination span.
fn occupants_of_span(
    fleet: &Fleet,
    types: &VehicleTypeRegistry,
    joiner_row: usize,
    member_rows: &[usize],
    lane: u8,
    dest_position: f64,
    joiner_length: f64,
) -> Vec<usize> {
    let dest_rear = dest_position - joiner_length;
    let mut out: Vec<usize> = fleet
        .rows()
        .filter(|&r| {
            r != joiner_row
                && !member_rows.contains(&r)
                && fleet.lane[r] == lane
                && fleet.position[r].min(dest_position) - fleet.rear_position(r, types).max(dest_rear)
                    >= 0.0
        })
        .collect();
    out.sort_by_key(|&r| fleet.ids[r]);
    out
}

/// Adjacent lane an occupant can be displaced to, right side preferred.
fn displacement_lane(
    fleet: &Fleet,
    types: &VehicleTypeRegistry,
    road: &Road,
    row: usize,
    acc_headway: f64,
) -> Option<u8> {
    // Displacing a platoon member would tear its platoon apart.
    if fleet.platoon_role[row] != PlatoonRole::None {
        return None;
    }
    let lane = fleet.lane[row];
    if lane > 0 && is_lane_change_safe(fleet, types, row, lane - 1, acc_headway) {
        return Some(lane - 1);
    }
    if lane < road.leftmost_lane() && is_lane_change_safe(fleet, types, row, lane + 1, acc_headway) {
        return Some(lane + 1);
    }
    None
}

/// Nearest vehicle that will sit behind the teleported joiner, ignoring
/// occupants about to be displaced off the lane.
fn successor_behind(
    fleet: &Fleet,
    joiner_row: usize,
    lane: u8,
    dest_rear: f64,
    displacements: &[(usize, u8)],
) -> Option<usize> {
    let mut best: Option<usize> = None;
    for r in fleet.rows() {
        if r == joiner_row
            || fleet.lane[r] != lane
            || fleet.position[r] > dest_rear
            || displacements.iter().any(|&(d, _)| d == r)
        {
            continue;
        }
        match best {
            None => best = Some(r),
            Some(b) if fleet.position[r] > fleet.position[b] => best = Some(r),
            _ => {}
        }
    }
    best
}
