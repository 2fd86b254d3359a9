//! The `PlatoonRegistry` — platoon id allocation and membership mutations.
//!
//! Iteration order is deterministic (`BTreeMap` keyed by id), which matters
//! because formation algorithms and traces walk the registry.

use std::collections::BTreeMap;

use pf_core::{PlatoonId, VehicleId};
use pf_fleet::{CfModel, Fleet, ManeuverState, PlatoonRole};
use tracing::{debug, info};

use crate::platoon::Platoon;
use crate::{PlatoonError, PlatoonResult};

/// How a vehicle's departure changed its platoon.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LeaveKind {
    /// Leader left, the member at index 1 was promoted.
    LeaderHandover { new_leader: VehicleId },
    /// Leader left a two-vehicle platoon; the platoon dissolved and the
    /// remaining vehicle returned to individual driving.
    Dissolved,
    /// The tail member left (simple pop).
    TailPop,
    /// A middle member left; both halves continue under fresh ids.
    Split { front: PlatoonId, rear: PlatoonId },
}

/// Owner of all live platoons.
#[derive(Default)]
pub struct PlatoonRegistry {
    next_id: u32,
    platoons: BTreeMap<PlatoonId, Platoon>,
}

impl PlatoonRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.platoons.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.platoons.is_empty()
    }

    #[inline]
    pub fn get(&self, id: PlatoonId) -> Option<&Platoon> {
        self.platoons.get(&id)
    }

    /// Iterate platoons in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Platoon> {
        self.platoons.values()
    }

    fn allocate_id(&mut self) -> PlatoonId {
        let id = PlatoonId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Create a platoon containing only `leader` and rewrite its fleet row.
    ///
    /// The leader keeps ACC (leaders are never CACC) and inherits the platoon
    /// desired speed as its cf target.
    pub fn create(
        &mut self,
        fleet: &mut Fleet,
        leader: VehicleId,
        now_secs: f64,
    ) -> PlatoonResult<PlatoonId> {
        let row = fleet.row(leader).ok_or(PlatoonError::UnknownVehicle(leader))?;
        if fleet.platoon_role[row].is_in_platoon() {
            return Err(PlatoonError::AlreadyInPlatoon(leader));
        }
        let id = self.allocate_id();
        let desired = fleet.desired_speed[row];
        self.platoons.insert(id, Platoon::new(id, leader, desired, now_secs));

        fleet.platoon_role[row] = PlatoonRole::Leader;
        fleet.platoon_id[row] = id;
        fleet.platoon_index[row] = 0;
        fleet.platoon_leader[row] = leader;
        fleet.cf_model[row] = CfModel::Acc;
        fleet.cf_target_speed[row] = desired;

        info!(platoon = %id, leader = %leader, "platoon created");
        Ok(id)
    }

    /// Append `vehicle` as the new tail of `platoon`.
    ///
    /// Rewrites the joiner's fleet row (follower role, CACC) and refreshes
    /// every member's platoon columns; recomputes the platoon desired speed
    /// when `update_desired_speed` is set.
    pub fn append_member(
        &mut self,
        fleet: &mut Fleet,
        platoon: PlatoonId,
        vehicle: VehicleId,
        update_desired_speed: bool,
    ) -> PlatoonResult<()> {
        let row = fleet.row(vehicle).ok_or(PlatoonError::UnknownVehicle(vehicle))?;
        if fleet.platoon_role[row].is_in_platoon() {
            return Err(PlatoonError::AlreadyInPlatoon(vehicle));
        }
        let p = self
            .platoons
            .get_mut(&platoon)
            .ok_or(PlatoonError::UnknownPlatoon(platoon))?;

        p.members.push(vehicle);
        p.joins += 1;
        fleet.platoon_role[row] = PlatoonRole::Follower;
        fleet.cf_model[row] = CfModel::Cacc;

        if update_desired_speed {
            recompute_desired_speed(p, fleet);
        }
        let p = self.platoons.get(&platoon).expect("just mutated");
        sync_member_columns(p, fleet);
        debug!(platoon = %platoon, vehicle = %vehicle, size = p.size(), "member appended");
        Ok(())
    }

    /// Remove `vehicle` from its platoon, handling all three leave cases.
    pub fn remove_member(
        &mut self,
        fleet: &mut Fleet,
        vehicle: VehicleId,
        update_desired_speed: bool,
        now_secs: f64,
    ) -> PlatoonResult<LeaveKind> {
        let row = fleet.row(vehicle).ok_or(PlatoonError::UnknownVehicle(vehicle))?;
        let pid = fleet.platoon_id[row];
        let p = self
            .platoons
            .get_mut(&pid)
            .ok_or(PlatoonError::UnknownPlatoon(pid))?;
        let idx = p
            .member_index(vehicle)
            .ok_or(PlatoonError::NotAMember(vehicle, pid))?;
        let size = p.size();

        clear_member_columns(fleet, row);

        let kind = if size == 1 {
            // Lone leader's trip ended: retire the platoon.
            self.platoons.remove(&pid);
            info!(platoon = %pid, "platoon retired");
            LeaveKind::Dissolved
        } else if idx == 0 {
            p.members.remove(0);
            p.leaves += 1;
            if p.size() == 1 {
                // Sole survivor returns to individual driving.
                let survivor = p.members[0];
                self.platoons.remove(&pid);
                if let Some(r) = fleet.row(survivor) {
                    clear_member_columns(fleet, r);
                }
                info!(platoon = %pid, "platoon dissolved after leader leave");
                LeaveKind::Dissolved
            } else {
                let new_leader = p.members[0];
                if update_desired_speed {
                    recompute_desired_speed(p, fleet);
                }
                let p = self.platoons.get(&pid).expect("still present");
                sync_member_columns(p, fleet);
                info!(platoon = %pid, new_leader = %new_leader, "leader handover");
                LeaveKind::LeaderHandover { new_leader }
            }
        } else if idx == size - 1 {
            p.members.pop();
            p.leaves += 1;
            if update_desired_speed {
                recompute_desired_speed(p, fleet);
            }
            let p = self.platoons.get(&pid).expect("still present");
            sync_member_columns(p, fleet);
            debug!(platoon = %pid, vehicle = %vehicle, "tail left");
            LeaveKind::TailPop
        } else {
            // Middle leave: split into two platoons under fresh ids.
            let formed_at = p.formed_at;
            let desired = p.desired_speed;
            let mut front_members = p.members.clone();
            let rear_members = front_members.split_off(idx + 1);
            front_members.truncate(idx);
            self.platoons.remove(&pid);

            let front_id = self.allocate_id();
            let rear_id = self.allocate_id();
            let mut front = Platoon::new(front_id, front_members[0], desired, formed_at);
            front.members = front_members;
            let mut rear = Platoon::new(rear_id, rear_members[0], desired, now_secs);
            rear.members = rear_members;

            if update_desired_speed {
                recompute_desired_speed(&mut front, fleet);
                recompute_desired_speed(&mut rear, fleet);
            }
            sync_member_columns(&front, fleet);
            sync_member_columns(&rear, fleet);
            // A split half of one vehicle is a lone leader, which is legal;
            // it is retired when that vehicle's trip ends.
            self.platoons.insert(front_id, front);
            self.platoons.insert(rear_id, rear);
            info!(original = %pid, front = %front_id, rear = %rear_id, "platoon split");
            LeaveKind::Split { front: front_id, rear: rear_id }
        };

        Ok(kind)
    }
}

// ── Column synchronization ────────────────────────────────────────────────────

/// Mean of the member desired speeds (the `update-desired-speed` policy).
fn recompute_desired_speed(platoon: &mut Platoon, fleet: &Fleet) {
    let mut sum = 0.0;
    let mut n = 0usize;
    for &m in &platoon.members {
        if let Some(r) = fleet.row(m) {
            sum += fleet.desired_speed[r];
            n += 1;
        }
    }
    if n > 0 {
        platoon.desired_speed = sum / n as f64;
    }
}

/// Rewrite role/index/leader/cf-target columns for every member.
fn sync_member_columns(platoon: &Platoon, fleet: &mut Fleet) {
    let leader = platoon.leader();
    for (i, &m) in platoon.members.iter().enumerate() {
        let Some(r) = fleet.row(m) else { continue };
        fleet.platoon_id[r] = platoon.id;
        fleet.platoon_index[r] = i as u32;
        fleet.platoon_leader[r] = leader;
        fleet.cf_target_speed[r] = platoon.desired_speed;
        if i == 0 {
            fleet.platoon_role[r] = PlatoonRole::Leader;
            fleet.cf_model[r] = CfModel::Acc;
        } else {
            fleet.platoon_role[r] = PlatoonRole::Follower;
            fleet.cf_model[r] = CfModel::Cacc;
        }
    }
}

/// Reset a row to individual driving.
fn clear_member_columns(fleet: &mut Fleet, row: usize) {
    fleet.platoon_role[row] = PlatoonRole::None;
    fleet.platoon_id[row] = pf_core::PlatoonId::INVALID;
    fleet.platoon_index[row] = 0;
    fleet.platoon_leader[row] = fleet.ids[row];
    fleet.cf_target_speed[row] = fleet.desired_speed[row];
    if fleet.platooning[row] {
        fleet.cf_model[row] = CfModel::Acc;
    }
    if fleet.maneuver[row] != ManeuverState::Leaving {
        fleet.maneuver[row] = ManeuverState::Idle;
    }
}
