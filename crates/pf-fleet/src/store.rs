//! The `Fleet` — Structure-of-Arrays storage for all live vehicles.
//!
//! Every `Vec` field has exactly `len()` elements; a row index is valid for
//! all of them.  Rows are dense: removal swap-removes the last row into the
//! gap and patches the id→row index, so iteration never skips.
//!
//! ```ignore
//! let row = fleet.row(id).unwrap();
//! let pos = fleet.position[row];   // O(1), cache-friendly
//! ```
//!
//! The stable handle is the [`VehicleId`]; ids grow monotonically and are
//! never reused, so a removed vehicle's id keeps identifying it in traces.

use pf_core::{PlatoonId, VehicleId, VehicleTypeId};

use crate::state::{CfModel, EmissionTotals, ManeuverState, PlatoonRole};
use crate::vtype::VehicleTypeRegistry;
use crate::{FleetError, FleetResult};

/// Everything the spawner decides about a vehicle before it enters the road.
#[derive(Clone, Debug)]
pub struct NewVehicle {
    pub vtype: VehicleTypeId,
    pub depart_time: f64,
    pub depart_position: f64,
    pub depart_lane: u8,
    pub depart_speed: f64,
    pub depart_delay: f64,
    pub arrival_position: f64,
    pub desired_speed: f64,
    /// Initial car-following model (by capability).
    pub cf_model: CfModel,
    /// `true` if the vehicle is ACC/CACC-capable (can platoon).
    pub platooning: bool,
    /// `true` if inserted by the density pre-fill before `t = 0`.
    pub prefilled: bool,
    /// Random offset in seconds into the formation scheduler's period so
    /// pre-filled vehicles do not act in lock-step.
    pub formation_phase: f64,
    /// RGB color, carried for the GUI bridge and traces only.
    pub color: [u8; 3],
}

/// Structure-of-Arrays storage for all live vehicles plus the id→row index.
#[derive(Default)]
pub struct Fleet {
    /// Next id to hand out.  Never decremented.
    next_id: u32,

    /// id value → row, `u32::MAX` for vehicles that left (or never existed).
    index: Vec<u32>,

    // ── Identity ──────────────────────────────────────────────────────────
    pub ids: Vec<VehicleId>,
    pub vtype: Vec<VehicleTypeId>,
    pub color: Vec<[u8; 3]>,

    // ── Kinematics ────────────────────────────────────────────────────────
    /// Position of the front bumper in metres along the road.
    pub position: Vec<f64>,
    /// Lane index, 0 = rightmost.
    pub lane: Vec<u8>,
    pub speed: Vec<f64>,
    /// Fixed per-vehicle desired speed in m/s.
    pub desired_speed: Vec<f64>,
    /// Mutable target speed the active cf model steered towards last phase.
    pub cf_target_speed: Vec<f64>,
    /// Acceleration realized in the last car-following phase, m/s².
    pub acceleration: Vec<f64>,
    /// Set by the cf model when a slower predecessor capped the speed.
    pub blocked_front: Vec<bool>,
    pub cf_model: Vec<CfModel>,

    // ── Trip ──────────────────────────────────────────────────────────────
    pub depart_time: Vec<f64>,
    pub depart_position: Vec<f64>,
    pub depart_lane: Vec<u8>,
    pub depart_speed: Vec<f64>,
    pub arrival_position: Vec<f64>,
    /// Seconds the spawner delayed the insertion past the requested time.
    pub depart_delay: Vec<f64>,
    /// Accumulated time driven below the desired speed, in seconds.
    pub time_loss: Vec<f64>,

    // ── Platooning ────────────────────────────────────────────────────────
    pub platoon_role: Vec<PlatoonRole>,
    /// `PlatoonId::INVALID` when not in a platoon.
    pub platoon_id: Vec<PlatoonId>,
    /// Position in the platoon (0 = leader); meaningless outside a platoon.
    pub platoon_index: Vec<u32>,
    /// Id of the platoon leader; own id when not in a platoon.  Kept in sync
    /// by the platoon registry so the CACC model resolves its leader without
    /// a registry lookup.
    pub platoon_leader: Vec<VehicleId>,
    pub maneuver: Vec<ManeuverState>,
    /// Join target while `maneuver == Joining`.
    pub maneuver_target: Vec<PlatoonId>,

    // ── Flags & statistics ────────────────────────────────────────────────
    pub platooning: Vec<bool>,
    pub prefilled: Vec<bool>,
    pub formation_phase: Vec<f64>,
    pub emissions: Vec<EmissionTotals>,
}

impl Fleet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live vehicles.
    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Total vehicles ever spawned (live + departed).
    #[inline]
    pub fn spawned_total(&self) -> u32 {
        self.next_id
    }

    /// Row index for `id`, or `None` if the vehicle already left.
    #[inline]
    pub fn row(&self, id: VehicleId) -> Option<usize> {
        match self.index.get(id.index()) {
            Some(&r) if r != u32::MAX => Some(r as usize),
            _ => None,
        }
    }

    /// `true` if `id` refers to a live vehicle.
    #[inline]
    pub fn contains(&self, id: VehicleId) -> bool {
        self.row(id).is_some()
    }

    /// Iterator over all row indices (arbitrary order).
    pub fn rows(&self) -> impl Iterator<Item = usize> {
        0..self.len()
    }

    /// Rear bumper position of the vehicle at `row`, clamped to the road start.
    #[inline]
    pub fn rear_position(&self, row: usize, types: &VehicleTypeRegistry) -> f64 {
        let rear = self.position[row] - types.get(self.vtype[row]).length;
        if rear < 0.0 {
            0.0
        } else {
            rear
        }
    }

    /// Insert a vehicle and return its freshly allocated id.
    pub fn spawn(&mut self, v: NewVehicle) -> VehicleId {
        let id = VehicleId(self.next_id);
        self.next_id += 1;

        debug_assert_eq!(self.index.len(), id.index());
        self.index.push(self.ids.len() as u32);

        self.ids.push(id);
        self.vtype.push(v.vtype);
        self.color.push(v.color);

        self.position.push(v.depart_position);
        self.lane.push(v.depart_lane);
        self.speed.push(v.depart_speed);
        self.desired_speed.push(v.desired_speed);
        self.cf_target_speed.push(v.desired_speed);
        self.acceleration.push(0.0);
        self.blocked_front.push(false);
        self.cf_model.push(v.cf_model);

        self.depart_time.push(v.depart_time);
        self.depart_position.push(v.depart_position);
        self.depart_lane.push(v.depart_lane);
        self.depart_speed.push(v.depart_speed);
        self.arrival_position.push(v.arrival_position);
        self.depart_delay.push(v.depart_delay);
        self.time_loss.push(0.0);

        self.platoon_role.push(PlatoonRole::None);
        self.platoon_id.push(PlatoonId::INVALID);
        self.platoon_index.push(0);
        self.platoon_leader.push(id);
        self.maneuver.push(ManeuverState::Idle);
        self.maneuver_target.push(PlatoonId::INVALID);

        self.platooning.push(v.platooning);
        self.prefilled.push(v.prefilled);
        self.formation_phase.push(v.formation_phase);
        self.emissions.push(EmissionTotals::default());

        id
    }

    /// Remove a vehicle by id (swap-remove).
    ///
    /// The id stays retired forever; only the row is recycled.
    pub fn remove(&mut self, id: VehicleId) -> FleetResult<()> {
        let row = self.row(id).ok_or(FleetError::UnknownVehicle(id))?;
        let last = self.len() - 1;

        self.ids.swap_remove(row);
        self.vtype.swap_remove(row);
        self.color.swap_remove(row);
        self.position.swap_remove(row);
        self.lane.swap_remove(row);
        self.speed.swap_remove(row);
        self.desired_speed.swap_remove(row);
        self.cf_target_speed.swap_remove(row);
        self.acceleration.swap_remove(row);
        self.blocked_front.swap_remove(row);
        self.cf_model.swap_remove(row);
        self.depart_time.swap_remove(row);
        self.depart_position.swap_remove(row);
        self.depart_lane.swap_remove(row);
        self.depart_speed.swap_remove(row);
        self.arrival_position.swap_remove(row);
        self.depart_delay.swap_remove(row);
        self.time_loss.swap_remove(row);
        self.platoon_role.swap_remove(row);
        self.platoon_id.swap_remove(row);
        self.platoon_index.swap_remove(row);
        self.platoon_leader.swap_remove(row);
        self.maneuver.swap_remove(row);
        self.maneuver_target.swap_remove(row);
        self.platooning.swap_remove(row);
        self.prefilled.swap_remove(row);
        self.formation_phase.swap_remove(row);
        self.emissions.swap_remove(row);

        self.index[id.index()] = u32::MAX;
        if row != last {
            // The former last row moved into the gap; repoint its id.
            let moved = self.ids[row];
            self.index[moved.index()] = row as u32;
        }
        Ok(())
    }
}
