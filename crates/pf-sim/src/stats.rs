//! The statistics accumulator.
//!
//! Statistics are computed here, in the core, but *written* by an external
//! sink (an observer implementation).  Recoverable failures land here as
//! counters instead of bubbling up as errors.

use std::collections::HashMap;

use pf_core::VehicleId;
use pf_fleet::EmissionTotals;
use pf_platoon::JoinAbortReason;

/// Per-vehicle maneuver counters, carried into the trip record at arrival.
#[derive(Copy, Clone, Debug, Default)]
pub struct ManeuverCounters {
    pub joins_attempted: u32,
    pub joins_completed: u32,
    pub joins_aborted: u32,
    pub leaves: u32,
}

/// Run-wide counters.
#[derive(Clone, Debug, Default)]
pub struct Statistics {
    pub spawned: u64,
    pub prefilled: u64,
    pub arrived: u64,
    /// Insertions dropped after exhausting the retry limit.
    pub dropped_insertions: u64,
    pub collisions: u64,
    pub lane_changes: u64,

    pub joins_scheduled: u64,
    pub joins_completed: u64,
    pub joins_aborted: u64,
    pub joins_aborted_disbanded: u64,
    pub joins_aborted_too_far: u64,
    pub joins_aborted_unsafe: u64,
    pub joins_aborted_budget: u64,
    /// Join commands refused at scheduling time (busy leader, stale target).
    pub join_rejects: u64,
    pub leaves_completed: u64,

    pub candidates_found: u64,
    pub candidates_filtered: u64,
    pub solver_timeouts: u64,

    /// Per-vehicle maneuver counters for vehicles still on the road.
    per_vehicle: HashMap<VehicleId, ManeuverCounters>,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vehicle(&mut self, id: VehicleId) -> &mut ManeuverCounters {
        self.per_vehicle.entry(id).or_default()
    }

    pub fn record_join_abort(&mut self, vehicle: VehicleId, reason: JoinAbortReason) {
        self.joins_aborted += 1;
        match reason {
            JoinAbortReason::TargetDisbanded => self.joins_aborted_disbanded += 1,
            JoinAbortReason::TeleportTooFar => self.joins_aborted_too_far += 1,
            JoinAbortReason::DestinationUnsafe => self.joins_aborted_unsafe += 1,
            JoinAbortReason::Budget => self.joins_aborted_budget += 1,
        }
        self.vehicle(vehicle).joins_aborted += 1;
    }

    /// Detach the maneuver counters of an arriving vehicle.
    pub fn take_vehicle(&mut self, id: VehicleId) -> ManeuverCounters {
        self.per_vehicle.remove(&id).unwrap_or_default()
    }
}

/// Everything recorded about one finished trip.
#[derive(Clone, Debug)]
pub struct TripRecord {
    pub vehicle: VehicleId,
    pub depart_time: f64,
    pub arrival_time: f64,
    pub depart_position: f64,
    pub arrival_position: f64,
    pub depart_lane: u8,
    pub arrival_lane: u8,
    pub depart_speed: f64,
    pub arrival_speed: f64,
    pub desired_speed: f64,
    pub route_length: f64,
    pub time_loss: f64,
    pub depart_delay: f64,
    pub prefilled: bool,
    pub emissions: EmissionTotals,
    pub maneuvers: ManeuverCounters,
}

/// What [`Simulator::run`][crate::Simulator::run] hands back on success.
#[derive(Clone, Debug)]
pub struct RunSummary {
    /// Steps executed.
    pub steps: u64,
    /// Simulated seconds covered.
    pub simulated_secs: f64,
    /// Vehicles still on the road at the end.
    pub vehicles_remaining: usize,
    /// Platoons alive at the end.
    pub platoons_remaining: usize,
    pub stats: Statistics,
}
