//! Simulation observer trait for progress reporting and trace recording.

use pf_core::{SimClock, VehicleId};
use pf_fleet::{Fleet, VehicleTypeRegistry};
use pf_mobility::{Collision, EmissionRates, LaneChange};
use pf_platoon::{ManeuverEvent, PlatoonRegistry};

use crate::stats::{RunSummary, TripRecord};

/// Read-only state handed to snapshot hooks.
pub struct TraceCtx<'a> {
    pub clock: &'a SimClock,
    pub fleet: &'a Fleet,
    pub types: &'a VehicleTypeRegistry,
    pub platoons: &'a PlatoonRegistry,
}

/// Callbacks invoked by [`Simulator::run`][crate::Simulator::run] at key
/// points in the step loop.
///
/// All methods have default no-op implementations so implementors only need
/// to override what they care about.  Hooks fire for pre-filled vehicles
/// too; sinks that exclude them filter on the `prefilled` arguments.
pub trait SimObserver {
    /// Start of each step, before any phase runs.
    fn on_step_start(&mut self, _now: f64) {}

    /// Action-boundary snapshot — the cadence for per-vehicle and
    /// per-platoon trace rows.
    fn on_snapshot(&mut self, _ctx: &TraceCtx<'_>) {}

    /// A committed lane change.
    fn on_lane_change(&mut self, _now: f64, _change: &LaneChange) {}

    /// One vehicle's instantaneous emission rates this step (already scaled
    /// by the platoon air-drag factor when that is enabled).
    fn on_emission_sample(
        &mut self,
        _now: f64,
        _vehicle: VehicleId,
        _rates: &EmissionRates,
        _prefilled: bool,
    ) {
    }

    /// A detected collision (fires under every collision policy).
    fn on_collision(&mut self, _now: f64, _collision: &Collision) {}

    /// A maneuver progressed (join scheduled/completed/aborted, leave).
    fn on_maneuver(&mut self, _now: f64, _event: &ManeuverEvent) {}

    /// A vehicle finished its trip and left the road.
    fn on_vehicle_arrived(&mut self, _trip: &TripRecord) {}

    /// Once, after the final step (also on cancellation, with the last
    /// committed state).
    fn on_sim_end(&mut self, _summary: &RunSummary) {}
}

/// A [`SimObserver`] that does nothing.
pub struct NoopObserver;

impl SimObserver for NoopObserver {}
