//! The `TraceWriter` trait implemented by all backend writers.

use crate::row::{
    EmissionsRow, LaneChangeRow, PlatoonManeuversRow, PlatoonTraceRow, TripRow, VehicleTraceRow,
};
use crate::OutputResult;

/// Backend-agnostic sink for all trace files.
///
/// Every write targets exactly one file; backends built with a subset of the
/// record flags silently ignore writes for files they did not open.
pub trait TraceWriter {
    fn write_trip(&mut self, row: &TripRow) -> OutputResult<()>;
    fn write_vehicle_trace(&mut self, row: &VehicleTraceRow) -> OutputResult<()>;
    fn write_lane_change(&mut self, row: &LaneChangeRow) -> OutputResult<()>;
    fn write_emissions(&mut self, row: &EmissionsRow) -> OutputResult<()>;
    fn write_emission_trace(&mut self, row: &EmissionsRow) -> OutputResult<()>;
    fn write_platoon_trace(&mut self, row: &PlatoonTraceRow) -> OutputResult<()>;
    fn write_platoon_maneuvers(&mut self, row: &PlatoonManeuversRow) -> OutputResult<()>;

    /// Flush and close all underlying file handles.
    ///
    /// Idempotent — safe to call more than once.
    fn finish(&mut self) -> OutputResult<()>;
}
