//! Plain data row types, one per trace file.
//!
//! Schemas are stable across runs: same columns, same order, same
//! formatting.  Two runs with equal (seed, config, code version) produce
//! byte-identical files.

/// One finished trip (`<base>_vehicle_trips.csv`).
#[derive(Clone, Debug, PartialEq)]
pub struct TripRow {
    pub id: u32,
    pub depart_time: f64,
    pub arrival_time: f64,
    pub depart_pos: f64,
    pub arrival_pos: f64,
    pub route_length: f64,
    pub time_loss: f64,
    pub depart_delay: f64,
}

/// One vehicle at one step (`<base>_vehicle_traces.csv`).
#[derive(Clone, Debug, PartialEq)]
pub struct VehicleTraceRow {
    pub time: f64,
    pub id: u32,
    pub position: f64,
    pub lane: u8,
    pub speed: f64,
    pub desired_speed: f64,
    /// `u32::MAX` renders as an empty field (not in a platoon).
    pub platoon_id: u32,
    pub platoon_role: &'static str,
    /// `#RRGGBB`.
    pub color: String,
}

/// One committed lane change (`<base>_vehicle_changes.csv`).
#[derive(Clone, Debug, PartialEq)]
pub struct LaneChangeRow {
    pub time: f64,
    pub id: u32,
    pub from_lane: u8,
    pub to_lane: u8,
    pub reason: &'static str,
}

/// Emission values for one vehicle (`<base>_vehicle_emissions.csv` totals at
/// trip end, `<base>_emission_traces.csv` instantaneous rates per step).
#[derive(Clone, Debug, PartialEq)]
pub struct EmissionsRow {
    pub time: f64,
    pub id: u32,
    pub co2: f64,
    pub co: f64,
    pub hc: f64,
    pub nox: f64,
    pub pmx: f64,
    pub fuel: f64,
}

/// One platoon at one step (`<base>_platoon_trace.csv`).
#[derive(Clone, Debug, PartialEq)]
pub struct PlatoonTraceRow {
    pub time: f64,
    pub platoon_id: u32,
    pub leader_id: u32,
    pub size: u32,
    pub desired_speed: f64,
    pub lane: u8,
    pub position: f64,
}

/// Per-vehicle maneuver counters at trip end
/// (`<base>_platoon_maneuvers.csv`).
#[derive(Clone, Debug, PartialEq)]
pub struct PlatoonManeuversRow {
    pub id: u32,
    pub joins_attempted: u32,
    pub joins_completed: u32,
    pub joins_aborted: u32,
    pub leaves: u32,
}
