//! Top-level simulation configuration.
//!
//! Everything here is decided before `t = 0`; a bad combination fails
//! validation and the process exits with code 1 without simulating a step.

use pf_core::Road;
use pf_fleet::VehicleType;

use crate::{SimError, SimResult};

/// When new vehicles enter the road.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DepartMethod {
    /// One vehicle per step until the configured total is reached.
    Number,
    /// One vehicle every `depart_interval` simulated seconds.
    Interval,
    /// Poisson arrivals at `depart_rate` vehicles per hour.
    Flow,
    /// One Bernoulli trial per step with `depart_probability`.
    Probability,
}

/// What to do when vehicles overlap.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CollisionPolicy {
    /// Log and continue.
    Warn,
    /// Separate the pair minimally and continue.
    Teleport,
    /// Fail the run (exit code 2).
    Abort,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FormationStrategy {
    /// Every equipped vehicle runs the algorithm for itself.
    Distributed,
    /// Omniscient roadside infrastructure runs it for everyone.
    Centralized,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CentralizedVariant {
    Greedy,
    Optimal,
}

/// Which trace files the run records.
#[derive(Clone, Debug)]
pub struct RecordFlags {
    pub vehicle_trips: bool,
    pub vehicle_emissions: bool,
    pub vehicle_traces: bool,
    pub vehicle_changes: bool,
    pub emission_traces: bool,
    /// Write one final trace row at trip end.
    pub end_trace: bool,
    /// Record statistics for pre-filled vehicles too.
    pub prefilled: bool,
    pub platoon_trace: bool,
    pub platoon_maneuvers: bool,
}

impl Default for RecordFlags {
    fn default() -> Self {
        Self {
            vehicle_trips: true,
            vehicle_emissions: true,
            vehicle_traces: false,
            vehicle_changes: false,
            emission_traces: false,
            end_trace: true,
            prefilled: false,
            platoon_trace: false,
            platoon_maneuvers: true,
        }
    }
}

/// All tunables of one simulation run.
#[derive(Clone, Debug)]
pub struct SimConfig {
    // ── Road ──────────────────────────────────────────────────────────────
    /// Road length, metres.
    pub road_length: f64,
    pub lanes: u8,
    /// Distance between on-/off-ramps, metres.
    pub ramp_interval: f64,
    /// Road speed limit, m/s.
    pub road_max_speed: f64,

    // ── Vehicles ──────────────────────────────────────────────────────────
    /// Total number of vehicles (ignored when `density > 0`).
    pub vehicles: usize,
    /// Vehicles per km per lane for the pre-fill; 0 disables density sizing.
    pub density: f64,
    /// Fraction of vehicles with ACC/CACC capability.
    pub penetration: f64,
    pub desired_speed: f64,
    pub random_desired_speed: bool,
    /// Relative standard deviation of the desired-speed distribution.
    pub speed_variation: f64,
    pub min_desired_speed: f64,
    pub max_desired_speed: f64,

    // ── Trips ─────────────────────────────────────────────────────────────
    pub depart_method: DepartMethod,
    /// Seconds between departures (`Interval` method).
    pub depart_interval: f64,
    /// Vehicles per hour (`Flow` method).
    pub depart_rate: f64,
    /// Per-step departure probability (`Probability` method).
    pub depart_probability: f64,
    /// Keep spawning past the configured total.
    pub depart_flow: bool,
    /// Depart at the desired speed instead of standing.
    pub depart_desired: bool,
    pub random_depart_speed: bool,
    pub random_depart_position: bool,
    pub random_depart_lane: bool,
    /// Escalate to the next lane when the requested one is blocked.
    pub depart_all_lanes: bool,
    pub random_arrival_position: bool,
    /// Fixed arrival position, metres; `None` means the road end.
    pub arrival_position: Option<f64>,
    /// Minimum trip length, metres.
    pub minimum_trip_length: f64,
    /// Retries before a rejected insertion is dropped.
    pub spawn_retry_limit: u32,

    // ── Car-following ─────────────────────────────────────────────────────
    pub acc_headway_time: f64,
    pub acc_lambda: f64,
    pub cacc_spacing: f64,
    /// Dawdle magnitude σ of the human model, m/s (0 disables).
    pub speed_imperfection: f64,
    /// Apply platoon air-drag emission savings.
    pub reduced_air_drag: bool,

    // ── Platooning ────────────────────────────────────────────────────────
    pub start_as_platoon: bool,
    pub pre_fill: bool,
    pub update_desired_speed: bool,
    /// Longest allowed join teleport, metres.
    pub teleport_max: f64,
    /// Join maneuver time budget τ_max, seconds.
    pub tau_max: f64,

    // ── Formation ─────────────────────────────────────────────────────────
    /// Registered algorithm name; `None` disables formation.
    pub formation_algorithm: Option<String>,
    pub formation_strategy: FormationStrategy,
    pub formation_centralized_kind: CentralizedVariant,
    /// Seconds between two formation invocations.
    pub execution_interval: f64,
    pub alpha: f64,
    pub speed_deviation_threshold: f64,
    pub position_deviation_threshold: f64,
    pub infrastructures: u16,
    /// Maximum V2V observation distance, metres.
    pub communication_range: f64,
    /// Wall-clock budget for one external solver call, seconds.
    pub solver_time_budget: f64,

    // ── Simulation ────────────────────────────────────────────────────────
    /// Simulated seconds to run.
    pub time_limit: f64,
    pub step_length: f64,
    /// Seconds between two action phases (formation, periodic traces).
    pub action_interval: f64,
    pub random_seed: u64,
    pub collisions: CollisionPolicy,
    pub lane_changes: bool,
    /// Validate and build everything, then skip the loop.
    pub dry_run: bool,

    // ── Recording ─────────────────────────────────────────────────────────
    pub record: RecordFlags,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            road_length: 100_000.0,
            lanes: 3,
            ramp_interval: 1_000.0,
            road_max_speed: 55.0,

            vehicles: 100,
            density: 0.0,
            penetration: 1.0,
            desired_speed: 36.0,
            random_desired_speed: false,
            speed_variation: 0.1,
            min_desired_speed: 22.0,
            max_desired_speed: 50.0,

            depart_method: DepartMethod::Interval,
            depart_interval: 1.0,
            depart_rate: 3_600.0,
            depart_probability: 1.0,
            depart_flow: false,
            depart_desired: false,
            random_depart_speed: false,
            random_depart_position: false,
            random_depart_lane: false,
            depart_all_lanes: true,
            random_arrival_position: false,
            arrival_position: None,
            minimum_trip_length: 0.0,
            spawn_retry_limit: 60,

            acc_headway_time: 1.0,
            acc_lambda: 0.1,
            cacc_spacing: 5.0,
            speed_imperfection: 0.0,
            reduced_air_drag: false,

            start_as_platoon: false,
            pre_fill: false,
            update_desired_speed: true,
            teleport_max: 2_000.0,
            tau_max: 60.0,

            formation_algorithm: None,
            formation_strategy: FormationStrategy::Distributed,
            formation_centralized_kind: CentralizedVariant::Greedy,
            execution_interval: 1.0,
            alpha: 0.5,
            speed_deviation_threshold: 0.1,
            position_deviation_threshold: 300.0,
            infrastructures: 0,
            communication_range: 1_000.0,
            solver_time_budget: 1.0,

            time_limit: 3_600.0,
            step_length: 1.0,
            action_interval: 1.0,
            random_seed: 42,
            collisions: CollisionPolicy::Abort,
            lane_changes: true,
            dry_run: false,

            record: RecordFlags::default(),
        }
    }
}

impl SimConfig {
    /// Build the validated road geometry.
    pub fn road(&self) -> SimResult<Road> {
        Road::new(self.road_length, self.lanes, self.ramp_interval, self.road_max_speed)
            .map_err(|e| SimError::Config(e.to_string()))
    }

    /// Total vehicles this run wants on the road.
    pub fn target_vehicle_count(&self) -> usize {
        if self.density > 0.0 {
            (self.density * (self.road_length / 1_000.0) * self.lanes as f64).round() as usize
        } else {
            self.vehicles
        }
    }

    /// All pre-`t = 0` validation rules.  The error message names the first
    /// offending parameter combination.
    pub fn validate(&self) -> SimResult<()> {
        let err = |msg: String| Err(SimError::Config(msg));

        self.road()?;
        if !(self.step_length > 0.0) {
            return err(format!("step length must be > 0 (got {})", self.step_length));
        }
        if self.time_limit < 0.0 {
            return err("time limit cannot be negative".into());
        }
        if !(self.action_interval > 0.0) {
            return err("action interval must be > 0".into());
        }
        if !(0.0..=1.0).contains(&self.penetration) {
            return err(format!("penetration must be within [0, 1] (got {})", self.penetration));
        }
        if !(0.0..=1.0).contains(&self.depart_probability) {
            return err(format!(
                "depart probability must be within [0, 1] (got {})",
                self.depart_probability
            ));
        }
        if !(0.0..=1.0).contains(&self.alpha) {
            return err(format!("alpha must be within [0, 1] (got {})", self.alpha));
        }
        if self.min_desired_speed > self.max_desired_speed {
            return err("min desired speed exceeds max desired speed".into());
        }
        if !(self.desired_speed > 0.0) {
            return err("desired speed must be > 0".into());
        }
        if self.minimum_trip_length > self.road_length {
            return err("minimum trip length cannot exceed the road length".into());
        }
        if let Some(arrival) = self.arrival_position {
            if !(0.0 < arrival && arrival <= self.road_length) {
                return err(format!(
                    "arrival position {arrival} must lie on the road (0, {}]",
                    self.road_length
                ));
            }
        }
        if !(self.communication_range > 0.0) {
            return err("communication range must be > 0".into());
        }
        if !(self.execution_interval > 0.0) {
            return err("execution interval must be > 0".into());
        }

        // Capacity: the requested vehicles must physically fit on the road.
        let vt = VehicleType::passenger_car();
        let slot = vt.length + vt.min_gap;
        let capacity = (self.road_length / slot).floor() as usize * self.lanes as usize;
        let wanted = self.target_vehicle_count();
        if (self.pre_fill || self.start_as_platoon) && wanted > capacity {
            return err(format!(
                "{wanted} vehicles cannot fit on the road (capacity {capacity})"
            ));
        }

        if self.random_depart_position && !self.depart_desired {
            return err("random depart positions require departing at the desired speed".into());
        }

        if self.start_as_platoon {
            if self.penetration < 1.0 {
                return err("starting as one platoon requires a penetration rate of 1.0".into());
            }
            if self.formation_algorithm.is_some() {
                return err("a formation algorithm cannot be combined with start-as-platoon".into());
            }
            if self.depart_flow {
                return err("a continuous departure flow cannot start as one platoon".into());
            }
            if self.random_depart_position || self.random_depart_lane {
                return err("start-as-platoon requires fixed depart positions and lanes".into());
            }
            if self.random_arrival_position {
                return err("start-as-platoon requires fixed arrival positions".into());
            }
        }

        if self.formation_strategy == FormationStrategy::Centralized
            && self.formation_algorithm.is_some()
            && self.infrastructures == 0
        {
            return err("the centralized strategy needs at least one infrastructure".into());
        }

        if let Some(name) = &self.formation_algorithm {
            // Only registered names are accepted; checked here so the run
            // fails before t = 0, not at the first action boundary.
            pf_formation::algorithm_by_name(name, self.scoring_params())
                .map_err(|e| SimError::Config(e.to_string()))?;
        }

        Ok(())
    }

    /// Scoring parameters shared by all speed-position variants.
    pub fn scoring_params(&self) -> pf_formation::ScoringParams {
        pf_formation::ScoringParams {
            alpha: self.alpha,
            speed_deviation_threshold: self.speed_deviation_threshold,
            position_deviation_threshold: self.position_deviation_threshold,
        }
    }
}
