//! `pfsim` — simulate platoon formation on a multi-lane freeway.
//!
//! Thin shell around `pf-sim`: parse flags into a `SimConfig`, wire the CSV
//! trace writers and the Ctrl-C handler, run, and map errors to exit codes
//! (0 success, 1 config, 2 invariant, 3 solver, 130 cancelled).

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use pf_output::{CsvTraceWriter, TraceObserver};
use pf_sim::{
    CancelToken, CentralizedVariant, CollisionPolicy, DepartMethod, FormationStrategy,
    NoopObserver, RunSummary, SimBuilder, SimConfig,
};

// ── Flag enums ────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, ValueEnum)]
enum DepartMethodArg {
    Number,
    Interval,
    Flow,
    Probability,
}

impl From<DepartMethodArg> for DepartMethod {
    fn from(value: DepartMethodArg) -> Self {
        match value {
            DepartMethodArg::Number => DepartMethod::Number,
            DepartMethodArg::Interval => DepartMethod::Interval,
            DepartMethodArg::Flow => DepartMethod::Flow,
            DepartMethodArg::Probability => DepartMethod::Probability,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum CollisionsArg {
    Warn,
    Teleport,
    Abort,
}

impl From<CollisionsArg> for CollisionPolicy {
    fn from(value: CollisionsArg) -> Self {
        match value {
            CollisionsArg::Warn => CollisionPolicy::Warn,
            CollisionsArg::Teleport => CollisionPolicy::Teleport,
            CollisionsArg::Abort => CollisionPolicy::Abort,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum StrategyArg {
    Distributed,
    Centralized,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum CentralizedKindArg {
    Greedy,
    Optimal,
}

// ── Arguments ─────────────────────────────────────────────────────────────────

/// Simulate cooperative platoon formation on a straight freeway.
#[derive(Parser, Debug)]
#[command(name = "pfsim", version, about)]
struct Cli {
    /// Accept all defaults (compatibility no-op; unset flags default anyway).
    #[arg(short = 'd', long)]
    defaults: bool,

    // ── Road ──────────────────────────────────────────────────────────────
    /// Road length in m.
    #[arg(long, default_value_t = 100_000.0)]
    road_length: f64,
    /// Number of lanes.
    #[arg(long, default_value_t = 3)]
    lanes: u8,
    /// Distance between on-/off-ramps in m.
    #[arg(long, default_value_t = 1_000.0)]
    ramp_interval: f64,
    /// Speed limit of the road in m/s.
    #[arg(long, default_value_t = 55.0)]
    max_speed: f64,

    // ── Vehicles ──────────────────────────────────────────────────────────
    /// Total number of vehicles.
    #[arg(long, default_value_t = 100)]
    vehicles: usize,
    /// Target density in vehicles per km per lane (overrides --vehicles).
    #[arg(long, default_value_t = 0.0)]
    density: f64,
    /// Fraction of vehicles with platooning capability.
    #[arg(long, default_value_t = 1.0)]
    penetration: f64,
    /// Desired driving speed in m/s.
    #[arg(long, default_value_t = 36.0)]
    desired_speed: f64,
    /// Sample desired speeds from a normal distribution.
    #[arg(long, default_value_t = false)]
    random_desired_speed: bool,
    /// Relative standard deviation of the desired-speed distribution.
    #[arg(long, default_value_t = 0.1)]
    speed_variation: f64,
    #[arg(long, default_value_t = 22.0)]
    min_desired_speed: f64,
    #[arg(long, default_value_t = 50.0)]
    max_desired_speed: f64,

    // ── Trips ─────────────────────────────────────────────────────────────
    #[arg(long, value_enum, default_value_t = DepartMethodArg::Interval)]
    depart_method: DepartMethodArg,
    /// Seconds between two departures (interval method).
    #[arg(long, default_value_t = 1.0)]
    depart_interval: f64,
    /// Departure rate in vehicles per hour (flow method).
    #[arg(long, default_value_t = 3_600.0)]
    depart_rate: f64,
    /// Per-step departure probability (probability method).
    #[arg(long, default_value_t = 1.0)]
    depart_probability: f64,
    /// Keep spawning beyond the configured total.
    #[arg(long, default_value_t = false)]
    depart_flow: bool,
    /// Depart at the desired speed instead of standing.
    #[arg(long, default_value_t = false)]
    depart_desired: bool,
    #[arg(long, default_value_t = false)]
    random_depart_position: bool,
    #[arg(long, default_value_t = false)]
    random_arrival_position: bool,
    /// Escalate to the next lane when the requested one is blocked.
    #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
    depart_all_lanes: bool,
    /// Fixed arrival position in m (defaults to the road end).
    #[arg(long)]
    arrival_position: Option<f64>,
    /// Minimum trip length in m.
    #[arg(long, default_value_t = 0.0)]
    minimum_trip_length: f64,

    // ── Car-following ─────────────────────────────────────────────────────
    /// Headway time enforced by ACC in s.
    #[arg(long, default_value_t = 1.0)]
    acc_headway_time: f64,
    /// Constant spacing maintained by CACC in m.
    #[arg(long, default_value_t = 5.0)]
    cacc_spacing: f64,
    /// Apply platoon air-drag emission savings.
    #[arg(long, default_value_t = false)]
    reduced_air_drag: bool,

    // ── Platooning ────────────────────────────────────────────────────────
    /// All vehicles start as one platoon.
    #[arg(long, default_value_t = false)]
    start_as_platoon: bool,
    /// Populate the road to the target density before t = 0.
    #[arg(long, default_value_t = false)]
    pre_fill: bool,
    /// Recompute the platoon desired speed on membership changes.
    #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
    update_desired_speed: bool,

    // ── Formation ─────────────────────────────────────────────────────────
    /// Formation algorithm name (omit to disable formation).
    #[arg(long)]
    formation_algorithm: Option<String>,
    #[arg(long, value_enum, default_value_t = StrategyArg::Distributed)]
    formation_strategy: StrategyArg,
    #[arg(long, value_enum, default_value_t = CentralizedKindArg::Greedy)]
    formation_centralized_kind: CentralizedKindArg,
    /// Seconds between two formation invocations.
    #[arg(long, default_value_t = 1.0)]
    execution_interval: f64,
    /// Number of roadside infrastructures (centralized strategy).
    #[arg(long, default_value_t = 0)]
    infrastructures: u16,
    /// Maximum V2V observation distance in m.
    #[arg(long, default_value_t = 1_000.0)]
    communication_range: f64,
    /// Weight of the speed deviation in the speed-position cost.
    #[arg(long, default_value_t = 0.5)]
    alpha: f64,
    /// Wall-clock budget for one solver call in s.
    #[arg(long, default_value_t = 1.0)]
    solver_time_budget: f64,

    // ── Simulation ────────────────────────────────────────────────────────
    /// Simulated seconds to run.
    #[arg(long, default_value_t = 3_600.0)]
    time_limit: f64,
    /// Step length in s.
    #[arg(long, default_value_t = 1.0)]
    step_length: f64,
    #[arg(long, default_value_t = 42)]
    random_seed: u64,
    #[arg(long, value_enum, default_value_t = CollisionsArg::Abort)]
    collisions: CollisionsArg,
    /// Enable the lane-change model.
    #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
    lane_changes: bool,
    /// Validate the configuration and build everything, then exit.
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    // ── Recording ─────────────────────────────────────────────────────────
    /// Base path prefix for all result files.
    #[arg(long, default_value = "results")]
    result_base_filename: PathBuf,
    #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
    record_vehicle_trips: bool,
    #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
    record_vehicle_emissions: bool,
    #[arg(long, default_value_t = false)]
    record_vehicle_traces: bool,
    #[arg(long, default_value_t = false)]
    record_vehicle_changes: bool,
    #[arg(long, default_value_t = false)]
    record_emission_traces: bool,
    #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
    record_end_trace: bool,
    /// Record statistics for pre-filled vehicles too.
    #[arg(long, default_value_t = false)]
    record_prefilled: bool,
    #[arg(long, default_value_t = false)]
    record_platoon_trace: bool,
    #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
    record_platoon_maneuvers: bool,
}

impl Cli {
    fn into_config(self) -> SimConfig {
        let defaults = SimConfig::default();
        SimConfig {
            road_length: self.road_length,
            lanes: self.lanes,
            ramp_interval: self.ramp_interval,
            road_max_speed: self.max_speed,

            vehicles: self.vehicles,
            density: self.density,
            penetration: self.penetration,
            desired_speed: self.desired_speed,
            random_desired_speed: self.random_desired_speed,
            speed_variation: self.speed_variation,
            min_desired_speed: self.min_desired_speed,
            max_desired_speed: self.max_desired_speed,

            depart_method: self.depart_method.into(),
            depart_interval: self.depart_interval,
            depart_rate: self.depart_rate,
            depart_probability: self.depart_probability,
            depart_flow: self.depart_flow,
            depart_desired: self.depart_desired,
            random_depart_position: self.random_depart_position,
            random_arrival_position: self.random_arrival_position,
            depart_all_lanes: self.depart_all_lanes,
            arrival_position: self.arrival_position,
            minimum_trip_length: self.minimum_trip_length,

            acc_headway_time: self.acc_headway_time,
            cacc_spacing: self.cacc_spacing,
            reduced_air_drag: self.reduced_air_drag,

            start_as_platoon: self.start_as_platoon,
            pre_fill: self.pre_fill,
            update_desired_speed: self.update_desired_speed,

            formation_algorithm: self.formation_algorithm,
            formation_strategy: match self.formation_strategy {
                StrategyArg::Distributed => FormationStrategy::Distributed,
                StrategyArg::Centralized => FormationStrategy::Centralized,
            },
            formation_centralized_kind: match self.formation_centralized_kind {
                CentralizedKindArg::Greedy => CentralizedVariant::Greedy,
                CentralizedKindArg::Optimal => CentralizedVariant::Optimal,
            },
            execution_interval: self.execution_interval,
            infrastructures: self.infrastructures,
            communication_range: self.communication_range,
            alpha: self.alpha,
            solver_time_budget: self.solver_time_budget,

            time_limit: self.time_limit,
            step_length: self.step_length,
            random_seed: self.random_seed,
            collisions: self.collisions.into(),
            lane_changes: self.lane_changes,
            dry_run: self.dry_run,

            record: pf_sim::RecordFlags {
                vehicle_trips: self.record_vehicle_trips,
                vehicle_emissions: self.record_vehicle_emissions,
                vehicle_traces: self.record_vehicle_traces,
                vehicle_changes: self.record_vehicle_changes,
                emission_traces: self.record_emission_traces,
                end_trace: self.record_end_trace,
                prefilled: self.record_prefilled,
                platoon_trace: self.record_platoon_trace,
                platoon_maneuvers: self.record_platoon_maneuvers,
            },

            ..defaults
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn print_summary(summary: &RunSummary) {
    let s = &summary.stats;
    println!(
        "simulated {:.1} s in {} steps",
        summary.simulated_secs, summary.steps
    );
    println!(
        "vehicles: {} spawned, {} pre-filled, {} arrived, {} insertions dropped, {} remaining",
        s.spawned, s.prefilled, s.arrived, s.dropped_insertions, summary.vehicles_remaining
    );
    println!(
        "platooning: {} joins completed, {} aborted, {} leaves, {} platoons remaining",
        s.joins_completed, s.joins_aborted, s.leaves_completed, summary.platoons_remaining
    );
    println!(
        "events: {} lane changes, {} collisions, {} solver timeouts",
        s.lane_changes, s.collisions, s.solver_timeouts
    );
}

fn run(cli: Cli) -> Result<i32, anyhow::Error> {
    if cli.defaults {
        info!("running with default configuration");
    }
    let base = cli.result_base_filename.clone();
    let dry_run = cli.dry_run;
    let config = cli.into_config();

    let token = CancelToken::new();
    {
        let token = token.clone();
        ctrlc::set_handler(move || token.cancel())
            .context("installing the Ctrl-C handler")?;
    }

    let mut sim = match SimBuilder::new(config.clone()).cancel_token(token).build() {
        Ok(sim) => sim,
        Err(e) => {
            eprintln!("pfsim: {e}");
            return Ok(e.exit_code());
        }
    };

    // A dry run validates and builds but never writes result files.
    let outcome = if dry_run {
        sim.run(&mut NoopObserver)
    } else {
        let writer = CsvTraceWriter::new(&base, &config.record)
            .with_context(|| format!("opening result files at {}", base.display()))?;
        let mut observer = TraceObserver::new(writer, config.record.clone());
        let result = sim.run(&mut observer);
        if let Some(e) = observer.take_error() {
            eprintln!("pfsim: result recording failed: {e}");
        }
        result
    };

    match outcome {
        Ok(summary) => {
            print_summary(&summary);
            Ok(0)
        }
        Err(e) => {
            eprintln!("pfsim: {e}");
            info!(exit_code = e.exit_code(), "run terminated");
            Ok(e.exit_code())
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => ExitCode::from(code.clamp(0, 255) as u8),
        Err(e) => {
            eprintln!("pfsim: {e:#}");
            ExitCode::from(1)
        }
    }
}
