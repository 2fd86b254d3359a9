//! Fluent builder for constructing a [`Simulator`].

use pf_core::SimClock;
use pf_core::SimRng;
use pf_fleet::{Fleet, VehicleType, VehicleTypeRegistry};
use pf_formation::FormationAlgorithm;
use pf_platoon::{ManeuverConfig, ManeuverCoordinator, PlatoonRegistry};

use crate::cancel::CancelToken;
use crate::config::SimConfig;
use crate::scheduler::FormationScheduler;
use crate::sim::Simulator;
use crate::spawner::Spawner;
use crate::stats::Statistics;
use crate::SimResult;

/// Fluent builder for [`Simulator`].
///
/// # Example
///
/// ```rust,ignore
/// let mut sim = SimBuilder::new(SimConfig::default()).build()?;
/// let summary = sim.run(&mut NoopObserver)?;
/// ```
pub struct SimBuilder {
    config: SimConfig,
    cancel: Option<CancelToken>,
    algorithm_override: Option<Box<dyn FormationAlgorithm>>,
}

impl SimBuilder {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            cancel: None,
            algorithm_override: None,
        }
    }

    /// Share a cancellation token with the caller (e.g. a Ctrl-C handler).
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Replace the configured formation algorithm with a caller-built one —
    /// the injection point for external assignment solvers.
    pub fn formation_algorithm(mut self, algorithm: Box<dyn FormationAlgorithm>) -> Self {
        self.algorithm_override = Some(algorithm);
        self
    }

    /// Validate the configuration, place the pre-`t = 0` population, and
    /// return a ready-to-run [`Simulator`].
    pub fn build(self) -> SimResult<Simulator> {
        let config = self.config;
        config.validate()?;

        let road = config.road()?;
        let mut types = VehicleTypeRegistry::new();
        let car = types.register(VehicleType::passenger_car());

        let mut rng = SimRng::new(config.random_seed);
        let mut fleet = Fleet::new();
        let mut platoons = PlatoonRegistry::new();
        let mut stats = Statistics::new();

        let mut spawner = Spawner::new(&config, &mut rng);
        spawner.initialize(
            &mut fleet,
            &types,
            car,
            &road,
            &mut platoons,
            &mut rng,
            &config,
            &mut stats,
        )?;

        let mut scheduler = FormationScheduler::from_config(&config, &road)?;
        if let Some(algorithm) = self.algorithm_override {
            scheduler.set_algorithm(algorithm);
        }

        let coordinator = ManeuverCoordinator::new(ManeuverConfig {
            cacc_spacing: config.cacc_spacing,
            acc_headway_time: config.acc_headway_time,
            teleport_max: config.teleport_max,
            tau_max: config.tau_max,
            approach_epsilon: 0.1,
            update_desired_speed: config.update_desired_speed,
        });

        Ok(Simulator {
            clock: SimClock::new(config.step_length),
            road,
            types,
            car,
            fleet,
            platoons,
            coordinator,
            scheduler,
            spawner,
            stats,
            rng,
            cancel: self.cancel.unwrap_or_default(),
            next_action: 0.0,
            steps: 0,
            config,
        })
    }
}
