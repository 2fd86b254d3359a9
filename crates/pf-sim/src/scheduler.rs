//! Periodic dispatch into the configured formation algorithm.
//!
//! The distributed strategy is evaluated at every action boundary — each
//! vehicle's own execution timer (see `FormationView::timer_fires`) gates
//! participation, which is what keeps pre-filled vehicles desynchronized.
//! The centralized strategies run on the global execution-interval grid: the
//! first action step at or past each boundary triggers one sweep, so the
//! interval does not have to be a multiple of the step length.

use std::time::Duration;

use pf_core::{InfrastructureId, Road, SimClock};
use pf_fleet::{Fleet, VehicleTypeRegistry};
use pf_formation::{
    algorithm_by_name, CentralizedFormation, CentralizedKind, FormationAlgorithm,
    FormationOutcome, FormationView, GreedySolver,
};
use pf_platoon::PlatoonRegistry;
use tracing::debug;

use crate::config::{CentralizedVariant, FormationStrategy, SimConfig};
use crate::SimResult;

/// A fixed roadside entity capable of running centralized formation.
///
/// Modeled as omniscient: the coverage range exists for traces and future
/// channel models, not for filtering.
#[derive(Clone, Debug)]
pub struct Infrastructure {
    pub id: InfrastructureId,
    pub position: f64,
    pub coverage_range: f64,
}

/// Owns the algorithm instance and the invocation cadence.
pub struct FormationScheduler {
    algorithm: Option<Box<dyn FormationAlgorithm>>,
    strategy: FormationStrategy,
    interval: f64,
    next_boundary: f64,
    communication_range: f64,
    infrastructures: Vec<Infrastructure>,
}

impl FormationScheduler {
    /// Build from config; unknown algorithm names fail here (exit 1).
    pub fn from_config(config: &SimConfig, road: &Road) -> SimResult<Self> {
        let algorithm: Option<Box<dyn FormationAlgorithm>> = match &config.formation_algorithm {
            None => None,
            Some(name) => match config.formation_strategy {
                FormationStrategy::Distributed => {
                    // Validates the name against the build-time registry.
                    Some(algorithm_by_name(name, config.scoring_params())?)
                }
                FormationStrategy::Centralized => {
                    algorithm_by_name(name, config.scoring_params())?;
                    let kind = match config.formation_centralized_kind {
                        CentralizedVariant::Greedy => CentralizedKind::Greedy,
                        CentralizedVariant::Optimal => CentralizedKind::Optimal {
                            solver: Box::new(GreedySolver),
                            budget: Duration::from_secs_f64(config.solver_time_budget),
                        },
                    };
                    Some(Box::new(CentralizedFormation::new(kind, config.scoring_params())))
                }
            },
        };

        let infrastructures = if algorithm.is_some()
            && config.formation_strategy == FormationStrategy::Centralized
        {
            let n = config.infrastructures as usize;
            let spacing = road.length / n as f64;
            (0..n)
                .map(|i| Infrastructure {
                    id: InfrastructureId(i as u16),
                    position: (i as f64 + 0.5) * spacing,
                    coverage_range: road.length,
                })
                .collect()
        } else {
            Vec::new()
        };

        Ok(Self {
            algorithm,
            strategy: config.formation_strategy,
            interval: config.execution_interval,
            next_boundary: 0.0,
            communication_range: config.communication_range,
            infrastructures,
        })
    }

    /// Replace the solver of a centralized-optimal scheduler (test hook and
    /// external-solver injection point).
    pub fn set_algorithm(&mut self, algorithm: Box<dyn FormationAlgorithm>) {
        self.algorithm = Some(algorithm);
    }

    pub fn infrastructures(&self) -> &[Infrastructure] {
        &self.infrastructures
    }

    /// Run the algorithm if this action step is an invocation point.
    pub fn on_action(
        &mut self,
        fleet: &Fleet,
        types: &VehicleTypeRegistry,
        platoons: &PlatoonRegistry,
        clock: &SimClock,
    ) -> SimResult<Option<FormationOutcome>> {
        let Some(algorithm) = &self.algorithm else {
            return Ok(None);
        };

        let now = clock.now_secs();
        match self.strategy {
            FormationStrategy::Distributed => {
                // per-vehicle timers gate inside the algorithm
            }
            FormationStrategy::Centralized => {
                if now + 1e-9 < self.next_boundary {
                    return Ok(None);
                }
                while self.next_boundary <= now + 1e-9 {
                    self.next_boundary += self.interval;
                }
            }
        }

        let view = FormationView {
            fleet,
            types,
            platoons,
            clock,
            communication_range: self.communication_range,
            execution_interval: self.interval,
        };
        let outcome = algorithm.on_step(&view)?;
        if !outcome.commands.is_empty() {
            debug!(commands = outcome.commands.len(), "formation produced commands");
        }
        Ok(Some(outcome))
    }
}
