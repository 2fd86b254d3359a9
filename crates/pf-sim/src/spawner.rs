//! Vehicle insertion: departure methods, safety-gated placement, pre-fill.

use std::collections::VecDeque;

use pf_core::{Road, SimClock, SimRng, VehicleId, VehicleTypeId};
use pf_fleet::{CfModel, Fleet, NewVehicle, VehicleTypeRegistry};
use pf_mobility::is_gap_safe;
use pf_platoon::PlatoonRegistry;
use tracing::{debug, info, warn};

use crate::config::{DepartMethod, SimConfig};
use crate::stats::Statistics;
use crate::{SimError, SimResult};

/// A departure that has been generated but not yet safely inserted.
#[derive(Clone, Debug)]
struct PendingSpawn {
    requested_at: f64,
    retries: u32,
}

/// Inserts vehicles according to the configured departure method.
///
/// Rejected insertions (no safe gap on any allowed lane) are retried the
/// next step up to the configured limit, then dropped with a counter.
pub struct Spawner {
    method: DepartMethod,
    depart_flow: bool,
    target_total: usize,
    depart_interval: f64,
    depart_rate: f64,
    depart_probability: f64,
    retry_limit: u32,

    /// Departure requests generated so far (counts dropped ones).
    generated: usize,
    next_interval_due: f64,
    queue: VecDeque<PendingSpawn>,

    /// Independent stream for trace colors, so cosmetics never perturb the
    /// mobility draws.
    color_rng: SimRng,
}

impl Spawner {
    pub fn new(config: &SimConfig, rng: &mut SimRng) -> Self {
        Self {
            method: config.depart_method,
            depart_flow: config.depart_flow,
            target_total: config.target_vehicle_count(),
            depart_interval: config.depart_interval,
            depart_rate: config.depart_rate,
            depart_probability: config.depart_probability,
            retry_limit: config.spawn_retry_limit,
            generated: 0,
            next_interval_due: 0.0,
            queue: VecDeque::new(),
            color_rng: rng.child(0xC0),
        }
    }

    /// `true` once no further vehicle can ever appear.
    pub fn exhausted(&self) -> bool {
        !self.depart_flow && self.generated >= self.target_total && self.queue.is_empty()
    }

    /// The spawn phase: generate this step's departure requests, then try to
    /// insert everything still queued.
    pub fn step(
        &mut self,
        fleet: &mut Fleet,
        types: &VehicleTypeRegistry,
        car: VehicleTypeId,
        road: &Road,
        clock: &SimClock,
        rng: &mut SimRng,
        config: &SimConfig,
        stats: &mut Statistics,
    ) -> Vec<VehicleId> {
        let now = clock.now_secs();
        self.generate_requests(now, clock.step_length, rng);

        let mut inserted = Vec::new();
        let mut requeue = VecDeque::new();
        while let Some(mut pending) = self.queue.pop_front() {
            match self.try_insert(fleet, types, car, road, now, rng, config, &pending) {
                Some(id) => {
                    stats.spawned += 1;
                    inserted.push(id);
                }
                None => {
                    pending.retries += 1;
                    if pending.retries > self.retry_limit {
                        warn!(
                            requested_at = pending.requested_at,
                            "insertion dropped after {} retries", pending.retries - 1
                        );
                        stats.dropped_insertions += 1;
                    } else {
                        requeue.push_back(pending);
                    }
                }
            }
        }
        self.queue = requeue;
        inserted
    }

    fn generate_requests(&mut self, now: f64, step_length: f64, rng: &mut SimRng) {
        let mut want = 0usize;
        match self.method {
            DepartMethod::Number => want = 1,
            DepartMethod::Interval => {
                while self.next_interval_due <= now + 1e-9 {
                    self.next_interval_due += self.depart_interval;
                    want += 1;
                }
            }
            DepartMethod::Flow => {
                let lambda = self.depart_rate * step_length / 3_600.0;
                want = rng.poisson(lambda) as usize;
            }
            DepartMethod::Probability => {
                if rng.gen_bool(self.depart_probability) {
                    want = 1;
                }
            }
        }

        for _ in 0..want {
            if !self.depart_flow && self.generated >= self.target_total {
                break;
            }
            self.generated += 1;
            self.queue.push_back(PendingSpawn { requested_at: now, retries: 0 });
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn try_insert(
        &mut self,
        fleet: &mut Fleet,
        types: &VehicleTypeRegistry,
        car: VehicleTypeId,
        road: &Road,
        now: f64,
        rng: &mut SimRng,
        config: &SimConfig,
        pending: &PendingSpawn,
    ) -> Option<VehicleId> {
        let vt = types.get(car);
        let length = vt.length;

        let depart_position = if config.random_depart_position {
            let max_depart = (road.length - config.minimum_trip_length.max(1.0)).max(0.0);
            let last_ramp = (max_depart / road.ramp_interval).floor() as usize;
            let ramp = rng.gen_range(0..=last_ramp);
            road.ramp_position(ramp).max(length)
        } else {
            // Front bumper just past the road start.
            length
        };

        let requested_lane: u8 = if config.random_depart_lane {
            rng.gen_range(0..road.lanes)
        } else {
            0
        };

        let desired_speed = sample_desired_speed(rng, config);
        let depart_speed = if config.depart_desired {
            desired_speed
        } else if config.random_depart_speed {
            rng.gen_range(0.0..=desired_speed)
        } else {
            0.0
        };

        let arrival_position =
            sample_arrival_position(road, depart_position, config, rng, false);

        // Safety scan over candidate lanes.
        let lane = self.find_insertable_lane(
            fleet,
            types,
            road,
            depart_position,
            depart_speed,
            length,
            vt.max_deceleration,
            vt.max_acceleration,
            requested_lane,
            config,
        )?;

        let platooning = rng.gen_bool(config.penetration);
        let id = fleet.spawn(NewVehicle {
            vtype: car,
            depart_time: now,
            depart_position,
            depart_lane: lane,
            depart_speed,
            depart_delay: now - pending.requested_at,
            arrival_position,
            desired_speed,
            cf_model: if platooning { CfModel::Acc } else { CfModel::Human },
            platooning,
            prefilled: false,
            formation_phase: now.rem_euclid(config.execution_interval),
            color: self.next_color(),
        });
        info!(vehicle = %id, depart_position, lane, depart_speed, "spawned");
        Some(id)
    }

    #[allow(clippy::too_many_arguments)]
    fn find_insertable_lane(
        &self,
        fleet: &Fleet,
        types: &VehicleTypeRegistry,
        road: &Road,
        position: f64,
        speed: f64,
        length: f64,
        max_deceleration: f64,
        max_acceleration: f64,
        requested: u8,
        config: &SimConfig,
    ) -> Option<u8> {
        let candidates: Vec<u8> = if config.depart_all_lanes {
            (requested..road.lanes).collect()
        } else {
            vec![requested]
        };
        candidates.into_iter().find(|&lane| {
            insertion_safe(
                fleet,
                types,
                position,
                lane,
                speed,
                length,
                max_deceleration,
                max_acceleration,
                config.step_length,
            )
        })
    }

    fn next_color(&mut self) -> [u8; 3] {
        [
            self.color_rng.gen_range(0..=255u32) as u8,
            self.color_rng.gen_range(0..=255u32) as u8,
            self.color_rng.gen_range(0..=255u32) as u8,
        ]
    }

    // ── Pre-simulation population ─────────────────────────────────────────

    /// Populate the road before `t = 0`: either the start-as-platoon chain
    /// or the density pre-fill.
    pub fn initialize(
        &mut self,
        fleet: &mut Fleet,
        types: &VehicleTypeRegistry,
        car: VehicleTypeId,
        road: &Road,
        platoons: &mut PlatoonRegistry,
        rng: &mut SimRng,
        config: &SimConfig,
        stats: &mut Statistics,
    ) -> SimResult<()> {
        if config.start_as_platoon {
            self.spawn_platoon_chain(fleet, types, car, platoons, rng, config, stats)?;
        } else if config.pre_fill {
            self.pre_fill(fleet, types, car, road, rng, config, stats);
        }
        Ok(())
    }

    fn spawn_platoon_chain(
        &mut self,
        fleet: &mut Fleet,
        types: &VehicleTypeRegistry,
        car: VehicleTypeId,
        platoons: &mut PlatoonRegistry,
        rng: &mut SimRng,
        config: &SimConfig,
        stats: &mut Statistics,
    ) -> SimResult<()> {
        let n = config.target_vehicle_count();
        let length = types.get(car).length;
        let slot = length + config.cacc_spacing;

        let mut ids = Vec::with_capacity(n);
        for i in 0..n {
            let desired_speed = sample_desired_speed(rng, config);
            let position = (n - i) as f64 * slot;
            let id = fleet.spawn(NewVehicle {
                vtype: car,
                depart_time: 0.0,
                depart_position: position,
                depart_lane: 0,
                depart_speed: desired_speed,
                depart_delay: 0.0,
                arrival_position: config.road_length,
                desired_speed,
                cf_model: CfModel::Acc,
                platooning: true,
                prefilled: false,
                formation_phase: 0.0,
                color: self.next_color(),
            });
            ids.push(id);
            stats.spawned += 1;
        }
        self.generated = n;

        let leader = *ids.first().ok_or_else(|| {
            SimError::Config("start-as-platoon needs at least one vehicle".into())
        })?;
        let pid = platoons
            .create(fleet, leader, 0.0)
            .map_err(|e| SimError::Config(e.to_string()))?;
        for &v in &ids[1..] {
            platoons
                .append_member(fleet, pid, v, config.update_desired_speed)
                .map_err(|e| SimError::Config(e.to_string()))?;
        }
        info!(platoon = %pid, size = n, "initial platoon chain placed");
        Ok(())
    }

    fn pre_fill(
        &mut self,
        fleet: &mut Fleet,
        types: &VehicleTypeRegistry,
        car: VehicleTypeId,
        road: &Road,
        rng: &mut SimRng,
        config: &SimConfig,
        stats: &mut Statistics,
    ) {
        let n = config.target_vehicle_count();
        let vt = types.get(car);
        let slot = vt.length + vt.min_gap;
        let slots = ((road.length - vt.length) / slot).floor() as u64;
        info!(vehicles = n, "pre-filling the road");

        for _ in 0..n {
            let mut placed = false;
            for _attempt in 0..200 {
                let position = vt.length + rng.gen_range(0..slots) as f64 * slot;
                let lane = rng.gen_range(0..road.lanes);
                if occupied(fleet, types, position, lane, vt.length) {
                    continue;
                }

                // Equilibrium departure: pre-filled vehicles cruise at their
                // desired speed as if the snapshot came from a running sim.
                let desired_speed = sample_desired_speed(rng, config);
                let arrival_position =
                    sample_arrival_position(road, position, config, rng, true);
                let platooning = rng.gen_bool(config.penetration);
                let phase_steps =
                    (config.execution_interval / config.step_length).floor().max(1.0) as u64;
                let formation_phase =
                    rng.gen_range(0..phase_steps) as f64 * config.step_length;

                let id = fleet.spawn(NewVehicle {
                    vtype: car,
                    depart_time: 0.0,
                    depart_position: position,
                    depart_lane: lane,
                    depart_speed: desired_speed,
                    depart_delay: 0.0,
                    arrival_position,
                    desired_speed,
                    cf_model: if platooning { CfModel::Acc } else { CfModel::Human },
                    platooning,
                    prefilled: true,
                    formation_phase,
                    color: self.next_color(),
                });
                debug!(vehicle = %id, position, lane, "pre-filled");
                stats.prefilled += 1;
                placed = true;
                break;
            }
            if !placed {
                stats.dropped_insertions += 1;
            }
        }
        self.generated = n;
    }
}

// ── Placement helpers ─────────────────────────────────────────────────────────

fn sample_desired_speed(rng: &mut SimRng, config: &SimConfig) -> f64 {
    if config.random_desired_speed {
        let speed = config.desired_speed * rng.normal(1.0, config.speed_variation);
        speed.clamp(config.min_desired_speed, config.max_desired_speed)
    } else {
        config.desired_speed
    }
}

/// Arrival ramp selection per the trip configuration.
fn sample_arrival_position(
    road: &Road,
    depart_position: f64,
    config: &SimConfig,
    rng: &mut SimRng,
    pre_fill: bool,
) -> f64 {
    let min_trip = if pre_fill {
        // A pre-filled trip is a snapshot of an older departure; it only has
        // to reach the next ramp.
        1.0
    } else {
        config.minimum_trip_length.max(1.0)
    };
    let min_arrival = (depart_position + min_trip).min(road.length);
    let min_ramp = road.ramp_at_or_after(min_arrival);

    if config.random_arrival_position && min_ramp < road.length {
        let first = (min_ramp / road.ramp_interval).round() as usize;
        let last = (road.length / road.ramp_interval).floor() as usize;
        let ramp = rng.gen_range(first..=last);
        road.ramp_position(ramp)
    } else {
        config
            .arrival_position
            .unwrap_or(road.length)
            .clamp(min_arrival, road.length)
    }
}

/// Plain bounding-box occupancy test for pre-fill placement.
fn occupied(
    fleet: &Fleet,
    types: &VehicleTypeRegistry,
    position: f64,
    lane: u8,
    length: f64,
) -> bool {
    let rear = position - length;
    fleet.rows().any(|r| {
        fleet.lane[r] == lane
            && fleet.position[r].min(position) - fleet.rear_position(r, types).max(rear) >= 0.0
    })
}

/// The insertion safety gate: the new vehicle must be gap-safe against both
/// its would-be predecessor and successor on the target lane.
#[allow(clippy::too_many_arguments)]
fn insertion_safe(
    fleet: &Fleet,
    types: &VehicleTypeRegistry,
    position: f64,
    lane: u8,
    speed: f64,
    length: f64,
    max_deceleration: f64,
    max_acceleration: f64,
    step_length: f64,
) -> bool {
    let rear = position - length;

    let mut front: Option<usize> = None;
    let mut back: Option<usize> = None;
    for r in fleet.rows() {
        if fleet.lane[r] != lane {
            continue;
        }
        let other_pos = fleet.position[r];
        let other_rear = fleet.rear_position(r, types);
        if other_pos.min(position) - other_rear.max(rear) >= 0.0 {
            return false; // direct overlap
        }
        if other_rear >= position {
            if front.map_or(true, |f| fleet.rear_position(f, types) > other_rear) {
                front = Some(r);
            }
        } else if other_pos <= rear {
            if back.map_or(true, |b| fleet.position[b] < other_pos) {
                back = Some(r);
            }
        }
    }

    if let Some(f) = front {
        let vt_f = types.get(fleet.vtype[f]);
        if !is_gap_safe(
            fleet.position[f],
            fleet.speed[f],
            vt_f.max_deceleration,
            vt_f.length,
            position,
            speed,
            max_acceleration,
            step_length,
        ) {
            return false;
        }
    }
    if let Some(b) = back {
        let vt_b = types.get(fleet.vtype[b]);
        if !is_gap_safe(
            position,
            speed,
            max_deceleration,
            length,
            fleet.position[b],
            fleet.speed[b],
            vt_b.max_acceleration,
            step_length,
        ) {
            return false;
        }
    }
    true
}
