//! The `Simulator` and its step loop.

use pf_core::{PlatoonId, Road, SimClock, SimRng, VehicleId, VehicleTypeId};
use pf_fleet::{Fleet, ManeuverState, PlatoonRole, VehicleTypeRegistry};
use pf_formation::{FormationCommand, JoinTarget};
use pf_mobility::{
    commit_lane_changes, compute_new_speeds, detect_collisions, instantaneous_rates, lane_order,
    platoon_drag_reduction, propose_lane_changes, separate, CfContext,
};
use pf_platoon::{ManeuverCoordinator, ManeuverEvent, PlatoonRegistry};
use tracing::{error, info, warn};

use crate::cancel::CancelToken;
use crate::config::{CollisionPolicy, SimConfig};
use crate::observer::{SimObserver, TraceCtx};
use crate::scheduler::FormationScheduler;
use crate::spawner::Spawner;
use crate::stats::{RunSummary, Statistics, TripRecord};
use crate::{SimError, SimResult};

/// The main simulation runner.
///
/// Owns every piece of mutable state (fleet columns, platoon registry, RNG,
/// pending maneuvers); models and algorithms only ever see borrows.  Create
/// via [`SimBuilder`][crate::SimBuilder].
pub struct Simulator {
    pub config: SimConfig,
    pub clock: SimClock,
    pub road: Road,
    pub types: VehicleTypeRegistry,
    /// The single registered vehicle type.
    pub car: VehicleTypeId,
    pub fleet: Fleet,
    pub platoons: PlatoonRegistry,
    pub coordinator: ManeuverCoordinator,
    pub scheduler: FormationScheduler,
    pub spawner: Spawner,
    pub stats: Statistics,
    pub rng: SimRng,

    pub(crate) cancel: CancelToken,
    pub(crate) next_action: f64,
    pub(crate) steps: u64,
}

impl Simulator {
    /// A handle that requests graceful termination at a phase boundary.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Snapshot of the run's outcome so far.
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            steps: self.steps,
            simulated_secs: self.clock.now_secs(),
            vehicles_remaining: self.fleet.len(),
            platoons_remaining: self.platoons.len(),
            stats: self.stats.clone(),
        }
    }

    /// Advance simulated time until the limit is reached or the road runs
    /// dry with nothing left to spawn.
    pub fn run<O: SimObserver>(&mut self, observer: &mut O) -> SimResult<RunSummary> {
        if self.config.dry_run {
            info!("dry run: configuration validated, skipping the loop");
            let summary = self.summary();
            observer.on_sim_end(&summary);
            return Ok(summary);
        }

        loop {
            if self.cancelled(observer) {
                return Err(SimError::Cancelled);
            }
            let now = self.clock.now_secs();
            if now + 1e-9 >= self.config.time_limit {
                info!(now, "time limit reached");
                break;
            }
            observer.on_step_start(now);

            // ── Phase 1: spawn ────────────────────────────────────────────
            self.spawner.step(
                &mut self.fleet,
                &self.types,
                self.car,
                &self.road,
                &self.clock,
                &mut self.rng,
                &self.config,
                &mut self.stats,
            );
            if self.fleet.is_empty() && self.spawner.exhausted() {
                info!(now, "no vehicles left and the spawner is exhausted");
                break;
            }

            // ── Phase 2: actions ──────────────────────────────────────────
            if now + 1e-9 >= self.next_action {
                while self.next_action <= now + 1e-9 {
                    self.next_action += self.config.action_interval;
                }
                self.action_phase(now, observer)?;
            }
            if self.cancelled(observer) {
                return Err(SimError::Cancelled);
            }

            // ── Phase 3: lane changes ─────────────────────────────────────
            if self.config.lane_changes {
                let proposals = propose_lane_changes(
                    &self.fleet,
                    &self.types,
                    &self.road,
                    self.config.acc_headway_time,
                );
                let applied = commit_lane_changes(&mut self.fleet, &self.types, &proposals);
                self.stats.lane_changes += applied.len() as u64;
                for change in &applied {
                    observer.on_lane_change(now, change);
                }
            }

            // ── Phase 4: car-following ────────────────────────────────────
            let order = lane_order(&self.fleet, self.road.lanes);
            let cf_ctx = CfContext {
                types: &self.types,
                road: &self.road,
                step_length: self.clock.step_length,
                acc_headway_time: self.config.acc_headway_time,
                acc_lambda: self.config.acc_lambda,
                cacc_spacing: self.config.cacc_spacing,
                speed_imperfection: self.config.speed_imperfection,
            };
            let staged = compute_new_speeds(&self.fleet, &order, &cf_ctx, &mut self.rng);
            for row in self.fleet.rows() {
                self.fleet.acceleration[row] =
                    (staged.new_speed[row] - self.fleet.speed[row]) / self.clock.step_length;
            }
            self.fleet.speed = staged.new_speed;
            self.fleet.blocked_front = staged.blocked;

            // ── Phase 5: position update (Euler, non-ballistic) ───────────
            for row in self.fleet.rows() {
                self.fleet.position[row] += self.fleet.speed[row] * self.clock.step_length;
            }

            // ── Phase 6: collision check ──────────────────────────────────
            self.collision_phase(now, observer)?;

            // Statistics advance: time loss and rectangle-rule emissions.
            self.integrate_statistics(now, observer);

            // ── Phase 7: completion ───────────────────────────────────────
            self.complete_trips(now, observer)?;

            if let Err(e) = self.audit() {
                error!(%e, "invariant audit failed");
                observer.on_sim_end(&self.summary());
                return Err(e);
            }

            // ── Phase 8: time advance ─────────────────────────────────────
            self.clock.advance();
            self.steps += 1;
        }

        let summary = self.summary();
        observer.on_sim_end(&summary);
        Ok(summary)
    }

    // ── Cancellation ──────────────────────────────────────────────────────

    fn cancelled<O: SimObserver>(&mut self, observer: &mut O) -> bool {
        if !self.cancel.is_cancelled() {
            return false;
        }
        warn!("cancellation requested, flushing last committed state");
        observer.on_sim_end(&self.summary());
        true
    }

    // ── Phase 2 internals ─────────────────────────────────────────────────

    fn action_phase<O: SimObserver>(&mut self, now: f64, observer: &mut O) -> SimResult<()> {
        // Maneuvers first: joins whose approach delay elapsed commit before
        // the algorithm looks for new opportunities.
        let events = self.coordinator.process_due(
            &mut self.fleet,
            &self.types,
            &mut self.platoons,
            &self.road,
            &self.clock,
        );
        for event in events {
            self.record_maneuver(&event);
            observer.on_maneuver(now, &event);
        }

        if let Some(outcome) =
            self.scheduler
                .on_action(&self.fleet, &self.types, &self.platoons, &self.clock)?
        {
            self.stats.candidates_found += outcome.candidates_found as u64;
            self.stats.candidates_filtered += outcome.candidates_filtered as u64;
            self.stats.solver_timeouts += outcome.solver_timeouts as u64;
            self.apply_commands(outcome.commands, now, observer);
        }

        observer.on_snapshot(&TraceCtx {
            clock: &self.clock,
            fleet: &self.fleet,
            types: &self.types,
            platoons: &self.platoons,
        });
        Ok(())
    }

    fn record_maneuver(&mut self, event: &ManeuverEvent) {
        match event {
            ManeuverEvent::JoinScheduled { .. } => {}
            ManeuverEvent::JoinCompleted { vehicle, .. } => {
                self.stats.joins_completed += 1;
                self.stats.vehicle(*vehicle).joins_completed += 1;
            }
            ManeuverEvent::JoinAborted { vehicle, reason, .. } => {
                self.stats.record_join_abort(*vehicle, *reason);
            }
            ManeuverEvent::LeaveCompleted { vehicle, .. } => {
                self.stats.leaves_completed += 1;
                self.stats.vehicle(*vehicle).leaves += 1;
            }
        }
    }

    /// Apply formation commands in ascending joiner-id order (this ordering
    /// is the lower-id-wins conflict rule).
    fn apply_commands<O: SimObserver>(
        &mut self,
        mut commands: Vec<FormationCommand>,
        now: f64,
        observer: &mut O,
    ) {
        commands.sort_by_key(|c| c.vehicle());
        for command in commands {
            match command {
                FormationCommand::Join { vehicle, target } => {
                    self.apply_join(vehicle, target, now, observer);
                }
                FormationCommand::Leave { vehicle } => {
                    match self.coordinator.leave(
                        &mut self.fleet,
                        &mut self.platoons,
                        &self.clock,
                        vehicle,
                    ) {
                        Ok(event) => {
                            self.record_maneuver(&event);
                            observer.on_maneuver(now, &event);
                        }
                        Err(_) => self.stats.join_rejects += 1,
                    }
                }
            }
        }
    }

    fn apply_join<O: SimObserver>(
        &mut self,
        vehicle: VehicleId,
        target: JoinTarget,
        now: f64,
        observer: &mut O,
    ) {
        // The snapshot the algorithm saw is stale by now; re-validate the
        // joiner before touching anything.
        let joinable = self.fleet.row(vehicle).is_some_and(|r| {
            self.fleet.platooning[r]
                && self.fleet.platoon_role[r] == PlatoonRole::None
                && self.fleet.maneuver[r] == ManeuverState::Idle
        });
        if !joinable {
            self.stats.join_rejects += 1;
            return;
        }

        let (platoon, created) = match self.resolve_target(vehicle, target, now) {
            Some(p) => p,
            None => {
                self.stats.join_rejects += 1;
                return;
            }
        };

        match self.coordinator.schedule_join(
            &mut self.fleet,
            &self.types,
            &self.platoons,
            &self.clock,
            vehicle,
            platoon,
        ) {
            Ok(due) => {
                self.stats.joins_scheduled += 1;
                self.stats.vehicle(vehicle).joins_attempted += 1;
                observer.on_maneuver(now, &ManeuverEvent::JoinScheduled { vehicle, platoon, due });
            }
            Err(reject) => {
                self.stats.join_rejects += 1;
                tracing::debug!(vehicle = %vehicle, ?reject, "join command rejected");
                if created {
                    // Roll back the platoon we just formed around the target.
                    if let Some(p) = self.platoons.get(platoon) {
                        let leader = p.leader();
                        let _ = self.platoons.remove_member(
                            &mut self.fleet,
                            leader,
                            self.config.update_desired_speed,
                            now,
                        );
                    }
                }
            }
        }
    }

    /// Turn a join target into a platoon id, creating a platoon around a
    /// lone target vehicle when needed.  Returns `(platoon, created_here)`.
    fn resolve_target(
        &mut self,
        joiner: VehicleId,
        target: JoinTarget,
        now: f64,
    ) -> Option<(PlatoonId, bool)> {
        match target {
            JoinTarget::Platoon(p) => self.platoons.get(p).map(|p| (p.id, false)),
            JoinTarget::Vehicle(v) => {
                if v == joiner {
                    return None;
                }
                let row = self.fleet.row(v)?;
                match self.fleet.platoon_role[row] {
                    // Became a leader since the snapshot: join its platoon.
                    PlatoonRole::Leader => Some((self.fleet.platoon_id[row], false)),
                    PlatoonRole::Follower => None,
                    PlatoonRole::None => {
                        if self.fleet.maneuver[row] != ManeuverState::Idle
                            || !self.fleet.platooning[row]
                        {
                            return None;
                        }
                        self.platoons
                            .create(&mut self.fleet, v, now)
                            .ok()
                            .map(|p| (p, true))
                    }
                }
            }
        }
    }

    // ── Phase 6 internals ─────────────────────────────────────────────────

    fn collision_phase<O: SimObserver>(&mut self, now: f64, observer: &mut O) -> SimResult<()> {
        let order = lane_order(&self.fleet, self.road.lanes);
        let collisions = detect_collisions(&self.fleet, &self.types, &order);
        if collisions.is_empty() {
            return Ok(());
        }

        self.stats.collisions += collisions.len() as u64;
        for collision in &collisions {
            observer.on_collision(now, collision);
        }

        match self.config.collisions {
            CollisionPolicy::Warn => {
                for c in &collisions {
                    warn!(front = %c.front, back = %c.back, lane = c.lane, overlap = c.overlap, "collision");
                }
                Ok(())
            }
            CollisionPolicy::Teleport => {
                for c in &collisions {
                    separate(&mut self.fleet, &self.types, c);
                }
                Ok(())
            }
            CollisionPolicy::Abort => {
                let c = &collisions[0];
                observer.on_sim_end(&self.summary());
                Err(SimError::Invariant(format!(
                    "vehicles {} and {} overlap by {:.2} m on lane {} at t = {:.1} s",
                    c.front, c.back, c.overlap, c.lane, now
                )))
            }
        }
    }

    fn integrate_statistics<O: SimObserver>(&mut self, now: f64, observer: &mut O) {
        let dt = self.clock.step_length;
        for row in self.fleet.rows() {
            let desired = self.fleet.desired_speed[row];
            let speed = self.fleet.speed[row];
            if desired > 0.0 && speed < desired {
                self.fleet.time_loss[row] += dt * (1.0 - speed / desired);
            }

            let class = self.types.get(self.fleet.vtype[row]).emission_class;
            let mut rates = instantaneous_rates(class, speed, self.fleet.acceleration[row]);
            let role = self.fleet.platoon_role[row];
            if self.config.reduced_air_drag && role.is_in_platoon() {
                let is_tail = self
                    .platoons
                    .get(self.fleet.platoon_id[row])
                    .map(|p| p.tail() == self.fleet.ids[row])
                    .unwrap_or(false);
                rates = rates.scaled(platoon_drag_reduction(role, is_tail));
            }
            rates.accumulate_into(&mut self.fleet.emissions[row], dt);
            observer.on_emission_sample(
                now,
                self.fleet.ids[row],
                &rates,
                self.fleet.prefilled[row],
            );
        }
    }

    // ── Phase 7 internals ─────────────────────────────────────────────────

    fn complete_trips<O: SimObserver>(&mut self, now: f64, observer: &mut O) -> SimResult<()> {
        let mut arrived: Vec<VehicleId> = self
            .fleet
            .rows()
            .filter(|&r| self.fleet.position[r] >= self.fleet.arrival_position[r])
            .map(|r| self.fleet.ids[r])
            .collect();
        arrived.sort();

        for id in arrived {
            let row = self.fleet.row(id).expect("collected from live rows");
            if self.fleet.platoon_role[row].is_in_platoon() {
                match self
                    .coordinator
                    .leave(&mut self.fleet, &mut self.platoons, &self.clock, id)
                {
                    Ok(event) => {
                        self.record_maneuver(&event);
                        observer.on_maneuver(now, &event);
                    }
                    Err(e) => {
                        return Err(SimError::Invariant(format!(
                            "arriving vehicle {id} holds a broken platoon link: {e}"
                        )));
                    }
                }
            }

            let row = self.fleet.row(id).expect("leave never removes the vehicle");
            let trip = TripRecord {
                vehicle: id,
                depart_time: self.fleet.depart_time[row],
                arrival_time: now + self.clock.step_length,
                depart_position: self.fleet.depart_position[row],
                arrival_position: self.fleet.position[row],
                depart_lane: self.fleet.depart_lane[row],
                arrival_lane: self.fleet.lane[row],
                depart_speed: self.fleet.depart_speed[row],
                arrival_speed: self.fleet.speed[row],
                desired_speed: self.fleet.desired_speed[row],
                route_length: self.fleet.position[row] - self.fleet.depart_position[row],
                time_loss: self.fleet.time_loss[row],
                depart_delay: self.fleet.depart_delay[row],
                prefilled: self.fleet.prefilled[row],
                emissions: self.fleet.emissions[row],
                maneuvers: self.stats.take_vehicle(id),
            };
            self.fleet
                .remove(id)
                .map_err(|e| SimError::Invariant(e.to_string()))?;
            self.stats.arrived += 1;
            info!(vehicle = %id, route_length = trip.route_length, "trip completed");
            observer.on_vehicle_arrived(&trip);
        }
        Ok(())
    }

    // ── Invariant audit ───────────────────────────────────────────────────

    /// Cheap end-of-step checks for the guarantees every other component
    /// relies on.  A violation is fatal (exit code 2).
    fn audit(&self) -> SimResult<()> {
        for row in self.fleet.rows() {
            let v = self.fleet.speed[row];
            let vt = self.types.get(self.fleet.vtype[row]);
            let cap = vt.max_speed.min(self.road.max_speed);
            if !(0.0..=cap + 1e-6).contains(&v) {
                return Err(SimError::Invariant(format!(
                    "vehicle {} drives at {v:.2} m/s outside [0, {cap:.2}]",
                    self.fleet.ids[row]
                )));
            }
            let role = self.fleet.platoon_role[row];
            if role.is_in_platoon() {
                let pid = self.fleet.platoon_id[row];
                let member_ok = self
                    .platoons
                    .get(pid)
                    .map(|p| p.member_index(self.fleet.ids[row]).is_some())
                    .unwrap_or(false);
                if !member_ok {
                    return Err(SimError::Invariant(format!(
                        "vehicle {} holds a dangling platoon link to {pid}",
                        self.fleet.ids[row]
                    )));
                }
            }
        }

        for platoon in self.platoons.iter() {
            let mut last_position = f64::INFINITY;
            let mut lane: Option<u8> = None;
            for &member in &platoon.members {
                let Some(row) = self.fleet.row(member) else {
                    return Err(SimError::Invariant(format!(
                        "platoon {} lists departed vehicle {member}",
                        platoon.id
                    )));
                };
                let position = self.fleet.position[row];
                if position >= last_position {
                    return Err(SimError::Invariant(format!(
                        "platoon {} members out of order at {member}",
                        platoon.id
                    )));
                }
                last_position = position;
                match lane {
                    None => lane = Some(self.fleet.lane[row]),
                    Some(l) if l != self.fleet.lane[row] => {
                        return Err(SimError::Invariant(format!(
                            "platoon {} spans multiple lanes",
                            platoon.id
                        )));
                    }
                    Some(_) => {}
                }
            }
        }
        Ok(())
    }
}
