//! `TraceObserver<W>` — bridges the simulation observer to a `TraceWriter`.

use pf_fleet::PlatoonRole;
use pf_mobility::{Collision, EmissionRates, LaneChange};
use pf_sim::{RecordFlags, RunSummary, SimObserver, TraceCtx, TripRecord};

use crate::row::{
    EmissionsRow, LaneChangeRow, PlatoonManeuversRow, PlatoonTraceRow, TripRow, VehicleTraceRow,
};
use crate::writer::TraceWriter;
use crate::OutputError;

fn role_name(role: PlatoonRole) -> &'static str {
    match role {
        PlatoonRole::None => "none",
        PlatoonRole::Leader => "leader",
        PlatoonRole::Follower => "follower",
    }
}

/// A [`SimObserver`] that renders trace rows into any [`TraceWriter`]
/// backend, honouring the per-file record flags and the pre-filled gate.
///
/// Writer errors are stored internally because observer hooks have no return
/// value; fetch them after the run with [`take_error`][Self::take_error].
pub struct TraceObserver<W: TraceWriter> {
    writer: W,
    flags: RecordFlags,
    last_error: Option<OutputError>,
}

impl<W: TraceWriter> TraceObserver<W> {
    pub fn new(writer: W, flags: RecordFlags) -> Self {
        Self {
            writer,
            flags,
            last_error: None,
        }
    }

    /// Take the stored write error (if any) after the run.
    pub fn take_error(&mut self) -> Option<OutputError> {
        self.last_error.take()
    }

    /// Unwrap the inner writer (e.g. to inspect files after the run).
    pub fn into_writer(self) -> W {
        self.writer
    }

    fn store_err(&mut self, result: crate::OutputResult<()>) {
        if let Err(e) = result {
            // Keep only the first error.
            if self.last_error.is_none() {
                self.last_error = Some(e);
            }
        }
    }
}

impl<W: TraceWriter> SimObserver for TraceObserver<W> {
    fn on_snapshot(&mut self, ctx: &TraceCtx<'_>) {
        let time = ctx.clock.now_secs();

        if self.flags.vehicle_traces {
            let mut rows: Vec<usize> = ctx.fleet.rows().collect();
            rows.sort_by_key(|&r| ctx.fleet.ids[r]);
            for r in rows {
                if ctx.fleet.prefilled[r] && !self.flags.prefilled {
                    continue;
                }
                let [red, green, blue] = ctx.fleet.color[r];
                let row = VehicleTraceRow {
                    time,
                    id: ctx.fleet.ids[r].0,
                    position: ctx.fleet.position[r],
                    lane: ctx.fleet.lane[r],
                    speed: ctx.fleet.speed[r],
                    desired_speed: ctx.fleet.desired_speed[r],
                    platoon_id: ctx.fleet.platoon_id[r].0,
                    platoon_role: role_name(ctx.fleet.platoon_role[r]),
                    color: format!("#{red:02X}{green:02X}{blue:02X}"),
                };
                let result = self.writer.write_vehicle_trace(&row);
                self.store_err(result);
            }
        }

        if self.flags.platoon_trace {
            for platoon in ctx.platoons.iter() {
                let Some(leader_row) = ctx.fleet.row(platoon.leader()) else { continue };
                let row = PlatoonTraceRow {
                    time,
                    platoon_id: platoon.id.0,
                    leader_id: platoon.leader().0,
                    size: platoon.size() as u32,
                    desired_speed: platoon.desired_speed,
                    lane: ctx.fleet.lane[leader_row],
                    position: ctx.fleet.position[leader_row],
                };
                let result = self.writer.write_platoon_trace(&row);
                self.store_err(result);
            }
        }
    }

    fn on_lane_change(&mut self, now: f64, change: &LaneChange) {
        if !self.flags.vehicle_changes {
            return;
        }
        let row = LaneChangeRow {
            time: now,
            id: change.vehicle.0,
            from_lane: change.from,
            to_lane: change.to,
            reason: change.reason.as_str(),
        };
        let result = self.writer.write_lane_change(&row);
        self.store_err(result);
    }

    fn on_emission_sample(
        &mut self,
        now: f64,
        vehicle: pf_core::VehicleId,
        rates: &EmissionRates,
        prefilled: bool,
    ) {
        if !self.flags.emission_traces || (prefilled && !self.flags.prefilled) {
            return;
        }
        let row = EmissionsRow {
            time: now,
            id: vehicle.0,
            co2: rates.co2,
            co: rates.co,
            hc: rates.hc,
            nox: rates.nox,
            pmx: rates.pmx,
            fuel: rates.fuel,
        };
        let result = self.writer.write_emission_trace(&row);
        self.store_err(result);
    }

    fn on_collision(&mut self, _now: f64, _collision: &Collision) {}

    fn on_vehicle_arrived(&mut self, trip: &TripRecord) {
        if trip.prefilled && !self.flags.prefilled {
            return;
        }

        if self.flags.end_trace && self.flags.vehicle_traces {
            let row = VehicleTraceRow {
                time: trip.arrival_time,
                id: trip.vehicle.0,
                position: trip.arrival_position,
                lane: trip.arrival_lane,
                speed: trip.arrival_speed,
                desired_speed: trip.desired_speed,
                platoon_id: u32::MAX,
                platoon_role: "none",
                color: String::new(),
            };
            let result = self.writer.write_vehicle_trace(&row);
            self.store_err(result);
        }

        if self.flags.vehicle_trips {
            let row = TripRow {
                id: trip.vehicle.0,
                depart_time: trip.depart_time,
                arrival_time: trip.arrival_time,
                depart_pos: trip.depart_position,
                arrival_pos: trip.arrival_position,
                route_length: trip.route_length,
                time_loss: trip.time_loss,
                depart_delay: trip.depart_delay,
            };
            let result = self.writer.write_trip(&row);
            self.store_err(result);
        }

        if self.flags.vehicle_emissions {
            let e = &trip.emissions;
            let row = EmissionsRow {
                time: trip.arrival_time,
                id: trip.vehicle.0,
                co2: e.co2,
                co: e.co,
                hc: e.hc,
                nox: e.nox,
                pmx: e.pmx,
                fuel: e.fuel,
            };
            let result = self.writer.write_emissions(&row);
            self.store_err(result);
        }

        if self.flags.platoon_maneuvers {
            let m = &trip.maneuvers;
            let row = PlatoonManeuversRow {
                id: trip.vehicle.0,
                joins_attempted: m.joins_attempted,
                joins_completed: m.joins_completed,
                joins_aborted: m.joins_aborted,
                leaves: m.leaves,
            };
            let result = self.writer.write_platoon_maneuvers(&row);
            self.store_err(result);
        }
    }

    fn on_sim_end(&mut self, _summary: &RunSummary) {
        let result = self.writer.finish();
        self.store_err(result);
    }
}
