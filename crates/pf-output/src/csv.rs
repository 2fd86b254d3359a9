//! CSV output backend.
//!
//! Creates one `<base>_<name>.csv` per enabled record flag, UTF-8,
//! comma-separated, with a header row.  Floats are rendered with fixed
//! precision so equal runs yield byte-identical files.

use std::fs::File;
use std::path::Path;

use csv::Writer;
use pf_sim::RecordFlags;

use crate::row::{
    EmissionsRow, LaneChangeRow, PlatoonManeuversRow, PlatoonTraceRow, TripRow, VehicleTraceRow,
};
use crate::writer::TraceWriter;
use crate::OutputResult;

/// Writes the enabled trace files next to `base` (a path prefix, not a
/// directory).
pub struct CsvTraceWriter {
    trips: Option<Writer<File>>,
    vehicle_traces: Option<Writer<File>>,
    lane_changes: Option<Writer<File>>,
    emissions: Option<Writer<File>>,
    emission_traces: Option<Writer<File>>,
    platoon_trace: Option<Writer<File>>,
    platoon_maneuvers: Option<Writer<File>>,
    finished: bool,
}

fn open(base: &Path, name: &str, header: &[&str]) -> OutputResult<Writer<File>> {
    let mut path = base.as_os_str().to_owned();
    path.push(format!("_{name}.csv"));
    let mut writer = Writer::from_path(Path::new(&path))?;
    writer.write_record(header)?;
    Ok(writer)
}

/// Empty field for "not in a platoon".
fn platoon_field(id: u32) -> String {
    if id == u32::MAX {
        String::new()
    } else {
        id.to_string()
    }
}

impl CsvTraceWriter {
    /// Open the files selected by `flags` and write their header rows.
    pub fn new(base: &Path, flags: &RecordFlags) -> OutputResult<Self> {
        let trips = if flags.vehicle_trips {
            Some(open(
                base,
                "vehicle_trips",
                &[
                    "id",
                    "depart_time",
                    "arrival_time",
                    "depart_pos",
                    "arrival_pos",
                    "route_length",
                    "time_loss",
                    "depart_delay",
                ],
            )?)
        } else {
            None
        };
        let vehicle_traces = if flags.vehicle_traces {
            Some(open(
                base,
                "vehicle_traces",
                &[
                    "time",
                    "id",
                    "position",
                    "lane",
                    "speed",
                    "desired_speed",
                    "platoon_id",
                    "platoon_role",
                    "color",
                ],
            )?)
        } else {
            None
        };
        let lane_changes = if flags.vehicle_changes {
            Some(open(
                base,
                "vehicle_changes",
                &["time", "id", "from_lane", "to_lane", "reason"],
            )?)
        } else {
            None
        };
        let emissions = if flags.vehicle_emissions {
            Some(open(
                base,
                "vehicle_emissions",
                &["time", "id", "co2", "co", "hc", "nox", "pmx", "fuel"],
            )?)
        } else {
            None
        };
        let emission_traces = if flags.emission_traces {
            Some(open(
                base,
                "emission_traces",
                &["time", "id", "co2", "co", "hc", "nox", "pmx", "fuel"],
            )?)
        } else {
            None
        };
        let platoon_trace = if flags.platoon_trace {
            Some(open(
                base,
                "platoon_trace",
                &[
                    "time",
                    "platoon_id",
                    "leader_id",
                    "size",
                    "desired_speed",
                    "lane",
                    "position",
                ],
            )?)
        } else {
            None
        };
        let platoon_maneuvers = if flags.platoon_maneuvers {
            Some(open(
                base,
                "platoon_maneuvers",
                &["id", "joins_attempted", "joins_completed", "joins_aborted", "leaves"],
            )?)
        } else {
            None
        };

        Ok(Self {
            trips,
            vehicle_traces,
            lane_changes,
            emissions,
            emission_traces,
            platoon_trace,
            platoon_maneuvers,
            finished: false,
        })
    }
}

fn write_emissions_record(
    writer: &mut Option<Writer<File>>,
    row: &EmissionsRow,
) -> OutputResult<()> {
    let Some(w) = writer else { return Ok(()) };
    w.write_record(&[
        format!("{:.1}", row.time),
        row.id.to_string(),
        format!("{:.3}", row.co2),
        format!("{:.3}", row.co),
        format!("{:.3}", row.hc),
        format!("{:.3}", row.nox),
        format!("{:.3}", row.pmx),
        format!("{:.3}", row.fuel),
    ])?;
    Ok(())
}

impl TraceWriter for CsvTraceWriter {
    fn write_trip(&mut self, row: &TripRow) -> OutputResult<()> {
        let Some(w) = &mut self.trips else { return Ok(()) };
        w.write_record(&[
            row.id.to_string(),
            format!("{:.1}", row.depart_time),
            format!("{:.1}", row.arrival_time),
            format!("{:.2}", row.depart_pos),
            format!("{:.2}", row.arrival_pos),
            format!("{:.2}", row.route_length),
            format!("{:.2}", row.time_loss),
            format!("{:.1}", row.depart_delay),
        ])?;
        Ok(())
    }

    fn write_vehicle_trace(&mut self, row: &VehicleTraceRow) -> OutputResult<()> {
        let Some(w) = &mut self.vehicle_traces else { return Ok(()) };
        w.write_record(&[
            format!("{:.1}", row.time),
            row.id.to_string(),
            format!("{:.2}", row.position),
            row.lane.to_string(),
            format!("{:.2}", row.speed),
            format!("{:.2}", row.desired_speed),
            platoon_field(row.platoon_id),
            row.platoon_role.to_string(),
            row.color.clone(),
        ])?;
        Ok(())
    }

    fn write_lane_change(&mut self, row: &LaneChangeRow) -> OutputResult<()> {
        let Some(w) = &mut self.lane_changes else { return Ok(()) };
        w.write_record(&[
            format!("{:.1}", row.time),
            row.id.to_string(),
            row.from_lane.to_string(),
            row.to_lane.to_string(),
            row.reason.to_string(),
        ])?;
        Ok(())
    }

    fn write_emissions(&mut self, row: &EmissionsRow) -> OutputResult<()> {
        write_emissions_record(&mut self.emissions, row)
    }

    fn write_emission_trace(&mut self, row: &EmissionsRow) -> OutputResult<()> {
        write_emissions_record(&mut self.emission_traces, row)
    }

    fn write_platoon_trace(&mut self, row: &PlatoonTraceRow) -> OutputResult<()> {
        let Some(w) = &mut self.platoon_trace else { return Ok(()) };
        w.write_record(&[
            format!("{:.1}", row.time),
            row.platoon_id.to_string(),
            row.leader_id.to_string(),
            row.size.to_string(),
            format!("{:.2}", row.desired_speed),
            row.lane.to_string(),
            format!("{:.2}", row.position),
        ])?;
        Ok(())
    }

    fn write_platoon_maneuvers(&mut self, row: &PlatoonManeuversRow) -> OutputResult<()> {
        let Some(w) = &mut self.platoon_maneuvers else { return Ok(()) };
        w.write_record(&[
            row.id.to_string(),
            row.joins_attempted.to_string(),
            row.joins_completed.to_string(),
            row.joins_aborted.to_string(),
            row.leaves.to_string(),
        ])?;
        Ok(())
    }

    fn finish(&mut self) -> OutputResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        for writer in [
            &mut self.trips,
            &mut self.vehicle_traces,
            &mut self.lane_changes,
            &mut self.emissions,
            &mut self.emission_traces,
            &mut self.platoon_trace,
            &mut self.platoon_maneuvers,
        ]
        .into_iter()
        .flatten()
        {
            writer.flush()?;
        }
        Ok(())
    }
}
