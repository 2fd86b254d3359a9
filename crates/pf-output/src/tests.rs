//! Integration tests for pf-output.

#[cfg(test)]
mod csv_tests {
    use tempfile::TempDir;

    use pf_sim::RecordFlags;

    use crate::csv::CsvTraceWriter;
    use crate::row::{PlatoonTraceRow, TripRow, VehicleTraceRow};
    use crate::writer::TraceWriter;

    fn tmp() -> TempDir {
        tempfile::tempdir().expect("create temp dir")
    }

    fn all_flags() -> RecordFlags {
        RecordFlags {
            vehicle_trips: true,
            vehicle_emissions: true,
            vehicle_traces: true,
            vehicle_changes: true,
            emission_traces: true,
            end_trace: true,
            prefilled: true,
            platoon_trace: true,
            platoon_maneuvers: true,
        }
    }

    fn trip_row(id: u32) -> TripRow {
        TripRow {
            id,
            depart_time: 0.0,
            arrival_time: 139.0,
            depart_pos: 4.0,
            arrival_pos: 5_000.0,
            route_length: 4_996.0,
            time_loss: 2.5,
            depart_delay: 0.0,
        }
    }

    #[test]
    fn enabled_files_created_with_base_prefix() {
        let dir = tmp();
        let base = dir.path().join("results");
        let _w = CsvTraceWriter::new(&base, &all_flags()).unwrap();
        for name in [
            "results_vehicle_trips.csv",
            "results_vehicle_traces.csv",
            "results_vehicle_changes.csv",
            "results_vehicle_emissions.csv",
            "results_emission_traces.csv",
            "results_platoon_trace.csv",
            "results_platoon_maneuvers.csv",
        ] {
            assert!(dir.path().join(name).exists(), "{name} missing");
        }
    }

    #[test]
    fn disabled_files_not_created() {
        let dir = tmp();
        let base = dir.path().join("results");
        let flags = RecordFlags {
            vehicle_traces: false,
            platoon_trace: false,
            ..all_flags()
        };
        let _w = CsvTraceWriter::new(&base, &flags).unwrap();
        assert!(!dir.path().join("results_vehicle_traces.csv").exists());
        assert!(!dir.path().join("results_platoon_trace.csv").exists());
        assert!(dir.path().join("results_vehicle_trips.csv").exists());
    }

    #[test]
    fn trip_headers_match_schema() {
        let dir = tmp();
        let base = dir.path().join("results");
        let mut w = CsvTraceWriter::new(&base, &all_flags()).unwrap();
        w.finish().unwrap();

        let mut rdr =
            csv::Reader::from_path(dir.path().join("results_vehicle_trips.csv")).unwrap();
        let headers: Vec<_> = rdr.headers().unwrap().iter().map(str::to_owned).collect();
        assert_eq!(
            headers,
            [
                "id",
                "depart_time",
                "arrival_time",
                "depart_pos",
                "arrival_pos",
                "route_length",
                "time_loss",
                "depart_delay"
            ]
        );
    }

    #[test]
    fn trip_row_round_trip() {
        let dir = tmp();
        let base = dir.path().join("results");
        let mut w = CsvTraceWriter::new(&base, &all_flags()).unwrap();
        w.write_trip(&trip_row(7)).unwrap();
        w.finish().unwrap();

        let mut rdr =
            csv::Reader::from_path(dir.path().join("results_vehicle_trips.csv")).unwrap();
        let rows: Vec<_> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][0], "7");
        assert_eq!(&rows[0][4], "5000.00"); // arrival_pos
        assert_eq!(&rows[0][6], "2.50"); // time_loss
    }

    #[test]
    fn vehicle_trace_empty_platoon_field() {
        let dir = tmp();
        let base = dir.path().join("results");
        let mut w = CsvTraceWriter::new(&base, &all_flags()).unwrap();
        w.write_vehicle_trace(&VehicleTraceRow {
            time: 3.0,
            id: 1,
            position: 120.5,
            lane: 2,
            speed: 33.0,
            desired_speed: 36.0,
            platoon_id: u32::MAX,
            platoon_role: "none",
            color: "#FF0080".into(),
        })
        .unwrap();
        w.finish().unwrap();

        let mut rdr =
            csv::Reader::from_path(dir.path().join("results_vehicle_traces.csv")).unwrap();
        let rows: Vec<_> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(&rows[0][6], "", "no platoon renders as an empty field");
        assert_eq!(&rows[0][7], "none");
        assert_eq!(&rows[0][8], "#FF0080");
    }

    #[test]
    fn platoon_trace_row_written() {
        let dir = tmp();
        let base = dir.path().join("results");
        let mut w = CsvTraceWriter::new(&base, &all_flags()).unwrap();
        w.write_platoon_trace(&PlatoonTraceRow {
            time: 60.0,
            platoon_id: 3,
            leader_id: 12,
            size: 4,
            desired_speed: 31.5,
            lane: 0,
            position: 2_240.0,
        })
        .unwrap();
        w.finish().unwrap();

        let mut rdr =
            csv::Reader::from_path(dir.path().join("results_platoon_trace.csv")).unwrap();
        let rows: Vec<_> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(&rows[0][1], "3");
        assert_eq!(&rows[0][2], "12");
        assert_eq!(&rows[0][3], "4");
    }

    #[test]
    fn finish_idempotent() {
        let dir = tmp();
        let base = dir.path().join("results");
        let mut w = CsvTraceWriter::new(&base, &all_flags()).unwrap();
        w.finish().unwrap();
        w.finish().unwrap();
    }
}

// ── End-to-end with the simulator ─────────────────────────────────────────────

#[cfg(test)]
mod integration {
    use tempfile::TempDir;

    use pf_sim::{RecordFlags, SimBuilder, SimConfig};

    use crate::csv::CsvTraceWriter;
    use crate::observer::TraceObserver;

    fn tmp() -> TempDir {
        tempfile::tempdir().expect("create temp dir")
    }

    fn short_run_config() -> SimConfig {
        SimConfig {
            vehicles: 2,
            desired_speed: 20.0,
            min_desired_speed: 20.0,
            random_desired_speed: false,
            depart_desired: true,
            road_length: 200.0,
            ramp_interval: 100.0,
            time_limit: 60.0,
            record: RecordFlags {
                vehicle_traces: true,
                vehicle_changes: true,
                platoon_trace: true,
                ..RecordFlags::default()
            },
            ..SimConfig::default()
        }
    }

    #[test]
    fn full_run_writes_trip_and_trace_rows() {
        let dir = tmp();
        let base = dir.path().join("results");
        let config = short_run_config();

        let writer = CsvTraceWriter::new(&base, &config.record).unwrap();
        let mut obs = TraceObserver::new(writer, config.record.clone());
        let mut sim = SimBuilder::new(config).build().unwrap();
        let summary = sim.run(&mut obs).unwrap();
        assert!(obs.take_error().is_none(), "no write errors expected");
        assert_eq!(summary.stats.arrived, 2);

        let mut trips =
            csv::Reader::from_path(dir.path().join("results_vehicle_trips.csv")).unwrap();
        assert_eq!(trips.records().count(), 2);

        let mut traces =
            csv::Reader::from_path(dir.path().join("results_vehicle_traces.csv")).unwrap();
        assert!(traces.records().count() > 2, "per-step rows plus end traces");

        let mut emissions =
            csv::Reader::from_path(dir.path().join("results_vehicle_emissions.csv")).unwrap();
        assert_eq!(emissions.records().count(), 2);
    }

    #[test]
    fn same_seed_byte_identical_files() {
        let run = |dir: &TempDir| -> Vec<u8> {
            let base = dir.path().join("results");
            let config = short_run_config();
            let writer = CsvTraceWriter::new(&base, &config.record).unwrap();
            let mut obs = TraceObserver::new(writer, config.record.clone());
            let mut sim = SimBuilder::new(config).build().unwrap();
            sim.run(&mut obs).unwrap();
            assert!(obs.take_error().is_none());
            std::fs::read(dir.path().join("results_vehicle_traces.csv")).unwrap()
        };

        let (dir_a, dir_b) = (tmp(), tmp());
        assert_eq!(run(&dir_a), run(&dir_b), "determinism: identical trace bytes");
    }
}
