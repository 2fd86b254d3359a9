//! `pf-output` — result recording for the pf freeway platooning simulator.
//!
//! # Crate layout
//!
//! | Module       | Contents                                                  |
//! |--------------|-----------------------------------------------------------|
//! | [`row`]      | Plain row types, one per trace file                       |
//! | [`writer`]   | The `TraceWriter` trait implemented by backends           |
//! | [`csv`]      | CSV backend (`<base>_vehicle_trips.csv`, …)               |
//! | [`observer`] | `TraceObserver` — bridges `pf_sim::SimObserver` to a      |
//! |              | `TraceWriter`, honouring the per-file record flags        |
//! | [`error`]    | `OutputError`, `OutputResult<T>`                          |
//!
//! # Usage
//!
//! ```rust,ignore
//! let writer = CsvTraceWriter::new(Path::new("results"), &config.record)?;
//! let mut obs = TraceObserver::new(writer, config.record.clone());
//! sim.run(&mut obs)?;
//! obs.take_error().map(|e| eprintln!("output error: {e}"));
//! ```
//!
//! Statistics are computed by the core; this crate only renders them.  Write
//! errors are stored internally (observer hooks return nothing) and fetched
//! with [`TraceObserver::take_error`] after the run.

pub mod csv;
pub mod error;
pub mod observer;
pub mod row;
pub mod writer;

#[cfg(test)]
mod tests;

// ── Re-exports ────────────────────────────────────────────────────────────────

pub use crate::csv::CsvTraceWriter;
pub use error::{OutputError, OutputResult};
pub use observer::TraceObserver;
pub use row::{
    EmissionsRow, LaneChangeRow, PlatoonManeuversRow, PlatoonTraceRow, TripRow, VehicleTraceRow,
};
pub use writer::TraceWriter;
