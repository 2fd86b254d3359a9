//! `pf-fleet` — columnar vehicle state for the pf freeway platooning simulator.
//!
//! # Crate layout
//!
//! | Module     | Contents                                                     |
//! |------------|--------------------------------------------------------------|
//! | [`vtype`]  | `VehicleType`, `EmissionClass`, `VehicleTypeRegistry`        |
//! | [`state`]  | Per-vehicle enums: `CfModel`, `PlatoonRole`, `ManeuverState` |
//! | [`store`]  | `Fleet` — SoA columns + dense id→row index                   |
//! | [`error`]  | `FleetError`, `FleetResult<T>`                               |
//!
//! # Design notes
//!
//! Vehicles are rows in parallel column `Vec`s.  Row order is arbitrary
//! (removal is swap-remove); the stable handle is the `VehicleId`, resolved
//! through an id→row index.  Models never hold row indices across phases —
//! they look rows up per step through the id.

pub mod error;
pub mod state;
pub mod store;
pub mod vtype;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use error::{FleetError, FleetResult};
pub use state::{CfModel, EmissionTotals, ManeuverState, PlatoonRole};
pub use store::{Fleet, NewVehicle};
pub use vtype::{EmissionClass, VehicleType, VehicleTypeRegistry};
