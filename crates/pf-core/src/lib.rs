//! `pf-core` — foundational types for the pf freeway platooning simulator.
//!
//! This crate is a dependency of every other `pf-*` crate.  It intentionally
//! has no `pf-*` dependencies and minimal external ones (only `rand`,
//! `rand_distr`, and `thiserror`, plus optional `serde`).
//!
//! # What lives here
//!
//! | Module    | Contents                                                  |
//! |-----------|-----------------------------------------------------------|
//! | [`ids`]   | `VehicleId`, `PlatoonId`, `VehicleTypeId`, `InfrastructureId` |
//! | [`time`]  | `Tick`, `SimClock`                                        |
//! | [`rng`]   | `SimRng` — the run's single deterministic RNG stream      |
//! | [`road`]  | `Road` — straight multi-lane freeway with ramp arithmetic |
//! | [`units`] | step-length-aware kinematic conversions                   |
//! | [`error`] | `CoreError`, `CoreResult`                                 |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                              |
//! |---------|-----------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to all public types. |

pub mod error;
pub mod ids;
pub mod rng;
pub mod road;
pub mod time;
pub mod units;

#[cfg(test)]
mod tests;

// ── Re-exports ────────────────────────────────────────────────────────────────

pub use error::{CoreError, CoreResult};
pub use ids::{InfrastructureId, PlatoonId, VehicleId, VehicleTypeId};
pub use rng::SimRng;
pub use road::Road;
pub use time::{SimClock, Tick};
