//! `pf-sim` — the step loop of the pf freeway platooning simulator.
//!
//! # Crate layout
//!
//! | Module        | Contents                                                  |
//! |---------------|-----------------------------------------------------------|
//! | [`config`]    | `SimConfig` and its pre-`t = 0` validation                |
//! | [`cancel`]    | `CancelToken` — cooperative graceful-termination flag     |
//! | [`stats`]     | `Statistics` accumulator, `TripRecord`, `RunSummary`      |
//! | [`observer`]  | `SimObserver` trait (no-op defaults) + `NoopObserver`     |
//! | [`spawner`]   | Departure methods, safety-gated insertion, pre-fill       |
//! | [`scheduler`] | Periodic dispatch into the formation algorithm            |
//! | [`sim`]       | `Simulator` — the phase-ordered step loop                 |
//! | [`builder`]   | Fluent `SimBuilder`                                       |
//! | [`error`]     | `SimError` with process exit-code mapping                 |
//!
//! # The step
//!
//! Phases run in a fixed order and never observe each other's partial state:
//!
//! 1. spawn  2. actions (maneuvers, formation, periodic traces)
//! 3. lane change  4. car-following  5. position update
//! 6. collision check  7. completion  8. time advance
//!
//! Lane-change and car-following results are staged against the phase
//! snapshot and committed atomically at phase end; together with the single
//! seeded RNG stream this makes runs with equal (seed, config, code version)
//! byte-identical.

pub mod builder;
pub mod cancel;
pub mod config;
pub mod error;
pub mod observer;
pub mod scheduler;
pub mod sim;
pub mod spawner;
pub mod stats;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use builder::SimBuilder;
pub use cancel::CancelToken;
pub use config::{
    CentralizedVariant, CollisionPolicy, DepartMethod, FormationStrategy, RecordFlags, SimConfig,
};
pub use error::{SimError, SimResult};
pub use observer::{NoopObserver, SimObserver, TraceCtx};
pub use scheduler::{FormationScheduler, Infrastructure};
pub use sim::Simulator;
pub use stats::{RunSummary, Statistics, TripRecord};
