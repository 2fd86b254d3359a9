//! `pf-platoon` — platoon lifecycle for the pf freeway platooning simulator.
//!
//! # Crate layout
//!
//! | Module       | Contents                                                 |
//! |--------------|----------------------------------------------------------|
//! | [`platoon`]  | The `Platoon` value type (ordered member list)           |
//! | [`registry`] | `PlatoonRegistry` — id allocation, membership mutations  |
//! | [`maneuver`] | `ManeuverCoordinator` — join/leave state machines with a |
//! |              | due-step queue and the bounded-teleport commit           |
//! | [`error`]    | `PlatoonError`, `PlatoonResult<T>`                       |
//!
//! # Design notes
//!
//! Platoons are the **source of truth** for membership: the registry holds
//! the ordered member list and fleet rows carry only the platoon id (a weak
//! relation resolved by lookup, so there are no ownership cycles).  Every
//! membership mutation goes through the registry, which rewrites the
//! affected fleet columns (role, platoon id/index/leader, cf model, cf
//! target speed) in one place.

pub mod error;
pub mod maneuver;
pub mod platoon;
pub mod registry;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use error::{PlatoonError, PlatoonResult};
pub use maneuver::{
    JoinAbortReason, JoinReject, ManeuverConfig, ManeuverCoordinator, ManeuverEvent,
};
pub use platoon::Platoon;
pub use registry::{LeaveKind, PlatoonRegistry};
