//! `pf-mobility` — the mobility models of the pf freeway platooning simulator.
//!
//! # Crate layout
//!
//! | Module          | Contents                                                    |
//! |-----------------|-------------------------------------------------------------|
//! | [`order`]       | Per-lane position ordering and predecessor lookups          |
//! | [`gap`]         | Worst-case one-step gap safety predicate                    |
//! | [`cf`]          | Krauß / ACC / CACC batch speed computation + common clamp   |
//! | [`lane_change`] | Lane-change proposals and the atomic, conflict-free commit  |
//! | [`collision`]   | Per-lane overlap detection and the minimal-separation fixup |
//! | [`emissions`]   | HBEFA-style polynomial emission model                       |
//!
//! # Design notes
//!
//! All models are **pure batch functions over a fleet snapshot**: they take
//! `&Fleet` plus the per-step context and return staged results (`Vec<f64>`
//! of new speeds, a list of lane-change proposals, a list of collisions).
//! The simulation loop owns the only mutable fleet reference and commits the
//! staged results atomically at phase end — this two-phase produce/apply
//! split is what makes runs replay bit-identically under a fixed seed.

pub mod cf;
pub mod collision;
pub mod emissions;
pub mod gap;
pub mod lane_change;
pub mod order;

#[cfg(test)]
mod tests;

// ── Re-exports ────────────────────────────────────────────────────────────────

pub use cf::{compute_new_speeds, CfContext, CfOutcome};
pub use collision::{detect_collisions, separate, Collision};
pub use emissions::{instantaneous_rates, platoon_drag_reduction, EmissionRates};
pub use gap::is_gap_safe;
pub use lane_change::{
    commit_lane_changes, is_lane_change_safe, propose_lane_changes, ChangeReason, LaneChange,
    LaneChangeProposal,
};
pub use order::{lane_order, predecessor_on_lane, successor_on_lane, LaneOrder, OPEN_ROAD};
