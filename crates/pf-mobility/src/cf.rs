//! Car-following models: Krauß (human), ACC, and CACC.
//!
//! # Contract
//!
//! [`compute_new_speeds`] is a batch function over the fleet snapshot: it
//! reads positions, speeds, and predecessor data as they were at phase start
//! and returns one staged speed per row.  The only exception is deliberate —
//! a CACC follower tracks the speed its platoon leader was assigned *in this
//! phase*, which realizes the delay-free follower update the platoon
//! abstraction promises.  Leaders sit in front of their followers on the same
//! lane, so processing each lane front-to-back makes the leader's staged
//! value available by the time the follower needs it.
//!
//! The stochastic dawdle term of the human model is the only randomness in
//! the whole mobility phase; draws happen in lane-then-front-to-back order so
//! a fixed seed replays exactly.

use pf_core::{Road, SimRng};
use pf_fleet::{CfModel, Fleet, PlatoonRole, VehicleTypeRegistry};

use crate::order::{LaneOrder, OPEN_ROAD};

/// Everything the cf models need besides the fleet snapshot.
pub struct CfContext<'a> {
    pub types: &'a VehicleTypeRegistry,
    pub road: &'a Road,
    /// Step length in seconds.
    pub step_length: f64,
    /// Headway time enforced by ACC, in seconds.
    pub acc_headway_time: f64,
    /// Gap-error weight of the ACC law (Rajamani eq. 6.18).
    pub acc_lambda: f64,
    /// Constant spacing maintained by CACC followers, in metres.
    pub cacc_spacing: f64,
    /// Dawdle magnitude σ in m/s; 0 disables the stochastic term.
    pub speed_imperfection: f64,
}

/// Staged result of one car-following phase.
pub struct CfOutcome {
    /// New speed per row, to be committed atomically.
    pub new_speed: Vec<f64>,
    /// Whether a slower predecessor capped the row's speed this phase.
    pub blocked: Vec<bool>,
}

/// Compute the staged speed for every vehicle.
pub fn compute_new_speeds(
    fleet: &Fleet,
    order: &LaneOrder,
    ctx: &CfContext<'_>,
    rng: &mut SimRng,
) -> CfOutcome {
    let mut new_speed = vec![f64::NAN; fleet.len()];
    let mut blocked = vec![false; fleet.len()];

    for (lane, rows) in order.lanes.iter().enumerate() {
        for (i, &row) in rows.iter().enumerate() {
            let (pred_speed, pred_rear) = order.predecessor_of(fleet, ctx.types, lane, i);
            let (speed, was_blocked) = match fleet.cf_model[row] {
                CfModel::Human => human_speed(fleet, row, pred_speed, pred_rear, ctx, rng),
                CfModel::Acc => acc_speed(fleet, row, pred_speed, pred_rear, ctx),
                CfModel::Cacc => {
                    if fleet.platoon_role[row] == PlatoonRole::Follower {
                        cacc_speed(fleet, row, pred_rear, &new_speed, ctx)
                    } else {
                        // Not following anyone: CACC degrades to ACC.
                        acc_speed(fleet, row, pred_speed, pred_rear, ctx)
                    }
                }
            };
            new_speed[row] = clamp_speed(fleet, row, speed, ctx);
            blocked[row] = was_blocked;
        }
    }

    debug_assert!(new_speed.iter().all(|v| v.is_finite()));
    CfOutcome { new_speed, blocked }
}

// ── Krauß (human) ─────────────────────────────────────────────────────────────

/// Krauß safe speed: `v_safe = v_pred + (g − g_des) / (τ + τ_b)` with the
/// braking time `τ_b = (v_pred + v) / (2b)`.
fn krauss_safe_speed(
    pred_speed: f64,
    speed: f64,
    gap: f64,
    desired_gap: f64,
    headway_time: f64,
    max_deceleration: f64,
) -> f64 {
    let tau_b = (pred_speed + speed) / (2.0 * max_deceleration);
    pred_speed + (gap - desired_gap) / (headway_time + tau_b)
}

fn human_speed(
    fleet: &Fleet,
    row: usize,
    pred_speed: f64,
    pred_rear: f64,
    ctx: &CfContext<'_>,
    rng: &mut SimRng,
) -> (f64, bool) {
    let vt = ctx.types.get(fleet.vtype[row]);
    let dt = ctx.step_length;
    let v = fleet.speed[row];
    let desired = fleet.cf_target_speed[row];
    let tau = vt.headway_time;

    // Free driving target, bounded by what the vehicle can physically do.
    let mut target = if v < desired {
        (v + vt.max_acceleration * dt).min(desired)
    } else {
        (v - vt.max_deceleration * dt).max(desired)
    };

    let mut is_blocked = false;
    if pred_rear < OPEN_ROAD {
        let gap = pred_rear - fleet.position[row];
        let desired_gap = vt.min_gap.max(tau * v);
        let v_safe =
            krauss_safe_speed(pred_speed, v, gap, desired_gap, tau, vt.max_deceleration);
        if v_safe < target {
            is_blocked = true;
            target = v_safe.max(v - vt.max_deceleration * dt);
        }
    }

    // Dawdling: subtract η·σ, η ∈ [0, 1).  σ = 0 skips the draw entirely so
    // disabling the term does not shift the RNG stream.
    if ctx.speed_imperfection > 0.0 {
        target -= rng.gen_unit() * ctx.speed_imperfection;
    }

    (target, is_blocked)
}

// ── ACC ───────────────────────────────────────────────────────────────────────

/// ACC control law (Rajamani eq. 6.18): acceleration toward the
/// predecessor's speed with a spring term on the headway-gap error.
fn acc_acceleration(
    speed: f64,
    pred_speed: f64,
    gap: f64,
    desired_gap: f64,
    headway_time: f64,
    lambda: f64,
) -> f64 {
    (pred_speed - speed - lambda * (desired_gap - gap)) / headway_time
}

fn acc_speed(
    fleet: &Fleet,
    row: usize,
    pred_speed: f64,
    pred_rear: f64,
    ctx: &CfContext<'_>,
) -> (f64, bool) {
    let vt = ctx.types.get(fleet.vtype[row]);
    let dt = ctx.step_length;
    let v = fleet.speed[row];
    let desired = fleet.cf_target_speed[row];

    if pred_rear >= OPEN_ROAD {
        // Open road: steer to the desired speed (clamp bounds the ramp-up).
        return (desired, false);
    }

    let gap = pred_rear - fleet.position[row];
    let desired_gap = vt.min_gap.max(ctx.acc_headway_time * v);
    let u = acc_acceleration(v, pred_speed, gap, desired_gap, ctx.acc_headway_time, ctx.acc_lambda)
        .clamp(-vt.max_deceleration, vt.max_acceleration);

    let target = (v + u * dt).min(desired);
    let is_blocked = target < desired && u <= 0.0;
    (target, is_blocked)
}

// ── CACC ──────────────────────────────────────────────────────────────────────

fn cacc_speed(
    fleet: &Fleet,
    row: usize,
    pred_rear: f64,
    staged: &[f64],
    ctx: &CfContext<'_>,
) -> (f64, bool) {
    let vt = ctx.types.get(fleet.vtype[row]);
    let dt = ctx.step_length;
    let v = fleet.speed[row];

    // The leader drives in front on the same lane, so its staged speed is
    // already in place; fall back to the snapshot speed if the ordering was
    // disturbed (e.g. mid-maneuver).
    let leader_speed = fleet
        .row(fleet.platoon_leader[row])
        .map(|lr| {
            let s = staged[lr];
            if s.is_finite() {
                s
            } else {
                fleet.speed[lr]
            }
        })
        .unwrap_or(v);

    if pred_rear >= OPEN_ROAD {
        return (leader_speed, false);
    }

    // Same control law as ACC, steered at the leader's speed with the fixed
    // spacing as the gap setpoint.
    let gap = pred_rear - fleet.position[row];
    let u = acc_acceleration(v, leader_speed, gap, ctx.cacc_spacing, ctx.acc_headway_time, ctx.acc_lambda)
        .clamp(-vt.max_deceleration, vt.max_acceleration);
    (v + u * dt, false)
}

// ── Common clamp ──────────────────────────────────────────────────────────────

/// Two-way limit: what the vehicle can physically reach this step, capped by
/// its type's maximum and the road's speed limit, and never backwards.
fn clamp_speed(fleet: &Fleet, row: usize, target: f64, ctx: &CfContext<'_>) -> f64 {
    let vt = ctx.types.get(fleet.vtype[row]);
    let dt = ctx.step_length;
    let v = fleet.speed[row];

    let upper = target
        .min(vt.max_speed)
        .min(ctx.road.max_speed)
        .min(v + vt.max_acceleration * dt);
    upper.max(v - vt.max_deceleration * dt).max(0.0)
}
