//! Gap safety check used by the spawner and the join-maneuver teleport.

/// Return whether the gap between a front and a back vehicle is safe.
///
/// Safe means: even if the front vehicle decelerates as hard as it can for
/// one step while the back vehicle accelerates as hard as it can, they do
/// not collide.  Assumes the Euler (non-ballistic) position update.
#[allow(clippy::too_many_arguments)]
pub fn is_gap_safe(
    front_position: f64,
    front_speed: f64,
    front_max_deceleration: f64,
    front_length: f64,
    back_position: f64,
    back_speed: f64,
    back_max_acceleration: f64,
    step_length: f64,
) -> bool {
    let next_front_rear = front_position - front_length
        + (front_speed - front_max_deceleration * step_length).max(0.0) * step_length;
    let next_back =
        back_position + (back_speed + back_max_acceleration * step_length) * step_length;
    next_front_rear > next_back
}
