//! Step-length-aware kinematic conversions.
//!
//! The simulator uses a non-ballistic (Euler) position update, so these
//! helpers are exact w.r.t. the model: a speed held for one step covers
//! `speed * step_length` metres.

/// Distance covered at `speed` over `step_length` seconds.
#[inline]
pub fn speed_to_distance(speed: f64, step_length: f64) -> f64 {
    speed * step_length
}

/// Speed needed to cover `distance` within `interval` seconds.
#[inline]
pub fn distance_to_speed(distance: f64, interval: f64) -> f64 {
    distance / interval
}

/// Speed delta produced by `acceleration` held over `step_length` seconds.
#[inline]
pub fn acceleration_to_speed(acceleration: f64, step_length: f64) -> f64 {
    acceleration * step_length
}

/// Acceleration that moved `speed_from` to `speed_to` within `interval` seconds.
#[inline]
pub fn speed_to_acceleration(speed_from: f64, speed_to: f64, interval: f64) -> f64 {
    (speed_to - speed_from) / interval
}
