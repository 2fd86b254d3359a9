//! The road network — one straight, multi-lane freeway.
//!
//! Geometry is deliberately one-dimensional: a position in metres along the
//! road and a lane index (0 = rightmost).  On-/off-ramps are the discrete
//! positions spaced every `ramp_interval` metres where vehicles may legally
//! enter or leave when random depart/arrival positions are disabled.

use crate::{CoreError, CoreResult};

/// Fixed attributes of the freeway.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Road {
    /// Length of the road in metres.
    pub length: f64,
    /// Number of lanes (0 = rightmost).
    pub lanes: u8,
    /// Distance between two consecutive ramps in metres.
    pub ramp_interval: f64,
    /// Speed limit in m/s, applied on top of per-type maximum speeds.
    pub max_speed: f64,
}

impl Road {
    /// Validate and construct a road.
    pub fn new(length: f64, lanes: u8, ramp_interval: f64, max_speed: f64) -> CoreResult<Self> {
        if !(length > 0.0) {
            return Err(CoreError::Config(format!("road length must be > 0 (got {length})")));
        }
        if lanes < 1 {
            return Err(CoreError::Config("at least 1 lane is required".into()));
        }
        if !(ramp_interval > 0.0) {
            return Err(CoreError::Config(format!(
                "ramp interval must be > 0 (got {ramp_interval})"
            )));
        }
        if !(max_speed > 0.0) {
            return Err(CoreError::Config(format!("road max speed must be > 0 (got {max_speed})")));
        }
        Ok(Self { length, lanes, ramp_interval, max_speed })
    }

    /// Index of the leftmost lane.
    #[inline]
    pub fn leftmost_lane(&self) -> u8 {
        self.lanes - 1
    }

    /// First ramp position at or after `pos`, clamped to the road end.
    pub fn ramp_at_or_after(&self, pos: f64) -> f64 {
        if pos <= 0.0 {
            return 0.0;
        }
        let k = (pos / self.ramp_interval).ceil();
        (k * self.ramp_interval).min(self.length)
    }

    /// Number of ramps on the road, including position 0 and excluding the
    /// road end when it does not fall on the ramp grid.
    pub fn ramp_count(&self) -> usize {
        (self.length / self.ramp_interval).floor() as usize + 1
    }

    /// Position of ramp `i` (0-based), clamped to the road end.
    #[inline]
    pub fn ramp_position(&self, i: usize) -> f64 {
        (i as f64 * self.ramp_interval).min(self.length)
    }

    /// `true` if `pos` lies on the road.
    #[inline]
    pub fn contains(&self, pos: f64) -> bool {
        (0.0..=self.length).contains(&pos)
    }
}
