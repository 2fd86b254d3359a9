//! Per-vehicle state enums and accumulators stored as fleet columns.

/// The car-following model currently steering a vehicle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CfModel {
    /// Human (Krauß) driving with optional stochastic dawdling.
    Human,
    /// Adaptive cruise control: headway-time law, no stochastic term.
    Acc,
    /// Cooperative ACC: platoon follower tracking the leader's speed at a
    /// constant spacing.  Falls back to ACC when not following.
    Cacc,
}

/// A vehicle's role within a platoon.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PlatoonRole {
    /// Driving individually.
    None,
    /// Front-most member; drives the platoon with ACC.
    Leader,
    /// Non-leader member; drives with CACC.
    Follower,
}

impl PlatoonRole {
    /// `true` for `Leader` and `Follower`.
    #[inline]
    pub fn is_in_platoon(self) -> bool {
        !matches!(self, PlatoonRole::None)
    }
}

/// Maneuver state machine position of a vehicle.
///
/// `Joining` covers the whole approach delay; the teleport happens at the
/// transition `Joining → (follower role, Idle)`.  `Leaving` lasts exactly one
/// step and models the abstract lateral offset of a departure.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ManeuverState {
    Idle,
    Joining,
    Leaving,
    /// The vehicle is a leader whose platoon is currently being joined; it
    /// may not start a second maneuver until the join resolves.
    BeingJoined,
}

/// Cumulative per-vehicle emissions, integrated by rectangle rule each step.
///
/// Units: mg for pollutants, ml for fuel.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct EmissionTotals {
    pub co: f64,
    pub co2: f64,
    pub hc: f64,
    pub pmx: f64,
    pub nox: f64,
    pub fuel: f64,
}
