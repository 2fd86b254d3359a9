//! The `Platoon` value type.

use pf_core::{PlatoonId, VehicleId};

/// An ordered group of CACC-capable vehicles on one lane.
///
/// `members[0]` is the leader and, by invariant, the front-most member;
/// member order equals position order (descending) on the shared lane.
#[derive(Clone, Debug)]
pub struct Platoon {
    pub id: PlatoonId,
    /// Member ids, leader first.
    pub members: Vec<VehicleId>,
    /// Common target speed of the platoon.
    pub desired_speed: f64,
    /// Simulated seconds at which the platoon was formed.
    pub formed_at: f64,
    /// Successful joins over the platoon's lifetime.
    pub joins: u32,
    /// Successful leaves over the platoon's lifetime.
    pub leaves: u32,
}

impl Platoon {
    pub fn new(id: PlatoonId, leader: VehicleId, desired_speed: f64, formed_at: f64) -> Self {
        Self {
            id,
            members: vec![leader],
            desired_speed,
            formed_at,
            joins: 0,
            leaves: 0,
        }
    }

    #[inline]
    pub fn leader(&self) -> VehicleId {
        self.members[0]
    }

    #[inline]
    pub fn tail(&self) -> VehicleId {
        *self.members.last().expect("platoon is never empty")
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.members.len()
    }

    /// Index of `vehicle` within the platoon, if it is a member.
    pub fn member_index(&self, vehicle: VehicleId) -> Option<usize> {
        self.members.iter().position(|&m| m == vehicle)
    }

    /// The member directly in front of `vehicle` (`None` for the leader).
    pub fn front_of(&self, vehicle: VehicleId) -> Option<VehicleId> {
        match self.member_index(vehicle)? {
            0 => None,
            i => Some(self.members[i - 1]),
        }
    }
}
