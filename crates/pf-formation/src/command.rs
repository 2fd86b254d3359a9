//! Formation commands — the write-only buffer algorithms hand back.

use pf_core::{PlatoonId, VehicleId};

/// What a join request points at.
///
/// Joining a lone vehicle implies creating a platoon around it first; the
/// simulation loop performs that creation when it applies the command.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum JoinTarget {
    Platoon(PlatoonId),
    Vehicle(VehicleId),
}

/// An action requested by a formation algorithm.
///
/// Commands are applied by the maneuver component at the next action
/// boundary, in ascending `vehicle` id order; a command that no longer
/// applies (the vehicle joined something else meanwhile, the target
/// disappeared) is skipped and counted, never an error.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FormationCommand {
    Join {
        vehicle: VehicleId,
        target: JoinTarget,
    },
    Leave {
        vehicle: VehicleId,
    },
}

impl FormationCommand {
    /// The id ordering key used when applying a command batch.
    pub fn vehicle(&self) -> VehicleId {
        match self {
            FormationCommand::Join { vehicle, .. } | FormationCommand::Leave { vehicle } => *vehicle,
        }
    }
}
