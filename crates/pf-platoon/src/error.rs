//! Error types for pf-platoon.

use pf_core::{PlatoonId, VehicleId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlatoonError {
    #[error("vehicle {0} is not in the fleet")]
    UnknownVehicle(VehicleId),

    #[error("platoon {0} does not exist")]
    UnknownPlatoon(PlatoonId),

    #[error("vehicle {0} is already in a platoon")]
    AlreadyInPlatoon(VehicleId),

    #[error("vehicle {0} is not a member of platoon {1}")]
    NotAMember(VehicleId, PlatoonId),

    #[error(transparent)]
    Fleet(#[from] pf_fleet::FleetError),
}

pub type PlatoonResult<T> = Result<T, PlatoonError>;
