//! Error types for pf-fleet.

use pf_core::VehicleId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FleetError {
    #[error("vehicle {0} is not in the fleet")]
    UnknownVehicle(VehicleId),
}

pub type FleetResult<T> = Result<T, FleetError>;
