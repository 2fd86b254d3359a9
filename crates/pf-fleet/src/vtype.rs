//! Vehicle types — immutable kinematic parameter sets.

use pf_core::VehicleTypeId;

/// HBEFA-style emission class of a vehicle type.
///
/// Only the gasoline Euro-4 passenger car is currently modeled (the
/// reference class of the validation simulator); the enum exists so traces
/// stay schema-stable when more classes are added.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EmissionClass {
    /// Gasoline passenger car, Euro norm 4 (HBEFA3 PC_G_EU4).
    PcGEu4,
}

impl EmissionClass {
    /// `true` for diesel-fueled classes (changes the fuel scale factor).
    #[inline]
    pub fn is_diesel(self) -> bool {
        match self {
            EmissionClass::PcGEu4 => false,
        }
    }
}

/// A collection of immutable parameters describing one kind of vehicle.
#[derive(Clone, Debug)]
pub struct VehicleType {
    /// Human-readable name, e.g. `"car"`.
    pub name: String,
    /// Length in metres.
    pub length: f64,
    /// Maximum speed in m/s.
    pub max_speed: f64,
    /// Maximum acceleration in m/s².
    pub max_acceleration: f64,
    /// Maximum deceleration in m/s² (positive number).
    pub max_deceleration: f64,
    /// Minimum standstill gap to the vehicle in front, in metres.
    pub min_gap: f64,
    /// Desired headway time for human (Krauß) driving, in seconds.
    pub headway_time: f64,
    /// Emission class used by the emission model.
    pub emission_class: EmissionClass,
}

impl VehicleType {
    /// The reference passenger car used when no type is configured.
    pub fn passenger_car() -> Self {
        Self {
            name: "car".into(),
            length: 4.0,
            max_speed: 55.0,
            max_acceleration: 2.5,
            max_deceleration: 15.0,
            min_gap: 2.5,
            headway_time: 1.0,
            emission_class: EmissionClass::PcGEu4,
        }
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// Append-only registry of vehicle types.
///
/// Types are registered before `t = 0` and referenced from fleet rows by
/// `VehicleTypeId`; they are never mutated or removed during a run.
#[derive(Default)]
pub struct VehicleTypeRegistry {
    types: Vec<VehicleType>,
}

impl VehicleTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type and return its id.
    pub fn register(&mut self, vtype: VehicleType) -> VehicleTypeId {
        let id = VehicleTypeId(self.types.len() as u16);
        self.types.push(vtype);
        id
    }

    /// Look up a type by id.
    ///
    /// # Panics
    /// Panics if `id` was not produced by this registry — type ids are
    /// assigned at configuration time and never invalidated.
    #[inline]
    pub fn get(&self, id: VehicleTypeId) -> &VehicleType {
        &self.types[id.index()]
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
