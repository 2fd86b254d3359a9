//! Read-only simulation state passed to every formation algorithm.

use pf_core::{PlatoonId, SimClock, VehicleId};
use pf_fleet::{Fleet, ManeuverState, PlatoonRole, VehicleTypeRegistry};
use pf_platoon::PlatoonRegistry;

use crate::command::JoinTarget;

/// A read-only snapshot handed to [`FormationAlgorithm::on_step`]
/// [crate::FormationAlgorithm::on_step].
///
/// Built once per invocation by the simulation loop and dropped before any
/// state mutation happens; algorithms must not retain any borrow.
pub struct FormationView<'a> {
    pub fleet: &'a Fleet,
    pub types: &'a VehicleTypeRegistry,
    pub platoons: &'a PlatoonRegistry,
    pub clock: &'a SimClock,
    /// Maximum distance over which vehicles observe each other, metres.
    pub communication_range: f64,
    /// Seconds between two invocations of a vehicle's own formation logic.
    pub execution_interval: f64,
}

/// Something a searching vehicle could join: an existing platoon or a lone
/// platoon-capable vehicle that would become a leader.
#[derive(Clone, Debug)]
pub struct JoinCandidate {
    pub target: JoinTarget,
    pub desired_speed: f64,
    /// Front bumper of the (possibly one-vehicle) formation.
    pub position: f64,
    /// Rear bumper of the last member.
    pub rear_position: f64,
}

impl<'a> FormationView<'a> {
    /// Rows of vehicles currently searching for a platoon: platooning-capable,
    /// not in a platoon, not in a maneuver.  Ascending id order.
    pub fn searching_rows(&self) -> Vec<usize> {
        let mut rows: Vec<usize> = self
            .fleet
            .rows()
            .filter(|&r| {
                self.fleet.platooning[r]
                    && self.fleet.platoon_role[r] == PlatoonRole::None
                    && self.fleet.maneuver[r] == ManeuverState::Idle
            })
            .collect();
        rows.sort_by_key(|&r| self.fleet.ids[r]);
        rows
    }

    /// Whether the per-vehicle execution timer of `row` fires this step.
    ///
    /// A vehicle acts on its own grid `{phase, phase + I, phase + 2I, …}`;
    /// the offset keeps pre-filled vehicles from acting in lock-step.
    pub fn timer_fires(&self, row: usize) -> bool {
        let t = self.clock.now_secs() - self.fleet.formation_phase[row];
        if t < 0.0 {
            return false;
        }
        t.rem_euclid(self.execution_interval) < self.clock.step_length * (1.0 - 1e-9)
    }

    /// Everything joinable in the whole simulation, ascending target id.
    ///
    /// A platoon is joinable while its leader is alive and not mid-maneuver;
    /// a lone vehicle is joinable while it is capable, unattached, and idle.
    pub fn join_candidates(&self) -> Vec<JoinCandidate> {
        let mut out = Vec::new();

        for p in self.platoons.iter() {
            let Some(leader_row) = self.fleet.row(p.leader()) else { continue };
            if self.fleet.maneuver[leader_row] != ManeuverState::Idle {
                continue;
            }
            let Some(tail_row) = self.fleet.row(p.tail()) else { continue };
            out.push(JoinCandidate {
                target: JoinTarget::Platoon(p.id),
                desired_speed: p.desired_speed,
                position: self.fleet.position[leader_row],
                rear_position: self.fleet.rear_position(tail_row, self.types),
            });
        }

        for r in self.searching_rows() {
            out.push(JoinCandidate {
                target: JoinTarget::Vehicle(self.fleet.ids[r]),
                desired_speed: self.fleet.desired_speed[r],
                position: self.fleet.position[r],
                rear_position: self.fleet.rear_position(r, self.types),
            });
        }

        out
    }

    /// Distance between a vehicle row and a candidate formation.
    #[inline]
    pub fn distance_to(&self, row: usize, candidate: &JoinCandidate) -> f64 {
        (self.fleet.position[row] - candidate.position).abs()
    }

    /// `true` when `candidate` is the row's own would-be platoon.
    pub fn is_self(&self, row: usize, candidate: &JoinCandidate) -> bool {
        match candidate.target {
            JoinTarget::Vehicle(v) => v == self.fleet.ids[row],
            JoinTarget::Platoon(p) => self.fleet.platoon_id[row] == p,
        }
    }

    /// Resolve the vehicle id behind a target (leader for platoons).
    pub fn target_leader(&self, target: JoinTarget) -> Option<VehicleId> {
        match target {
            JoinTarget::Vehicle(v) => Some(v),
            JoinTarget::Platoon(p) => self.platoons.get(p).map(|p| p.leader()),
        }
    }

    /// Resolve a target back to a platoon id, if it already is one.
    pub fn target_platoon(&self, target: JoinTarget) -> Option<PlatoonId> {
        match target {
            JoinTarget::Platoon(p) => Some(p),
            JoinTarget::Vehicle(_) => None,
        }
    }
}
