//! Pairwise per-lane collision detection.
//!
//! Two vehicles collide when their bounding boxes `(position − length,
//! position]` overlap.  On a sorted lane only consecutive pairs can touch, so
//! detection is one linear pass per lane.

use pf_core::VehicleId;
use pf_fleet::{Fleet, VehicleTypeRegistry};
use tracing::warn;

use crate::order::LaneOrder;

/// One detected overlap between two consecutive vehicles on a lane.
#[derive(Clone, Debug)]
pub struct Collision {
    pub front: VehicleId,
    pub back: VehicleId,
    pub lane: u8,
    /// How deep the back vehicle's front bumper reaches into the front
    /// vehicle, in metres.
    pub overlap: f64,
}

/// Scan all lanes for overlapping consecutive pairs.
pub fn detect_collisions(
    fleet: &Fleet,
    types: &VehicleTypeRegistry,
    order: &LaneOrder,
) -> Vec<Collision> {
    let mut collisions = Vec::new();
    for (lane, rows) in order.lanes.iter().enumerate() {
        for pair in rows.windows(2) {
            let (front, back) = (pair[0], pair[1]);
            let front_rear = fleet.position[front] - types.get(fleet.vtype[front]).length;
            let overlap = fleet.position[back] - front_rear;
            if overlap > 0.0 {
                collisions.push(Collision {
                    front: fleet.ids[front],
                    back: fleet.ids[back],
                    lane: lane as u8,
                    overlap,
                });
            }
        }
    }
    collisions
}

/// The `teleport` collision policy: separate the pair minimally by moving the
/// back vehicle rearward until its own min-gap to the front vehicle holds,
/// capping its speed to the front vehicle's.
pub fn separate(fleet: &mut Fleet, types: &VehicleTypeRegistry, collision: &Collision) {
    let Some(front) = fleet.row(collision.front) else { return };
    let Some(back) = fleet.row(collision.back) else { return };

    let front_rear = fleet.position[front] - types.get(fleet.vtype[front]).length;
    let min_gap = types.get(fleet.vtype[back]).min_gap;
    let new_position = (front_rear - min_gap).max(types.get(fleet.vtype[back]).length);

    warn!(
        front = %collision.front,
        back = %collision.back,
        lane = collision.lane,
        from = fleet.position[back],
        to = new_position,
        "separating collided vehicles"
    );

    fleet.position[back] = new_position;
    fleet.speed[back] = fleet.speed[back].min(fleet.speed[front]);
}
