//! Waypoint navigation for patrolling NPCs.
//!
//! Movement is a straight-line step toward a goal, clamped so the mover never
//! overshoots. There is no pathfinding here: patrol routes are authored so
//! consecutive waypoints are mutually visible.

use crate::geometry::Vec3;

/// Move from `from` toward `to` by at most `max_step`.
pub fn step_towards(from: Vec3, to: Vec3, max_step: f32) -> Vec3 {
    let delta = to - from;
    let dist = delta.length();
    if dist <= max_step || dist == 0.0 {
        to
    } else {
        from + delta * (max_step / dist)
    }
}

/// Whether `from` is within `threshold` of `to`.
pub fn arrived(from: Vec3, to: Vec3, threshold: f32) -> bool {
    from.distance_squared(&to) <= threshold * threshold
}

/// Index of the waypoint closest to `point`, or `None` for an empty route.
pub fn nearest_waypoint(point: Vec3, waypoints: &[Vec3]) -> Option<usize> {
    waypoints
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            point
                .distance_squared(a)
                .partial_cmp(&point.distance_squared(b))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(i, _)| i)
}

/// Next index on a looping route.
pub fn next_index(current: usize, len: usize) -> usize {
    if len == 0 {
        0
    } else {
        (current + 1) % len
    }
}
