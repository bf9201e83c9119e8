//! Laser beam tracing.
//!
//! A beam is cast from an emitter, bounces off mirrors, and stops at the first
//! solid surface or player. The number of reflections is bounded by the caller
//! so a pair of facing mirrors cannot loop forever; the bound is a level design
//! policy, not a physical constant.
//!
//! ```
//! use heist_logic::beam::{trace_beam, BeamEnd};
//! use heist_logic::geometry::Vec3;
//!
//! // Nothing in the way: the beam runs its full length.
//! let trace = trace_beam(Vec3::ZERO, Vec3::FORWARD, 10.0, 2, |_, _, _| None);
//! assert_eq!(trace.end, BeamEnd::Open);
//! assert_eq!(trace.length, 10.0);
//! ```

use crate::geometry::{Surface, Vec3};

/// Offset applied after a bounce so the next cast does not re-hit the mirror.
const SKIN: f32 = 1e-3;

/// One intersection reported by the caller's ray query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeamHit {
    pub distance: f32,
    pub point: Vec3,
    pub normal: Vec3,
    pub surface: Surface,
}

/// Why the beam stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeamEnd {
    /// Ran out of distance without striking anything that stops it.
    Open,
    /// Stopped by solid geometry.
    Blocked,
    /// Struck a player.
    Player,
    /// Hit a mirror after the reflection budget was spent.
    ReflectionLimit,
}

/// Result of tracing a beam.
#[derive(Debug, Clone, PartialEq)]
pub struct BeamTrace {
    /// Total travelled length across all segments.
    pub length: f32,
    /// Number of mirror bounces taken.
    pub reflections: u32,
    pub end: BeamEnd,
    /// Emitter followed by each segment end point.
    pub points: Vec<Vec3>,
}

/// Trace a beam through the scene.
///
/// `cast(origin, direction, max_distance)` returns the nearest hit along the
/// ray, or `None` when the ray is clear (or the query failed, which callers
/// should treat the same way).
pub fn trace_beam<F>(
    origin: Vec3,
    direction: Vec3,
    max_distance: f32,
    max_reflections: u32,
    mut cast: F,
) -> BeamTrace
where
    F: FnMut(Vec3, Vec3, f32) -> Option<BeamHit>,
{
    let mut origin = origin;
    let mut dir = direction.normalize();
    let mut remaining = max_distance.max(0.0);
    let mut trace = BeamTrace {
        length: 0.0,
        reflections: 0,
        end: BeamEnd::Open,
        points: vec![origin],
    };

    loop {
        let hit = match cast(origin, dir, remaining) {
            Some(hit) if hit.distance <= remaining => hit,
            _ => {
                trace.length += remaining;
                trace.points.push(origin + dir * remaining);
                trace.end = BeamEnd::Open;
                return trace;
            }
        };

        trace.length += hit.distance;
        trace.points.push(hit.point);

        match hit.surface {
            Surface::Player => {
                trace.end = BeamEnd::Player;
                return trace;
            }
            Surface::Solid => {
                trace.end = BeamEnd::Blocked;
                return trace;
            }
            Surface::Mirror => {
                if trace.reflections >= max_reflections {
                    trace.end = BeamEnd::ReflectionLimit;
                    return trace;
                }
                trace.reflections += 1;
                dir = dir.reflect(&hit.normal).normalize();
                origin = hit.point + dir * SKIN;
                remaining -= hit.distance;
                if remaining <= 0.0 {
                    trace.end = BeamEnd::Open;
                    return trace;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mirror_at(distance: f32, normal: Vec3) -> BeamHit {
        BeamHit {
            distance,
            point: Vec3::new(0.0, 0.0, distance),
            normal,
            surface: Surface::Mirror,
        }
    }

    #[test]
    fn test_beam_stops_at_player() {
        let trace = trace_beam(Vec3::ZERO, Vec3::FORWARD, 20.0, 3, |o, d, _| {
            Some(BeamHit {
                distance: 5.0,
                point: o + d * 5.0,
                normal: -d,
                surface: Surface::Player,
            })
        });
        assert_eq!(trace.end, BeamEnd::Player);
        assert_eq!(trace.length, 5.0);
        assert_eq!(trace.reflections, 0);
    }

    #[test]
    fn test_reflection_limit_is_respected() {
        // Two facing mirrors: every cast hits a mirror 2m away.
        let trace = trace_beam(Vec3::ZERO, Vec3::FORWARD, 100.0, 3, |_, d, _| {
            Some(mirror_at(2.0, -d))
        });
        assert_eq!(trace.reflections, 3);
        assert_eq!(trace.end, BeamEnd::ReflectionLimit);
        assert_eq!(trace.points.len(), 5);
    }

    #[test]
    fn test_zero_reflection_budget() {
        let trace = trace_beam(Vec3::ZERO, Vec3::FORWARD, 100.0, 0, |_, d, _| {
            Some(mirror_at(2.0, -d))
        });
        assert_eq!(trace.reflections, 0);
        assert_eq!(trace.end, BeamEnd::ReflectionLimit);
    }

    #[test]
    fn test_hit_beyond_range_is_ignored() {
        let trace = trace_beam(Vec3::ZERO, Vec3::FORWARD, 4.0, 1, |_, _, _| {
            Some(BeamHit {
                distance: 6.0,
                point: Vec3::new(0.0, 0.0, 6.0),
                normal: Vec3::new(0.0, 0.0, -1.0),
                surface: Surface::Solid,
            })
        });
        assert_eq!(trace.end, BeamEnd::Open);
        assert_eq!(trace.length, 4.0);
    }
}
