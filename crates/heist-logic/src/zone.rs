//! Zone membership.
//!
//! A zone is a sphere around a center point. Whether a point exactly on the
//! boundary counts as inside is a level design choice, so it is passed in
//! explicitly instead of being baked into the comparison. Membership compares
//! squared distances so a point placed exactly at `radius` is classified
//! without square-root rounding.
//!
//! ```
//! use heist_logic::geometry::Vec3;
//! use heist_logic::zone::{BoundaryPolicy, Zone};
//!
//! let zone = Zone::new(Vec3::ZERO, 2.0);
//! let edge = Vec3::new(2.0, 0.0, 0.0);
//! assert!(zone.contains(edge, BoundaryPolicy::Inclusive));
//! assert!(!zone.contains(edge, BoundaryPolicy::Exclusive));
//! ```

use serde::{Deserialize, Serialize};

use crate::geometry::Vec3;

/// How to classify a point at exactly `radius` from the center.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPolicy {
    /// `distance <= radius` is inside.
    #[default]
    Inclusive,
    /// `distance < radius` is inside.
    Exclusive,
}

/// Spherical zone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub center: Vec3,
    pub radius: f32,
}

impl Zone {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    pub fn contains(&self, point: Vec3, policy: BoundaryPolicy) -> bool {
        let d2 = self.center.distance_squared(&point);
        let r2 = self.radius * self.radius;
        match policy {
            BoundaryPolicy::Inclusive => d2 <= r2,
            BoundaryPolicy::Exclusive => d2 < r2,
        }
    }

    /// True when there is at least one point and every point is inside.
    pub fn contains_all<I>(&self, points: I, policy: BoundaryPolicy) -> bool
    where
        I: IntoIterator<Item = Vec3>,
    {
        let mut any = false;
        for p in points {
            if !self.contains(p, policy) {
                return false;
            }
            any = true;
        }
        any
    }
}
