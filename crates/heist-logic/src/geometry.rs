//! Vector math and ray queries shared by vision, lasers and navigation.

use serde::{Deserialize, Serialize};

/// 3D position or direction vector
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0, z: 0.0 };
    pub const FORWARD: Self = Self { x: 0.0, y: 0.0, z: 1.0 };
    pub const UP: Self = Self { x: 0.0, y: 1.0, z: 0.0 };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn dot(&self, other: &Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn distance_squared(&self, other: &Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }

    pub fn distance(&self, other: &Self) -> f32 {
        self.distance_squared(other).sqrt()
    }

    pub fn length(&self) -> f32 {
        self.dot(self).sqrt()
    }

    pub fn normalize(&self) -> Self {
        let len = self.length();
        if len > 0.0 {
            Self {
                x: self.x / len,
                y: self.y / len,
                z: self.z / len,
            }
        } else {
            Self::ZERO
        }
    }

    /// Every component is a finite number.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Mirror this direction about a surface normal.
    pub fn reflect(&self, normal: &Self) -> Self {
        let n = normal.normalize();
        *self - n * (2.0 * self.dot(&n))
    }

    /// Drop the vertical component (guards and zones reason on the floor plane).
    pub fn flat(&self) -> Self {
        Self::new(self.x, 0.0, self.z)
    }
}

impl std::ops::Add for Vec3 {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
        }
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
        }
    }
}

impl std::ops::Mul<f32> for Vec3 {
    type Output = Self;
    fn mul(self, scalar: f32) -> Self {
        Self {
            x: self.x * scalar,
            y: self.y * scalar,
            z: self.z * scalar,
        }
    }
}

impl std::ops::Neg for Vec3 {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

/// What a ray struck. Physics layers tag their colliders with one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Surface {
    /// Opaque geometry: walls, furniture.
    Solid,
    /// Reflective geometry; beams bounce off it.
    Mirror,
    /// A player's body.
    Player,
}

/// Distance along a normalized ray to the first intersection with a sphere.
pub fn ray_sphere(origin: Vec3, dir: Vec3, center: Vec3, radius: f32) -> Option<f32> {
    let oc = origin - center;
    let b = oc.dot(&dir);
    let c = oc.dot(&oc) - radius * radius;
    let disc = b * b - c;
    if disc < 0.0 {
        return None;
    }
    let sqrt_disc = disc.sqrt();
    let near = -b - sqrt_disc;
    if near >= 0.0 {
        return Some(near);
    }
    // Origin inside the sphere: report the exit point.
    let far = -b + sqrt_disc;
    (far >= 0.0).then_some(far)
}

/// Distance along a normalized ray to an infinite plane, front face only.
pub fn ray_plane(origin: Vec3, dir: Vec3, point: Vec3, normal: Vec3) -> Option<f32> {
    let n = normal.normalize();
    let denom = dir.dot(&n);
    if denom >= -1e-6 {
        return None;
    }
    let t = (point - origin).dot(&n) / denom;
    (t >= 0.0).then_some(t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reflect_off_wall() {
        let dir = Vec3::new(1.0, 0.0, 1.0).normalize();
        let out = dir.reflect(&Vec3::new(-1.0, 0.0, 0.0));
        assert!((out.x + dir.x).abs() < 1e-6);
        assert!((out.z - dir.z).abs() < 1e-6);
    }

    #[test]
    fn test_ray_sphere_hit_and_miss() {
        let hit = ray_sphere(Vec3::ZERO, Vec3::FORWARD, Vec3::new(0.0, 0.0, 5.0), 1.0);
        assert_eq!(hit, Some(4.0));

        let miss = ray_sphere(Vec3::ZERO, Vec3::FORWARD, Vec3::new(3.0, 0.0, 5.0), 1.0);
        assert_eq!(miss, None);

        let behind = ray_sphere(Vec3::ZERO, Vec3::FORWARD, Vec3::new(0.0, 0.0, -5.0), 1.0);
        assert_eq!(behind, None);
    }

    #[test]
    fn test_ray_plane_front_face_only() {
        let wall = Vec3::new(0.0, 0.0, 10.0);
        let facing = ray_plane(Vec3::ZERO, Vec3::FORWARD, wall, Vec3::new(0.0, 0.0, -1.0));
        assert_eq!(facing, Some(10.0));

        let back = ray_plane(Vec3::ZERO, Vec3::FORWARD, wall, Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(back, None);
    }

    #[test]
    fn test_non_finite_detection() {
        assert!(Vec3::new(1.0, 2.0, 3.0).is_finite());
        assert!(!Vec3::new(f32::NAN, 0.0, 0.0).is_finite());
    }
}
