// src/math.rs
//! Engine-side pose type and glam <-> Rapier/nalgebra conversions.
//!
//! Gameplay code speaks glam; Rapier speaks nalgebra. Every crossing goes through here.

use glam::{Quat, Vec3};
use nalgebra::{Isometry3, Quaternion, Translation3, UnitQuaternion};
use rapier3d::prelude::{Isometry, Real, Vector};
use serde::{Deserialize, Serialize};

/// World-space position + rotation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Pose {
    pub const IDENTITY: Pose = Pose {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    #[inline]
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    #[inline]
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
        }
    }

    #[inline]
    pub fn to_isometry(self) -> Isometry<Real> {
        let rotation = self.rotation.normalize();
        Isometry3::from_parts(
            Translation3::new(self.position.x, self.position.y, self.position.z),
            UnitQuaternion::from_quaternion(Quaternion::new(
                rotation.w, rotation.x, rotation.y, rotation.z,
            )),
        )
    }

    #[inline]
    pub fn from_isometry(iso: &Isometry<Real>) -> Self {
        let t = iso.translation.vector;
        let r = iso.rotation;
        Self {
            position: Vec3::new(t.x, t.y, t.z),
            rotation: Quat::from_xyzw(r.i, r.j, r.k, r.w),
        }
    }

    /// Blend between two poses (lerp position, slerp rotation).
    #[inline]
    pub fn interpolate(self, to: Pose, alpha: f32) -> Pose {
        let alpha = alpha.clamp(0.0, 1.0);
        Pose {
            position: self.position.lerp(to.position, alpha),
            rotation: self.rotation.slerp(to.rotation, alpha),
        }
    }

    /// Compares positions component-wise and rotations up to sign.
    pub fn approx_eq(&self, other: &Pose, epsilon: f32) -> bool {
        self.position.abs_diff_eq(other.position, epsilon)
            && (self.rotation.dot(other.rotation).abs() - 1.0).abs() <= epsilon
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.rotation.is_finite()
    }
}

#[inline]
pub fn to_vector(v: Vec3) -> Vector<Real> {
    Vector::new(v.x, v.y, v.z)
}

#[inline]
pub fn from_vector(v: &Vector<Real>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isometry_conversion_preserves_pose() {
        let pose = Pose::new(
            Vec3::new(1.0, -2.0, 3.5),
            Quat::from_rotation_y(0.75) * Quat::from_rotation_x(-0.3),
        );
        let back = Pose::from_isometry(&pose.to_isometry());
        assert!(pose.approx_eq(&back, 1e-5));
    }

    #[test]
    fn approx_eq_ignores_quaternion_sign() {
        let a = Pose::new(Vec3::ONE, Quat::from_rotation_z(1.0));
        let b = Pose::new(Vec3::ONE, -a.rotation);
        assert!(a.approx_eq(&b, 1e-6));
    }

    #[test]
    fn interpolate_clamps_alpha() {
        let a = Pose::from_position(Vec3::ZERO);
        let b = Pose::from_position(Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(a.interpolate(b, 0.5).position, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(a.interpolate(b, 4.0).position, b.position);
    }
}
