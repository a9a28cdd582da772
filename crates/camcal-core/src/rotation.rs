//! Conversions between axis-angle vectors, rotation matrices and Euler angles.
//!
//! Euler angles follow the `R = Rz(yaw) · Ry(pitch) · Rx(roll)` convention
//! (the same as `nalgebra::Rotation3::from_euler_angles`), all in radians.

use nalgebra::{Rotation3, UnitQuaternion};
use serde::{Deserialize, Serialize};

use crate::{Mat3, Real, Vec3};

/// `sqrt(R00² + R10²)` below this value is treated as gimbal lock.
pub const GIMBAL_LOCK_THRESHOLD: Real = 1e-6;

/// Roll/pitch/yaw angles in radians (rotations about x, y and z).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EulerAngles {
    pub roll: Real,
    pub pitch: Real,
    pub yaw: Real,
}

impl EulerAngles {
    pub fn as_array(&self) -> [Real; 3] {
        [self.roll, self.pitch, self.yaw]
    }
}

/// Result of decomposing a rotation matrix into Euler angles.
///
/// The two cases are computed from different matrix entries; the variant
/// records which one applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EulerDecomposition {
    /// Pitch away from ±90°: all three angles are observable.
    General(EulerAngles),
    /// Pitch at ±90°: yaw is fixed to zero and roll absorbs the remainder.
    GimbalLock(EulerAngles),
}

impl EulerDecomposition {
    pub fn angles(&self) -> EulerAngles {
        match *self {
            EulerDecomposition::General(a) | EulerDecomposition::GimbalLock(a) => a,
        }
    }

    pub fn is_gimbal_lock(&self) -> bool {
        matches!(self, EulerDecomposition::GimbalLock(_))
    }
}

/// Rodrigues formula: axis-angle vector to rotation matrix.
pub fn matrix_from_axis_angle(axis_angle: &Vec3) -> Mat3 {
    Rotation3::from_scaled_axis(*axis_angle).into_inner()
}

/// Inverse Rodrigues: rotation matrix to axis-angle vector with angle in `[0, π]`.
///
/// `r` must be a proper rotation matrix.
pub fn axis_angle_from_matrix(r: &Mat3) -> Vec3 {
    let q = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(*r));
    let (mut w, mut v) = (q.scalar(), q.imag());
    if w < 0.0 {
        w = -w;
        v = -v;
    }
    let s = v.norm();
    if s < 1e-12 {
        return v * 2.0;
    }
    let angle = 2.0 * s.atan2(w);
    v * (angle / s)
}

/// Decompose a rotation matrix into roll/pitch/yaw.
pub fn euler_from_matrix(r: &Mat3) -> EulerDecomposition {
    let sy = (r[(0, 0)] * r[(0, 0)] + r[(1, 0)] * r[(1, 0)]).sqrt();
    if sy < GIMBAL_LOCK_THRESHOLD {
        EulerDecomposition::GimbalLock(euler_gimbal_lock(r, sy))
    } else {
        EulerDecomposition::General(euler_general(r, sy))
    }
}

fn euler_general(r: &Mat3, sy: Real) -> EulerAngles {
    EulerAngles {
        roll: r[(2, 1)].atan2(r[(2, 2)]),
        pitch: (-r[(2, 0)]).atan2(sy),
        yaw: r[(1, 0)].atan2(r[(0, 0)]),
    }
}

fn euler_gimbal_lock(r: &Mat3, sy: Real) -> EulerAngles {
    EulerAngles {
        roll: (-r[(1, 2)]).atan2(r[(1, 1)]),
        pitch: (-r[(2, 0)]).atan2(sy),
        yaw: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn assert_mat_close(a: &Mat3, b: &Mat3, tol: Real) {
        let err = (a - b).abs().max();
        assert!(err < tol, "matrices differ by {err}\n{a}\n{b}");
    }

    #[test]
    fn axis_angle_roundtrip_over_many_rotations() {
        let axes = [
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 2.0, -0.5),
            Vec3::new(-0.3, 0.1, 0.9),
        ];
        let angles = [0.0, 1e-9, 1e-4, 0.3, 1.5, 3.0, PI - 1e-6, PI];
        for axis in &axes {
            for &angle in &angles {
                let r = matrix_from_axis_angle(&(axis.normalize() * angle));
                let back = matrix_from_axis_angle(&axis_angle_from_matrix(&r));
                assert_mat_close(&r, &back, 1e-9);
            }
        }
    }

    #[test]
    fn axis_angle_recovers_vector_below_pi() {
        let v = Vec3::new(0.2, -0.4, 0.1);
        let back = axis_angle_from_matrix(&matrix_from_axis_angle(&v));
        assert!((back - v).norm() < 1e-12);
    }

    #[test]
    fn general_branch_matches_construction() {
        let (roll, pitch, yaw) = (0.3, -0.4, 1.2);
        let r = Rotation3::from_euler_angles(roll, pitch, yaw).into_inner();
        let dec = euler_from_matrix(&r);
        assert!(!dec.is_gimbal_lock());
        let a = dec.angles();
        assert!((a.roll - roll).abs() < 1e-12);
        assert!((a.pitch - pitch).abs() < 1e-12);
        assert!((a.yaw - yaw).abs() < 1e-12);
    }

    #[test]
    fn gimbal_lock_forces_zero_yaw() {
        for pitch in [FRAC_PI_2, -FRAC_PI_2, FRAC_PI_2 - 1e-8] {
            let r = Rotation3::from_euler_angles(0.4, pitch, 0.7).into_inner();
            let dec = euler_from_matrix(&r);
            assert!(dec.is_gimbal_lock(), "pitch {pitch} should be singular");
            let a = dec.angles();
            assert_eq!(a.yaw, 0.0);
            assert!((a.pitch.abs() - FRAC_PI_2).abs() < 1e-6);

            // Yaw is folded into roll, so the matrix is still reproduced.
            let rebuilt = Rotation3::from_euler_angles(a.roll, a.pitch, a.yaw).into_inner();
            assert_mat_close(&r, &rebuilt, 1e-6);
        }
    }

    #[test]
    fn threshold_separates_branches() {
        // sy = cos(pitch); just above the threshold stays general.
        let pitch = FRAC_PI_2 - 1e-5;
        let r = Rotation3::from_euler_angles(0.1, pitch, 0.2).into_inner();
        assert!(!euler_from_matrix(&r).is_gimbal_lock());
    }
}
