use serde::{Deserialize, Serialize};

use crate::{CalibError, Real, Vec2};

/// Brown–Conrady radial/tangential distortion in normalized coordinates.
///
/// Coefficient order follows the common `k1 k2 p1 p2 k3` convention.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BrownConrady5 {
    pub k1: Real,
    pub k2: Real,
    pub p1: Real,
    pub p2: Real,
    pub k3: Real,
}

impl BrownConrady5 {
    /// Number of undistortion fixed-point iterations.
    pub const UNDISTORT_ITERS: usize = 20;

    /// Build from an ordered coefficient slice of length 4 or 5.
    ///
    /// A 4-element slice leaves `k3 = 0`.
    pub fn from_coefficients(coeffs: &[Real]) -> Result<Self, CalibError> {
        match *coeffs {
            [k1, k2, p1, p2] => Ok(Self {
                k1,
                k2,
                p1,
                p2,
                k3: 0.0,
            }),
            [k1, k2, p1, p2, k3] => Ok(Self { k1, k2, p1, p2, k3 }),
            _ => Err(CalibError::Numerical(format!(
                "expected 4 or 5 distortion coefficients, got {}",
                coeffs.len()
            ))),
        }
    }

    /// Coefficients in `k1 k2 p1 p2 k3` order.
    pub fn coefficients(&self) -> [Real; 5] {
        [self.k1, self.k2, self.p1, self.p2, self.k3]
    }

    /// Apply distortion to an undistorted normalized point.
    pub fn distort(&self, n: &Vec2) -> Vec2 {
        let (x, y) = (n.x, n.y);
        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let r6 = r4 * r2;

        let radial = 1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r6;

        let xy = x * y;
        let x_tan = 2.0 * self.p1 * xy + self.p2 * (r2 + 2.0 * x * x);
        let y_tan = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * xy;

        Vec2::new(x * radial + x_tan, y * radial + y_tan)
    }

    /// Invert [`Self::distort`] by fixed-point iteration.
    pub fn undistort(&self, n_dist: &Vec2) -> Vec2 {
        let mut n = *n_dist;
        for _ in 0..Self::UNDISTORT_ITERS {
            let err = self.distort(&n) - n_dist;
            n -= err;
            if err.norm() < 1e-14 {
                break;
            }
        }
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_coefficients_are_identity() {
        let d = BrownConrady5::default();
        let n = Vec2::new(0.3, -0.2);
        assert_eq!(d.distort(&n), n);
    }

    #[test]
    fn undistort_inverts_distort() {
        let d = BrownConrady5 {
            k1: -0.2,
            k2: 0.05,
            p1: 0.001,
            p2: -0.0015,
            k3: 0.0,
        };
        let n = Vec2::new(0.25, -0.15);
        let back = d.undistort(&d.distort(&n));
        assert!((back - n).norm() < 1e-10, "err={}", (back - n).norm());
    }

    #[test]
    fn coefficient_slices() {
        let d = BrownConrady5::from_coefficients(&[0.1, 0.2, 0.3, 0.4]).unwrap();
        assert_eq!(d.coefficients(), [0.1, 0.2, 0.3, 0.4, 0.0]);
        assert!(BrownConrady5::from_coefficients(&[0.1, 0.2]).is_err());
    }
}
