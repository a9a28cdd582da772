use serde::{Deserialize, Serialize};

use crate::{CalibError, Mat3, Pt2, Real, Vec2};

/// Pinhole intrinsics without a skew term.
///
/// The corresponding calibration matrix `K` has the form:
///
/// ```text
/// [ fx   0  cx ]
/// [  0  fy  cy ]
/// [  0   0   1 ]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    /// Focal length in pixels along X.
    pub fx: Real,
    /// Focal length in pixels along Y.
    pub fy: Real,
    /// Principal point X coordinate in pixels.
    pub cx: Real,
    /// Principal point Y coordinate in pixels.
    pub cy: Real,
}

impl Intrinsics {
    /// Build intrinsics, rejecting non-positive or non-finite focal lengths.
    pub fn new(fx: Real, fy: Real, cx: Real, cy: Real) -> Result<Self, CalibError> {
        let k = Self { fx, fy, cx, cy };
        k.validate()?;
        Ok(k)
    }

    /// Check the `fx, fy > 0` invariant and finiteness of all entries.
    pub fn validate(&self) -> Result<(), CalibError> {
        let finite = [self.fx, self.fy, self.cx, self.cy]
            .iter()
            .all(|v| v.is_finite());
        if !finite || self.fx <= 0.0 || self.fy <= 0.0 {
            return Err(CalibError::Numerical(format!(
                "invalid intrinsics fx={} fy={} cx={} cy={}",
                self.fx, self.fy, self.cx, self.cy
            )));
        }
        Ok(())
    }

    /// Build the 3×3 calibration matrix `K`.
    pub fn k_matrix(&self) -> Mat3 {
        Mat3::new(self.fx, 0.0, self.cx, 0.0, self.fy, self.cy, 0.0, 0.0, 1.0)
    }

    /// Attempt to construct intrinsics from a 3×3 calibration matrix `K`.
    ///
    /// The matrix is first normalised so that `K[2, 2] == 1`. It must then
    /// match the zero-skew sparsity pattern within a small tolerance and have
    /// positive focal lengths, otherwise `None` is returned.
    pub fn try_from_k_matrix(k: &Mat3) -> Option<Self> {
        let eps = 1e-9;

        let k33 = k[(2, 2)];
        if k33.abs() < eps {
            return None;
        }
        let k_norm = k / k33;

        if k_norm[(0, 1)].abs() > eps
            || k_norm[(1, 0)].abs() > eps
            || k_norm[(2, 0)].abs() > eps
            || k_norm[(2, 1)].abs() > eps
        {
            return None;
        }

        Self::new(
            k_norm[(0, 0)],
            k_norm[(1, 1)],
            k_norm[(0, 2)],
            k_norm[(1, 2)],
        )
        .ok()
    }

    /// Map normalized image-plane coordinates to pixels.
    #[inline]
    pub fn to_pixel(&self, n: &Vec2) -> Pt2 {
        Pt2::new(self.fx * n.x + self.cx, self.fy * n.y + self.cy)
    }

    /// Map pixels back to normalized image-plane coordinates.
    #[inline]
    pub fn to_normalized(&self, px: &Pt2) -> Vec2 {
        Vec2::new((px.x - self.cx) / self.fx, (px.y - self.cy) / self.fy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn k_matrix_roundtrip() {
        let k = Intrinsics::new(800.0, 780.0, 640.0, 360.0).unwrap();
        let back = Intrinsics::try_from_k_matrix(&(k.k_matrix() * 2.0)).unwrap();
        assert_eq!(back, k);
    }

    #[test]
    fn rejects_skewed_matrix() {
        let mut m = Intrinsics::new(800.0, 780.0, 640.0, 360.0)
            .unwrap()
            .k_matrix();
        m[(0, 1)] = 0.5;
        assert!(Intrinsics::try_from_k_matrix(&m).is_none());
    }

    #[test]
    fn rejects_non_positive_focal_length() {
        assert!(Intrinsics::new(0.0, 780.0, 640.0, 360.0).is_err());
        assert!(Intrinsics::new(800.0, -1.0, 640.0, 360.0).is_err());
        assert!(Intrinsics::new(Real::NAN, 780.0, 640.0, 360.0).is_err());
    }

    #[test]
    fn pixel_normalized_inverse() {
        let k = Intrinsics::new(800.0, 780.0, 640.0, 360.0).unwrap();
        let px = Pt2::new(700.0, 100.0);
        let back = k.to_pixel(&k.to_normalized(&px));
        assert!((back - px).norm() < 1e-12);
    }
}
