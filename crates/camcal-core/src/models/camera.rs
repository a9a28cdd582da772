use serde::{Deserialize, Serialize};

use super::{BrownConrady5, Intrinsics};
use crate::{Pt2, Pt3, Vec2};

/// Pinhole camera with Brown–Conrady distortion.
///
/// `pixel = K ∘ distortion ∘ perspective_divide(p_c)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PinholeCamera {
    pub intrinsics: Intrinsics,
    pub distortion: BrownConrady5,
}

impl PinholeCamera {
    pub fn new(intrinsics: Intrinsics, distortion: BrownConrady5) -> Self {
        Self {
            intrinsics,
            distortion,
        }
    }

    /// Distortion-free camera.
    pub fn ideal(intrinsics: Intrinsics) -> Self {
        Self::new(intrinsics, BrownConrady5::default())
    }

    /// Project a point in camera coordinates to (distorted) pixels.
    ///
    /// Returns `None` if the point is not strictly in front of the camera.
    pub fn project_point(&self, p_c: &Pt3) -> Option<Pt2> {
        if p_c.z <= 0.0 || !p_c.z.is_finite() {
            return None;
        }
        let n = Vec2::new(p_c.x / p_c.z, p_c.y / p_c.z);
        Some(self.intrinsics.to_pixel(&self.distortion.distort(&n)))
    }

    /// Map an observed (distorted) pixel to undistorted normalized coordinates.
    pub fn normalize_pixel(&self, px: &Pt2) -> Vec2 {
        self.distortion
            .undistort(&self.intrinsics.to_normalized(px))
    }
}
