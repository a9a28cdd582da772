use serde::{Deserialize, Serialize};

use crate::{rotation, Mat3, Pt3, Vec3};

/// Rigid transform from pattern coordinates to camera coordinates.
///
/// The rotation is stored as an axis-angle (Rodrigues) vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extrinsics {
    pub rotation: Vec3,
    pub translation: Vec3,
}

impl Extrinsics {
    pub fn new(rotation: Vec3, translation: Vec3) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Rotation as a 3×3 matrix.
    pub fn rotation_matrix(&self) -> Mat3 {
        rotation::matrix_from_axis_angle(&self.rotation)
    }

    /// Map a pattern point into the camera frame.
    pub fn transform_point(&self, p: &Pt3) -> Pt3 {
        Pt3::from(self.rotation_matrix() * p.coords + self.translation)
    }
}
