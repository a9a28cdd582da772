//! Parameter block packing shared by the calibration problems.

use camcal_core::{Extrinsics, Mat3, PinholeCamera, Pt2, Pt3, Real, Vec3};
use nalgebra::{DVector, DVectorView, DVectorViewMut};

/// Width of a pose block: axis-angle rotation followed by translation.
pub const POSE_DIM: usize = 6;

/// Residual used for a point that falls on or behind the camera plane.
///
/// Large enough to dominate any realistic reprojection error so the solver
/// backs away from such parameter regions.
pub const BEHIND_CAMERA_PENALTY: Real = 1e4;

pub fn write_pose(pose: &Extrinsics, mut out: DVectorViewMut<'_, Real>) {
    out[0] = pose.rotation.x;
    out[1] = pose.rotation.y;
    out[2] = pose.rotation.z;
    out[3] = pose.translation.x;
    out[4] = pose.translation.y;
    out[5] = pose.translation.z;
}

pub fn read_pose(block: DVectorView<'_, Real>) -> Extrinsics {
    Extrinsics::new(
        Vec3::new(block[0], block[1], block[2]),
        Vec3::new(block[3], block[4], block[5]),
    )
}

/// Pack a list of poses into a contiguous vector.
pub fn pack_poses(poses: &[Extrinsics]) -> DVector<Real> {
    let mut x = DVector::zeros(POSE_DIM * poses.len());
    for (i, pose) in poses.iter().enumerate() {
        write_pose(pose, x.rows_mut(POSE_DIM * i, POSE_DIM));
    }
    x
}

/// Write the `(observed - projected)` residual pairs of one view into `out`.
pub fn view_residuals(
    camera: &PinholeCamera,
    rotation: &Mat3,
    translation: &Vec3,
    points_3d: &[Pt3],
    points_2d: &[Pt2],
    mut out: DVectorViewMut<'_, Real>,
) {
    for (i, (pw, obs)) in points_3d.iter().zip(points_2d).enumerate() {
        let p_c = Pt3::from(rotation * pw.coords + translation);
        match camera.project_point(&p_c) {
            Some(proj) => {
                out[2 * i] = obs.x - proj.x;
                out[2 * i + 1] = obs.y - proj.y;
            }
            None => {
                out[2 * i] = BEHIND_CAMERA_PENALTY;
                out[2 * i + 1] = BEHIND_CAMERA_PENALTY;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pose_blocks_round_trip() {
        let poses = vec![
            Extrinsics::new(Vec3::new(0.1, 0.2, 0.3), Vec3::new(1.0, 2.0, 3.0)),
            Extrinsics::new(Vec3::new(-0.1, 0.0, 0.5), Vec3::new(0.0, -1.0, 7.0)),
        ];
        let x = pack_poses(&poses);
        assert_eq!(x.len(), 12);
        assert_eq!(read_pose(x.rows(6, 6)), poses[1]);
    }
}
