//! Point projection shared by calibration, evaluation and pose solving.

use crate::{CalibError, Extrinsics, Mat3, PinholeCamera, Pt2, Pt3, Vec3};

/// Project pattern points through a posed camera.
///
/// Each point is transformed by `(rotation, translation)`, perspective-divided,
/// distorted in normalized coordinates and mapped through `K`. The first point
/// with non-positive depth aborts the projection with
/// [`CalibError::InvalidGeometry`]; use [`project_point`] to handle points
/// individually.
pub fn project_points(
    points: &[Pt3],
    pose: &Extrinsics,
    camera: &PinholeCamera,
) -> Result<Vec<Pt2>, CalibError> {
    let r = pose.rotation_matrix();
    points
        .iter()
        .enumerate()
        .map(|(idx, p)| project_with_matrix(idx, p, &r, &pose.translation, camera))
        .collect()
}

/// Project a single pattern point; `index` is reported on failure.
pub fn project_point(
    index: usize,
    point: &Pt3,
    pose: &Extrinsics,
    camera: &PinholeCamera,
) -> Result<Pt2, CalibError> {
    project_with_matrix(index, point, &pose.rotation_matrix(), &pose.translation, camera)
}

#[inline]
pub(crate) fn project_with_matrix(
    index: usize,
    point: &Pt3,
    r: &Mat3,
    t: &Vec3,
    camera: &PinholeCamera,
) -> Result<Pt2, CalibError> {
    let p_c = Pt3::from(r * point.coords + t);
    camera
        .project_point(&p_c)
        .ok_or(CalibError::InvalidGeometry {
            point: index,
            depth: p_c.z,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BrownConrady5, Intrinsics};

    fn camera() -> PinholeCamera {
        PinholeCamera::ideal(Intrinsics::new(500.0, 500.0, 320.0, 240.0).unwrap())
    }

    #[test]
    fn identity_pose_projects_through_principal_point() {
        let pose = Extrinsics::new(Vec3::zeros(), Vec3::new(0.0, 0.0, 2.0));
        let px = project_points(&[Pt3::origin(), Pt3::new(1.0, 0.0, 0.0)], &pose, &camera())
            .unwrap();
        assert!((px[0] - Pt2::new(320.0, 240.0)).norm() < 1e-12);
        assert!((px[1] - Pt2::new(570.0, 240.0)).norm() < 1e-12);
    }

    #[test]
    fn distortion_moves_off_axis_points_only() {
        let mut cam = camera();
        cam.distortion = BrownConrady5 {
            k1: -0.2,
            ..Default::default()
        };
        let pose = Extrinsics::new(Vec3::zeros(), Vec3::new(0.0, 0.0, 2.0));
        let px = project_points(&[Pt3::origin(), Pt3::new(1.0, 0.0, 0.0)], &pose, &cam).unwrap();
        assert!((px[0] - Pt2::new(320.0, 240.0)).norm() < 1e-12);
        // x_n = 0.5, r2 = 0.25, radial = 0.95
        assert!((px[1].x - (320.0 + 500.0 * 0.5 * 0.95)).abs() < 1e-9);
    }

    #[test]
    fn point_behind_camera_is_reported() {
        let pose = Extrinsics::new(Vec3::zeros(), Vec3::new(0.0, 0.0, 1.0));
        let points = [Pt3::new(0.0, 0.0, 0.5), Pt3::new(0.0, 0.0, -2.0)];
        let err = project_points(&points, &pose, &camera()).unwrap_err();
        match err {
            CalibError::InvalidGeometry { point, depth } => {
                assert_eq!(point, 1);
                assert!((depth + 1.0).abs() < 1e-12);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
