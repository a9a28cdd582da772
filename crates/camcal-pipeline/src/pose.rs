//! Single-view pose estimation with a fixed, previously calibrated camera.

use camcal_core::{
    project_points, rotation::euler_from_matrix, CalibError, Correspondence, EulerDecomposition,
    Extrinsics, PatternGeometry, PinholeCamera, Pt2, Pt3, Real,
};
use camcal_linear::{estimate_planar_pose, math::is_collinear};
use camcal_optim::{refine_planar_pose, LmBackend, SolveOptions};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::evaluate::evaluate_pose;

/// Estimate the pattern pose in one view.
///
/// A direct coplanar estimate (homography of the undistorted points) seeds a
/// Levenberg–Marquardt refinement of the six pose parameters.
///
/// # Errors
///
/// - [`CalibError::PoseDegenerate`] if the pattern or image points are collinear,
/// - [`CalibError::NonPlanarPattern`] if pattern points leave `z = 0`,
/// - [`CalibError::InvalidGeometry`] if the refined pose puts points behind
///   the camera.
pub fn solve_pose(
    view: &Correspondence,
    camera: &PinholeCamera,
    opts: &SolveOptions,
) -> Result<Extrinsics, CalibError> {
    if !view.is_planar() {
        return Err(CalibError::NonPlanarPattern);
    }
    if is_collinear(&view.planar_points()) || is_collinear(&view.points_2d) {
        return Err(CalibError::PoseDegenerate);
    }

    let initial = estimate_planar_pose(camera, view)?;
    let (pose, report) = refine_planar_pose(&LmBackend, camera, view, &initial, opts)?;
    debug!(
        "pose refined in {} evaluations, cost {:.3e}",
        report.evaluations, report.final_cost
    );

    // Surface points that ended up behind the camera instead of the penalty.
    project_points(&view.points_3d, &pose, camera)?;
    Ok(pose)
}

/// Pose of one processed image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseResult {
    pub image_id: String,
    pub extrinsics: Extrinsics,
    pub euler: EulerDecomposition,
    pub reprojection_rms: Real,
}

impl PoseResult {
    /// Solve the pose and derive Euler angles and reprojection error.
    pub fn solve(
        image_id: impl Into<String>,
        view: &Correspondence,
        camera: &PinholeCamera,
        opts: &SolveOptions,
    ) -> Result<Self, CalibError> {
        let extrinsics = solve_pose(view, camera, opts)?;
        let stats = evaluate_pose(camera, view, &extrinsics)?;
        Ok(Self {
            image_id: image_id.into(),
            euler: euler_from_matrix(&extrinsics.rotation_matrix()),
            extrinsics,
            reprojection_rms: stats.rms,
        })
    }
}

/// Projected pattern origin and axis end points, for drawing a pose overlay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisOverlay {
    pub origin: Pt2,
    pub x_axis: Pt2,
    pub y_axis: Pt2,
    pub z_axis: Pt2,
}

impl AxisOverlay {
    pub fn project(
        pattern: &PatternGeometry,
        pose: &Extrinsics,
        camera: &PinholeCamera,
    ) -> Result<Self, CalibError> {
        let [x, y, z] = pattern.axis_points();
        let px = project_points(&[Pt3::origin(), x, y, z], pose, camera)?;
        Ok(Self {
            origin: px[0],
            x_axis: px[1],
            y_axis: px[2],
            z_axis: px[3],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camcal_core::{synthetic::planar, BrownConrady5, Intrinsics, Vec3};

    fn camera() -> PinholeCamera {
        PinholeCamera::new(
            Intrinsics::new(650.0, 650.0, 320.0, 240.0).unwrap(),
            BrownConrady5 {
                k1: -0.15,
                k2: 0.02,
                ..Default::default()
            },
        )
    }

    #[test]
    fn recovers_pose_and_overlay() {
        let pattern = PatternGeometry::new(9, 6, 1.0).unwrap();
        let gt = planar::pose_facing(&pattern, Vec3::new(0.3, -0.25, 0.1), 14.0);
        let view = planar::project_views(&camera(), &pattern, &[gt]).unwrap().remove(0);

        let result = PoseResult::solve("img_000.png", &view, &camera(), &SolveOptions::default())
            .unwrap();
        assert!((result.extrinsics.translation - gt.translation).norm() < 1e-6);
        assert!(result.reprojection_rms < 1e-6);
        assert!(!result.euler.is_gimbal_lock());

        let overlay = AxisOverlay::project(&pattern, &result.extrinsics, &camera()).unwrap();
        assert!((overlay.origin - view.points_2d[0]).norm() < 1e-6);
    }

    #[test]
    fn collinear_view_is_degenerate() {
        let pattern = PatternGeometry::new(9, 6, 1.0).unwrap();
        let points_2d: Vec<Pt2> = (0..pattern.len())
            .map(|i| Pt2::new(100.0 + 2.0 * i as Real, 50.0 + i as Real))
            .collect();
        let view = Correspondence::new(pattern.points().to_vec(), points_2d).unwrap();

        let err = solve_pose(&view, &camera(), &SolveOptions::default()).unwrap_err();
        assert_eq!(err, CalibError::PoseDegenerate);
    }
}
