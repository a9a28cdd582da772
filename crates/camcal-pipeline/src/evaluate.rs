//! Reprojection error statistics.

use camcal_core::{project_points, CalibError, Correspondence, Extrinsics, PinholeCamera, Real};
use serde::{Deserialize, Serialize};

use crate::CalibrationResult;

/// RMS reprojection error pooled over every point, plus the per-view RMS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReprojectionStats {
    /// `sqrt(Σ‖observed − projected‖² / N)` over all points of all views.
    pub rms: Real,
    pub per_view_rms: Vec<Real>,
    /// Total number of points `N`.
    pub count: usize,
}

/// Evaluate a calibration against the correspondences it was estimated from.
///
/// `views` is the full input of [`crate::calibrate`]; views it dropped are
/// skipped.
pub fn evaluate(
    views: &[Correspondence],
    result: &CalibrationResult,
) -> Result<ReprojectionStats, CalibError> {
    let retained: Vec<Correspondence> = result.retained(views).cloned().collect();
    evaluate_views(&result.camera(), &retained, &result.extrinsics)
}

/// Evaluate one view with a fixed camera.
pub fn evaluate_pose(
    camera: &PinholeCamera,
    view: &Correspondence,
    pose: &Extrinsics,
) -> Result<ReprojectionStats, CalibError> {
    evaluate_views(camera, std::slice::from_ref(view), std::slice::from_ref(pose))
}

/// Pooled RMS of several views, each with its own pose.
///
/// # Errors
///
/// - [`CalibError::InvalidConfig`] if `poses` does not match `views` one-to-one,
/// - [`CalibError::InvalidGeometry`] if any point projects behind the camera.
pub fn evaluate_views(
    camera: &PinholeCamera,
    views: &[Correspondence],
    poses: &[Extrinsics],
) -> Result<ReprojectionStats, CalibError> {
    if views.len() != poses.len() {
        return Err(CalibError::InvalidConfig(format!(
            "{} poses for {} views",
            poses.len(),
            views.len()
        )));
    }

    let mut total_sq = 0.0;
    let mut count = 0;
    let mut per_view_rms = Vec::with_capacity(views.len());
    for (view, pose) in views.iter().zip(poses) {
        let projected = project_points(&view.points_3d, pose, camera)?;
        let sq: Real = projected
            .iter()
            .zip(&view.points_2d)
            .map(|(p, o)| (o - p).norm_squared())
            .sum();
        per_view_rms.push(if view.is_empty() {
            0.0
        } else {
            (sq / view.len() as Real).sqrt()
        });
        total_sq += sq;
        count += view.len();
    }

    let rms = if count == 0 {
        0.0
    } else {
        (total_sq / count as Real).sqrt()
    };
    Ok(ReprojectionStats {
        rms,
        per_view_rms,
        count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use camcal_core::{synthetic::planar, Intrinsics, PatternGeometry, Pt2, Pt3, Vec3};

    fn camera() -> PinholeCamera {
        PinholeCamera::ideal(Intrinsics::new(600.0, 600.0, 320.0, 240.0).unwrap())
    }

    #[test]
    fn exact_projections_give_zero_error() {
        let pattern = PatternGeometry::new(9, 6, 1.0).unwrap();
        let poses = planar::orbit_poses(3, &planar::pattern_center(&pattern), 12.0, 0.3);
        let views = planar::project_views(&camera(), &pattern, &poses).unwrap();

        let stats = evaluate_views(&camera(), &views, &poses).unwrap();
        assert!(stats.rms < 1e-12);
        assert_eq!(stats.count, 162);
        assert_eq!(stats.per_view_rms.len(), 3);
    }

    #[test]
    fn rms_is_pooled_not_averaged_per_view() {
        let pose = Extrinsics::new(Vec3::zeros(), Vec3::new(0.0, 0.0, 1.0));
        let cam = camera();
        let pts = |n: usize| -> Vec<Pt3> {
            (0..n).map(|i| Pt3::new(0.01 * i as Real, 0.0, 0.0)).collect()
        };

        // View A: 1 point off by 3 px. View B: 2 points exact.
        let a_pts = pts(1);
        let a_obs: Vec<Pt2> = project_points(&a_pts, &pose, &cam)
            .unwrap()
            .into_iter()
            .map(|p| p + camcal_core::Vec2::new(3.0, 0.0))
            .collect();
        let b_pts = pts(2);
        let b_obs = project_points(&b_pts, &pose, &cam).unwrap();

        let views = vec![
            Correspondence::new(a_pts, a_obs).unwrap(),
            Correspondence::new(b_pts, b_obs).unwrap(),
        ];
        let stats = evaluate_views(&cam, &views, &[pose, pose]).unwrap();

        // Pooled: sqrt(9 / 3). The mean of per-view RMS would be 1.5.
        assert!((stats.rms - (3.0 as Real).sqrt()).abs() < 1e-12);
        assert_eq!(stats.count, 3);
        assert!((stats.per_view_rms[0] - 3.0).abs() < 1e-12);
        assert!(stats.per_view_rms[1] < 1e-12);
    }

    #[test]
    fn behind_camera_is_reported() {
        let view = Correspondence::new(vec![Pt3::new(0.0, 0.0, 0.0)], vec![Pt2::new(0.0, 0.0)])
            .unwrap();
        let pose = Extrinsics::new(Vec3::zeros(), Vec3::new(0.0, 0.0, -1.0));
        let err = evaluate_pose(&camera(), &view, &pose).unwrap_err();
        assert!(matches!(err, CalibError::InvalidGeometry { point: 0, .. }));
    }
}
