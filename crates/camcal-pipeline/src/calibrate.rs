//! Zhang-style planar calibration: homographies, closed-form intrinsics,
//! per-view poses, then joint Levenberg–Marquardt refinement.

use camcal_core::{
    BrownConrady5, CalibError, Correspondence, Extrinsics, ImageSize, Intrinsics, Mat3,
    PinholeCamera, Real,
};
use camcal_linear::{dlt_homography, estimate_intrinsics, estimate_planar_pose_from_h};
use camcal_optim::{refine_planar_intrinsics, LmBackend, PlanarIntrinsicsProblem, SolveReport};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{evaluate::evaluate_views, CalibrationConfig};

/// Minimum number of views for the homography-based initialisation.
pub const MIN_VIEWS: usize = 2;

/// Output of one [`calibrate`] call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub intrinsics: Intrinsics,
    pub distortion: BrownConrady5,
    /// One pose per retained view, in input order.
    pub extrinsics: Vec<Extrinsics>,
    /// Input indices of views left out because their homography or initial
    /// pose could not be computed, ascending.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dropped_views: Vec<usize>,
    /// Pooled RMS reprojection error in pixels.
    pub rms: Real,
    pub image_size: ImageSize,
    pub report: SolveReport,
}

impl CalibrationResult {
    pub fn camera(&self) -> PinholeCamera {
        PinholeCamera::new(self.intrinsics, self.distortion)
    }

    /// Items of a per-input-view slice that took part in the calibration.
    pub fn retained<'a, T>(&'a self, items: &'a [T]) -> impl Iterator<Item = &'a T> + 'a {
        items
            .iter()
            .enumerate()
            .filter(|(i, _)| self.dropped_views.binary_search(i).is_err())
            .map(|(_, item)| item)
    }

    /// Estimated pose of input view `index`, if it was retained.
    pub fn pose_of(&self, index: usize) -> Option<&Extrinsics> {
        if self.dropped_views.binary_search(&index).is_ok() {
            return None;
        }
        let before = self.dropped_views.partition_point(|&d| d < index);
        self.extrinsics.get(index - before)
    }
}

fn ensure_enough_views(got: usize) -> Result<(), CalibError> {
    if got < MIN_VIEWS {
        return Err(CalibError::InsufficientViews {
            needed: MIN_VIEWS,
            got,
        });
    }
    Ok(())
}

/// Calibrate from two or more planar views.
///
/// A view whose homography or initial pose cannot be computed (for example
/// collinear points) is left out and listed in
/// [`CalibrationResult::dropped_views`]; the rest are calibrated as long as
/// [`MIN_VIEWS`] remain. Non-convergence of the refinement is not an error:
/// the best iterate is returned and `report.converged` is `false`.
///
/// # Errors
///
/// - [`CalibError::InsufficientViews`] if fewer than [`MIN_VIEWS`] usable views remain,
/// - [`CalibError::NonPlanarPattern`] if pattern points leave `z = 0`,
/// - [`CalibError::Numerical`] if the closed-form intrinsics break down.
pub fn calibrate(
    views: &[Correspondence],
    image_size: ImageSize,
    config: &CalibrationConfig,
) -> Result<CalibrationResult, CalibError> {
    ensure_enough_views(views.len())?;
    if let Some(view) = views.iter().find(|v| !v.is_planar()) {
        debug!("non-planar view with {} points", view.len());
        return Err(CalibError::NonPlanarPattern);
    }

    let mut dropped_views = Vec::new();
    let mut homographies: Vec<(usize, Mat3)> = Vec::with_capacity(views.len());
    for (idx, v) in views.iter().enumerate() {
        match dlt_homography(&v.planar_points(), &v.points_2d) {
            Ok(h) => homographies.push((idx, h)),
            Err(e) => {
                warn!("view {idx}: dropped, {}", CalibError::from(e));
                dropped_views.push(idx);
            }
        }
    }
    ensure_enough_views(homographies.len())?;

    let hs: Vec<Mat3> = homographies.iter().map(|(_, h)| *h).collect();
    let intrinsics = estimate_intrinsics(&hs, image_size)?;
    let kmtx = intrinsics.k_matrix();

    let mut used = Vec::with_capacity(homographies.len());
    let mut poses = Vec::with_capacity(homographies.len());
    for (idx, h) in &homographies {
        match estimate_planar_pose_from_h(&kmtx, h) {
            Ok(pose) => {
                used.push(views[*idx].clone());
                poses.push(pose);
            }
            Err(e) => {
                warn!("view {idx}: dropped, {}", CalibError::from(e));
                dropped_views.push(*idx);
            }
        }
    }
    ensure_enough_views(used.len())?;
    dropped_views.sort_unstable();
    let views = used.as_slice();

    let initial = PinholeCamera::ideal(intrinsics);
    let init_rms = evaluate_views(&initial, views, &poses)
        .map(|s| s.rms)
        .unwrap_or(Real::NAN);
    debug!(
        "initial estimate fx={:.3} fy={:.3} cx={:.3} cy={:.3}, rms {:.4} px",
        intrinsics.fx, intrinsics.fy, intrinsics.cx, intrinsics.cy, init_rms
    );

    let mut problem = PlanarIntrinsicsProblem::new(views.to_vec(), config.distortion_mask())?;
    let est = refine_planar_intrinsics(
        &LmBackend,
        &mut problem,
        &initial,
        &poses,
        &config.solver.solve_options(),
    )?;

    let stats = evaluate_views(&est.camera, views, &est.poses)?;
    info!(
        "calibrated {} views: fx={:.3} fy={:.3} cx={:.3} cy={:.3}, rms {:.4} px{}",
        views.len(),
        est.camera.intrinsics.fx,
        est.camera.intrinsics.fy,
        est.camera.intrinsics.cx,
        est.camera.intrinsics.cy,
        stats.rms,
        if est.report.converged { "" } else { " (not converged)" }
    );

    Ok(CalibrationResult {
        intrinsics: est.camera.intrinsics,
        distortion: est.camera.distortion,
        extrinsics: est.poses,
        dropped_views,
        rms: stats.rms,
        image_size,
        report: est.report,
    })
}
