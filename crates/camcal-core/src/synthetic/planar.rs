//! Synthetic planar target helpers.
//!
//! The functions here generate camera poses looking at a planar pattern and
//! project the pattern into the camera to produce [`Correspondence`]
//! instances.

use crate::{
    projection::project_points, rotation::matrix_from_axis_angle, CalibError, Correspondence,
    Extrinsics, PatternGeometry, PinholeCamera, Pt2, Pt3, Real, Vec3,
};
use nalgebra::Rotation3;

use super::noise::GaussianPixelNoise;

/// Centre of the pattern's bounding box.
pub fn pattern_center(pattern: &PatternGeometry) -> Pt3 {
    Pt3::new(
        (pattern.cols - 1) as Real * pattern.square_size * 0.5,
        (pattern.rows - 1) as Real * pattern.square_size * 0.5,
        0.0,
    )
}

/// Generate `n_views` varied poses that keep `center` on the optical axis at
/// roughly `distance` from the camera.
///
/// Tilts stay within `max_tilt_rad` about the x and y axes, with a small
/// in-plane roll; the sequence is deterministic.
pub fn orbit_poses(
    n_views: usize,
    center: &Pt3,
    distance: Real,
    max_tilt_rad: Real,
) -> Vec<Extrinsics> {
    (0..n_views)
        .map(|i| {
            let k = i as Real;
            let rx = max_tilt_rad * (1.3 * k + 0.4).sin();
            let ry = max_tilt_rad * (0.9 * k + 1.1).cos();
            let rz = 0.15 * (0.7 * k).sin();
            let rot = Rotation3::from_euler_angles(rx, ry, rz);
            let d = distance * (1.0 + 0.1 * (1.7 * k).sin());

            // cam = R (p - c) + (0, 0, d)
            let t = Vec3::new(0.0, 0.0, d) - rot * center.coords;
            Extrinsics::new(rot.scaled_axis(), t)
        })
        .collect()
}

/// Project the pattern for every pose, requiring every point to be projectable.
pub fn project_views(
    camera: &PinholeCamera,
    pattern: &PatternGeometry,
    poses: &[Extrinsics],
) -> Result<Vec<Correspondence>, CalibError> {
    project_views_noisy(camera, pattern, poses, &GaussianPixelNoise::default())
}

/// Like [`project_views`], adding deterministic Gaussian pixel noise.
pub fn project_views_noisy(
    camera: &PinholeCamera,
    pattern: &PatternGeometry,
    poses: &[Extrinsics],
    noise: &GaussianPixelNoise,
) -> Result<Vec<Correspondence>, CalibError> {
    poses
        .iter()
        .enumerate()
        .map(|(view_idx, pose)| {
            let pixels: Vec<Pt2> = project_points(pattern.points(), pose, camera)?
                .into_iter()
                .enumerate()
                .map(|(pt_idx, px)| px + noise.sample(view_idx, pt_idx))
                .collect();
            Correspondence::new(pattern.points().to_vec(), pixels)
        })
        .collect()
}

/// A pose whose rotation is `axis_angle`, placed so that the pattern centre
/// sits `distance` in front of the camera.
pub fn pose_facing(pattern: &PatternGeometry, axis_angle: Vec3, distance: Real) -> Extrinsics {
    let c = pattern_center(pattern);
    let r = matrix_from_axis_angle(&axis_angle);
    Extrinsics::new(axis_angle, Vec3::new(0.0, 0.0, distance) - r * c.coords)
}
