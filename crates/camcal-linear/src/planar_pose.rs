use camcal_core::{CalibError, Correspondence, Extrinsics, Mat3, PinholeCamera, Pt2, Real, Vec3};
use nalgebra::Rotation3;
use thiserror::Error;

use crate::homography::{dlt_homography, HomographyError};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlanarPoseError {
    #[error("intrinsics matrix is not invertible")]
    SingularIntrinsics,
    #[error("homography does not describe a plane in front of the camera")]
    Degenerate,
    #[error("svd failed")]
    SvdFailed,
    #[error(transparent)]
    Homography(#[from] HomographyError),
}

impl From<PlanarPoseError> for CalibError {
    fn from(err: PlanarPoseError) -> Self {
        match err {
            PlanarPoseError::Degenerate => CalibError::PoseDegenerate,
            PlanarPoseError::Homography(h) => h.into(),
            other => CalibError::Numerical(format!("planar pose: {other}")),
        }
    }
}

/// Estimate the pose of a planar board (`Z = 0`) relative to the camera from
/// its plane → image homography and the intrinsics `K`.
///
/// The sign of `H` is chosen so that the board lies in front of the camera,
/// and `[r1 r2 r1×r2]` is projected onto SO(3).
pub fn estimate_planar_pose_from_h(kmtx: &Mat3, hmtx: &Mat3) -> Result<Extrinsics, PlanarPoseError> {
    let k_inv = kmtx
        .try_inverse()
        .ok_or(PlanarPoseError::SingularIntrinsics)?;

    let k_inv_h1 = k_inv * hmtx.column(0);
    let k_inv_h2 = k_inv * hmtx.column(1);
    let k_inv_h3 = k_inv * hmtx.column(2);

    // Average the two column norms for the scale.
    let mean_norm = 0.5 * (k_inv_h1.norm() + k_inv_h2.norm());
    if mean_norm <= Real::EPSILON {
        return Err(PlanarPoseError::Degenerate);
    }
    let mut lambda = 1.0 / mean_norm;
    if k_inv_h3.z < 0.0 {
        lambda = -lambda;
    }

    let r1 = k_inv_h1 * lambda;
    let r2 = k_inv_h2 * lambda;
    let r3 = r1.cross(&r2);
    let t: Vec3 = k_inv_h3 * lambda;
    if t.z <= 0.0 || !t.z.is_finite() {
        return Err(PlanarPoseError::Degenerate);
    }

    let r_approx = Mat3::from_columns(&[r1, r2, r3]);
    let r_orth = nearest_rotation(&r_approx)?;

    Ok(Extrinsics::new(
        Rotation3::from_matrix_unchecked(r_orth).scaled_axis(),
        t,
    ))
}

/// Direct coplanar pose estimate for a view with known camera.
///
/// Observed pixels are undistorted into normalized coordinates, so the
/// homography is estimated against `K = I`.
pub fn estimate_planar_pose(
    camera: &PinholeCamera,
    view: &Correspondence,
) -> Result<Extrinsics, PlanarPoseError> {
    let normalized: Vec<Pt2> = view
        .points_2d
        .iter()
        .map(|px| Pt2::from(camera.normalize_pixel(px)))
        .collect();
    let h = dlt_homography(&view.planar_points(), &normalized)?;
    estimate_planar_pose_from_h(&Mat3::identity(), &h)
}

/// Polar projection onto SO(3) via SVD.
fn nearest_rotation(m: &Mat3) -> Result<Mat3, PlanarPoseError> {
    let svd = m
        .try_svd(true, true, Real::EPSILON, 0)
        .ok_or(PlanarPoseError::SvdFailed)?;
    let u = svd.u.ok_or(PlanarPoseError::SvdFailed)?;
    let v_t = svd.v_t.ok_or(PlanarPoseError::SvdFailed)?;

    let r = u * v_t;
    if r.determinant() < 0.0 {
        let mut u_flipped = u;
        u_flipped.column_mut(2).neg_mut();
        return Ok(u_flipped * v_t);
    }
    Ok(r)
}
