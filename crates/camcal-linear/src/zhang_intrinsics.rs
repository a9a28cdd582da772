//! Closed-form intrinsics initialisation from plane homographies.
//!
//! The skew-free variant of Zhang's method: with `B = K^-T K^-1` and no skew,
//! `B12 = 0` and each homography contributes two linear constraints on the
//! remaining five entries, so two views suffice. Homographies are first
//! conditioned by the image size (principal point moved to the image centre,
//! coordinates scaled by the larger dimension).
//!
//! When that system is degenerate (e.g. all boards parallel) or produces an
//! implausible camera, the principal point is pinned to the image centre and
//! only `fx`, `fy` are solved for.

use camcal_core::{CalibError, ImageSize, Intrinsics, Mat3, Real};
use log::{debug, warn};
use nalgebra::{DMatrix, SVector};
use thiserror::Error;

use crate::math::null_vector;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum IntrinsicsInitError {
    #[error("need at least {needed} homographies, got {got}")]
    NotEnoughHomographies { needed: usize, got: usize },
    #[error("degenerate homography set")]
    Degenerate,
    #[error("svd failed")]
    SvdFailed,
}

impl From<IntrinsicsInitError> for CalibError {
    fn from(err: IntrinsicsInitError) -> Self {
        match err {
            IntrinsicsInitError::NotEnoughHomographies { needed, got } => {
                CalibError::InsufficientViews { needed, got }
            }
            other => CalibError::Numerical(format!("intrinsics initialisation: {other}")),
        }
    }
}

/// Image-size conditioning `N`, mapping pixels to roughly unit, centred
/// coordinates.
fn conditioning(size: &ImageSize) -> (Mat3, Real) {
    let s = (size.width.max(size.height) as Real).max(1.0);
    let cx0 = 0.5 * size.width as Real;
    let cy0 = 0.5 * size.height as Real;
    #[rustfmt::skip]
    let n = Mat3::new(
        1.0 / s, 0.0,     -cx0 / s,
        0.0,     1.0 / s, -cy0 / s,
        0.0,     0.0,     1.0,
    );
    (n, s)
}

/// Skew-free `v_ij` over `(B11, B22, B13, B23, B33)`.
fn v_ij(h: &Mat3, i: usize, j: usize) -> SVector<Real, 5> {
    let hi = h.column(i);
    let hj = h.column(j);
    SVector::<Real, 5>::from_row_slice(&[
        hi[0] * hj[0],
        hi[1] * hj[1],
        hi[2] * hj[0] + hi[0] * hj[2],
        hi[2] * hj[1] + hi[1] * hj[2],
        hi[2] * hj[2],
    ])
}

/// Estimate zero-skew intrinsics from at least two plane → pixel homographies.
///
/// Falls back to [`estimate_focal_fixed_principal_point`] when the full
/// closed form is degenerate or implausible for `image_size`.
pub fn estimate_intrinsics(
    homographies: &[Mat3],
    image_size: ImageSize,
) -> Result<Intrinsics, IntrinsicsInitError> {
    if homographies.len() < 2 {
        return Err(IntrinsicsInitError::NotEnoughHomographies {
            needed: 2,
            got: homographies.len(),
        });
    }

    let (n, s) = conditioning(&image_size);
    let conditioned: Vec<Mat3> = homographies.iter().map(|h| n * h).collect();

    match closed_form(&conditioned) {
        Some((fx, fy, cx, cy)) => {
            let cx0 = 0.5 * image_size.width as Real;
            let cy0 = 0.5 * image_size.height as Real;
            let candidate = Intrinsics {
                fx: fx * s,
                fy: fy * s,
                cx: cx * s + cx0,
                cy: cy * s + cy0,
            };
            if is_plausible(&candidate, &image_size) {
                debug!(
                    "zhang init: fx={:.3} fy={:.3} cx={:.3} cy={:.3}",
                    candidate.fx, candidate.fy, candidate.cx, candidate.cy
                );
                return Ok(candidate);
            }
            warn!(
                "closed-form intrinsics implausible (fx={:.3} fy={:.3} cx={:.3} cy={:.3}); pinning principal point",
                candidate.fx, candidate.fy, candidate.cx, candidate.cy
            );
        }
        None => warn!("closed-form intrinsics degenerate; pinning principal point"),
    }

    estimate_focal_fixed_principal_point(homographies, image_size)
}

/// Solve for `fx`, `fy` with the principal point fixed at the image centre.
///
/// One homography is enough.
pub fn estimate_focal_fixed_principal_point(
    homographies: &[Mat3],
    image_size: ImageSize,
) -> Result<Intrinsics, IntrinsicsInitError> {
    if homographies.is_empty() {
        return Err(IntrinsicsInitError::NotEnoughHomographies { needed: 1, got: 0 });
    }

    let (n, s) = conditioning(&image_size);
    let m = homographies.len();

    // With cx = cy = 0 in conditioned coordinates B = diag(B11, B22, B33).
    let mut a = DMatrix::<Real>::zeros(2 * m, 3);
    for (k, h) in homographies.iter().enumerate() {
        let h = n * h;
        let (h1, h2) = (h.column(0), h.column(1));
        a[(2 * k, 0)] = h1[0] * h2[0];
        a[(2 * k, 1)] = h1[1] * h2[1];
        a[(2 * k, 2)] = h1[2] * h2[2];
        a[(2 * k + 1, 0)] = h1[0] * h1[0] - h2[0] * h2[0];
        a[(2 * k + 1, 1)] = h1[1] * h1[1] - h2[1] * h2[1];
        a[(2 * k + 1, 2)] = h1[2] * h1[2] - h2[2] * h2[2];
    }

    let b = null_vector(a).ok_or(IntrinsicsInitError::SvdFailed)?;
    let (b11, b22, b33) = (b[0], b[1], b[2]);
    let fx2 = b33 / b11;
    let fy2 = b33 / b22;
    if !(fx2 > 0.0 && fy2 > 0.0 && fx2.is_finite() && fy2.is_finite()) {
        return Err(IntrinsicsInitError::Degenerate);
    }

    let intr = Intrinsics {
        fx: fx2.sqrt() * s,
        fy: fy2.sqrt() * s,
        cx: 0.5 * image_size.width as Real,
        cy: 0.5 * image_size.height as Real,
    };
    debug!(
        "fixed-principal-point init: fx={:.3} fy={:.3}",
        intr.fx, intr.fy
    );
    Ok(intr)
}

/// Returns `(fx, fy, cx, cy)` in the homographies' coordinates.
fn closed_form(homographies: &[Mat3]) -> Option<(Real, Real, Real, Real)> {
    let m = homographies.len();
    let mut v = DMatrix::<Real>::zeros(2 * m, 5);
    for (k, h) in homographies.iter().enumerate() {
        let v12 = v_ij(h, 0, 1);
        let v11 = v_ij(h, 0, 0);
        let v22 = v_ij(h, 1, 1);
        v.row_mut(2 * k).copy_from(&v12.transpose());
        v.row_mut(2 * k + 1).copy_from(&(v11 - v22).transpose());
    }

    // The null space must be one-dimensional: reject when the second
    // smallest singular value vanishes as well (e.g. parallel boards).
    let v = if v.nrows() < 5 {
        v.resize_vertically(5, 0.0)
    } else {
        v
    };
    let svd = v.try_svd(false, true, Real::EPSILON, 0)?;
    let sv = &svd.singular_values;
    let mut order: Vec<usize> = (0..sv.len()).collect();
    order.sort_by(|&a, &b| sv[a].total_cmp(&sv[b]));
    if sv[order[1]] <= 1e-9 * sv[order[order.len() - 1]].max(Real::EPSILON) {
        debug!("zhang system rank deficient: {:?}", sv.as_slice());
        return None;
    }

    let v_t = svd.v_t?;
    let b = v_t.row(order[0]);
    let (b11, b22, b13, b23, b33) = (b[0], b[1], b[2], b[3], b[4]);
    if b11.abs() <= Real::EPSILON || b22.abs() <= Real::EPSILON {
        return None;
    }

    let cx = -b13 / b11;
    let cy = -b23 / b22;
    let lambda = b33 - b13 * b13 / b11 - b23 * b23 / b22;
    let fx2 = lambda / b11;
    let fy2 = lambda / b22;
    if !(fx2 > 0.0 && fy2 > 0.0 && fx2.is_finite() && fy2.is_finite()) {
        return None;
    }

    Some((fx2.sqrt(), fy2.sqrt(), cx, cy))
}

fn is_plausible(k: &Intrinsics, size: &ImageSize) -> bool {
    let (w, h) = (size.width as Real, size.height as Real);
    k.validate().is_ok()
        && k.cx > -0.5 * w
        && k.cx < 1.5 * w
        && k.cy > -0.5 * h
        && k.cy < 1.5 * h
        && k.fx / k.fy < 10.0
        && k.fy / k.fx < 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Rotation3, Vector3};

    fn k_gt() -> Intrinsics {
        Intrinsics::new(900.0, 880.0, 650.0, 350.0).unwrap()
    }

    fn synthetic_homography(k: &Mat3, rot: Rotation3<Real>, t: Vector3<Real>) -> Mat3 {
        // For a Z = 0 plane, H = K [r1 r2 t]
        let r = rot.matrix();
        let mut h = Mat3::zeros();
        h.set_column(0, &(k * r.column(0)));
        h.set_column(1, &(k * r.column(1)));
        h.set_column(2, &(k * t));
        h
    }

    fn size() -> ImageSize {
        ImageSize::new(1280, 720)
    }

    #[test]
    fn recovers_intrinsics_from_three_views() {
        let k = k_gt().k_matrix();
        let hs = vec![
            synthetic_homography(&k, Rotation3::from_euler_angles(0.1, 0.0, 0.05), Vector3::new(0.1, -0.05, 1.0)),
            synthetic_homography(&k, Rotation3::from_euler_angles(-0.05, 0.15, -0.1), Vector3::new(-0.05, 0.1, 1.2)),
            synthetic_homography(&k, Rotation3::from_euler_angles(0.2, -0.1, 0.0), Vector3::new(0.0, 0.0, 0.9)),
        ];

        let est = estimate_intrinsics(&hs, size()).unwrap();
        let gt = k_gt();
        assert!((est.fx - gt.fx).abs() < 1e-3, "fx {}", est.fx);
        assert!((est.fy - gt.fy).abs() < 1e-3, "fy {}", est.fy);
        assert!((est.cx - gt.cx).abs() < 1e-3, "cx {}", est.cx);
        assert!((est.cy - gt.cy).abs() < 1e-3, "cy {}", est.cy);
    }

    #[test]
    fn two_views_are_enough_without_skew() {
        let k = k_gt().k_matrix();
        let hs = vec![
            synthetic_homography(&k, Rotation3::from_euler_angles(0.3, 0.05, 0.1), Vector3::new(0.1, -0.05, 1.0)),
            synthetic_homography(&k, Rotation3::from_euler_angles(-0.1, 0.35, -0.2), Vector3::new(-0.05, 0.1, 1.2)),
        ];
        let est = estimate_intrinsics(&hs, size()).unwrap();
        assert!((est.fx - 900.0).abs() < 1e-2, "fx {}", est.fx);
        assert!((est.cy - 350.0).abs() < 1e-2, "cy {}", est.cy);
    }

    #[test]
    fn fixed_principal_point_from_single_view() {
        let gt = Intrinsics::new(800.0, 820.0, 640.0, 360.0).unwrap();
        let h = synthetic_homography(
            &gt.k_matrix(),
            Rotation3::from_euler_angles(0.3, -0.25, 0.1),
            Vector3::new(0.05, 0.02, 1.5),
        );
        let est = estimate_focal_fixed_principal_point(&[h], size()).unwrap();
        assert!((est.fx - 800.0).abs() < 1e-3, "fx {}", est.fx);
        assert!((est.fy - 820.0).abs() < 1e-3, "fy {}", est.fy);
        assert_eq!(est.cx, 640.0);
    }

    #[test]
    fn single_homography_is_insufficient() {
        let err = estimate_intrinsics(&[Mat3::identity()], size()).unwrap_err();
        assert_eq!(
            CalibError::from(err),
            CalibError::InsufficientViews { needed: 2, got: 1 }
        );
    }
}
