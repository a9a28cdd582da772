use camcal_core::{CalibError, Mat3, Pt2};
use log::debug;
use nalgebra::DMatrix;
use thiserror::Error;

use crate::math::{is_collinear, mat3_from_row_major, normalize_points_2d, null_vector};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum HomographyError {
    #[error("need at least 4 point correspondences, got {0}")]
    NotEnoughPoints(usize),
    #[error("point lists differ in length: {plane} plane vs {image} image points")]
    LengthMismatch { plane: usize, image: usize },
    #[error("points are collinear")]
    Degenerate,
    #[error("svd failed")]
    SvdFailed,
}

impl From<HomographyError> for CalibError {
    fn from(err: HomographyError) -> Self {
        match err {
            HomographyError::Degenerate => CalibError::PoseDegenerate,
            HomographyError::LengthMismatch { plane, image } => CalibError::CorrespondenceMismatch {
                expected: plane,
                got: image,
            },
            other => CalibError::Numerical(format!("homography: {other}")),
        }
    }
}

/// Estimate `H` such that `x' ~ H x` with the normalized DLT.
///
/// Both point sets are Hartley-normalized before the linear system is built
/// and the result is de-normalized and scaled so that `H[2,2] = 1` whenever
/// that entry is not vanishing.
pub fn dlt_homography(plane: &[Pt2], image: &[Pt2]) -> Result<Mat3, HomographyError> {
    let n = plane.len();
    if image.len() != n {
        return Err(HomographyError::LengthMismatch {
            plane: n,
            image: image.len(),
        });
    }
    if n < 4 {
        return Err(HomographyError::NotEnoughPoints(n));
    }
    if is_collinear(plane) || is_collinear(image) {
        return Err(HomographyError::Degenerate);
    }

    let (pn, t_plane) = normalize_points_2d(plane).ok_or(HomographyError::Degenerate)?;
    let (qn, t_image) = normalize_points_2d(image).ok_or(HomographyError::Degenerate)?;

    let mut a = DMatrix::<f64>::zeros(2 * n, 9);
    for (i, (p, q)) in pn.iter().zip(qn.iter()).enumerate() {
        let (x, y) = (p.x, p.y);
        let (u, v) = (q.x, q.y);

        let r0 = 2 * i;
        let r1 = r0 + 1;

        a[(r0, 0)] = -x;
        a[(r0, 1)] = -y;
        a[(r0, 2)] = -1.0;
        a[(r0, 6)] = u * x;
        a[(r0, 7)] = u * y;
        a[(r0, 8)] = u;

        a[(r1, 3)] = -x;
        a[(r1, 4)] = -y;
        a[(r1, 5)] = -1.0;
        a[(r1, 6)] = v * x;
        a[(r1, 7)] = v * y;
        a[(r1, 8)] = v;
    }

    let h = null_vector(a).ok_or(HomographyError::SvdFailed)?;
    let h_norm = mat3_from_row_major(&h);

    // H = T_image^-1 * H_norm * T_plane
    let t_image_inv = t_image.try_inverse().ok_or(HomographyError::SvdFailed)?;
    let mut h_mat = t_image_inv * h_norm * t_plane;

    let scale = h_mat[(2, 2)];
    if scale.abs() > f64::EPSILON {
        h_mat /= scale;
    } else {
        debug!("homography has vanishing H[2,2]; leaving unnormalized");
    }

    Ok(h_mat)
}

/// Apply `H` to a point, returning `None` when it maps to infinity.
pub fn apply_homography(h: &Mat3, p: &Pt2) -> Option<Pt2> {
    let v = h * p.to_homogeneous();
    if v.z.abs() <= f64::EPSILON {
        return None;
    }
    Some(Pt2::new(v.x / v.z, v.y / v.z))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaled_square() {
        let w = vec![
            Pt2::new(0.0, 0.0),
            Pt2::new(1.0, 0.0),
            Pt2::new(1.0, 1.0),
            Pt2::new(0.0, 1.0),
        ];
        let img = vec![
            Pt2::new(0.0, 0.0),
            Pt2::new(2.0, 0.0),
            Pt2::new(2.0, 2.0),
            Pt2::new(0.0, 2.0),
        ];

        let h = dlt_homography(&w, &img).unwrap();
        assert!((h[(0, 0)] - 2.0).abs() < 1e-9);
        assert!((h[(1, 1)] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn recovers_projective_map() {
        #[rustfmt::skip]
        let h_gt = Mat3::new(
            820.0, 15.0, 300.0,
            -10.0, 790.0, 220.0,
            0.02, -0.01, 1.0,
        );
        let plane: Vec<Pt2> = (0..6)
            .flat_map(|i| (0..9).map(move |j| Pt2::new(j as f64, i as f64)))
            .collect();
        let image: Vec<Pt2> = plane
            .iter()
            .map(|p| apply_homography(&h_gt, p).unwrap())
            .collect();

        let h = dlt_homography(&plane, &image).unwrap();
        for p in &plane {
            let a = apply_homography(&h, p).unwrap();
            let b = apply_homography(&h_gt, p).unwrap();
            assert!((a - b).norm() < 1e-6, "transfer error {}", (a - b).norm());
        }
    }

    #[test]
    fn collinear_points_are_rejected() {
        let plane: Vec<Pt2> = (0..5).map(|i| Pt2::new(i as f64, 0.0)).collect();
        let image: Vec<Pt2> = (0..5).map(|i| Pt2::new(10.0 * i as f64, 3.0)).collect();
        assert_eq!(
            dlt_homography(&plane, &image).unwrap_err(),
            HomographyError::Degenerate
        );
        assert_eq!(
            CalibError::from(HomographyError::Degenerate),
            CalibError::PoseDegenerate
        );
    }

    #[test]
    fn too_few_points() {
        let p = vec![Pt2::new(0.0, 0.0); 3];
        assert_eq!(
            dlt_homography(&p, &p).unwrap_err(),
            HomographyError::NotEnoughPoints(3)
        );
    }
}
