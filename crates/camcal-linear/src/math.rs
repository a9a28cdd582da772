//! Numerical helpers shared by the linear solvers.
//!
//! - **Hartley normalization** for 2D points (conditioning for DLT-style
//!   systems),
//! - a **collinearity test** used to reject degenerate views,
//! - **null-space extraction** for homogeneous systems `A x = 0`.
//!
//! # Example
//!
//! ```
//! use camcal_linear::math::normalize_points_2d;
//! use camcal_core::Pt2;
//!
//! let points = vec![
//!     Pt2::new(100.0, 200.0),
//!     Pt2::new(150.0, 250.0),
//!     Pt2::new(120.0, 220.0),
//! ];
//!
//! let (normalized, transform) = normalize_points_2d(&points).unwrap();
//! // normalized points have mean at origin, mean distance = sqrt(2)
//! assert_eq!(normalized.len(), 3);
//! ```

use camcal_core::{Mat3, Pt2, Real};
use nalgebra::{DMatrix, DVector};

/// Ratio of the smaller to the larger principal variance below which a point
/// set is treated as collinear.
pub const COLLINEARITY_TOL: Real = 1e-9;

/// Hartley normalization for 2D points.
///
/// Centers points at the origin and scales so that the mean distance from
/// the origin is `√2`.
///
/// Returns the normalized points and the 3×3 transform `T` such that
/// `p_norm = T * p_homogeneous`, or `None` if the input is empty or all points
/// coincide.
///
/// # References
///
/// Hartley & Zisserman, "Multiple View Geometry in Computer Vision", 2nd ed.,
/// Algorithm 4.2 (Normalized DLT)
pub fn normalize_points_2d(points: &[Pt2]) -> Option<(Vec<Pt2>, Mat3)> {
    let c = centroid(points)?;

    let mean_dist = points.iter().map(|p| (p - c).norm()).sum::<Real>() / points.len() as Real;
    if mean_dist <= Real::EPSILON {
        return None;
    }

    let scale = (2.0 as Real).sqrt() / mean_dist;
    #[rustfmt::skip]
    let t = Mat3::new(
        scale, 0.0,   -scale * c.x,
        0.0,   scale, -scale * c.y,
        0.0,   0.0,   1.0,
    );

    let norm = points
        .iter()
        .map(|p| Pt2::new((p.x - c.x) * scale, (p.y - c.y) * scale))
        .collect();

    Some((norm, t))
}

/// Whether the points lie (numerically) on a single line.
///
/// Compares the eigenvalues of the centered 2×2 scatter matrix. Fewer than
/// three points, or points that all coincide, count as collinear.
pub fn is_collinear(points: &[Pt2]) -> bool {
    if points.len() < 3 {
        return true;
    }
    let Some(c) = centroid(points) else {
        return true;
    };

    let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
    for p in points {
        let d = p - c;
        sxx += d.x * d.x;
        sxy += d.x * d.y;
        syy += d.y * d.y;
    }

    let half_trace = 0.5 * (sxx + syy);
    let disc = (0.25 * (sxx - syy) * (sxx - syy) + sxy * sxy).sqrt();
    let l_max = half_trace + disc;
    let l_min = (half_trace - disc).max(0.0);

    l_max <= Real::EPSILON || l_min / l_max < COLLINEARITY_TOL
}

/// Unit vector minimizing `|A x|`, i.e. the right singular vector belonging
/// to the smallest singular value.
///
/// Under-determined systems are padded with zero rows so the full right
/// singular basis is available.
pub fn null_vector(a: DMatrix<Real>) -> Option<DVector<Real>> {
    let (rows, cols) = a.shape();
    let a = if rows < cols {
        a.resize_vertically(cols, 0.0)
    } else {
        a
    };

    let svd = a.try_svd(false, true, Real::EPSILON, 0)?;
    let v_t = svd.v_t?;
    let idx = svd.singular_values.imin();
    Some(v_t.row(idx).transpose())
}

/// Reshape a 9-vector (row-major) into a 3×3 matrix.
pub fn mat3_from_row_major(v: &DVector<Real>) -> Mat3 {
    Mat3::from_fn(|r, c| v[3 * r + c])
}

fn centroid(points: &[Pt2]) -> Option<Pt2> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as Real;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Some(Pt2::new(sx / n, sy / n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_centers_and_scales() {
        let pts = vec![
            Pt2::new(10.0, 20.0),
            Pt2::new(30.0, 40.0),
            Pt2::new(50.0, 10.0),
            Pt2::new(-5.0, 7.0),
        ];
        let (norm, t) = normalize_points_2d(&pts).unwrap();

        let cx: Real = norm.iter().map(|p| p.x).sum::<Real>() / norm.len() as Real;
        let cy: Real = norm.iter().map(|p| p.y).sum::<Real>() / norm.len() as Real;
        assert!(cx.abs() < 1e-12);
        assert!(cy.abs() < 1e-12);

        let mean_dist: Real =
            norm.iter().map(|p| p.coords.norm()).sum::<Real>() / norm.len() as Real;
        assert!((mean_dist - (2.0 as Real).sqrt()).abs() < 1e-12);

        let mapped = t * pts[2].to_homogeneous();
        assert!((mapped.x / mapped.z - norm[2].x).abs() < 1e-12);
    }

    #[test]
    fn normalize_rejects_coincident_points() {
        assert!(normalize_points_2d(&[]).is_none());
        assert!(normalize_points_2d(&[Pt2::new(1.0, 1.0); 4]).is_none());
    }

    #[test]
    fn collinearity_is_detected() {
        let line: Vec<Pt2> = (0..10)
            .map(|i| Pt2::new(i as Real * 3.0 + 100.0, i as Real * 1.5 + 50.0))
            .collect();
        assert!(is_collinear(&line));

        let mut bent = line.clone();
        bent[5].y += 1.0;
        assert!(!is_collinear(&bent));

        assert!(is_collinear(&[Pt2::new(0.0, 0.0), Pt2::new(1.0, 1.0)]));
    }

    #[test]
    fn null_vector_of_underdetermined_system() {
        // x + y + z = 0 and x - y = 0 -> null space along (1, 1, -2)
        let a = DMatrix::from_row_slice(2, 3, &[1.0, 1.0, 1.0, 1.0, -1.0, 0.0]);
        let v = null_vector(a).unwrap();
        let expected = DVector::from_vec(vec![1.0, 1.0, -2.0]).normalize();
        assert!((v.dot(&expected).abs() - 1.0).abs() < 1e-10);
    }
}
