//! Planar pattern geometry and per-view 2D-3D correspondences.

use serde::{Deserialize, Serialize};

use crate::{CalibError, Pt2, Pt3, Real};

/// Inner-corner grid of a planar calibration target on the plane `z = 0`.
///
/// Points are enumerated row-major: for each row `i` in `0..rows`, for each
/// column `j` in `0..cols`, the point `(j * square_size, i * square_size, 0)`.
/// Detectors must report corners in the same raster order.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternGeometry {
    pub cols: usize,
    pub rows: usize,
    pub square_size: Real,
    points: Vec<Pt3>,
}

impl PatternGeometry {
    pub fn new(cols: usize, rows: usize, square_size: Real) -> Result<Self, CalibError> {
        if cols < 2 || rows < 2 {
            return Err(CalibError::InvalidConfig(format!(
                "pattern needs at least 2x2 corners, got {cols}x{rows}"
            )));
        }
        if !(square_size > 0.0 && square_size.is_finite()) {
            return Err(CalibError::InvalidConfig(format!(
                "square size must be positive, got {square_size}"
            )));
        }

        let mut points = Vec::with_capacity(cols * rows);
        for i in 0..rows {
            for j in 0..cols {
                points.push(Pt3::new(
                    j as Real * square_size,
                    i as Real * square_size,
                    0.0,
                ));
            }
        }

        Ok(Self {
            cols,
            rows,
            square_size,
            points,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Pt3] {
        &self.points
    }

    /// Axis end points three squares long, used for pose overlays.
    ///
    /// The z axis points towards the camera (negative pattern z).
    pub fn axis_points(&self) -> [Pt3; 3] {
        let l = 3.0 * self.square_size;
        [
            Pt3::new(l, 0.0, 0.0),
            Pt3::new(0.0, l, 0.0),
            Pt3::new(0.0, 0.0, -l),
        ]
    }
}

/// Raw output of a corner detector for one image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub found: bool,
    #[serde(default)]
    pub points: Vec<Pt2>,
}

impl Detection {
    pub fn found(points: Vec<Pt2>) -> Self {
        Self {
            found: true,
            points,
        }
    }

    pub fn missing() -> Self {
        Self::default()
    }
}

/// One observed view: pattern points paired position-by-position with image
/// points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correspondence {
    /// Pattern points (z = 0).
    pub points_3d: Vec<Pt3>,
    /// Observed pixels, same length and order as `points_3d`.
    pub points_2d: Vec<Pt2>,
}

impl Correspondence {
    /// Pair explicit point lists.
    ///
    /// # Errors
    ///
    /// Returns [`CalibError::CorrespondenceMismatch`] if the lengths differ.
    pub fn new(points_3d: Vec<Pt3>, points_2d: Vec<Pt2>) -> Result<Self, CalibError> {
        if points_3d.len() != points_2d.len() {
            return Err(CalibError::CorrespondenceMismatch {
                expected: points_3d.len(),
                got: points_2d.len(),
            });
        }
        Ok(Self {
            points_3d,
            points_2d,
        })
    }

    /// Build a correspondence from a detector result.
    ///
    /// # Errors
    ///
    /// - [`CalibError::DetectionMissing`] if the detector did not find the pattern.
    /// - [`CalibError::CorrespondenceMismatch`] if the point count differs from
    ///   `rows * cols`.
    pub fn from_detection(
        pattern: &PatternGeometry,
        detection: &Detection,
    ) -> Result<Self, CalibError> {
        if !detection.found {
            return Err(CalibError::DetectionMissing);
        }
        Self::new(pattern.points().to_vec(), detection.points.clone()).map_err(|_| {
            CalibError::CorrespondenceMismatch {
                expected: pattern.len(),
                got: detection.points.len(),
            }
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points_3d.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points_3d.is_empty()
    }

    /// Pattern points projected onto the plane (x, y).
    pub fn planar_points(&self) -> Vec<Pt2> {
        self.points_3d.iter().map(|p| Pt2::new(p.x, p.y)).collect()
    }

    /// Whether every pattern point lies on `z = 0`.
    pub fn is_planar(&self) -> bool {
        self.points_3d.iter().all(|p| p.z.abs() < 1e-9)
    }

    /// Iterate over (3D point, 2D point) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&Pt3, &Pt2)> {
        self.points_3d.iter().zip(self.points_2d.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_order_is_row_major() {
        let pattern = PatternGeometry::new(9, 6, 2.0).unwrap();
        assert_eq!(pattern.len(), 54);
        let pts = pattern.points();
        assert_eq!(pts[0], Pt3::new(0.0, 0.0, 0.0));
        assert_eq!(pts[1], Pt3::new(2.0, 0.0, 0.0));
        assert_eq!(pts[8], Pt3::new(16.0, 0.0, 0.0));
        assert_eq!(pts[9], Pt3::new(0.0, 2.0, 0.0));
        assert_eq!(pts[53], Pt3::new(16.0, 10.0, 0.0));
    }

    #[test]
    fn rejects_bad_dimensions() {
        assert!(PatternGeometry::new(1, 6, 1.0).is_err());
        assert!(PatternGeometry::new(9, 6, 0.0).is_err());
    }

    #[test]
    fn detection_missing_is_reported() {
        let pattern = PatternGeometry::new(3, 2, 1.0).unwrap();
        let err = Correspondence::from_detection(&pattern, &Detection::missing()).unwrap_err();
        assert_eq!(err, CalibError::DetectionMissing);
    }

    #[test]
    fn point_count_mismatch_is_reported() {
        let pattern = PatternGeometry::new(3, 2, 1.0).unwrap();
        let det = Detection::found(vec![Pt2::new(1.0, 1.0); 5]);
        let err = Correspondence::from_detection(&pattern, &det).unwrap_err();
        assert_eq!(
            err,
            CalibError::CorrespondenceMismatch {
                expected: 6,
                got: 5
            }
        );
    }

    #[test]
    fn detection_pairs_by_position() {
        let pattern = PatternGeometry::new(3, 2, 1.0).unwrap();
        let pixels: Vec<Pt2> = (0..6).map(|i| Pt2::new(i as Real, 0.0)).collect();
        let corr = Correspondence::from_detection(&pattern, &Detection::found(pixels)).unwrap();
        assert_eq!(corr.len(), 6);
        assert!(corr.is_planar());
        let (p3, p2) = corr.iter().nth(4).unwrap();
        assert_eq!(*p3, Pt3::new(1.0, 1.0, 0.0));
        assert_eq!(*p2, Pt2::new(4.0, 0.0));
    }

    #[test]
    fn correspondence_serde_roundtrip() {
        let corr = Correspondence::new(vec![Pt3::new(0.0, 0.0, 0.0)], vec![Pt2::new(1.0, 2.0)])
            .unwrap();
        let json = serde_json::to_string(&corr).unwrap();
        let back: Correspondence = serde_json::from_str(&json).unwrap();
        assert_eq!(back, corr);
    }
}
