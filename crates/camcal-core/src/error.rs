//! Error taxonomy shared by every stage of the calibration workflow.

use crate::Real;
use thiserror::Error;

/// Failures produced by detection handling, calibration, evaluation and pose
/// solving.
///
/// Per-image and per-batch failures are recoverable: the surrounding loop
/// records them and moves on. File and configuration failures are fatal.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CalibError {
    /// The detector reported that the pattern was not found in the image.
    #[error("calibration pattern not detected")]
    DetectionMissing,
    /// The detector returned a point list that does not match the pattern.
    #[error("detected {got} points, pattern has {expected}")]
    CorrespondenceMismatch { expected: usize, got: usize },
    /// Too few valid views to initialise the calibration.
    #[error("need at least {needed} valid views, got {got}")]
    InsufficientViews { needed: usize, got: usize },
    /// The view's points are (numerically) collinear; no pose exists.
    #[error("degenerate view: points are collinear")]
    PoseDegenerate,
    /// A point ended up on or behind the camera plane.
    #[error("point {point} has non-positive depth {depth:.6}")]
    InvalidGeometry { point: usize, depth: Real },
    /// The persisted calibration parameters could not be used.
    #[error("calibration file unreadable: {reason}")]
    CalibrationFileUnreadable { reason: String },
    /// Pattern points do not lie on the plane z = 0.
    #[error("pattern points are not planar (z = 0)")]
    NonPlanarPattern,
    /// A configuration value makes the requested operation meaningless.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A linear-algebra step broke down (SVD failure, degenerate system).
    #[error("numerical failure: {0}")]
    Numerical(String),
}

impl CalibError {
    /// Whether processing may continue with the next image or batch.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            CalibError::CalibrationFileUnreadable { .. } | CalibError::InvalidConfig(_)
        )
    }
}

pub type Result<T, E = CalibError> = std::result::Result<T, E>;
