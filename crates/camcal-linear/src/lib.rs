//! Linear initialisation for planar-target calibration.
//!
//! - normalized DLT homography between the pattern plane and the image,
//! - Zhang's closed-form intrinsics (zero skew) with a fixed-principal-point
//!   fallback,
//! - homography → pose decomposition for a single view.
//!
//! These estimates seed the nonlinear refinement in `camcal-optim`.

pub mod math;

mod homography;
mod planar_pose;
mod zhang_intrinsics;

pub use homography::*;
pub use planar_pose::*;
pub use zhang_intrinsics::*;
