//! Non-linear least-squares refinement for planar-target calibration.
//!
//! A small problem/backend split: calibration problems implement
//! [`NllsProblem`] (residuals, optionally a structured Jacobian) and are
//! minimized by a [`NllsSolverBackend`]; [`LmBackend`] wraps the
//! `levenberg-marquardt` crate.

mod backend_lm;
mod params;
pub mod planar_intrinsics;
pub mod planar_pose;
mod traits;

pub use backend_lm::LmBackend;
pub use params::{BEHIND_CAMERA_PENALTY, POSE_DIM};
pub use planar_intrinsics::{
    refine_planar_intrinsics, DistortionFixMask, PlanarIntrinsicsEstimate,
    PlanarIntrinsicsProblem,
};
pub use planar_pose::{refine_planar_pose, PlanarPoseProblem};
pub use traits::{fd_step, NllsProblem, NllsSolverBackend, SolveOptions, SolveReport};
