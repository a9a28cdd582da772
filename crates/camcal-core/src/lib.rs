//! Core math and geometry primitives for `camcal`.
//!
//! This crate contains:
//! - linear algebra type aliases (`Real`, `Pt2`, `Pt3`, ...),
//! - the pinhole camera model (intrinsics + Brown–Conrady distortion + pose),
//! - the shared point projection,
//! - rotation conversions (axis-angle, matrix, Euler with gimbal-lock handling),
//! - planar pattern geometry and per-view correspondences,
//! - the error taxonomy used by every stage.
//!
//! Camera pipeline:
//! `pixel = K ∘ distortion ∘ perspective_divide(R p + t)`

pub mod error;
/// Linear algebra type aliases and helpers.
pub mod math;
/// Camera models and distortion utilities.
pub mod models;
pub mod pattern;
pub mod projection;
pub mod rotation;
pub mod synthetic;

pub use error::CalibError;
pub use math::*;
pub use models::*;
pub use pattern::*;
pub use projection::{project_point, project_points};
pub use rotation::{EulerAngles, EulerDecomposition};
