//! Deterministic synthetic data generation helpers.
//!
//! This module provides small, reusable building blocks for constructing
//! synthetic calibration problems used in tests and examples:
//! - pose generators around a planar pattern,
//! - projection helpers producing [`crate::Correspondence`],
//! - deterministic pseudo-random noise utilities.
//!
//! # Example
//!
//! ```
//! use camcal_core::{synthetic::planar, Intrinsics, PatternGeometry, PinholeCamera};
//!
//! let cam = PinholeCamera::ideal(Intrinsics::new(800.0, 800.0, 320.0, 240.0).unwrap());
//! let pattern = PatternGeometry::new(9, 6, 1.0).unwrap();
//! let poses = planar::orbit_poses(5, &planar::pattern_center(&pattern), 15.0, 0.3);
//! let views = planar::project_views(&cam, &pattern, &poses).unwrap();
//! assert_eq!(views.len(), 5);
//! ```

pub mod noise;
pub mod planar;
