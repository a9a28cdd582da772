//! Calibration and pose workflows built from the `camcal` building blocks.
//!
//! - [`calibrate`]: Zhang initialisation + joint LM refinement over planar views,
//! - [`evaluate`]: pooled RMS reprojection error,
//! - [`solve_pose`]: single-view pose with a fixed camera,
//! - [`sweep`]: calibration over growing image prefixes,
//! - [`run_pose_pipeline`]: pose table over many images,
//! - detector / image-source interfaces and the persisted [`CalibrationFile`].

mod calibrate;
mod calibration_file;
pub mod config;
pub mod evaluate;
pub mod io;
mod pose;
mod pose_pipeline;
mod sweep;

pub use calibrate::{calibrate, CalibrationResult, MIN_VIEWS};
pub use calibration_file::CalibrationFile;
pub use config::{CalibrationConfig, PatternConfig, SolverConfig, SweepConfig};
pub use evaluate::{evaluate, evaluate_pose, ReprojectionStats};
pub use io::{
    gather_observations, Detector, GatheredObservations, ImageObservation, ImageSource,
    PrecomputedDetections, SkipReason, SkippedImage,
};
pub use pose::{solve_pose, AxisOverlay, PoseResult};
pub use pose_pipeline::{run_pose_pipeline, write_pose_csv, PosePipelineOutcome, PoseRecord};
pub use sweep::{sweep, SweepOutcome, SweepRecord, SweepSeries};

pub use camcal_core::CalibError;
