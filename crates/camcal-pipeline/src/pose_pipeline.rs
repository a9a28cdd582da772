//! Pose estimation over a set of images with a stored calibration.

use std::io;

use camcal_core::{PinholeCamera, Real};
use camcal_optim::SolveOptions;
use log::{info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{ImageObservation, PoseResult, SkipReason, SkippedImage};

/// One row of the pose table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseRecord {
    pub translation_x: Real,
    pub translation_y: Real,
    pub translation_z: Real,
    pub rotation_x: Real,
    pub rotation_y: Real,
    pub rotation_z: Real,
    pub euler_x: Real,
    pub euler_y: Real,
    pub euler_z: Real,
    #[serde(rename = "inputImageFile")]
    pub input_image_file: String,
}

impl From<&PoseResult> for PoseRecord {
    fn from(r: &PoseResult) -> Self {
        let t = r.extrinsics.translation;
        let w = r.extrinsics.rotation;
        let e = r.euler.angles();
        Self {
            translation_x: t.x,
            translation_y: t.y,
            translation_z: t.z,
            rotation_x: w.x,
            rotation_y: w.y,
            rotation_z: w.z,
            euler_x: e.roll,
            euler_y: e.pitch,
            euler_z: e.yaw,
            input_image_file: r.image_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PosePipelineOutcome {
    /// Solved images in input order.
    pub poses: Vec<PoseResult>,
    pub skipped: Vec<SkippedImage>,
}

impl PosePipelineOutcome {
    pub fn records(&self) -> Vec<PoseRecord> {
        self.poses.iter().map(PoseRecord::from).collect()
    }
}

/// Write pose rows as CSV with a header line.
pub fn write_pose_csv<W: io::Write>(writer: W, records: &[PoseRecord]) -> csv::Result<()> {
    let mut w = csv::Writer::from_writer(writer);
    for r in records {
        w.serialize(r)?;
    }
    w.flush()?;
    Ok(())
}

/// Solve every observation's pose with a fixed camera.
///
/// Images run in parallel and results keep the input order. Images without a
/// correspondence are ignored (they were already reported when gathered);
/// per-image solver failures become skips.
pub fn run_pose_pipeline(
    observations: &[ImageObservation],
    camera: &PinholeCamera,
    opts: &SolveOptions,
) -> PosePipelineOutcome {
    let solved: Vec<Option<Result<PoseResult, SkippedImage>>> = observations
        .par_iter()
        .map(|obs| {
            let view = obs.correspondence.as_ref()?;
            Some(
                PoseResult::solve(obs.image_id.clone(), view, camera, opts).map_err(|e| {
                    SkippedImage {
                        image_id: obs.image_id.clone(),
                        reason: SkipReason::Rejected(e),
                    }
                }),
            )
        })
        .collect();

    let mut out = PosePipelineOutcome::default();
    for entry in solved.into_iter().flatten() {
        match entry {
            Ok(pose) => {
                let e = pose.euler.angles();
                info!(
                    "{}: t=({:.3}, {:.3}, {:.3}) euler=({:.4}, {:.4}, {:.4}) rms {:.3} px",
                    pose.image_id,
                    pose.extrinsics.translation.x,
                    pose.extrinsics.translation.y,
                    pose.extrinsics.translation.z,
                    e.roll,
                    e.pitch,
                    e.yaw,
                    pose.reprojection_rms
                );
                out.poses.push(pose);
            }
            Err(skip) => {
                warn!("skipping {}: {}", skip.image_id, skip.reason);
                out.skipped.push(skip);
            }
        }
    }
    out
}
