//! Calibration quality as a function of the number of images.
//!
//! Every batch takes the first `batch_size` images in input order, so larger
//! batches are supersets of smaller ones.

use camcal_core::{CalibError, Correspondence, ImageSize, Real};
use log::{info, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::{calibrate, CalibrationConfig, CalibrationResult, ImageObservation, SweepConfig};

/// Outcome of one batch size.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepRecord {
    pub batch_size: usize,
    /// Images within the batch whose pattern was usable.
    pub valid_views: usize,
    pub result: Result<CalibrationResult, CalibError>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepOutcome {
    /// One record per batch size with at least one valid view, ascending.
    pub records: Vec<SweepRecord>,
    /// Batch sizes without any valid view.
    pub skipped_batches: Vec<usize>,
}

/// Per-statistic series over the successful batches.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SweepSeries {
    pub batch_size: Vec<usize>,
    pub fx: Vec<Real>,
    pub fy: Vec<Real>,
    pub cx: Vec<Real>,
    pub cy: Vec<Real>,
    pub rms: Vec<Real>,
}

impl SweepOutcome {
    pub fn successes(&self) -> impl Iterator<Item = (usize, &CalibrationResult)> {
        self.records
            .iter()
            .filter_map(|r| r.result.as_ref().ok().map(|res| (r.batch_size, res)))
    }

    /// The result of the largest batch that calibrated successfully.
    pub fn best(&self) -> Option<&CalibrationResult> {
        self.successes().last().map(|(_, r)| r)
    }

    pub fn series(&self) -> SweepSeries {
        let mut s = SweepSeries::default();
        for (batch_size, r) in self.successes() {
            s.batch_size.push(batch_size);
            s.fx.push(r.intrinsics.fx);
            s.fy.push(r.intrinsics.fy);
            s.cx.push(r.intrinsics.cx);
            s.cy.push(r.intrinsics.cy);
            s.rms.push(r.rms);
        }
        s
    }
}

/// Calibrate on growing prefixes of `observations`.
///
/// Batches run in parallel; records come back ordered by batch size.
///
/// # Errors
///
/// Only configuration errors abort the sweep; per-batch failures are kept in
/// the corresponding [`SweepRecord`].
pub fn sweep(
    observations: &[ImageObservation],
    image_size: ImageSize,
    sweep_config: &SweepConfig,
    calib_config: &CalibrationConfig,
) -> Result<SweepOutcome, CalibError> {
    sweep_config.validate()?;
    let sizes = sweep_config.batch_sizes(observations.len());
    info!(
        "sweeping {} batch sizes over {} images",
        sizes.len(),
        observations.len()
    );

    let outcomes: Vec<(usize, Option<SweepRecord>)> = sizes
        .par_iter()
        .map(|&batch_size| {
            let views: Vec<Correspondence> = observations[..batch_size]
                .iter()
                .filter_map(|o| o.correspondence.clone())
                .collect();
            if views.is_empty() {
                return (batch_size, None);
            }
            let result = calibrate(&views, image_size, calib_config);
            (
                batch_size,
                Some(SweepRecord {
                    batch_size,
                    valid_views: views.len(),
                    result,
                }),
            )
        })
        .collect();

    let mut out = SweepOutcome::default();
    for (batch_size, record) in outcomes {
        match record {
            Some(record) => {
                match &record.result {
                    Ok(r) => info!(
                        "batch {batch_size}: {} views, rms {:.4} px",
                        record.valid_views, r.rms
                    ),
                    Err(e) => warn!("batch {batch_size}: {e}"),
                }
                out.records.push(record);
            }
            None => {
                warn!("batch {batch_size}: no valid views, skipped");
                out.skipped_batches.push(batch_size);
            }
        }
    }
    Ok(out)
}
