//! Interfaces to image loading and corner detection, and the conversion of
//! their output into per-image correspondences.

use std::{collections::HashSet, fs, path::Path};

use camcal_core::{CalibError, Correspondence, Detection, ImageSize, PatternGeometry};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ImageLoadError {
    #[error("image {0} not found")]
    NotFound(String),
    #[error("image {id} could not be decoded: {reason}")]
    Unreadable { id: String, reason: String },
}

/// Source of raster images addressed by an identifier (usually a path).
pub trait ImageSource {
    type Image;

    fn load(&self, id: &str) -> Result<Self::Image, ImageLoadError>;
}

/// Chessboard corner detector.
///
/// Corners must be reported in the pattern's row-major order.
pub trait Detector<I> {
    fn detect(&self, image: &I, pattern: &PatternGeometry) -> Detection;
}

/// Stored detector output for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionEntry {
    pub id: String,
    #[serde(flatten)]
    pub detection: Detection,
}

#[derive(Debug, Error)]
pub enum DetectionsFileError {
    #[error("failed to read detections file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed detections file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("image id {0} appears more than once")]
    DuplicateId(String),
}

/// Detector results computed ahead of time, serving as both image source
/// and detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecomputedDetections {
    pub image_width: u32,
    pub image_height: u32,
    pub images: Vec<DetectionEntry>,
}

impl PrecomputedDetections {
    /// Read a detections file. Image ids must be unique.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DetectionsFileError> {
        let text = fs::read_to_string(path)?;
        let det: Self = serde_json::from_str(&text)?;
        det.check_unique_ids()?;
        Ok(det)
    }

    fn check_unique_ids(&self) -> Result<(), DetectionsFileError> {
        let mut seen = HashSet::with_capacity(self.images.len());
        match self.images.iter().find(|e| !seen.insert(e.id.as_str())) {
            Some(dup) => Err(DetectionsFileError::DuplicateId(dup.id.clone())),
            None => Ok(()),
        }
    }

    pub fn to_path(&self, path: impl AsRef<Path>) -> Result<(), DetectionsFileError> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn image_size(&self) -> ImageSize {
        ImageSize::new(self.image_width, self.image_height)
    }

    /// Image identifiers in file order.
    pub fn ids(&self) -> Vec<String> {
        self.images.iter().map(|e| e.id.clone()).collect()
    }
}

impl ImageSource for PrecomputedDetections {
    type Image = Detection;

    fn load(&self, id: &str) -> Result<Detection, ImageLoadError> {
        self.images
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.detection.clone())
            .ok_or_else(|| ImageLoadError::NotFound(id.to_string()))
    }
}

impl Detector<Detection> for PrecomputedDetections {
    fn detect(&self, image: &Detection, _pattern: &PatternGeometry) -> Detection {
        image.clone()
    }
}

/// One input image and its correspondence, if the pattern was usable.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageObservation {
    pub image_id: String,
    pub correspondence: Option<Correspondence>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SkipReason {
    #[error(transparent)]
    Load(#[from] ImageLoadError),
    #[error(transparent)]
    Rejected(#[from] CalibError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedImage {
    pub image_id: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GatheredObservations {
    /// One entry per requested id, in request order.
    pub observations: Vec<ImageObservation>,
    pub skipped: Vec<SkippedImage>,
}

impl GatheredObservations {
    pub fn valid_count(&self) -> usize {
        self.observations
            .iter()
            .filter(|o| o.correspondence.is_some())
            .count()
    }
}

/// Load, detect and pair every image.
///
/// Load failures and unusable detections become [`SkippedImage`] entries; the
/// image keeps its slot in `observations` with no correspondence.
pub fn gather_observations<S, D>(
    ids: &[String],
    source: &S,
    detector: &D,
    pattern: &PatternGeometry,
) -> GatheredObservations
where
    S: ImageSource,
    D: Detector<S::Image>,
{
    let mut out = GatheredObservations::default();
    for id in ids {
        let attempt = source
            .load(id)
            .map_err(SkipReason::from)
            .and_then(|image| {
                let detection = detector.detect(&image, pattern);
                Correspondence::from_detection(pattern, &detection).map_err(SkipReason::from)
            });

        let correspondence = match attempt {
            Ok(c) => Some(c),
            Err(reason) => {
                warn!("skipping {id}: {reason}");
                out.skipped.push(SkippedImage {
                    image_id: id.clone(),
                    reason,
                });
                None
            }
        };
        out.observations.push(ImageObservation {
            image_id: id.clone(),
            correspondence,
        });
    }

    info!(
        "pattern found in {} of {} images",
        out.valid_count(),
        ids.len()
    );
    out
}
