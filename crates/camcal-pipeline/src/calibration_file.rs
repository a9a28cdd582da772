//! Persisted calibration parameters consumed by the pose pipeline.

use std::{fs, io, path::Path};

use camcal_core::{
    BrownConrady5, CalibError, ImageSize, Intrinsics, Mat3, PatternGeometry, PinholeCamera, Real,
};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{CalibrationResult, PatternConfig};

/// JSON calibration record.
///
/// Key names follow the OpenCV calibration sample so existing files convert
/// one-to-one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationFile {
    /// Row-major 3×3 camera matrix.
    pub camera_matrix: [[Real; 3]; 3],
    /// `k1 k2 p1 p2 [k3]`.
    pub distortion_coefficients: Vec<Real>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_height: Option<u32>,
    #[serde(rename = "BoardSize_Width")]
    pub board_width: usize,
    #[serde(rename = "BoardSize_Height")]
    pub board_height: usize,
    #[serde(rename = "Square_Size")]
    pub square_size: Real,
    #[serde(rename = "Calibrate_Pattern")]
    pub pattern_kind: String,
}

fn unreadable(reason: impl Into<String>) -> CalibError {
    CalibError::CalibrationFileUnreadable {
        reason: reason.into(),
    }
}

impl CalibrationFile {
    pub fn from_result(result: &CalibrationResult, pattern: &PatternConfig) -> Self {
        let k = result.intrinsics.k_matrix();
        Self {
            camera_matrix: [
                [k[(0, 0)], k[(0, 1)], k[(0, 2)]],
                [k[(1, 0)], k[(1, 1)], k[(1, 2)]],
                [k[(2, 0)], k[(2, 1)], k[(2, 2)]],
            ],
            distortion_coefficients: result.distortion.coefficients().to_vec(),
            image_width: Some(result.image_size.width),
            image_height: Some(result.image_size.height),
            board_width: pattern.cols,
            board_height: pattern.rows,
            square_size: pattern.square_size,
            pattern_kind: pattern.kind.clone(),
        }
    }

    /// Read and validate a calibration record.
    ///
    /// # Errors
    ///
    /// [`CalibError::CalibrationFileUnreadable`] if the file cannot be read or
    /// parsed, a required key is absent, or the camera, distortion or pattern
    /// entries are unusable.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CalibError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| unreadable(format!("{}: {e}", path.display())))?;
        let file: Self = serde_json::from_str(&text)
            .map_err(|e| unreadable(format!("{}: {e}", path.display())))?;

        file.camera()?;
        file.pattern()?;
        debug!(
            "loaded calibration for {}x{} {} pattern from {}",
            file.board_width,
            file.board_height,
            file.pattern_kind,
            path.display()
        );
        Ok(file)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let text = serde_json::to_string_pretty(self).map_err(io::Error::other)?;
        fs::write(path, text)
    }

    pub fn camera(&self) -> Result<PinholeCamera, CalibError> {
        let m = &self.camera_matrix;
        #[rustfmt::skip]
        let k = Mat3::new(
            m[0][0], m[0][1], m[0][2],
            m[1][0], m[1][1], m[1][2],
            m[2][0], m[2][1], m[2][2],
        );
        let intrinsics = Intrinsics::try_from_k_matrix(&k)
            .ok_or_else(|| unreadable("camera_matrix is not a zero-skew pinhole matrix"))?;
        let distortion = BrownConrady5::from_coefficients(&self.distortion_coefficients)
            .map_err(|e| unreadable(format!("distortion_coefficients: {e}")))?;
        Ok(PinholeCamera::new(intrinsics, distortion))
    }

    pub fn pattern(&self) -> Result<PatternGeometry, CalibError> {
        PatternGeometry::new(self.board_width, self.board_height, self.square_size)
            .map_err(|e| unreadable(format!("board: {e}")))
    }

    pub fn image_size(&self) -> Option<ImageSize> {
        Some(ImageSize::new(self.image_width?, self.image_height?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camcal_optim::SolveReport;

    fn result() -> CalibrationResult {
        CalibrationResult {
            intrinsics: Intrinsics::new(812.5, 810.25, 319.5, 241.0).unwrap(),
            distortion: BrownConrady5 {
                k1: -0.21,
                k2: 0.07,
                p1: 0.001,
                p2: -0.002,
                k3: 0.0,
            },
            extrinsics: Vec::new(),
            dropped_views: Vec::new(),
            rms: 0.31,
            image_size: ImageSize::new(640, 480),
            report: SolveReport {
                evaluations: 12,
                final_cost: 1.0,
                converged: true,
            },
        }
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calib.json");
        let file = CalibrationFile::from_result(&result(), &PatternConfig::default());
        file.save(&path).unwrap();

        let back = CalibrationFile::load(&path).unwrap();
        assert_eq!(back, file);
        assert_eq!(back.camera().unwrap(), result().camera());
        assert_eq!(back.pattern().unwrap().len(), 54);
        assert_eq!(back.image_size(), Some(ImageSize::new(640, 480)));
    }

    #[test]
    fn missing_key_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calib.json");
        fs::write(
            &path,
            r#"{ "camera_matrix": [[800, 0, 320], [0, 800, 240], [0, 0, 1]],
                 "BoardSize_Width": 9, "BoardSize_Height": 6,
                 "Square_Size": 1.0, "Calibrate_Pattern": "chessboard" }"#,
        )
        .unwrap();

        let err = CalibrationFile::load(&path).unwrap_err();
        match err {
            CalibError::CalibrationFileUnreadable { reason } => {
                assert!(reason.contains("distortion_coefficients"), "{reason}")
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn invalid_contents_are_unreadable() {
        let mut file = CalibrationFile::from_result(&result(), &PatternConfig::default());
        file.camera_matrix[0][1] = 3.0;
        assert!(matches!(
            file.camera(),
            Err(CalibError::CalibrationFileUnreadable { .. })
        ));

        let mut file = CalibrationFile::from_result(&result(), &PatternConfig::default());
        file.distortion_coefficients.truncate(3);
        assert!(file.camera().is_err());

        let err = CalibrationFile::load("/nonexistent/calib.json").unwrap_err();
        assert!(!err.is_recoverable());
    }
}
