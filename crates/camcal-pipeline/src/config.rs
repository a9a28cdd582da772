//! Configuration for calibration, sweeps and the calibration pattern.
//!
//! Every structure is `serde`-(de)serializable and has a `Default` matching
//! the usual chessboard workflow; missing JSON fields fall back to defaults.

use std::{fs, path::Path};

use camcal_core::{CalibError, PatternGeometry, Real};
use camcal_optim::{DistortionFixMask, SolveOptions};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Termination criteria for the Levenberg–Marquardt refinements.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub max_iters: usize,
    pub ftol: Real,
    pub xtol: Real,
    pub gtol: Real,
}

impl Default for SolverConfig {
    fn default() -> Self {
        let opts = SolveOptions::default();
        Self {
            max_iters: opts.max_iters,
            ftol: opts.ftol,
            xtol: opts.xtol,
            gtol: opts.gtol,
        }
    }
}

impl SolverConfig {
    pub fn solve_options(&self) -> SolveOptions {
        SolveOptions {
            max_iters: self.max_iters,
            ftol: self.ftol,
            xtol: self.xtol,
            gtol: self.gtol,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub solver: SolverConfig,
    /// Hold k3 at zero.
    pub fix_k3: bool,
    /// Hold p1, p2 at zero.
    pub fix_tangential: bool,
    /// Estimate a distortion-free camera.
    pub zero_distortion: bool,
}

impl CalibrationConfig {
    pub fn distortion_mask(&self) -> DistortionFixMask {
        if self.zero_distortion {
            return DistortionFixMask::all();
        }
        DistortionFixMask {
            radial: false,
            tangential: self.fix_tangential,
            k3: self.fix_k3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub step: usize,
    pub max_batch: usize,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            step: 5,
            max_batch: 155,
        }
    }
}

impl SweepConfig {
    /// Reject settings that would produce an empty or endless sweep.
    pub fn validate(&self) -> Result<(), CalibError> {
        if self.step == 0 {
            return Err(CalibError::InvalidConfig("sweep step must be positive".into()));
        }
        if self.max_batch == 0 {
            return Err(CalibError::InvalidConfig(
                "sweep max_batch must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Batch sizes `step, 2 * step, ...` up to `min(max_batch, total)`.
    pub fn batch_sizes(&self, total: usize) -> Vec<usize> {
        if self.step == 0 {
            return Vec::new();
        }
        let upper = self.max_batch.min(total);
        (self.step..=upper).step_by(self.step).collect()
    }
}

/// Inner-corner layout of the calibration target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    pub cols: usize,
    pub rows: usize,
    pub square_size: Real,
    pub kind: String,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            cols: 9,
            rows: 6,
            square_size: 1.0,
            kind: "chessboard".to_string(),
        }
    }
}

impl PatternConfig {
    pub fn geometry(&self) -> Result<PatternGeometry, CalibError> {
        PatternGeometry::new(self.cols, self.rows, self.square_size)
    }
}

/// Read a JSON config file, or the default when `path` is `None`.
pub fn load_config<T: DeserializeOwned + Default>(path: Option<&Path>) -> Result<T, CalibError> {
    let Some(path) = path else {
        return Ok(T::default());
    };
    let text = fs::read_to_string(path)
        .map_err(|e| CalibError::InvalidConfig(format!("{}: {e}", path.display())))?;
    serde_json::from_str(&text)
        .map_err(|e| CalibError::InvalidConfig(format!("{}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_sizes_stop_at_available_images() {
        let cfg = SweepConfig::default();
        assert_eq!(cfg.batch_sizes(12), vec![5, 10]);
        assert_eq!(cfg.batch_sizes(4), Vec::<usize>::new());

        let cfg = SweepConfig {
            step: 5,
            max_batch: 10,
        };
        assert_eq!(cfg.batch_sizes(40), vec![5, 10]);
        assert_eq!(cfg.batch_sizes(10), vec![5, 10]);
    }

    #[test]
    fn zero_step_is_rejected() {
        let cfg = SweepConfig {
            step: 0,
            max_batch: 10,
        };
        assert!(matches!(cfg.validate(), Err(CalibError::InvalidConfig(_))));
        assert!(cfg.batch_sizes(20).is_empty());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let cfg: CalibrationConfig = serde_json::from_str(r#"{ "fix_k3": true }"#).unwrap();
        assert!(cfg.fix_k3);
        assert_eq!(cfg.solver, SolverConfig::default());
        assert!(cfg.distortion_mask().k3);
        assert!(!cfg.distortion_mask().tangential);

        let pattern: PatternConfig = serde_json::from_str(r#"{ "square_size": 25.0 }"#).unwrap();
        assert_eq!((pattern.cols, pattern.rows), (9, 6));
        assert_eq!(pattern.geometry().unwrap().len(), 54);
    }

    #[test]
    fn zero_distortion_fixes_everything() {
        let cfg = CalibrationConfig {
            zero_distortion: true,
            ..Default::default()
        };
        assert!(cfg.distortion_mask().free_indices().is_empty());
    }

    #[test]
    fn missing_config_path_uses_default() {
        let cfg: SweepConfig = load_config(None).unwrap();
        assert_eq!(cfg, SweepConfig::default());
        let err = load_config::<SweepConfig>(Some(Path::new("/nonexistent/sweep.json"))).unwrap_err();
        assert!(!err.is_recoverable());
    }
}
