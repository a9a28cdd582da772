//! Joint refinement of intrinsics, distortion and per-view poses.
//!
//! Parameter layout: `[fx, fy, cx, cy, <free distortion>, pose_0, pose_1, ...]`
//! where the free distortion entries are the subset of `[k1, k2, p1, p2, k3]`
//! not held fixed by the [`DistortionFixMask`], and each pose block is
//! `[rx, ry, rz, tx, ty, tz]` (axis-angle, translation).

use crate::params::{pack_poses, read_pose, view_residuals, POSE_DIM};
use crate::{fd_step, NllsProblem, NllsSolverBackend, SolveOptions, SolveReport};
use camcal_core::{
    BrownConrady5, CalibError, Correspondence, Extrinsics, Intrinsics, PinholeCamera, Real,
};
use log::debug;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

const INTRINSICS_DIM: usize = 4;

/// Distortion coefficients held at their initial value during refinement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistortionFixMask {
    pub radial: bool,
    pub tangential: bool,
    pub k3: bool,
}

impl DistortionFixMask {
    /// Hold every coefficient fixed.
    pub fn all() -> Self {
        Self {
            radial: true,
            tangential: true,
            k3: true,
        }
    }

    /// Indices into `[k1, k2, p1, p2, k3]` that are optimized.
    pub fn free_indices(&self) -> Vec<usize> {
        let mut idx = Vec::with_capacity(5);
        if !self.radial {
            idx.extend([0, 1]);
        }
        if !self.tangential {
            idx.extend([2, 3]);
        }
        if !self.k3 {
            idx.push(4);
        }
        idx
    }
}

/// Non-linear refinement problem for planar intrinsics (and per-view poses).
#[derive(Debug, Clone)]
pub struct PlanarIntrinsicsProblem {
    views: Vec<Correspondence>,
    fixed: DistortionFixMask,
    free_dist: Vec<usize>,
    /// Coefficients used for the fixed entries.
    base_distortion: [Real; 5],
    residual_offsets: Vec<usize>,
}

impl PlanarIntrinsicsProblem {
    /// # Errors
    ///
    /// - [`CalibError::InsufficientViews`] if `views` is empty,
    /// - [`CalibError::CorrespondenceMismatch`] if a view has fewer than 4 points,
    /// - [`CalibError::NonPlanarPattern`] if any pattern point is off `z = 0`.
    pub fn new(views: Vec<Correspondence>, fixed: DistortionFixMask) -> Result<Self, CalibError> {
        if views.is_empty() {
            return Err(CalibError::InsufficientViews { needed: 1, got: 0 });
        }
        for v in &views {
            if v.len() < 4 {
                return Err(CalibError::CorrespondenceMismatch {
                    expected: 4,
                    got: v.len(),
                });
            }
            if !v.is_planar() {
                return Err(CalibError::NonPlanarPattern);
            }
        }

        let mut residual_offsets = Vec::with_capacity(views.len() + 1);
        let mut offset = 0;
        for v in &views {
            residual_offsets.push(offset);
            offset += 2 * v.len();
        }
        residual_offsets.push(offset);

        Ok(Self {
            free_dist: fixed.free_indices(),
            views,
            fixed,
            base_distortion: [0.0; 5],
            residual_offsets,
        })
    }

    pub fn num_views(&self) -> usize {
        self.views.len()
    }

    pub fn views(&self) -> &[Correspondence] {
        &self.views
    }

    pub fn fix_mask(&self) -> DistortionFixMask {
        self.fixed
    }

    fn pose_offset(&self) -> usize {
        INTRINSICS_DIM + self.free_dist.len()
    }

    /// Pack a starting point. Fixed distortion entries keep the values of
    /// `camera.distortion`.
    pub fn pack(&mut self, camera: &PinholeCamera, poses: &[Extrinsics]) -> Result<DVector<Real>, CalibError> {
        if poses.len() != self.views.len() {
            return Err(CalibError::InvalidConfig(format!(
                "{} initial poses for {} views",
                poses.len(),
                self.views.len()
            )));
        }
        self.base_distortion = camera.distortion.coefficients();

        let mut x = DVector::zeros(self.num_params());
        let k = &camera.intrinsics;
        x[0] = k.fx;
        x[1] = k.fy;
        x[2] = k.cx;
        x[3] = k.cy;
        for (slot, &d) in self.free_dist.iter().enumerate() {
            x[INTRINSICS_DIM + slot] = self.base_distortion[d];
        }
        let off = self.pose_offset();
        x.rows_mut(off, POSE_DIM * poses.len())
            .copy_from(&pack_poses(poses));
        Ok(x)
    }

    /// Decode a parameter vector into camera + per-view poses.
    ///
    /// The intrinsics are not validated here; see [`refine_planar_intrinsics`].
    pub fn unpack(&self, x: &DVector<Real>) -> (PinholeCamera, Vec<Extrinsics>) {
        (self.camera(x), self.poses(x))
    }

    fn camera(&self, x: &DVector<Real>) -> PinholeCamera {
        let mut coeffs = self.base_distortion;
        for (slot, &d) in self.free_dist.iter().enumerate() {
            coeffs[d] = x[INTRINSICS_DIM + slot];
        }
        let [k1, k2, p1, p2, k3] = coeffs;
        PinholeCamera::new(
            Intrinsics {
                fx: x[0],
                fy: x[1],
                cx: x[2],
                cy: x[3],
            },
            BrownConrady5 { k1, k2, p1, p2, k3 },
        )
    }

    fn poses(&self, x: &DVector<Real>) -> Vec<Extrinsics> {
        let off = self.pose_offset();
        (0..self.views.len())
            .map(|i| read_pose(x.rows(off + POSE_DIM * i, POSE_DIM)))
            .collect()
    }

    fn fill_view(&self, camera: &PinholeCamera, pose: &Extrinsics, view_idx: usize, r: &mut DVector<Real>) {
        let view = &self.views[view_idx];
        let start = self.residual_offsets[view_idx];
        view_residuals(
            camera,
            &pose.rotation_matrix(),
            &pose.translation,
            &view.points_3d,
            &view.points_2d,
            r.rows_mut(start, 2 * view.len()),
        );
    }
}

impl NllsProblem for PlanarIntrinsicsProblem {
    fn num_params(&self) -> usize {
        self.pose_offset() + POSE_DIM * self.views.len()
    }

    fn num_residuals(&self) -> usize {
        self.residual_offsets[self.views.len()]
    }

    fn residuals(&self, x: &DVector<Real>) -> DVector<Real> {
        let (camera, poses) = self.unpack(x);
        let mut r = DVector::zeros(self.num_residuals());
        for (i, pose) in poses.iter().enumerate() {
            self.fill_view(&camera, pose, i, &mut r);
        }
        r
    }

    /// Finite differences exploiting the block structure: a pose block only
    /// touches its own view's residuals.
    fn jacobian(&self, x: &DVector<Real>) -> DMatrix<Real> {
        let m = self.num_residuals();
        let n = self.num_params();
        let mut j = DMatrix::zeros(m, n);
        let base = self.residuals(x);

        let mut x_pert = x.clone();
        for k in 0..self.pose_offset() {
            let h = fd_step(x[k]);
            x_pert[k] = x[k] + h;
            let diff = (self.residuals(&x_pert) - &base) / h;
            j.set_column(k, &diff);
            x_pert[k] = x[k];
        }

        let camera = self.camera(x);
        let off = self.pose_offset();
        let mut r_view = DVector::zeros(m);
        for (i, view) in self.views.iter().enumerate() {
            let start = self.residual_offsets[i];
            let len = 2 * view.len();
            for p in 0..POSE_DIM {
                let k = off + POSE_DIM * i + p;
                let h = fd_step(x[k]);
                x_pert[k] = x[k] + h;
                let pose = read_pose(x_pert.rows(off + POSE_DIM * i, POSE_DIM));
                self.fill_view(&camera, &pose, i, &mut r_view);
                for row in start..start + len {
                    j[(row, k)] = (r_view[row] - base[row]) / h;
                }
                x_pert[k] = x[k];
            }
        }

        j
    }
}

/// Refined camera and poses with the solver report.
#[derive(Debug, Clone)]
pub struct PlanarIntrinsicsEstimate {
    pub camera: PinholeCamera,
    pub poses: Vec<Extrinsics>,
    pub report: SolveReport,
}

/// Refine camera intrinsics, distortion and per-view poses jointly.
///
/// # Errors
///
/// Returns [`CalibError::InvalidConfig`] if `poses` does not have one entry per
/// view and [`CalibError::Numerical`] if the refined focal lengths are not
/// positive and finite.
pub fn refine_planar_intrinsics<B: NllsSolverBackend>(
    backend: &B,
    problem: &mut PlanarIntrinsicsProblem,
    initial: &PinholeCamera,
    poses: &[Extrinsics],
    opts: &SolveOptions,
) -> Result<PlanarIntrinsicsEstimate, CalibError> {
    let x0 = problem.pack(initial, poses)?;
    debug!(
        "refining {} views, {} parameters, {} residuals",
        problem.num_views(),
        problem.num_params(),
        problem.num_residuals()
    );

    let (x_opt, report) = backend.solve(&*problem, x0, opts);
    let (camera, poses) = problem.unpack(&x_opt);
    camera.intrinsics.validate()?;

    Ok(PlanarIntrinsicsEstimate {
        camera,
        poses,
        report,
    })
}
