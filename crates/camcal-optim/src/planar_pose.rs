//! Single-view pose refinement with a fixed camera.

use crate::params::{read_pose, view_residuals, write_pose, POSE_DIM};
use crate::{NllsProblem, NllsSolverBackend, SolveOptions, SolveReport};
use camcal_core::{CalibError, Correspondence, Extrinsics, PinholeCamera, Real};
use nalgebra::DVector;

/// Reprojection problem over the 6 pose parameters of one view.
#[derive(Debug, Clone)]
pub struct PlanarPoseProblem<'a> {
    camera: &'a PinholeCamera,
    view: &'a Correspondence,
}

impl<'a> PlanarPoseProblem<'a> {
    pub fn new(camera: &'a PinholeCamera, view: &'a Correspondence) -> Result<Self, CalibError> {
        if view.len() < 4 {
            return Err(CalibError::CorrespondenceMismatch {
                expected: 4,
                got: view.len(),
            });
        }
        Ok(Self { camera, view })
    }
}

impl NllsProblem for PlanarPoseProblem<'_> {
    fn num_params(&self) -> usize {
        POSE_DIM
    }

    fn num_residuals(&self) -> usize {
        2 * self.view.len()
    }

    fn residuals(&self, x: &DVector<Real>) -> DVector<Real> {
        let pose = read_pose(x.rows(0, POSE_DIM));
        let mut r = DVector::zeros(self.num_residuals());
        view_residuals(
            self.camera,
            &pose.rotation_matrix(),
            &pose.translation,
            &self.view.points_3d,
            &self.view.points_2d,
            r.rows_mut(0, self.num_residuals()),
        );
        r
    }
}

/// Refine `initial` by minimizing the view's pixel reprojection error.
pub fn refine_planar_pose<B: NllsSolverBackend>(
    backend: &B,
    camera: &PinholeCamera,
    view: &Correspondence,
    initial: &Extrinsics,
    opts: &SolveOptions,
) -> Result<(Extrinsics, SolveReport), CalibError> {
    let problem = PlanarPoseProblem::new(camera, view)?;
    let mut x0 = DVector::zeros(POSE_DIM);
    write_pose(initial, x0.rows_mut(0, POSE_DIM));

    let (x_opt, report) = backend.solve(&problem, x0, opts);
    Ok((read_pose(x_opt.rows(0, POSE_DIM)), report))
}
