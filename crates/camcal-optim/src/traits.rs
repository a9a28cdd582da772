use camcal_core::Real;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Generic non-linear least squares problem with dense parameter/residual vectors.
///
/// The default Jacobian is a forward finite difference over every parameter;
/// problems with exploitable structure should override it.
pub trait NllsProblem {
    /// Number of parameters in the optimization vector.
    fn num_params(&self) -> usize;
    /// Number of residual rows in the problem.
    fn num_residuals(&self) -> usize;

    /// Residuals for the current parameters.
    fn residuals(&self, x: &DVector<Real>) -> DVector<Real>;

    /// Jacobian of [`NllsProblem::residuals`] at `x`.
    fn jacobian(&self, x: &DVector<Real>) -> DMatrix<Real> {
        let base = self.residuals(x);
        let mut j = DMatrix::zeros(base.len(), x.len());
        let mut x_pert = x.clone();
        for k in 0..x.len() {
            let h = fd_step(x[k]);
            x_pert[k] = x[k] + h;
            let diff = (self.residuals(&x_pert) - &base) / h;
            j.set_column(k, &diff);
            x_pert[k] = x[k];
        }
        j
    }
}

/// Forward-difference step scaled to the parameter magnitude.
#[inline]
pub fn fd_step(x: Real) -> Real {
    1e-7 * x.abs().max(1.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolveOptions {
    /// Maximum number of solver iterations before termination.
    ///
    /// The LM backend follows the MINPACK convention and caps function
    /// evaluations at `max_iters * (n + 1)`.
    pub max_iters: usize,
    /// Relative tolerance on the objective (cost) reduction.
    pub ftol: Real,
    /// Relative tolerance on parameter updates.
    pub xtol: Real,
    /// Orthogonality/gradient tolerance.
    pub gtol: Real,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            max_iters: 200,
            ftol: 1e-10,
            xtol: 1e-10,
            gtol: 1e-10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveReport {
    /// Residual function evaluations spent, not outer LM iterations.
    pub evaluations: usize,
    pub final_cost: Real,
    pub converged: bool,
}

pub trait NllsSolverBackend {
    /// Minimize the problem starting from `x0`.
    ///
    /// Non-convergence is not an error: the best iterate is returned and the
    /// report says whether a tolerance was met.
    fn solve<P: NllsProblem>(
        &self,
        problem: &P,
        x0: DVector<Real>,
        opts: &SolveOptions,
    ) -> (DVector<Real>, SolveReport);
}
