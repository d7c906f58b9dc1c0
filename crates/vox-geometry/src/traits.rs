//! Solver trait hierarchy.
//!
//! Every grid solver implements [`FdmLinearSystemSolver`]; multigrid-based
//! solvers additionally implement [`FdmMgLinearSystemSolver`]. Preconditioned
//! CG is parameterised by a [`Preconditioner`] over any [`Blas`].

use crate::blas::Blas;
use crate::error::SolverError;
use crate::linear_system::{FdmCompressedLinearSystem, FdmLinearSystem, FdmMgLinearSystem};
use crate::mg::MgParameters;

/// Approximate inverse `M^-1` used by [`pcg`](crate::cg::pcg).
pub trait Preconditioner<B: Blas> {
    /// Prepare for `matrix`. Called once per PCG solve, before the first
    /// [`solve`](Self::solve).
    fn build(&mut self, matrix: &B::Matrix);

    /// `x = M^-1 b`.
    fn solve(&mut self, b: &B::Vector, x: &mut B::Vector);
}

/// Solver for stencil (and optionally compressed) linear systems.
///
/// `solve` returns `Ok(true)` when the solver's acceptance criterion holds,
/// `Ok(false)` when it does not, and `Err` only for invalid input.
pub trait FdmLinearSystemSolver<const N: usize> {
    /// Solve `system` in place, writing the solution into `system.x`.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::InvalidInput`] if the grids of `system` do not
    /// share one resolution or the solver parameters are out of range.
    fn solve(&mut self, system: &mut FdmLinearSystem<N>) -> Result<bool, SolverError>;

    /// Solve a compressed system in place. Solvers without a compressed path
    /// return `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::InvalidInput`] for malformed systems.
    fn solve_compressed(
        &mut self,
        system: &mut FdmCompressedLinearSystem,
    ) -> Result<bool, SolverError> {
        let _ = system;
        Ok(false)
    }

    /// Convergence tolerance on the residual norm.
    fn tolerance(&self) -> f64;

    /// Residual norm after the last solve.
    fn last_residual(&self) -> f64;

    /// Iteration cap.
    fn max_number_of_iterations(&self) -> usize;

    /// Iterations used by the last solve.
    fn last_number_of_iterations(&self) -> usize;
}

/// Solver that operates on a full multigrid hierarchy.
pub trait FdmMgLinearSystemSolver<const N: usize>: FdmLinearSystemSolver<N> {
    /// Solve `system` in place; the solution ends up in `system.x.levels[0]`.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::InvalidInput`] for empty or inconsistent
    /// hierarchies and out-of-range parameters.
    fn solve_mg(&mut self, system: &mut FdmMgLinearSystem<N>) -> Result<bool, SolverError>;

    /// Multigrid parameters in use.
    fn params(&self) -> &MgParameters;
}
