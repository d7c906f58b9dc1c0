//! Multigrid-preconditioned Conjugate Gradient (MGPCG).
//!
//! CG on the finest level of a multigrid hierarchy, where each application
//! of `M^{-1}` is one V-cycle started from a zero initial guess.

use tracing::{debug, info};

use crate::blas::FdmBlas;
use crate::cg::{cg_solver_accessors, pcg, CgScratch, ConvergenceInfo, SolveRecord};
use crate::error::SolverError;
use crate::execution::ExecutionContext;
use crate::grid::{FdmMatrix, FdmVector};
use crate::linear_system::{FdmLinearSystem, FdmMgLinearSystem, FdmMgMatrix, FdmMgVector};
use crate::mg::{mg_v_cycle, MgParameters};
use crate::traits::{FdmLinearSystemSolver, FdmMgLinearSystemSolver, Preconditioner};
use crate::validation::{validate_mg_params, validate_tolerance};

/// V-cycle preconditioner.
///
/// Borrows the matrix hierarchy and the solver-owned scratch hierarchies for
/// the duration of one PCG solve.
pub struct MgPreconditioner<'a, const N: usize> {
    a: &'a FdmMgMatrix<N>,
    params: &'a MgParameters,
    ctx: &'a ExecutionContext,
    x: &'a mut FdmMgVector<N>,
    b: &'a mut FdmMgVector<N>,
    buffer: &'a mut FdmMgVector<N>,
}

impl<'a, const N: usize> MgPreconditioner<'a, N> {
    pub fn new(
        a: &'a FdmMgMatrix<N>,
        params: &'a MgParameters,
        ctx: &'a ExecutionContext,
        x: &'a mut FdmMgVector<N>,
        b: &'a mut FdmMgVector<N>,
        buffer: &'a mut FdmMgVector<N>,
    ) -> Self {
        Self {
            a,
            params,
            ctx,
            x,
            b,
            buffer,
        }
    }
}

impl<const N: usize> Preconditioner<FdmBlas<N>> for MgPreconditioner<'_, N> {
    fn build(&mut self, _matrix: &FdmMatrix<N>) {
        let levels = self.a.levels.len();
        for scratch in [&mut *self.x, &mut *self.b, &mut *self.buffer] {
            scratch.levels.resize_with(levels, FdmVector::default);
            for (level, a) in scratch.levels.iter_mut().zip(&self.a.levels) {
                level.resize(a.size());
            }
        }
    }

    fn solve(&mut self, b: &FdmVector<N>, x: &mut FdmVector<N>) {
        self.b.levels[0].set(b);
        self.x.levels[0].fill(0.0);
        mg_v_cycle(self.a, self.params, self.ctx, self.x, self.b, self.buffer);
        x.set(&self.x.levels[0]);
    }
}

/// MGPCG solver.
///
/// Success follows the CG-family rule
/// [`solve_accepted`](crate::cg::solve_accepted): residual within
/// tolerance, or CG stopped before its iteration cap.
pub struct FdmMgpcgSolver<const N: usize> {
    max_number_of_iterations: usize,
    tolerance: f64,
    params: MgParameters,
    ctx: ExecutionContext,
    record: SolveRecord,
    scratch: CgScratch<FdmBlas<N>>,
    mg_x: FdmMgVector<N>,
    mg_b: FdmMgVector<N>,
    mg_buffer: FdmMgVector<N>,
}

pub type FdmMgpcgSolver2 = FdmMgpcgSolver<2>;
pub type FdmMgpcgSolver3 = FdmMgpcgSolver<3>;

impl<const N: usize> FdmMgpcgSolver<N> {
    pub fn new(max_number_of_cg_iterations: usize, tolerance: f64, params: MgParameters) -> Self {
        Self {
            max_number_of_iterations: max_number_of_cg_iterations,
            tolerance,
            params,
            ctx: ExecutionContext::serial(),
            record: SolveRecord::default(),
            scratch: CgScratch::default(),
            mg_x: FdmMgVector::default(),
            mg_b: FdmMgVector::default(),
            mg_buffer: FdmMgVector::default(),
        }
    }

    /// Run V-cycle level operations on `ctx`.
    pub fn with_execution(mut self, ctx: ExecutionContext) -> Self {
        self.ctx = ctx;
        self
    }

    /// Residual after every CG iteration of the last solve.
    pub fn convergence_history(&self) -> &[ConvergenceInfo] {
        &self.record.convergence_history
    }
}

impl<const N: usize> FdmLinearSystemSolver<N> for FdmMgpcgSolver<N> {
    /// Flat systems carry no hierarchy; always `Ok(false)`.
    fn solve(&mut self, _system: &mut FdmLinearSystem<N>) -> Result<bool, SolverError> {
        Ok(false)
    }

    cg_solver_accessors!();
}

impl<const N: usize> FdmMgLinearSystemSolver<N> for FdmMgpcgSolver<N> {
    fn solve_mg(&mut self, system: &mut FdmMgLinearSystem<N>) -> Result<bool, SolverError> {
        system.validate()?;
        validate_tolerance("tolerance", self.tolerance)?;
        validate_mg_params(&self.params)?;
        debug!(
            "MGPCG: finest={:?}, levels={}, tol={:.2e}, max_iter={}",
            system.a.levels[0].size(),
            system.number_of_levels(),
            self.tolerance,
            self.max_number_of_iterations,
        );

        let FdmMgLinearSystem { a, x, b } = system;
        let mut preconditioner = MgPreconditioner::new(
            a,
            &self.params,
            &self.ctx,
            &mut self.mg_x,
            &mut self.mg_b,
            &mut self.mg_buffer,
        );

        x.levels[0].fill(0.0);
        let outcome = pcg::<FdmBlas<N>, _>(
            &a.levels[0],
            &b.levels[0],
            self.max_number_of_iterations,
            self.tolerance,
            &mut preconditioner,
            &mut x.levels[0],
            &mut self.scratch,
        );
        self.record.update(outcome);

        info!(
            "Residual after solving MGPCG: {:.6e} ({} iterations)",
            self.record.last_residual, self.record.last_number_of_iterations,
        );

        Ok(self.record.accepted(self.tolerance, self.max_number_of_iterations))
    }

    fn params(&self) -> &MgParameters {
        &self.params
    }
}
