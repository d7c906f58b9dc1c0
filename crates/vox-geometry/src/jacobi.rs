//! Jacobi iteration.
//!
//! Each sweep computes `x'_i = (b_i - sum_{j != i} a_ij x_j) / a_ii` from the
//! previous sweep's values only, so sweeps are double buffered and every
//! cell can be updated independently (in parallel when the execution
//! context allows it).

use rayon::prelude::*;
use tracing::{debug, trace};

use crate::blas::{Blas, CompressedBlas, FdmBlas};
use crate::error::SolverError;
use crate::execution::ExecutionContext;
use crate::grid::{FdmMatrix, FdmVector};
use crate::linear_system::{FdmCompressedLinearSystem, FdmLinearSystem};
use crate::traits::FdmLinearSystemSolver;
use crate::types::CsrMatrix;
use crate::validation::{validate_positive, validate_tolerance};

// ---------------------------------------------------------------------------
// Sweep kernels
// ---------------------------------------------------------------------------

/// One Jacobi sweep over a stencil system. The new iterate is written into
/// `x_temp` and then swapped into `x`.
pub fn jacobi_sweep<const N: usize>(
    a: &FdmMatrix<N>,
    b: &FdmVector<N>,
    x: &mut FdmVector<N>,
    x_temp: &mut FdmVector<N>,
    ctx: &ExecutionContext,
) {
    x_temp.resize(a.size());
    let strides = a.strides();
    let rows = a.as_slice();
    let xs = x.as_slice();
    let bs = b.as_slice();

    x_temp.update_each(ctx, |i, coord, out| {
        let off = a.off_diagonal_product(xs, i, coord, &strides);
        *out = (bs[i] - off) / rows[i].center;
    });
    std::mem::swap(x, x_temp);
}

/// One Jacobi sweep over a compressed system.
pub fn jacobi_sweep_compressed(
    a: &CsrMatrix<f64>,
    b: &[f64],
    x: &mut Vec<f64>,
    x_temp: &mut Vec<f64>,
    ctx: &ExecutionContext,
) {
    x_temp.resize(a.rows, 0.0);
    let xs: &[f64] = x;
    let update = |(i, out): (usize, &mut f64)| {
        let mut diag = 0.0;
        let mut off = 0.0;
        for (j, &v) in a.row_entries(i) {
            if j == i {
                diag += v;
            } else {
                off += v * xs[j];
            }
        }
        *out = (b[i] - off) / diag;
    };

    if ctx.is_parallel() {
        let out = &mut x_temp[..];
        ctx.install(|| out.par_iter_mut().enumerate().for_each(update));
    } else {
        x_temp.iter_mut().enumerate().for_each(update);
    }
    std::mem::swap(x, x_temp);
}

// ---------------------------------------------------------------------------
// FdmJacobiSolver
// ---------------------------------------------------------------------------

/// Jacobi solver.
///
/// Every outer iteration runs `relaxations_per_iteration` sweeps and then
/// checks `||b - A x||_2 <= tolerance`.
pub struct FdmJacobiSolver<const N: usize> {
    max_number_of_iterations: usize,
    relaxations_per_iteration: usize,
    tolerance: f64,
    last_number_of_iterations: usize,
    last_residual: f64,
    ctx: ExecutionContext,

    x_temp: FdmVector<N>,
    residual: FdmVector<N>,
    x_temp_compressed: Vec<f64>,
    residual_compressed: Vec<f64>,
}

pub type FdmJacobiSolver2 = FdmJacobiSolver<2>;
pub type FdmJacobiSolver3 = FdmJacobiSolver<3>;

impl<const N: usize> FdmJacobiSolver<N> {
    pub fn new(
        max_number_of_iterations: usize,
        relaxations_per_iteration: usize,
        tolerance: f64,
    ) -> Self {
        Self {
            max_number_of_iterations,
            relaxations_per_iteration,
            tolerance,
            last_number_of_iterations: 0,
            last_residual: f64::MAX,
            ctx: ExecutionContext::serial(),
            x_temp: FdmVector::default(),
            residual: FdmVector::default(),
            x_temp_compressed: Vec::new(),
            residual_compressed: Vec::new(),
        }
    }

    /// Run sweeps on `ctx` instead of the calling thread.
    pub fn with_execution(mut self, ctx: ExecutionContext) -> Self {
        self.ctx = ctx;
        self
    }

    pub fn relaxations_per_iteration(&self) -> usize {
        self.relaxations_per_iteration
    }

    fn validate_params(&self) -> Result<(), SolverError> {
        validate_tolerance("tolerance", self.tolerance)?;
        validate_positive("relaxations_per_iteration", self.relaxations_per_iteration)?;
        Ok(())
    }
}

impl<const N: usize> FdmLinearSystemSolver<N> for FdmJacobiSolver<N> {
    fn solve(&mut self, system: &mut FdmLinearSystem<N>) -> Result<bool, SolverError> {
        system.validate()?;
        self.validate_params()?;
        debug!(
            "Jacobi: size={:?}, tol={:.2e}, max_iter={}, sweeps={}",
            system.a.size(),
            self.tolerance,
            self.max_number_of_iterations,
            self.relaxations_per_iteration,
        );

        self.x_temp.resize(system.x.size());
        self.residual.resize(system.x.size());

        self.last_number_of_iterations = self.max_number_of_iterations;
        FdmBlas::<N>::residual(&system.a, &system.x, &system.b, &mut self.residual);
        self.last_residual = FdmBlas::<N>::l2_norm(&self.residual);

        for iter in 0..self.max_number_of_iterations {
            for _ in 0..self.relaxations_per_iteration {
                jacobi_sweep(&system.a, &system.b, &mut system.x, &mut self.x_temp, &self.ctx);
            }

            FdmBlas::<N>::residual(&system.a, &system.x, &system.b, &mut self.residual);
            self.last_residual = FdmBlas::<N>::l2_norm(&self.residual);
            trace!("Jacobi iter {iter}: ||r|| = {:.6e}", self.last_residual);

            if self.last_residual <= self.tolerance {
                self.last_number_of_iterations = iter + 1;
                break;
            }
        }

        Ok(self.last_residual <= self.tolerance)
    }

    fn solve_compressed(
        &mut self,
        system: &mut FdmCompressedLinearSystem,
    ) -> Result<bool, SolverError> {
        system.validate()?;
        self.validate_params()?;
        debug!(
            "Jacobi: n={}, nnz={}, tol={:.2e}, max_iter={}",
            system.a.rows,
            system.a.nnz(),
            self.tolerance,
            self.max_number_of_iterations,
        );

        self.last_number_of_iterations = self.max_number_of_iterations;
        CompressedBlas::residual(&system.a, &system.x, &system.b, &mut self.residual_compressed);
        self.last_residual = CompressedBlas::l2_norm(&self.residual_compressed);

        for iter in 0..self.max_number_of_iterations {
            for _ in 0..self.relaxations_per_iteration {
                jacobi_sweep_compressed(
                    &system.a,
                    &system.b,
                    &mut system.x,
                    &mut self.x_temp_compressed,
                    &self.ctx,
                );
            }

            CompressedBlas::residual(&system.a, &system.x, &system.b, &mut self.residual_compressed);
            self.last_residual = CompressedBlas::l2_norm(&self.residual_compressed);
            trace!("Jacobi iter {iter}: ||r|| = {:.6e}", self.last_residual);

            if self.last_residual <= self.tolerance {
                self.last_number_of_iterations = iter + 1;
                break;
            }
        }

        Ok(self.last_residual <= self.tolerance)
    }

    fn tolerance(&self) -> f64 {
        self.tolerance
    }

    fn last_residual(&self) -> f64 {
        self.last_residual
    }

    fn max_number_of_iterations(&self) -> usize {
        self.max_number_of_iterations
    }

    fn last_number_of_iterations(&self) -> usize {
        self.last_number_of_iterations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stencil::laplacian_matrix;

    #[test]
    fn sweep_solves_diagonal_system_in_one_step() {
        let mut a = FdmMatrix::<2>::new([3, 3]);
        for row in a.as_mut_slice() {
            row.center = 2.0;
        }
        let b = FdmVector::<2>::filled([3, 3], 4.0);
        let mut x = FdmVector::<2>::new([3, 3]);
        let mut tmp = FdmVector::<2>::default();
        jacobi_sweep(&a, &b, &mut x, &mut tmp, &ExecutionContext::serial());
        assert!(x.iter().all(|&v| v == 2.0));
    }

    #[test]
    fn parallel_sweep_matches_serial() {
        let a = laplacian_matrix([6, 5, 4], 1.0);
        let mut b = FdmVector::<3>::new([6, 5, 4]);
        b.update_each(&ExecutionContext::serial(), |i, _, v| *v = (i % 7) as f64);

        let ctx = ExecutionContext::parallel(3).unwrap();
        let mut xs = FdmVector::<3>::new([6, 5, 4]);
        let mut xp = FdmVector::<3>::new([6, 5, 4]);
        let mut ts = FdmVector::<3>::default();
        let mut tp = FdmVector::<3>::default();
        for _ in 0..4 {
            jacobi_sweep(&a, &b, &mut xs, &mut ts, &ExecutionContext::serial());
            jacobi_sweep(&a, &b, &mut xp, &mut tp, &ctx);
        }
        assert_eq!(xs, xp);
    }

    #[test]
    fn compressed_sweep_matches_stencil_sweep() {
        let mut system = FdmLinearSystem::<2>::new([4, 3]);
        system.a = laplacian_matrix([4, 3], 1.0);
        system.b.update_each(&ExecutionContext::serial(), |i, _, v| *v = i as f64);
        let compressed = FdmCompressedLinearSystem::from_stencil(&system).unwrap();

        let mut x = system.x.clone();
        let mut tmp = FdmVector::default();
        let mut xc = compressed.x.clone();
        let mut tmpc = Vec::new();
        for _ in 0..3 {
            jacobi_sweep(&system.a, &system.b, &mut x, &mut tmp, &ExecutionContext::serial());
            jacobi_sweep_compressed(
                &compressed.a,
                &compressed.b,
                &mut xc,
                &mut tmpc,
                &ExecutionContext::serial(),
            );
        }
        for (p, q) in x.iter().zip(&xc) {
            assert!((p - q).abs() < 1e-12);
        }
    }

    #[test]
    fn zero_relaxations_rejected() {
        let mut solver = FdmJacobiSolver2::new(10, 0, 1e-6);
        let mut system = FdmLinearSystem::<2>::new([2, 2]);
        assert!(matches!(
            solver.solve(&mut system),
            Err(SolverError::InvalidInput(_))
        ));
    }
}
