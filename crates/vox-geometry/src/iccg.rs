//! Incomplete-Cholesky preconditioned Conjugate Gradient (ICCG).
//!
//! The preconditioner is the diagonal IC(0) factorisation
//! `M = (D + L) D^{-1} (D + L^T)` restricted to the sparsity pattern of `A`
//! (no fill-in), where `L` is the strictly lower part of `A` and the pivots
//! satisfy
//!
//! ```text
//! D_i = a_ii - sum_{j < i, a_ij != 0} a_ij^2 / D_j
//! ```
//!
//! Only the inverse pivots `d_i = 1 / D_i` are stored; a zero pivot yields
//! `d_i = 0`. Applying `M^{-1}` is one forward and one backward
//! substitution.

use tracing::debug;

use crate::blas::{CompressedBlas, FdmBlas};
use crate::cg::{cg_solver_accessors, pcg, CgScratch, ConvergenceInfo, SolveRecord};
use crate::error::SolverError;
use crate::grid::{advance_coord, FdmMatrix, FdmVector};
use crate::linear_system::{FdmCompressedLinearSystem, FdmLinearSystem};
use crate::traits::{FdmLinearSystemSolver, Preconditioner};
use crate::types::CsrMatrix;
use crate::validation::validate_tolerance;

#[inline]
fn inverse_pivot(denom: f64) -> f64 {
    if denom == 0.0 {
        0.0
    } else {
        1.0 / denom
    }
}

// ---------------------------------------------------------------------------
// Stencil preconditioner
// ---------------------------------------------------------------------------

/// IC(0) preconditioner over a stencil matrix.
#[derive(Debug, Clone, Default)]
pub struct FdmIccgPreconditioner<const N: usize> {
    a: FdmMatrix<N>,
    d: FdmVector<N>,
    y: FdmVector<N>,
}

impl<const N: usize> FdmIccgPreconditioner<N> {
    /// Inverse pivots from the last build.
    pub fn inverse_pivots(&self) -> &FdmVector<N> {
        &self.d
    }
}

impl<const N: usize> Preconditioner<FdmBlas<N>> for FdmIccgPreconditioner<N> {
    fn build(&mut self, matrix: &FdmMatrix<N>) {
        let size = matrix.size();
        self.a.set(matrix);
        self.d.resize(size);
        self.y.resize(size);
        if matrix.is_empty() {
            return;
        }

        let strides = matrix.strides();
        let rows = matrix.as_slice();
        let d = self.d.as_mut_slice();
        let mut coord = [0usize; N];
        for i in 0..rows.len() {
            let mut denom = rows[i].center;
            for axis in 0..N {
                if coord[axis] > 0 {
                    let j = i - strides[axis];
                    let a_ij = rows[j].neighbors[axis];
                    denom -= a_ij * a_ij * d[j];
                }
            }
            d[i] = inverse_pivot(denom);
            advance_coord(&mut coord, size);
        }
    }

    fn solve(&mut self, b: &FdmVector<N>, x: &mut FdmVector<N>) {
        let size = self.a.size();
        x.resize(size);
        if self.a.is_empty() {
            return;
        }

        let strides = self.a.strides();
        let rows = self.a.as_slice();
        let d = self.d.as_slice();
        let bs = b.as_slice();

        // Forward: (D + L) y = b
        let y = self.y.as_mut_slice();
        let mut coord = [0usize; N];
        for i in 0..rows.len() {
            let mut sum = bs[i];
            for axis in 0..N {
                if coord[axis] > 0 {
                    let j = i - strides[axis];
                    sum -= rows[j].neighbors[axis] * y[j];
                }
            }
            y[i] = sum * d[i];
            advance_coord(&mut coord, size);
        }

        // Backward: (I + D^{-1} L^T) x = y
        let xs = x.as_mut_slice();
        for i in (0..rows.len()).rev() {
            let coord = crate::grid::coord_of(size, i);
            let mut sum = 0.0;
            for axis in 0..N {
                if coord[axis] + 1 < size[axis] {
                    sum += rows[i].neighbors[axis] * xs[i + strides[axis]];
                }
            }
            xs[i] = y[i] - d[i] * sum;
        }
    }
}

// ---------------------------------------------------------------------------
// Compressed preconditioner
// ---------------------------------------------------------------------------

/// IC(0) preconditioner over a CSR matrix. Column order within a row does
/// not matter.
#[derive(Debug, Clone, Default)]
pub struct CompressedIccgPreconditioner {
    a: CsrMatrix<f64>,
    diag: Vec<f64>,
    d: Vec<f64>,
    y: Vec<f64>,
}

impl CompressedIccgPreconditioner {
    /// Inverse pivots from the last build.
    pub fn inverse_pivots(&self) -> &[f64] {
        &self.d
    }
}

impl Preconditioner<CompressedBlas> for CompressedIccgPreconditioner {
    fn build(&mut self, matrix: &CsrMatrix<f64>) {
        let n = matrix.rows;
        self.a.clone_from(matrix);
        self.diag = matrix.diagonal();
        self.d.clear();
        self.d.resize(n, 0.0);
        self.y.resize(n, 0.0);

        for i in 0..n {
            let mut denom = self.diag[i];
            for (j, &a_ij) in matrix.row_entries(i).filter(|&(j, _)| j < i) {
                denom -= a_ij * a_ij * self.d[j];
            }
            self.d[i] = inverse_pivot(denom);
        }
    }

    fn solve(&mut self, b: &Vec<f64>, x: &mut Vec<f64>) {
        let n = self.a.rows;
        x.resize(n, 0.0);

        // Forward: (D + L) y = b
        for i in 0..n {
            let mut sum = b[i];
            for (j, &a_ij) in self.a.row_entries(i).filter(|&(j, _)| j < i) {
                sum -= a_ij * self.y[j];
            }
            self.y[i] = sum * self.d[i];
        }

        // Backward: (I + D^{-1} L^T) x = y
        for i in (0..n).rev() {
            let mut sum = 0.0;
            for (j, &a_ij) in self.a.row_entries(i) {
                if j > i {
                    sum += a_ij * x[j];
                }
            }
            x[i] = self.y[i] - self.d[i] * sum;
        }
    }
}

// ---------------------------------------------------------------------------
// FdmIccgSolver
// ---------------------------------------------------------------------------

/// PCG with an IC(0) preconditioner.
pub struct FdmIccgSolver<const N: usize> {
    max_number_of_iterations: usize,
    tolerance: f64,
    record: SolveRecord,
    preconditioner: FdmIccgPreconditioner<N>,
    compressed_preconditioner: CompressedIccgPreconditioner,
    scratch: CgScratch<FdmBlas<N>>,
    compressed_scratch: CgScratch<CompressedBlas>,
}

pub type FdmIccgSolver2 = FdmIccgSolver<2>;
pub type FdmIccgSolver3 = FdmIccgSolver<3>;

impl<const N: usize> FdmIccgSolver<N> {
    pub fn new(max_number_of_iterations: usize, tolerance: f64) -> Self {
        Self {
            max_number_of_iterations,
            tolerance,
            record: SolveRecord::default(),
            preconditioner: FdmIccgPreconditioner::default(),
            compressed_preconditioner: CompressedIccgPreconditioner::default(),
            scratch: CgScratch::default(),
            compressed_scratch: CgScratch::default(),
        }
    }

    /// Residual after every iteration of the last solve.
    pub fn convergence_history(&self) -> &[ConvergenceInfo] {
        &self.record.convergence_history
    }
}

impl<const N: usize> FdmLinearSystemSolver<N> for FdmIccgSolver<N> {
    fn solve(&mut self, system: &mut FdmLinearSystem<N>) -> Result<bool, SolverError> {
        system.validate()?;
        validate_tolerance("tolerance", self.tolerance)?;
        debug!(
            "ICCG: size={:?}, tol={:.2e}, max_iter={}",
            system.a.size(),
            self.tolerance,
            self.max_number_of_iterations,
        );

        system.x.fill(0.0);
        let outcome = pcg::<FdmBlas<N>, _>(
            &system.a,
            &system.b,
            self.max_number_of_iterations,
            self.tolerance,
            &mut self.preconditioner,
            &mut system.x,
            &mut self.scratch,
        );
        self.record.update(outcome);
        Ok(self.record.accepted(self.tolerance, self.max_number_of_iterations))
    }

    fn solve_compressed(
        &mut self,
        system: &mut FdmCompressedLinearSystem,
    ) -> Result<bool, SolverError> {
        system.validate()?;
        validate_tolerance("tolerance", self.tolerance)?;
        debug!(
            "ICCG: n={}, nnz={}, tol={:.2e}, max_iter={}",
            system.a.rows,
            system.a.nnz(),
            self.tolerance,
            self.max_number_of_iterations,
        );

        system.x.fill(0.0);
        let outcome = pcg::<CompressedBlas, _>(
            &system.a,
            &system.b,
            self.max_number_of_iterations,
            self.tolerance,
            &mut self.compressed_preconditioner,
            &mut system.x,
            &mut self.compressed_scratch,
        );
        self.record.update(outcome);
        Ok(self.record.accepted(self.tolerance, self.max_number_of_iterations))
    }

    cg_solver_accessors!();
}
