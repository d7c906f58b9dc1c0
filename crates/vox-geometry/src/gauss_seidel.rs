//! Gauss-Seidel iteration with successive over-relaxation (SOR).
//!
//! ```text
//! x_i = (1 - w) * x_i + w * (b_i - sum_{j != i} a_ij x_j) / a_ii
//! ```
//!
//! The lexicographic sweep updates cells in storage order, in place. The
//! red-black sweep updates all cells whose coordinate sum is even, then all
//! cells whose sum is odd; cells of one colour never couple through the
//! stencil, so each half-sweep runs data-parallel.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::blas::{Blas, CompressedBlas, FdmBlas};
use crate::error::SolverError;
use crate::execution::ExecutionContext;
use crate::grid::{advance_coord, FdmMatrix, FdmVector};
use crate::linear_system::{FdmCompressedLinearSystem, FdmLinearSystem};
use crate::traits::FdmLinearSystemSolver;
use crate::types::CsrMatrix;
use crate::validation::{validate_positive, validate_sor_factor, validate_tolerance};

/// Cell update order of a Gauss-Seidel sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SweepOrder {
    /// Storage order, in place.
    #[default]
    Lexicographic,
    /// Even coordinate sums first, then odd.
    RedBlack,
}

impl SweepOrder {
    pub fn from_red_black(use_red_black_ordering: bool) -> Self {
        if use_red_black_ordering {
            Self::RedBlack
        } else {
            Self::Lexicographic
        }
    }
}

// ---------------------------------------------------------------------------
// Sweep kernels
// ---------------------------------------------------------------------------

/// One SOR sweep over a stencil system.
///
/// `buffer` is only used by the red-black ordering; it holds one colour's
/// update before it is swapped into `x`.
pub fn gauss_seidel_sweep<const N: usize>(
    a: &FdmMatrix<N>,
    b: &FdmVector<N>,
    sor_factor: f64,
    order: SweepOrder,
    x: &mut FdmVector<N>,
    buffer: &mut FdmVector<N>,
    ctx: &ExecutionContext,
) {
    let size = a.size();
    if a.is_empty() {
        return;
    }
    let strides = a.strides();
    let rows = a.as_slice();
    let bs = b.as_slice();

    match order {
        SweepOrder::Lexicographic => {
            let mut coord = [0usize; N];
            for i in 0..rows.len() {
                let off = a.off_diagonal_product(x.as_slice(), i, coord, &strides);
                let xs = x.as_mut_slice();
                xs[i] = (1.0 - sor_factor) * xs[i] + sor_factor * (bs[i] - off) / rows[i].center;
                advance_coord(&mut coord, size);
            }
        }
        SweepOrder::RedBlack => {
            buffer.resize(size);
            for color in 0..2 {
                let xs = x.as_slice();
                buffer.update_each(ctx, |i, coord, out| {
                    if coord.iter().sum::<usize>() % 2 == color {
                        let off = a.off_diagonal_product(xs, i, coord, &strides);
                        *out = (1.0 - sor_factor) * xs[i]
                            + sor_factor * (bs[i] - off) / rows[i].center;
                    } else {
                        *out = xs[i];
                    }
                });
                std::mem::swap(x, buffer);
            }
        }
    }
}

/// One lexicographic SOR sweep over a compressed system.
pub fn gauss_seidel_sweep_compressed(
    a: &CsrMatrix<f64>,
    b: &[f64],
    sor_factor: f64,
    x: &mut [f64],
) {
    for i in 0..a.rows {
        let mut diag = 0.0;
        let mut off = 0.0;
        for (j, &v) in a.row_entries(i) {
            if j == i {
                diag += v;
            } else {
                off += v * x[j];
            }
        }
        x[i] = (1.0 - sor_factor) * x[i] + sor_factor * (b[i] - off) / diag;
    }
}

// ---------------------------------------------------------------------------
// FdmGaussSeidelSolver
// ---------------------------------------------------------------------------

/// Gauss-Seidel / SOR solver.
///
/// The residual is checked every `residual_check_interval` sweeps; success
/// means `||b - A x||_2 <= tolerance` after the last sweep. Compressed
/// systems are always swept lexicographically.
pub struct FdmGaussSeidelSolver<const N: usize> {
    max_number_of_iterations: usize,
    residual_check_interval: usize,
    tolerance: f64,
    sor_factor: f64,
    use_red_black_ordering: bool,
    last_number_of_iterations: usize,
    last_residual: f64,
    ctx: ExecutionContext,

    buffer: FdmVector<N>,
    residual: FdmVector<N>,
    residual_compressed: Vec<f64>,
}

pub type FdmGaussSeidelSolver2 = FdmGaussSeidelSolver<2>;
pub type FdmGaussSeidelSolver3 = FdmGaussSeidelSolver<3>;

impl<const N: usize> FdmGaussSeidelSolver<N> {
    pub fn new(
        max_number_of_iterations: usize,
        residual_check_interval: usize,
        tolerance: f64,
        sor_factor: f64,
        use_red_black_ordering: bool,
    ) -> Self {
        Self {
            max_number_of_iterations,
            residual_check_interval,
            tolerance,
            sor_factor,
            use_red_black_ordering,
            last_number_of_iterations: 0,
            last_residual: f64::MAX,
            ctx: ExecutionContext::serial(),
            buffer: FdmVector::default(),
            residual: FdmVector::default(),
            residual_compressed: Vec::new(),
        }
    }

    /// Run red-black half-sweeps on `ctx`.
    pub fn with_execution(mut self, ctx: ExecutionContext) -> Self {
        self.ctx = ctx;
        self
    }

    pub fn sor_factor(&self) -> f64 {
        self.sor_factor
    }

    pub fn use_red_black_ordering(&self) -> bool {
        self.use_red_black_ordering
    }

    fn validate_params(&self) -> Result<(), SolverError> {
        validate_tolerance("tolerance", self.tolerance)?;
        validate_positive("residual_check_interval", self.residual_check_interval)?;
        validate_sor_factor(self.sor_factor)?;
        Ok(())
    }

    #[inline]
    fn should_check(&self, iter: usize) -> bool {
        iter != 0 && iter % self.residual_check_interval == 0
    }
}

impl<const N: usize> FdmLinearSystemSolver<N> for FdmGaussSeidelSolver<N> {
    fn solve(&mut self, system: &mut FdmLinearSystem<N>) -> Result<bool, SolverError> {
        system.validate()?;
        self.validate_params()?;
        debug!(
            "GS: size={:?}, tol={:.2e}, max_iter={}, sor={}, red_black={}",
            system.a.size(),
            self.tolerance,
            self.max_number_of_iterations,
            self.sor_factor,
            self.use_red_black_ordering,
        );

        let order = SweepOrder::from_red_black(self.use_red_black_ordering);
        self.residual.resize(system.x.size());
        self.last_number_of_iterations = self.max_number_of_iterations;

        for iter in 0..self.max_number_of_iterations {
            gauss_seidel_sweep(
                &system.a,
                &system.b,
                self.sor_factor,
                order,
                &mut system.x,
                &mut self.buffer,
                &self.ctx,
            );

            if self.should_check(iter) {
                FdmBlas::<N>::residual(&system.a, &system.x, &system.b, &mut self.residual);
                let norm = FdmBlas::<N>::l2_norm(&self.residual);
                trace!("GS iter {iter}: ||r|| = {norm:.6e}");
                if norm <= self.tolerance {
                    self.last_number_of_iterations = iter + 1;
                    break;
                }
            }
        }

        FdmBlas::<N>::residual(&system.a, &system.x, &system.b, &mut self.residual);
        self.last_residual = FdmBlas::<N>::l2_norm(&self.residual);
        Ok(self.last_residual <= self.tolerance)
    }

    fn solve_compressed(
        &mut self,
        system: &mut FdmCompressedLinearSystem,
    ) -> Result<bool, SolverError> {
        system.validate()?;
        self.validate_params()?;
        debug!(
            "GS: n={}, nnz={}, tol={:.2e}, max_iter={}, sor={}",
            system.a.rows,
            system.a.nnz(),
            self.tolerance,
            self.max_number_of_iterations,
            self.sor_factor,
        );

        self.last_number_of_iterations = self.max_number_of_iterations;
        for iter in 0..self.max_number_of_iterations {
            gauss_seidel_sweep_compressed(&system.a, &system.b, self.sor_factor, &mut system.x);

            if self.should_check(iter) {
                CompressedBlas::residual(&system.a, &system.x, &system.b, &mut self.residual_compressed);
                let norm = CompressedBlas::l2_norm(&self.residual_compressed);
                trace!("GS iter {iter}: ||r|| = {norm:.6e}");
                if norm <= self.tolerance {
                    self.last_number_of_iterations = iter + 1;
                    break;
                }
            }
        }

        CompressedBlas::residual(&system.a, &system.x, &system.b, &mut self.residual_compressed);
        self.last_residual = CompressedBlas::l2_norm(&self.residual_compressed);
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

    fn rhs(size: [usize; 2]) -> FdmVector<2> {
        let mut b = FdmVector::new(size);
        b.update_each(&ExecutionContext::serial(), |i, _, v| *v = 1.0 + (i % 3) as f64);
        b
    }

    #[test]
    fn lexicographic_matches_compressed_sweep() {
        let mut system = FdmLinearSystem::<2>::new([5, 4]);
        system.a = laplacian_matrix([5, 4], 1.0);
        system.b = rhs([5, 4]);
        let compressed = FdmCompressedLinearSystem::from_stencil(&system).unwrap();

        let mut x = system.x.clone();
        let mut buffer = FdmVector::default();
        let mut xc = compressed.x.clone();
        for _ in 0..3 {
            gauss_seidel_sweep(
                &system.a,
                &system.b,
                1.2,
                SweepOrder::Lexicographic,
                &mut x,
                &mut buffer,
                &ExecutionContext::serial(),
            );
            gauss_seidel_sweep_compressed(&compressed.a, &compressed.b, 1.2, &mut xc);
        }
        for (p, q) in x.iter().zip(&xc) {
            assert!((p - q).abs() < 1e-12);
        }
    }

    #[test]
    fn red_black_parallel_matches_serial() {
        let a = laplacian_matrix([6, 6], 1.0);
        let b = rhs([6, 6]);
        let ctx = ExecutionContext::parallel(2).unwrap();

        let mut xs = FdmVector::<2>::new([6, 6]);
        let mut xp = FdmVector::<2>::new([6, 6]);
        let mut bs = FdmVector::default();
        let mut bp = FdmVector::default();
        for _ in 0..5 {
            gauss_seidel_sweep(&a, &b, 1.0, SweepOrder::RedBlack, &mut xs, &mut bs, &ExecutionContext::serial());
            gauss_seidel_sweep(&a, &b, 1.0, SweepOrder::RedBlack, &mut xp, &mut bp, &ctx);
        }
        assert_eq!(xs, xp);
    }

    #[test]
    fn red_black_second_colour_sees_first() {
        // 2x1 chain: cell 0 is red, cell 1 is black.
        let a = laplacian_matrix([2, 1], 1.0);
        let b = FdmVector::<2>::filled([2, 1], 4.0);
        let mut x = FdmVector::<2>::new([2, 1]);
        let mut buffer = FdmVector::default();
        gauss_seidel_sweep(&a, &b, 1.0, SweepOrder::RedBlack, &mut x, &mut buffer, &ExecutionContext::serial());
        // center 4, neighbour -1: x0 = 4/4 = 1, x1 = (4 + 1)/4.
        assert_eq!(x.as_slice(), &[1.0, 1.25]);
    }

    #[test]
    fn bad_sor_factor_rejected() {
        let mut solver = FdmGaussSeidelSolver2::new(10, 1, 1e-6, 2.5, false);
        let mut system = FdmLinearSystem::<2>::new([2, 2]);
        assert!(matches!(
            solver.solve(&mut system),
            Err(SolverError::InvalidInput(_))
        ));
    }
}
