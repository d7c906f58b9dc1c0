//! Geometric multigrid.
//!
//! [`mg_v_cycle`] runs one V-cycle over a grid hierarchy (level 0 finest)
//! for any [`MgBlas`]. The cycle is an explicit two-pass loop:
//!
//! ```text
//! for level in 0..coarsest:                  (downward)
//!     relax x[level]        (number_of_restriction_iter)
//!     buffer[level] = b - A x
//!     b[level + 1]  = restrict(buffer[level])
//!     x[level + 1]  = 0
//! relax x[coarsest]         (number_of_coarsest_iter)
//! for level in (0..coarsest).rev():          (upward)
//!     x[level] += correct(x[level + 1])
//!     relax x[level]        (number_of_correction_iter, or
//!                            number_of_final_iter on level 0)
//! return ||b[0] - A[0] x[0]||_2
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::blas::{Blas, FdmBlas};
use crate::error::SolverError;
use crate::execution::ExecutionContext;
use crate::gauss_seidel::{gauss_seidel_sweep, SweepOrder};
use crate::grid::{FdmMatrix, FdmVector};
use crate::jacobi::jacobi_sweep;
use crate::linear_system::{FdmLinearSystem, FdmMgLinearSystem, FdmMgVector, MgMatrix, MgVector};
use crate::mg_utils;
use crate::traits::{FdmLinearSystemSolver, FdmMgLinearSystemSolver};
use crate::validation::validate_mg_params;

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Smoother used on every level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RelaxationMethod {
    /// Gauss-Seidel / SOR with [`MgParameters::sor_factor`].
    #[default]
    GaussSeidel,
    /// Double-buffered Jacobi.
    Jacobi,
}

/// Multigrid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MgParameters {
    /// Upper bound on the hierarchy depth.
    pub max_number_of_levels: usize,
    /// Pre-smoothing sweeps on the way down.
    pub number_of_restriction_iter: usize,
    /// Post-smoothing sweeps on the way up (levels above 0).
    pub number_of_correction_iter: usize,
    /// Sweeps on the coarsest level.
    pub number_of_coarsest_iter: usize,
    /// Post-smoothing sweeps on level 0.
    pub number_of_final_iter: usize,
    /// A solve succeeds once the finest residual is below this.
    pub max_tolerance: f64,
    pub relaxation: RelaxationMethod,
    /// SOR factor for [`RelaxationMethod::GaussSeidel`].
    pub sor_factor: f64,
    /// Red-black ordering for [`RelaxationMethod::GaussSeidel`].
    pub use_red_black_ordering: bool,
}

impl Default for MgParameters {
    fn default() -> Self {
        Self {
            max_number_of_levels: 1,
            number_of_restriction_iter: 5,
            number_of_correction_iter: 5,
            number_of_coarsest_iter: 20,
            number_of_final_iter: 20,
            max_tolerance: 1e-9,
            relaxation: RelaxationMethod::GaussSeidel,
            sor_factor: 1.5,
            use_red_black_ordering: false,
        }
    }
}

// ---------------------------------------------------------------------------
// MgBlas
// ---------------------------------------------------------------------------

/// [`Blas`] extension with the level operations a V-cycle needs.
pub trait MgBlas: Blas {
    /// `iterations` smoothing sweeps of `a x = b`. `buffer` is scratch of
    /// the same shape as `x`.
    fn relax(
        a: &Self::Matrix,
        b: &Self::Vector,
        iterations: usize,
        params: &MgParameters,
        ctx: &ExecutionContext,
        x: &mut Self::Vector,
        buffer: &mut Self::Vector,
    );

    /// Transfer a fine-level vector to the next coarser level.
    fn restrict(finer: &Self::Vector, coarser: &mut Self::Vector, ctx: &ExecutionContext);

    /// Add the interpolated coarse-level correction into the finer level.
    fn correct(coarser: &Self::Vector, finer: &mut Self::Vector, ctx: &ExecutionContext);
}

impl<const N: usize> MgBlas for FdmBlas<N> {
    fn relax(
        a: &FdmMatrix<N>,
        b: &FdmVector<N>,
        iterations: usize,
        params: &MgParameters,
        ctx: &ExecutionContext,
        x: &mut FdmVector<N>,
        buffer: &mut FdmVector<N>,
    ) {
        match params.relaxation {
            RelaxationMethod::GaussSeidel => {
                let order = SweepOrder::from_red_black(params.use_red_black_ordering);
                for _ in 0..iterations {
                    gauss_seidel_sweep(a, b, params.sor_factor, order, x, buffer, ctx);
                }
            }
            RelaxationMethod::Jacobi => {
                for _ in 0..iterations {
                    jacobi_sweep(a, b, x, buffer, ctx);
                }
            }
        }
    }

    fn restrict(finer: &FdmVector<N>, coarser: &mut FdmVector<N>, ctx: &ExecutionContext) {
        mg_utils::restrict(finer, coarser, ctx);
    }

    fn correct(coarser: &FdmVector<N>, finer: &mut FdmVector<N>, ctx: &ExecutionContext) {
        mg_utils::correct(coarser, finer, ctx);
    }
}

// ---------------------------------------------------------------------------
// V-cycle
// ---------------------------------------------------------------------------

/// Size `buffer` to match the levels of `template`.
pub(crate) fn resize_buffer_like<B: Blas>(template: &MgVector<B>, buffer: &mut MgVector<B>) {
    buffer
        .levels
        .resize_with(template.levels.len(), Default::default);
    for (t, level) in template.levels.iter().zip(buffer.levels.iter_mut()) {
        B::resize_like(t, level);
    }
}

/// One V-cycle. Returns the finest-level residual norm afterwards.
///
/// `a`, `x`, `b` and `buffer` must describe the same non-empty hierarchy
/// (see [`FdmMgLinearSystem::validate`]). Coarse levels of `b` and `x` are
/// overwritten.
pub fn mg_v_cycle<B: MgBlas>(
    a: &MgMatrix<B>,
    params: &MgParameters,
    ctx: &ExecutionContext,
    x: &mut MgVector<B>,
    b: &mut MgVector<B>,
    buffer: &mut MgVector<B>,
) -> B::Scalar {
    let coarsest = a.levels.len().saturating_sub(1);

    for level in 0..coarsest {
        B::relax(
            &a.levels[level],
            &b.levels[level],
            params.number_of_restriction_iter,
            params,
            ctx,
            &mut x.levels[level],
            &mut buffer.levels[level],
        );
        B::residual(
            &a.levels[level],
            &x.levels[level],
            &b.levels[level],
            &mut buffer.levels[level],
        );
        B::restrict(&buffer.levels[level], &mut b.levels[level + 1], ctx);
        B::set(num_traits::zero(), &mut x.levels[level + 1]);
    }

    B::relax(
        &a.levels[coarsest],
        &b.levels[coarsest],
        params.number_of_coarsest_iter,
        params,
        ctx,
        &mut x.levels[coarsest],
        &mut buffer.levels[coarsest],
    );

    for level in (0..coarsest).rev() {
        let (finer, coarser) = x.levels.split_at_mut(level + 1);
        B::correct(&coarser[0], &mut finer[level], ctx);

        let iterations = if level == 0 {
            params.number_of_final_iter
        } else {
            params.number_of_correction_iter
        };
        B::relax(
            &a.levels[level],
            &b.levels[level],
            iterations,
            params,
            ctx,
            &mut x.levels[level],
            &mut buffer.levels[level],
        );
    }

    B::residual(&a.levels[0], &x.levels[0], &b.levels[0], &mut buffer.levels[0]);
    B::l2_norm(&buffer.levels[0])
}

// ---------------------------------------------------------------------------
// FdmMgSolver
// ---------------------------------------------------------------------------

/// Multigrid solver running V-cycles until the finest residual drops below
/// [`MgParameters::max_tolerance`].
pub struct FdmMgSolver<const N: usize> {
    params: MgParameters,
    max_number_of_cycles: usize,
    last_number_of_iterations: usize,
    last_residual: f64,
    ctx: ExecutionContext,
    buffer: FdmMgVector<N>,
}

pub type FdmMgSolver2 = FdmMgSolver<2>;
pub type FdmMgSolver3 = FdmMgSolver<3>;

impl<const N: usize> FdmMgSolver<N> {
    /// One V-cycle per solve; see [`with_max_number_of_cycles`](Self::with_max_number_of_cycles).
    pub fn new(params: MgParameters) -> Self {
        Self {
            params,
            max_number_of_cycles: 1,
            last_number_of_iterations: 0,
            last_residual: f64::MAX,
            ctx: ExecutionContext::serial(),
            buffer: FdmMgVector::default(),
        }
    }

    pub fn with_max_number_of_cycles(mut self, max_number_of_cycles: usize) -> Self {
        self.max_number_of_cycles = max_number_of_cycles;
        self
    }

    /// Run level operations on `ctx`.
    pub fn with_execution(mut self, ctx: ExecutionContext) -> Self {
        self.ctx = ctx;
        self
    }

    pub fn max_number_of_cycles(&self) -> usize {
        self.max_number_of_cycles
    }
}

impl<const N: usize> FdmLinearSystemSolver<N> for FdmMgSolver<N> {
    /// Flat systems carry no hierarchy; always `Ok(false)`.
    fn solve(&mut self, _system: &mut FdmLinearSystem<N>) -> Result<bool, SolverError> {
        Ok(false)
    }

    fn tolerance(&self) -> f64 {
        self.params.max_tolerance
    }

    fn last_residual(&self) -> f64 {
        self.last_residual
    }

    fn max_number_of_iterations(&self) -> usize {
        self.max_number_of_cycles
    }

    fn last_number_of_iterations(&self) -> usize {
        self.last_number_of_iterations
    }
}

impl<const N: usize> FdmMgLinearSystemSolver<N> for FdmMgSolver<N> {
    fn solve_mg(&mut self, system: &mut FdmMgLinearSystem<N>) -> Result<bool, SolverError> {
        system.validate()?;
        validate_mg_params(&self.params)?;
        debug!(
            "MG: finest={:?}, levels={}, tol={:.2e}, max_cycles={}",
            system.a.levels[0].size(),
            system.number_of_levels(),
            self.params.max_tolerance,
            self.max_number_of_cycles,
        );

        resize_buffer_like(&system.x, &mut self.buffer);

        self.last_number_of_iterations = self.max_number_of_cycles;
        FdmBlas::<N>::residual(
            &system.a.levels[0],
            &system.x.levels[0],
            &system.b.levels[0],
            &mut self.buffer.levels[0],
        );
        self.last_residual = FdmBlas::<N>::l2_norm(&self.buffer.levels[0]);

        for cycle in 0..self.max_number_of_cycles {
            self.last_residual = mg_v_cycle(
                &system.a,
                &self.params,
                &self.ctx,
                &mut system.x,
                &mut system.b,
                &mut self.buffer,
            );
            trace!("MG cycle {cycle}: ||r|| = {:.6e}", self.last_residual);

            if self.last_residual < self.params.max_tolerance {
                self.last_number_of_iterations = cycle + 1;
                break;
            }
        }

        Ok(self.last_residual < self.params.max_tolerance)
    }

    fn params(&self) -> &MgParameters {
        &self.params
    }
}
