//! Conjugate Gradient and preconditioned Conjugate Gradient.
//!
//! Solves `Ax = b` for symmetric positive-definite `A` over any [`Blas`]
//! implementation. [`cg`] and [`pcg`] are the generic kernels;
//! [`FdmCgSolver`] and [`FdmPcgSolver`] wrap them for stencil and
//! compressed systems.
//!
//! # Algorithm
//!
//! ```text
//! r = b - A*x
//! d = M^{-1} * r        (d = r for plain CG)
//! sigma = r . d
//!
//! for k in 0..max_iterations:
//!     q = A * d
//!     alpha = sigma / (d . q)
//!     x = x + alpha * d
//!     r = r - alpha * q     (r = b - A*x every 50th step or after sigma grew)
//!     if ||r||_2 <= tolerance:
//!         break
//!     s = M^{-1} * r
//!     sigma_new = r . s
//!     beta = sigma_new / sigma
//!     d = s + beta * d
//!     sigma = sigma_new
//! ```
//!
//! The tolerance is absolute on `||r||_2`. The initial guess is whatever
//! `x` holds on entry; the solver wrappers zero it first.

use num_traits::{Float, Zero};
use tracing::{debug, trace, warn};

use crate::blas::{Blas, CompressedBlas, FdmBlas};
use crate::error::SolverError;
use crate::grid::{FdmMatrix, FdmVector};
use crate::linear_system::{FdmCompressedLinearSystem, FdmLinearSystem};
use crate::traits::{FdmLinearSystemSolver, Preconditioner};
use crate::types::CsrMatrix;
use crate::validation::validate_tolerance;

/// Recompute the true residual `b - A x` at this iteration interval to shed
/// accumulated drift of the recursive update.
const RESIDUAL_REFRESH_INTERVAL: usize = 50;

// ═══════════════════════════════════════════════════════════════════════════
// Result and scratch types
// ═══════════════════════════════════════════════════════════════════════════

/// Residual after one CG iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvergenceInfo<S = f64> {
    /// Zero-based iteration index.
    pub iteration: usize,
    /// `||r||_2` after the iteration.
    pub residual_norm: S,
}

/// Outcome of one [`cg`] / [`pcg`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationOutcome<S = f64> {
    /// Iterations performed.
    pub iterations: usize,
    /// Final `||r||_2`.
    pub residual_norm: S,
    /// Residual after every iteration.
    pub convergence_history: Vec<ConvergenceInfo<S>>,
}

/// Work vectors reused across solves of the same size.
pub struct CgScratch<B: Blas> {
    r: B::Vector,
    d: B::Vector,
    q: B::Vector,
    s: B::Vector,
}

impl<B: Blas> Default for CgScratch<B> {
    fn default() -> Self {
        Self {
            r: B::Vector::default(),
            d: B::Vector::default(),
            q: B::Vector::default(),
            s: B::Vector::default(),
        }
    }
}

impl<B: Blas> CgScratch<B> {
    fn resize_like(&mut self, template: &B::Vector) {
        B::resize_like(template, &mut self.r);
        B::resize_like(template, &mut self.d);
        B::resize_like(template, &mut self.q);
        B::resize_like(template, &mut self.s);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Preconditioners
// ═══════════════════════════════════════════════════════════════════════════

/// Identity preconditioner; turns [`pcg`] into plain CG.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPreconditioner;

impl<B: Blas> Preconditioner<B> for NullPreconditioner {
    fn build(&mut self, _matrix: &B::Matrix) {}

    fn solve(&mut self, b: &B::Vector, x: &mut B::Vector) {
        B::copy(b, x);
    }
}

/// Jacobi preconditioner `M = diag(A)`.
///
/// Zero or near-zero diagonal entries are replaced with `1.0` to prevent
/// division by zero.
#[derive(Debug, Clone, Default)]
pub struct DiagonalPreconditioner {
    inv_diag: Vec<f64>,
}

impl DiagonalPreconditioner {
    #[inline]
    fn invert(diag: f64) -> f64 {
        if diag.abs() > f64::EPSILON {
            1.0 / diag
        } else {
            1.0
        }
    }

    /// Inverse diagonal from the last build.
    pub fn inverse_diagonal(&self) -> &[f64] {
        &self.inv_diag
    }

    /// `z[i] = inv_diag[i] * r[i]`.
    #[inline]
    fn apply(&self, r: &[f64], z: &mut [f64]) {
        debug_assert_eq!(self.inv_diag.len(), r.len());
        for ((zi, &ri), &di) in z.iter_mut().zip(r).zip(&self.inv_diag) {
            *zi = di * ri;
        }
    }
}

impl<const N: usize> Preconditioner<FdmBlas<N>> for DiagonalPreconditioner {
    fn build(&mut self, matrix: &FdmMatrix<N>) {
        self.inv_diag.clear();
        self.inv_diag
            .extend(matrix.iter().map(|row| Self::invert(row.center)));
    }

    fn solve(&mut self, b: &FdmVector<N>, x: &mut FdmVector<N>) {
        x.resize(b.size());
        self.apply(b.as_slice(), x.as_mut_slice());
    }
}

impl Preconditioner<CompressedBlas> for DiagonalPreconditioner {
    fn build(&mut self, matrix: &CsrMatrix<f64>) {
        self.inv_diag = matrix.diagonal().into_iter().map(Self::invert).collect();
    }

    fn solve(&mut self, b: &Vec<f64>, x: &mut Vec<f64>) {
        x.resize(b.len(), 0.0);
        self.apply(b, x);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// CG / PCG kernels
// ═══════════════════════════════════════════════════════════════════════════

/// Plain Conjugate Gradient. See [`pcg`].
pub fn cg<B: Blas>(
    a: &B::Matrix,
    b: &B::Vector,
    max_iterations: usize,
    tolerance: B::Scalar,
    x: &mut B::Vector,
    scratch: &mut CgScratch<B>,
) -> IterationOutcome<B::Scalar> {
    pcg::<B, _>(a, b, max_iterations, tolerance, &mut NullPreconditioner, x, scratch)
}

/// Preconditioned Conjugate Gradient.
///
/// Returns the number of iterations performed and the final residual norm.
/// With `max_iterations == 0`, or when the initial residual already
/// satisfies `tolerance`, returns `(0, ||b - A x||)` without touching `x`.
///
/// Numerical breakdown (`d . q == 0`, a non-finite step, or a vanishing
/// `r . M^{-1} r`) stops the iteration early with a `warn!` event; the
/// residual at that point is reported.
pub fn pcg<B: Blas, P: Preconditioner<B>>(
    a: &B::Matrix,
    b: &B::Vector,
    max_iterations: usize,
    tolerance: B::Scalar,
    preconditioner: &mut P,
    x: &mut B::Vector,
    scratch: &mut CgScratch<B>,
) -> IterationOutcome<B::Scalar> {
    scratch.resize_like(b);
    let CgScratch { r, d, q, s } = scratch;

    // --- r = b - A*x ---
    B::residual(a, x, b, r);
    let mut residual_norm = B::l2_norm(r);

    if max_iterations == 0 || residual_norm <= tolerance {
        return IterationOutcome {
            iterations: 0,
            residual_norm,
            convergence_history: Vec::new(),
        };
    }

    // --- d = M^{-1} * r, sigma = r . d ---
    preconditioner.build(a);
    preconditioner.solve(r, d);
    let mut sigma = B::dot(r, d);

    let mut convergence_history = Vec::with_capacity(max_iterations.min(256));
    if sigma.is_zero() {
        warn!("PCG: r . M^-1 r vanished before the first iteration");
        return IterationOutcome {
            iterations: 0,
            residual_norm,
            convergence_history,
        };
    }

    let mut iterations = 0;
    let mut refresh = false;

    for k in 0..max_iterations {
        // --- q = A * d ---
        B::mvm(a, d, q);

        // --- alpha = sigma / (d . q) ---
        let d_dot_q = B::dot(d, q);
        let alpha = sigma / d_dot_q;
        if d_dot_q.is_zero() || !alpha.is_finite() {
            warn!("PCG: breakdown at iteration {k}: d.q = {d_dot_q:.4e}, alpha = {alpha:?}");
            break;
        }

        // --- x = x + alpha * d ---
        B::axpy_assign(alpha, d, x);

        // --- r = r - alpha * q, or the true residual when drift is likely ---
        if refresh || (k > 0 && k % RESIDUAL_REFRESH_INTERVAL == 0) {
            B::residual(a, x, b, r);
            refresh = false;
        } else {
            B::axpy_assign(-alpha, q, r);
        }

        residual_norm = B::l2_norm(r);
        iterations = k + 1;
        convergence_history.push(ConvergenceInfo {
            iteration: k,
            residual_norm,
        });
        trace!("PCG iter {k}: ||r|| = {residual_norm:.6e}");

        if residual_norm <= tolerance {
            break;
        }

        // --- s = M^{-1} * r, sigma_new = r . s ---
        preconditioner.solve(r, s);
        let sigma_new = B::dot(r, s);
        if sigma_new.is_zero() {
            warn!("PCG: r . M^-1 r vanished at iteration {k}");
            break;
        }
        if sigma_new > sigma {
            refresh = true;
        }

        // --- d = s + beta * d ---
        let beta = sigma_new / sigma;
        B::xpay_assign(s, beta, d);
        sigma = sigma_new;
    }

    IterationOutcome {
        iterations,
        residual_norm,
        convergence_history,
    }
}

/// Acceptance rule shared by the CG-family solvers.
///
/// A solve counts as successful when the residual meets the tolerance *or*
/// the iteration stopped before the cap (for instance after breakdown).
/// This is deliberately looser than a residual-only test.
#[inline]
pub fn solve_accepted(
    last_residual: f64,
    tolerance: f64,
    last_number_of_iterations: usize,
    max_number_of_iterations: usize,
) -> bool {
    last_residual <= tolerance || last_number_of_iterations < max_number_of_iterations
}

// ═══════════════════════════════════════════════════════════════════════════
// Solvers
// ═══════════════════════════════════════════════════════════════════════════

/// Bookkeeping shared by the CG-family solvers.
#[derive(Debug, Clone, Default)]
pub(crate) struct SolveRecord {
    pub(crate) last_number_of_iterations: usize,
    pub(crate) last_residual: f64,
    pub(crate) convergence_history: Vec<ConvergenceInfo>,
}

impl SolveRecord {
    pub(crate) fn update(&mut self, outcome: IterationOutcome) {
        self.last_number_of_iterations = outcome.iterations;
        self.last_residual = outcome.residual_norm;
        self.convergence_history = outcome.convergence_history;
    }

    pub(crate) fn accepted(&self, tolerance: f64, max_number_of_iterations: usize) -> bool {
        solve_accepted(
            self.last_residual,
            tolerance,
            self.last_number_of_iterations,
            max_number_of_iterations,
        )
    }
}

macro_rules! cg_solver_accessors {
    () => {
        fn tolerance(&self) -> f64 {
            self.tolerance
        }

        fn last_residual(&self) -> f64 {
            self.record.last_residual
        }

        fn max_number_of_iterations(&self) -> usize {
            self.max_number_of_iterations
        }

        fn last_number_of_iterations(&self) -> usize {
            self.record.last_number_of_iterations
        }
    };
}
pub(crate) use cg_solver_accessors;

/// Plain CG solver for stencil and compressed systems.
pub struct FdmCgSolver<const N: usize> {
    max_number_of_iterations: usize,
    tolerance: f64,
    record: SolveRecord,
    scratch: CgScratch<FdmBlas<N>>,
    compressed_scratch: CgScratch<CompressedBlas>,
}

pub type FdmCgSolver2 = FdmCgSolver<2>;
pub type FdmCgSolver3 = FdmCgSolver<3>;

impl<const N: usize> FdmCgSolver<N> {
    pub fn new(max_number_of_iterations: usize, tolerance: f64) -> Self {
        Self {
            max_number_of_iterations,
            tolerance,
            record: SolveRecord::default(),
            scratch: CgScratch::default(),
            compressed_scratch: CgScratch::default(),
        }
    }

    /// Residual after every iteration of the last solve.
    pub fn convergence_history(&self) -> &[ConvergenceInfo] {
        &self.record.convergence_history
    }
}

impl<const N: usize> FdmLinearSystemSolver<N> for FdmCgSolver<N> {
    fn solve(&mut self, system: &mut FdmLinearSystem<N>) -> Result<bool, SolverError> {
        system.validate()?;
        validate_tolerance("tolerance", self.tolerance)?;
        debug!(
            "CG: size={:?}, tol={:.2e}, max_iter={}",
            system.a.size(),
            self.tolerance,
            self.max_number_of_iterations,
        );

        system.x.fill(0.0);
        let outcome = cg::<FdmBlas<N>>(
            &system.a,
            &system.b,
            self.max_number_of_iterations,
            self.tolerance,
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
            "CG: n={}, nnz={}, tol={:.2e}, max_iter={}",
            system.a.rows,
            system.a.nnz(),
            self.tolerance,
            self.max_number_of_iterations,
        );

        system.x.fill(0.0);
        let outcome = cg::<CompressedBlas>(
            &system.a,
            &system.b,
            self.max_number_of_iterations,
            self.tolerance,
            &mut system.x,
            &mut self.compressed_scratch,
        );
        self.record.update(outcome);
        Ok(self.record.accepted(self.tolerance, self.max_number_of_iterations))
    }

    cg_solver_accessors!();
}

/// CG with a diagonal (Jacobi) preconditioner.
pub struct FdmPcgSolver<const N: usize> {
    max_number_of_iterations: usize,
    tolerance: f64,
    record: SolveRecord,
    preconditioner: DiagonalPreconditioner,
    scratch: CgScratch<FdmBlas<N>>,
    compressed_scratch: CgScratch<CompressedBlas>,
}

pub type FdmPcgSolver2 = FdmPcgSolver<2>;
pub type FdmPcgSolver3 = FdmPcgSolver<3>;

impl<const N: usize> FdmPcgSolver<N> {
    pub fn new(max_number_of_iterations: usize, tolerance: f64) -> Self {
        Self {
            max_number_of_iterations,
            tolerance,
            record: SolveRecord::default(),
            preconditioner: DiagonalPreconditioner::default(),
            scratch: CgScratch::default(),
            compressed_scratch: CgScratch::default(),
        }
    }

    /// Residual after every iteration of the last solve.
    pub fn convergence_history(&self) -> &[ConvergenceInfo] {
        &self.record.convergence_history
    }
}

impl<const N: usize> FdmLinearSystemSolver<N> for FdmPcgSolver<N> {
    fn solve(&mut self, system: &mut FdmLinearSystem<N>) -> Result<bool, SolverError> {
        system.validate()?;
        validate_tolerance("tolerance", self.tolerance)?;
        debug!(
            "PCG: size={:?}, tol={:.2e}, max_iter={}",
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
            "PCG: n={}, nnz={}, tol={:.2e}, max_iter={}",
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
            &mut self.preconditioner,
            &mut system.x,
            &mut self.compressed_scratch,
        );
        self.record.update(outcome);
        Ok(self.record.accepted(self.tolerance, self.max_number_of_iterations))
    }

    cg_solver_accessors!();
}

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════
