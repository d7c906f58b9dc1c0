//! BLAS-style vector and matrix operations the solvers are written against.
//!
//! Every iterative solver in this crate is generic over a [`Blas`]
//! implementation, so the same CG / PCG / multigrid code runs on stencil
//! grids ([`FdmBlas`]) and on compressed sparse systems
//! ([`CompressedBlas`]). Dispatch is static.
//!
//! All operations write only their designated output argument.

use std::fmt;
use std::marker::PhantomData;

use num_traits::Float;

use crate::grid::{advance_coord, FdmMatrix, FdmMatrixRow, FdmVector};
use crate::types::CsrMatrix;

/// Vector/matrix kernel set used by the solvers.
pub trait Blas {
    /// Scalar field of the vectors.
    type Scalar: Float + fmt::Debug + fmt::LowerExp;
    /// Vector type (grid of unknowns or flat array).
    type Vector: Clone + Default;
    /// Matrix type (stencil grid or sparse matrix).
    type Matrix: Clone + Default;

    /// Set every element of `result` to `s`.
    fn set(s: Self::Scalar, result: &mut Self::Vector);

    /// Copy `v` into `result` (size included).
    fn copy(v: &Self::Vector, result: &mut Self::Vector);

    /// Set every stored coefficient of `result` to `s`.
    fn set_matrix(s: Self::Scalar, result: &mut Self::Matrix);

    /// Copy `m` into `result` (size included).
    fn copy_matrix(m: &Self::Matrix, result: &mut Self::Matrix);

    /// Resize `result` to the shape of `template`, zero-filled, if the
    /// shapes differ. Contents are kept otherwise.
    fn resize_like(template: &Self::Vector, result: &mut Self::Vector);

    /// Number of unknowns in `v`.
    fn len(v: &Self::Vector) -> usize;

    /// Inner product `a . b`.
    fn dot(a: &Self::Vector, b: &Self::Vector) -> Self::Scalar;

    /// `result = a * x + y`.
    fn axpy(a: Self::Scalar, x: &Self::Vector, y: &Self::Vector, result: &mut Self::Vector);

    /// `y += a * x`.
    fn axpy_assign(a: Self::Scalar, x: &Self::Vector, y: &mut Self::Vector);

    /// `y = x + a * y`.
    fn xpay_assign(x: &Self::Vector, a: Self::Scalar, y: &mut Self::Vector);

    /// `result = m * v`.
    fn mvm(m: &Self::Matrix, v: &Self::Vector, result: &mut Self::Vector);

    /// `result = b - a * x`.
    fn residual(a: &Self::Matrix, x: &Self::Vector, b: &Self::Vector, result: &mut Self::Vector);

    /// Euclidean norm.
    fn l2_norm(v: &Self::Vector) -> Self::Scalar;

    /// Maximum absolute element.
    fn linf_norm(v: &Self::Vector) -> Self::Scalar;
}

// ═══════════════════════════════════════════════════════════════════════════
// Slice kernels shared by both implementations
// ═══════════════════════════════════════════════════════════════════════════

/// Dot product of two `f64` slices with 4-wide accumulation.
///
/// # Panics
///
/// Panics if the lengths differ.
#[inline]
pub fn dot_f64(a: &[f64], b: &[f64]) -> f64 {
    assert_eq!(a.len(), b.len(), "dot_f64: length mismatch");

    let n = a.len();
    let chunks = n / 4;

    let mut acc0: f64 = 0.0;
    let mut acc1: f64 = 0.0;
    let mut acc2: f64 = 0.0;
    let mut acc3: f64 = 0.0;

    for i in 0..chunks {
        let j = i * 4;
        acc0 += a[j] * b[j];
        acc1 += a[j + 1] * b[j + 1];
        acc2 += a[j + 2] * b[j + 2];
        acc3 += a[j + 3] * b[j + 3];
    }
    for j in chunks * 4..n {
        acc0 += a[j] * b[j];
    }

    (acc0 + acc1) + (acc2 + acc3)
}

#[inline]
fn axpy_f64(a: f64, x: &[f64], y: &[f64], result: &mut [f64]) {
    debug_assert_eq!(x.len(), y.len());
    for ((r, &xi), &yi) in result.iter_mut().zip(x).zip(y) {
        *r = a * xi + yi;
    }
}

#[inline]
fn axpy_assign_f64(a: f64, x: &[f64], y: &mut [f64]) {
    debug_assert_eq!(x.len(), y.len());
    for (yi, &xi) in y.iter_mut().zip(x) {
        *yi += a * xi;
    }
}

#[inline]
fn xpay_assign_f64(x: &[f64], a: f64, y: &mut [f64]) {
    debug_assert_eq!(x.len(), y.len());
    for (yi, &xi) in y.iter_mut().zip(x) {
        *yi = xi + a * *yi;
    }
}

#[inline]
fn linf_f64(v: &[f64]) -> f64 {
    v.iter().fold(0.0f64, |m, &x| m.max(x.abs()))
}

// ═══════════════════════════════════════════════════════════════════════════
// FdmBlas
// ═══════════════════════════════════════════════════════════════════════════

/// [`Blas`] over N-dimensional stencil grids.
///
/// The matrix is implicit: [`mvm`](Blas::mvm) couples each cell to its
/// `+axis` neighbours through its own row and to its `-axis` neighbours
/// through theirs.
#[derive(Debug, Clone, Copy, Default)]
pub struct FdmBlas<const N: usize>(PhantomData<[(); N]>);

pub type FdmBlas2 = FdmBlas<2>;
pub type FdmBlas3 = FdmBlas<3>;

impl<const N: usize> Blas for FdmBlas<N> {
    type Scalar = f64;
    type Vector = FdmVector<N>;
    type Matrix = FdmMatrix<N>;

    fn set(s: f64, result: &mut FdmVector<N>) {
        result.fill(s);
    }

    fn copy(v: &FdmVector<N>, result: &mut FdmVector<N>) {
        result.set(v);
    }

    fn set_matrix(s: f64, result: &mut FdmMatrix<N>) {
        result.fill(FdmMatrixRow::new(s, [s; N]));
    }

    fn copy_matrix(m: &FdmMatrix<N>, result: &mut FdmMatrix<N>) {
        result.set(m);
    }

    fn resize_like(template: &FdmVector<N>, result: &mut FdmVector<N>) {
        result.resize(template.size());
    }

    fn len(v: &FdmVector<N>) -> usize {
        v.len()
    }

    fn dot(a: &FdmVector<N>, b: &FdmVector<N>) -> f64 {
        dot_f64(a.as_slice(), b.as_slice())
    }

    fn axpy(a: f64, x: &FdmVector<N>, y: &FdmVector<N>, result: &mut FdmVector<N>) {
        result.resize(x.size());
        axpy_f64(a, x.as_slice(), y.as_slice(), result.as_mut_slice());
    }

    fn axpy_assign(a: f64, x: &FdmVector<N>, y: &mut FdmVector<N>) {
        axpy_assign_f64(a, x.as_slice(), y.as_mut_slice());
    }

    fn xpay_assign(x: &FdmVector<N>, a: f64, y: &mut FdmVector<N>) {
        xpay_assign_f64(x.as_slice(), a, y.as_mut_slice());
    }

    fn mvm(m: &FdmMatrix<N>, v: &FdmVector<N>, result: &mut FdmVector<N>) {
        let size = m.size();
        result.resize(size);
        if m.is_empty() {
            return;
        }

        let strides = m.strides();
        let rows = m.as_slice();
        let x = v.as_slice();
        let mut coord = [0usize; N];
        for (i, out) in result.as_mut_slice().iter_mut().enumerate() {
            *out = rows[i].center * x[i] + m.off_diagonal_product(x, i, coord, &strides);
            advance_coord(&mut coord, size);
        }
    }

    fn residual(a: &FdmMatrix<N>, x: &FdmVector<N>, b: &FdmVector<N>, result: &mut FdmVector<N>) {
        let size = a.size();
        result.resize(size);
        if a.is_empty() {
            return;
        }

        let strides = a.strides();
        let rows = a.as_slice();
        let xs = x.as_slice();
        let bs = b.as_slice();
        let mut coord = [0usize; N];
        for (i, out) in result.as_mut_slice().iter_mut().enumerate() {
            let ax = rows[i].center * xs[i] + a.off_diagonal_product(xs, i, coord, &strides);
            *out = bs[i] - ax;
            advance_coord(&mut coord, size);
        }
    }

    fn l2_norm(v: &FdmVector<N>) -> f64 {
        let s = v.as_slice();
        dot_f64(s, s).sqrt()
    }

    fn linf_norm(v: &FdmVector<N>) -> f64 {
        linf_f64(v.as_slice())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// CompressedBlas
// ═══════════════════════════════════════════════════════════════════════════

/// [`Blas`] over CSR matrices and flat `Vec<f64>` vectors.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompressedBlas;

impl Blas for CompressedBlas {
    type Scalar = f64;
    type Vector = Vec<f64>;
    type Matrix = CsrMatrix<f64>;

    fn set(s: f64, result: &mut Vec<f64>) {
        result.fill(s);
    }

    fn copy(v: &Vec<f64>, result: &mut Vec<f64>) {
        result.clone_from(v);
    }

    fn set_matrix(s: f64, result: &mut CsrMatrix<f64>) {
        result.values.fill(s);
    }

    fn copy_matrix(m: &CsrMatrix<f64>, result: &mut CsrMatrix<f64>) {
        result.clone_from(m);
    }

    fn resize_like(template: &Vec<f64>, result: &mut Vec<f64>) {
        if result.len() != template.len() {
            result.clear();
            result.resize(template.len(), 0.0);
        }
    }

    fn len(v: &Vec<f64>) -> usize {
        v.len()
    }

    fn dot(a: &Vec<f64>, b: &Vec<f64>) -> f64 {
        dot_f64(a, b)
    }

    fn axpy(a: f64, x: &Vec<f64>, y: &Vec<f64>, result: &mut Vec<f64>) {
        result.resize(x.len(), 0.0);
        axpy_f64(a, x, y, result);
    }

    fn axpy_assign(a: f64, x: &Vec<f64>, y: &mut Vec<f64>) {
        axpy_assign_f64(a, x, y);
    }

    fn xpay_assign(x: &Vec<f64>, a: f64, y: &mut Vec<f64>) {
        xpay_assign_f64(x, a, y);
    }

    fn mvm(m: &CsrMatrix<f64>, v: &Vec<f64>, result: &mut Vec<f64>) {
        result.resize(m.rows, 0.0);
        m.spmv(v, result);
    }

    fn residual(a: &CsrMatrix<f64>, x: &Vec<f64>, b: &Vec<f64>, result: &mut Vec<f64>) {
        result.resize(a.rows, 0.0);
        a.residual(x, b, result);
    }

    fn l2_norm(v: &Vec<f64>) -> f64 {
        dot_f64(v, v).sqrt()
    }

    fn linf_norm(v: &Vec<f64>) -> f64 {
        linf_f64(v)
    }
}
