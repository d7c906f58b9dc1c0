//! Shared test helpers for the vox-geometry integration test suite.
//!
//! Provides deterministic random system generators, a dense reference
//! solver, and residual utilities used across all test modules.

#![allow(dead_code)]

use glam::DVec3;
use vox_geometry::blas::{Blas, FdmBlas};
use vox_geometry::grid::{coord_of, FdmMatrixRow, FdmVector};
use vox_geometry::linear_system::{FdmCompressedLinearSystem, FdmLinearSystem};
use vox_geometry::types::CsrMatrix;

// ---------------------------------------------------------------------------
// Random number generator (simple LCG for deterministic reproducibility)
// ---------------------------------------------------------------------------

/// A minimal linear congruential generator for deterministic test data.
pub struct Lcg {
    state: u64,
}

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state
    }

    /// Uniform f64 in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform f64 in [lo, hi).
    pub fn next_f64_range(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }
}

// ---------------------------------------------------------------------------
// System generators
// ---------------------------------------------------------------------------

/// The 2x2 system `[[4, 1], [1, 3]] x = [1, 2]` as a 2 x 1 stencil grid.
///
/// Exact solution: `[1/11, 7/11]`.
pub fn two_by_two_system() -> FdmLinearSystem<2> {
    let mut system = FdmLinearSystem::<2>::new([2, 1]);
    system.a[[0, 0]] = FdmMatrixRow::new(4.0, [1.0, 0.0]);
    system.a[[1, 0]] = FdmMatrixRow::new(3.0, [0.0, 0.0]);
    system.b[[0, 0]] = 1.0;
    system.b[[1, 0]] = 2.0;
    system
}

pub const TWO_BY_TWO_SOLUTION: [f64; 2] = [1.0 / 11.0, 7.0 / 11.0];

/// Random symmetric stencil system with a constant diagonal of `2N + 1`
/// and off-diagonal couplings in `[-1, 0)`, so every row is strictly
/// diagonally dominant. `b` is uniform in `[-1, 1)`.
pub fn random_stencil_system<const N: usize>(size: [usize; N], seed: u64) -> FdmLinearSystem<N> {
    let mut rng = Lcg::new(seed);
    let mut system = FdmLinearSystem::<N>::new(size);
    let center = 2.0 * N as f64 + 1.0;
    for i in 0..system.a.len() {
        let coord = coord_of(size, i);
        let mut neighbors = [0.0; N];
        for axis in 0..N {
            if coord[axis] + 1 < size[axis] {
                neighbors[axis] = rng.next_f64_range(-1.0, 0.0);
            }
        }
        system.a.as_mut_slice()[i] = FdmMatrixRow::new(center, neighbors);
        system.b.as_mut_slice()[i] = rng.next_f64_range(-1.0, 1.0);
    }
    system
}

/// Random symmetric, strictly diagonally dominant CSR matrix.
pub fn random_spd_csr(n: usize, density: f64, seed: u64) -> CsrMatrix<f64> {
    let mut rng = Lcg::new(seed);
    let mut entries = Vec::new();
    let mut row_sums = vec![0.0f64; n];
    for i in 0..n {
        for j in (i + 1)..n {
            if rng.next_f64() < density {
                let v = rng.next_f64_range(-1.0, 1.0);
                entries.push((i, j, v));
                entries.push((j, i, v));
                row_sums[i] += v.abs();
                row_sums[j] += v.abs();
            }
        }
    }
    for (i, sum) in row_sums.iter().enumerate() {
        entries.push((i, i, sum + 1.0));
    }
    CsrMatrix::<f64>::from_coo(n, n, entries)
}

/// Deterministic random vector of length `n` in `[-1, 1)`.
pub fn random_vector(n: usize, seed: u64) -> Vec<f64> {
    let mut rng = Lcg::new(seed);
    (0..n).map(|_| rng.next_f64_range(-1.0, 1.0)).collect()
}

/// Deterministic random points inside `[0, extent)^3`.
pub fn random_points(n: usize, extent: f64, seed: u64) -> Vec<DVec3> {
    let mut rng = Lcg::new(seed);
    (0..n)
        .map(|_| {
            DVec3::new(
                rng.next_f64_range(0.0, extent),
                rng.next_f64_range(0.0, extent),
                rng.next_f64_range(0.0, extent),
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Dense reference solver
// ---------------------------------------------------------------------------

/// Solve `Ax = b` by Gaussian elimination with partial pivoting.
///
/// # Panics
///
/// Panics if the matrix is singular or dimensions are inconsistent.
pub fn dense_solve(matrix: &CsrMatrix<f64>, rhs: &[f64]) -> Vec<f64> {
    let n = matrix.rows;
    assert_eq!(n, matrix.cols, "dense_solve requires a square matrix");
    assert_eq!(rhs.len(), n, "rhs length must match matrix dimension");

    let mut aug = vec![vec![0.0f64; n + 1]; n];
    for i in 0..n {
        aug[i][n] = rhs[i];
        for (j, &v) in matrix.row_entries(i) {
            aug[i][j] += v;
        }
    }

    for col in 0..n {
        let mut max_row = col;
        for row in (col + 1)..n {
            if aug[row][col].abs() > aug[max_row][col].abs() {
                max_row = row;
            }
        }
        assert!(aug[max_row][col].abs() > 1e-15, "matrix is singular");
        aug.swap(col, max_row);

        let pivot = aug[col][col];
        for row in (col + 1)..n {
            let factor = aug[row][col] / pivot;
            for j in col..=n {
                aug[row][j] -= factor * aug[col][j];
            }
        }
    }

    let mut x = vec![0.0f64; n];
    for i in (0..n).rev() {
        let mut sum = aug[i][n];
        for j in (i + 1)..n {
            sum -= aug[i][j] * x[j];
        }
        x[i] = sum / aug[i][i];
    }
    x
}

/// Dense solution of a stencil system, via its compressed form.
pub fn dense_solve_stencil<const N: usize>(system: &FdmLinearSystem<N>) -> Vec<f64> {
    let compressed = FdmCompressedLinearSystem::from_stencil(system).unwrap();
    dense_solve(&compressed.a, &compressed.b)
}

// ---------------------------------------------------------------------------
// Residual utilities
// ---------------------------------------------------------------------------

pub fn l2_norm(v: &[f64]) -> f64 {
    v.iter().map(|&x| x * x).sum::<f64>().sqrt()
}

/// `max_i |a_i - b_i|`.
pub fn max_abs_diff<'a>(
    a: impl IntoIterator<Item = &'a f64>,
    b: impl IntoIterator<Item = &'a f64>,
) -> f64 {
    a.into_iter()
        .zip(b)
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}

/// `||b - A x||_2` of a stencil system.
pub fn stencil_residual_norm<const N: usize>(system: &FdmLinearSystem<N>) -> f64 {
    let mut r = FdmVector::<N>::default();
    FdmBlas::<N>::residual(&system.a, &system.x, &system.b, &mut r);
    FdmBlas::<N>::l2_norm(&r)
}

/// `||b - A x||_2` of a compressed system.
pub fn compressed_residual_norm(system: &FdmCompressedLinearSystem) -> f64 {
    let mut r = vec![0.0; system.b.len()];
    system.a.residual(&system.x, &system.b, &mut r);
    l2_norm(&r)
}
