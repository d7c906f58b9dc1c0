//! Compressed sparse row storage for the compressed linear systems.
//!
//! [`CsrMatrix`] is the matrix type behind
//! [`CompressedBlas`](crate::blas::CompressedBlas) and
//! [`FdmCompressedLinearSystem`](crate::linear_system::FdmCompressedLinearSystem).

use std::ops::{AddAssign, Mul, Sub};

// ---------------------------------------------------------------------------
// CsrMatrix<T>
// ---------------------------------------------------------------------------

/// Compressed Sparse Row (CSR) matrix.
///
/// # Layout
///
/// For a matrix with `m` rows and `nnz` non-zeros:
/// - `row_ptr` has length `m + 1`
/// - `col_indices` and `values` each have length `nnz`
/// - Row `i` spans indices `row_ptr[i]..row_ptr[i+1]`, columns ascending
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix<T> {
    /// Row pointers: `row_ptr[i]` is the start index in `col_indices`/`values`
    /// for row `i`.
    pub row_ptr: Vec<usize>,
    /// Column indices for each non-zero entry.
    pub col_indices: Vec<usize>,
    /// Values for each non-zero entry.
    pub values: Vec<T>,
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
}

impl<T> Default for CsrMatrix<T> {
    fn default() -> Self {
        Self {
            row_ptr: vec![0],
            col_indices: Vec::new(),
            values: Vec::new(),
            rows: 0,
            cols: 0,
        }
    }
}

impl<T> CsrMatrix<T> {
    /// Number of non-zero entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Number of stored entries in `row`.
    #[inline]
    pub fn row_degree(&self, row: usize) -> usize {
        self.row_ptr[row + 1] - self.row_ptr[row]
    }

    /// Iterate over `(col_index, &value)` pairs for the given row.
    #[inline]
    pub fn row_entries(&self, row: usize) -> impl Iterator<Item = (usize, &T)> {
        let start = self.row_ptr[row];
        let end = self.row_ptr[row + 1];
        self.col_indices[start..end]
            .iter()
            .copied()
            .zip(self.values[start..end].iter())
    }

    /// `true` for square matrices.
    #[inline]
    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }
}

impl<T: Copy + Default + Mul<Output = T> + AddAssign> CsrMatrix<T> {
    /// Sparse matrix-vector multiply: `y = A * x`.
    ///
    /// # Panics
    ///
    /// Debug-asserts that `x.len() >= self.cols` and `y.len() >= self.rows`.
    #[inline]
    pub fn spmv(&self, x: &[T], y: &mut [T]) {
        debug_assert!(
            x.len() >= self.cols,
            "spmv: x.len()={} < cols={}",
            x.len(),
            self.cols,
        );
        debug_assert!(
            y.len() >= self.rows,
            "spmv: y.len()={} < rows={}",
            y.len(),
            self.rows,
        );

        for (i, yi) in y.iter_mut().enumerate().take(self.rows) {
            *yi = self.row_dot(i, x);
        }
    }

    /// `sum_j a_ij x_j` for a single row.
    #[inline]
    pub fn row_dot(&self, row: usize, x: &[T]) -> T {
        let mut sum = T::default();
        for idx in self.row_ptr[row]..self.row_ptr[row + 1] {
            sum += self.values[idx] * x[self.col_indices[idx]];
        }
        sum
    }

    /// Diagonal entries (zero where a row stores no diagonal).
    pub fn diagonal(&self) -> Vec<T> {
        let n = self.rows.min(self.cols);
        let mut diag = vec![T::default(); n];
        for (i, d) in diag.iter_mut().enumerate() {
            for (c, &v) in self.row_entries(i) {
                if c == i {
                    *d += v;
                }
            }
        }
        diag
    }
}

impl<T: Copy + Default + Mul<Output = T> + AddAssign + Sub<Output = T>> CsrMatrix<T> {
    /// `r = b - A x`.
    #[inline]
    pub fn residual(&self, x: &[T], b: &[T], r: &mut [T]) {
        for (i, ri) in r.iter_mut().enumerate().take(self.rows) {
            *ri = b[i] - self.row_dot(i, x);
        }
    }
}

impl<T: Copy + Default + AddAssign> CsrMatrix<T> {
    /// Build a CSR matrix from COO (coordinate) triplets.
    ///
    /// Entries are sorted by (row, col) internally. Duplicate positions are
    /// summed into a single entry.
    ///
    /// # Panics
    ///
    /// Panics if a row or column index is out of bounds.
    pub fn from_coo(
        rows: usize,
        cols: usize,
        entries: impl IntoIterator<Item = (usize, usize, T)>,
    ) -> Self {
        let mut sorted: Vec<_> = entries.into_iter().collect();
        sorted.sort_by_key(|(r, c, _)| (*r, *c));

        let mut row_ptr = vec![0usize; rows + 1];
        let mut col_indices: Vec<usize> = Vec::with_capacity(sorted.len());
        let mut values: Vec<T> = Vec::with_capacity(sorted.len());
        let mut last: Option<(usize, usize)> = None;

        for (r, c, v) in sorted {
            assert!(r < rows, "row index {} out of bounds (rows={})", r, rows);
            assert!(c < cols, "col index {} out of bounds (cols={})", c, cols);

            if last == Some((r, c)) {
                if let Some(slot) = values.last_mut() {
                    *slot += v;
                }
                continue;
            }
            row_ptr[r + 1] += 1;
            col_indices.push(c);
            values.push(v);
            last = Some((r, c));
        }
        for i in 1..=rows {
            row_ptr[i] += row_ptr[i - 1];
        }

        Self {
            row_ptr,
            col_indices,
            values,
            rows,
            cols,
        }
    }
}

impl CsrMatrix<f64> {
    /// Build a square identity matrix of dimension `n` in CSR format.
    pub fn identity(n: usize) -> Self {
        Self {
            row_ptr: (0..=n).collect(),
            col_indices: (0..n).collect(),
            values: vec![1.0; n],
            rows: n,
            cols: n,
        }
    }

    /// `true` if `a_ij == a_ji` (within `tol`) for every stored entry.
    pub fn is_symmetric(&self, tol: f64) -> bool {
        if !self.is_square() {
            return false;
        }
        (0..self.rows).all(|i| {
            self.row_entries(i).all(|(j, &v)| {
                let mirror = self
                    .row_entries(j)
                    .find(|&(c, _)| c == i)
                    .map_or(0.0, |(_, &w)| w);
                (v - mirror).abs() <= tol
            })
        })
    }
}
