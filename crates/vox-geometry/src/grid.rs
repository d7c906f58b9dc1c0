//! Dense N-dimensional grids and the finite-difference stencil matrix.
//!
//! A [`Grid`] stores its cells with the x axis varying fastest, so the cell
//! at `[i, j, k]` lives at `i + size[0] * (j + size[1] * k)`.
//!
//! The FDM matrix is never stored explicitly. Each cell carries an
//! [`FdmMatrixRow`]: its diagonal coefficient and one coupling coefficient
//! per axis towards the `+axis` neighbour. The coupling towards the `-axis`
//! neighbour is read from that neighbour's row, which makes the implied
//! matrix symmetric by construction.

use std::ops::{Index, IndexMut};

use rayon::prelude::*;

use crate::execution::ExecutionContext;

/// Number of cells of a grid with the given resolution.
#[inline]
pub fn cell_count<const N: usize>(size: [usize; N]) -> usize {
    size.iter().product()
}

/// Linear-index strides of a grid with the given resolution.
#[inline]
pub fn strides<const N: usize>(size: [usize; N]) -> [usize; N] {
    let mut strides = [1usize; N];
    for axis in 1..N {
        strides[axis] = strides[axis - 1] * size[axis - 1];
    }
    strides
}

/// Coordinate of the cell stored at `index`.
#[inline]
pub fn coord_of<const N: usize>(size: [usize; N], mut index: usize) -> [usize; N] {
    let mut coord = [0usize; N];
    for axis in 0..N {
        coord[axis] = index % size[axis];
        index /= size[axis];
    }
    coord
}

/// Step `coord` to the next cell in storage order (x fastest), wrapping to
/// the origin after the last cell.
#[inline]
pub fn advance_coord<const N: usize>(coord: &mut [usize; N], size: [usize; N]) {
    for axis in 0..N {
        coord[axis] += 1;
        if coord[axis] < size[axis] {
            return;
        }
        coord[axis] = 0;
    }
}

/// Dense N-dimensional array of cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid<T, const N: usize> {
    size: [usize; N],
    data: Vec<T>,
}

impl<T, const N: usize> Default for Grid<T, N> {
    fn default() -> Self {
        Self {
            size: [0; N],
            data: Vec::new(),
        }
    }
}

impl<T, const N: usize> Grid<T, N> {
    /// Resolution of the grid.
    #[inline]
    pub fn size(&self) -> [usize; N] {
        self.size
    }

    /// Number of cells.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// `true` if any axis has zero resolution.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Linear-index strides of this grid.
    #[inline]
    pub fn strides(&self) -> [usize; N] {
        strides(self.size)
    }

    /// Linear index of `coord`.
    #[inline]
    pub fn index_of(&self, coord: [usize; N]) -> usize {
        let mut index = 0;
        let mut stride = 1;
        for axis in 0..N {
            debug_assert!(coord[axis] < self.size[axis], "coordinate out of bounds");
            index += coord[axis] * stride;
            stride *= self.size[axis];
        }
        index
    }

    /// Coordinate of the cell stored at `index`.
    #[inline]
    pub fn coord_of(&self, index: usize) -> [usize; N] {
        coord_of(self.size, index)
    }

    /// Visit every cell index in storage order (x fastest).
    pub fn for_each_index(&self, mut f: impl FnMut(usize, [usize; N])) {
        if self.data.is_empty() {
            return;
        }
        let mut coord = [0usize; N];
        for index in 0..self.data.len() {
            f(index, coord);
            advance_coord(&mut coord, self.size);
        }
    }

    /// Iterator over the cells in storage order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.data.iter()
    }
}

impl<T: Clone + Default, const N: usize> Grid<T, N> {
    /// Create a grid with every cell set to `T::default()`.
    pub fn new(size: [usize; N]) -> Self {
        Self::filled(size, T::default())
    }

    /// Create a grid with every cell set to `value`.
    pub fn filled(size: [usize; N], value: T) -> Self {
        Self {
            size,
            data: vec![value; cell_count(size)],
        }
    }

    /// Change the resolution. Contents are reset to `T::default()` when the
    /// size changes and left untouched otherwise.
    pub fn resize(&mut self, size: [usize; N]) {
        if self.size != size {
            self.size = size;
            self.data.clear();
            self.data.resize(cell_count(size), T::default());
        }
    }

    /// Set every cell to `value`.
    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    /// Copy size and contents from `other`.
    pub fn set(&mut self, other: &Self) {
        self.size = other.size;
        self.data.clone_from(&other.data);
    }
}

impl<T: Clone + Send + Sync, const N: usize> Grid<T, N> {
    /// Set every cell to `value`, in parallel when `ctx` allows it.
    pub fn fill_with(&mut self, value: T, ctx: &ExecutionContext) {
        if ctx.is_parallel() {
            let data = &mut self.data;
            ctx.install(|| data.par_iter_mut().for_each(|v| *v = value.clone()));
        } else {
            self.data.fill(value);
        }
    }

    /// Apply `f(index, coord, &mut cell)` to every cell, in parallel when
    /// `ctx` allows it. `f` must not depend on visiting order.
    pub fn update_each<F>(&mut self, ctx: &ExecutionContext, f: F)
    where
        F: Fn(usize, [usize; N], &mut T) + Sync + Send,
    {
        let size = self.size;
        if ctx.is_parallel() {
            let data = &mut self.data;
            ctx.install(|| {
                data.par_iter_mut()
                    .enumerate()
                    .for_each(|(index, cell)| f(index, coord_of(size, index), cell));
            });
        } else {
            let mut coord = [0usize; N];
            for (index, cell) in self.data.iter_mut().enumerate() {
                f(index, coord, cell);
                advance_coord(&mut coord, size);
            }
        }
    }
}

impl<T, const N: usize> Index<[usize; N]> for Grid<T, N> {
    type Output = T;

    #[inline]
    fn index(&self, coord: [usize; N]) -> &T {
        let index = self.index_of(coord);
        &self.data[index]
    }
}

impl<T, const N: usize> IndexMut<[usize; N]> for Grid<T, N> {
    #[inline]
    fn index_mut(&mut self, coord: [usize; N]) -> &mut T {
        let index = self.index_of(coord);
        &mut self.data[index]
    }
}

// ---------------------------------------------------------------------------
// FDM vector / matrix
// ---------------------------------------------------------------------------

/// Grid of unknowns or right-hand-side values.
pub type FdmVector<const N: usize> = Grid<f64, N>;
pub type FdmVector2 = FdmVector<2>;
pub type FdmVector3 = FdmVector<3>;

/// One row of the stencil matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FdmMatrixRow<const N: usize> {
    /// Diagonal coefficient `a_ii`.
    pub center: f64,
    /// Coupling towards the `+axis` neighbour, per axis (right, up, front).
    pub neighbors: [f64; N],
}

impl<const N: usize> Default for FdmMatrixRow<N> {
    fn default() -> Self {
        Self {
            center: 0.0,
            neighbors: [0.0; N],
        }
    }
}

impl<const N: usize> FdmMatrixRow<N> {
    pub fn new(center: f64, neighbors: [f64; N]) -> Self {
        Self { center, neighbors }
    }

    /// Coupling towards the `+x` neighbour.
    #[inline]
    pub fn right(&self) -> f64 {
        self.neighbors[0]
    }

    /// Coupling towards the `+y` neighbour.
    #[inline]
    pub fn up(&self) -> f64 {
        self.neighbors[1]
    }
}

impl FdmMatrixRow<3> {
    /// Coupling towards the `+z` neighbour.
    #[inline]
    pub fn front(&self) -> f64 {
        self.neighbors[2]
    }
}

/// Stencil matrix: one [`FdmMatrixRow`] per cell.
pub type FdmMatrix<const N: usize> = Grid<FdmMatrixRow<N>, N>;
pub type FdmMatrix2 = FdmMatrix<2>;
pub type FdmMatrix3 = FdmMatrix<3>;

impl<const N: usize> Grid<FdmMatrixRow<N>, N> {
    /// `sum_{j != i} a_ij x_j` for the cell at `index` / `coord`.
    ///
    /// `strides` must be the strides of this grid; it is passed in so hot
    /// loops compute it once.
    #[inline]
    pub fn off_diagonal_product(
        &self,
        x: &[f64],
        index: usize,
        coord: [usize; N],
        strides: &[usize; N],
    ) -> f64 {
        let rows = self.as_slice();
        let mut sum = 0.0;
        for axis in 0..N {
            let stride = strides[axis];
            if coord[axis] > 0 {
                sum += rows[index - stride].neighbors[axis] * x[index - stride];
            }
            if coord[axis] + 1 < self.size[axis] {
                sum += rows[index].neighbors[axis] * x[index + stride];
            }
        }
        sum
    }

    /// Row `index` of the implied matrix as `(column, value)` pairs, in
    /// ascending column order.
    pub fn row_entries(&self, index: usize) -> Vec<(usize, f64)> {
        let coord = self.coord_of(index);
        let strides = self.strides();
        let rows = self.as_slice();
        let mut entries = Vec::with_capacity(2 * N + 1);

        for axis in (0..N).rev() {
            if coord[axis] > 0 {
                let j = index - strides[axis];
                entries.push((j, rows[j].neighbors[axis]));
            }
        }
        entries.push((index, rows[index].center));
        for axis in 0..N {
            if coord[axis] + 1 < self.size[axis] {
                entries.push((index + strides[axis], rows[index].neighbors[axis]));
            }
        }
        entries
    }
}
