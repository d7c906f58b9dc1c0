//! Model Poisson operators on regular grids.
//!
//! The negative Laplacian with homogeneous Dirichlet boundaries: every cell
//! gets `2N / h^2` on the diagonal and `-1 / h^2` towards each in-grid
//! neighbour. Cells outside the grid are fixed at zero, so boundary rows
//! remain strictly diagonally dominant and the operator is SPD.

use crate::execution::ExecutionContext;
use crate::grid::{FdmMatrix, FdmMatrixRow, FdmVector};
use crate::linear_system::{FdmLinearSystem, FdmMgLinearSystem};

/// Fill `a` with the Dirichlet Laplacian for grid spacing `spacing`.
pub fn fill_laplacian<const N: usize>(a: &mut FdmMatrix<N>, spacing: f64, ctx: &ExecutionContext) {
    let inv_h2 = 1.0 / (spacing * spacing);
    let size = a.size();
    a.update_each(ctx, |_, coord, row| {
        let mut neighbors = [0.0; N];
        for axis in 0..N {
            if coord[axis] + 1 < size[axis] {
                neighbors[axis] = -inv_h2;
            }
        }
        *row = FdmMatrixRow::new(2.0 * N as f64 * inv_h2, neighbors);
    });
}

/// Dirichlet Laplacian of resolution `size`.
pub fn laplacian_matrix<const N: usize>(size: [usize; N], spacing: f64) -> FdmMatrix<N> {
    let mut a = FdmMatrix::new(size);
    fill_laplacian(&mut a, spacing, &ExecutionContext::serial());
    a
}

/// Poisson system `-Δu = f` with `b[cell] = rhs(coord)` and `x = 0`.
pub fn poisson_system<const N: usize>(
    size: [usize; N],
    spacing: f64,
    rhs: impl Fn([usize; N]) -> f64 + Sync + Send,
    ctx: &ExecutionContext,
) -> FdmLinearSystem<N> {
    let mut system = FdmLinearSystem::new(size);
    fill_laplacian(&mut system.a, spacing, ctx);
    system.b.update_each(ctx, |_, coord, v| *v = rhs(coord));
    system
}

/// Fill every level of `system.a` with the Laplacian for that level's
/// spacing (`spacing * 2^level`) and zero the unknowns.
///
/// The caller sets `system.b.levels[0]`; coarser right-hand sides are
/// produced by restriction during the V-cycle.
pub fn fill_mg_laplacian<const N: usize>(
    system: &mut FdmMgLinearSystem<N>,
    spacing: f64,
    ctx: &ExecutionContext,
) {
    let mut h = spacing;
    for level in 0..system.number_of_levels() {
        fill_laplacian(&mut system.a.levels[level], h, ctx);
        system.x.levels[level].fill_with(0.0, ctx);
        system.b.levels[level].fill_with(0.0, ctx);
        h *= 2.0;
    }
}

/// Multigrid Poisson hierarchy of at most `max_number_of_levels` levels
/// whose finest right-hand side is `finest`.
pub fn mg_poisson_system<const N: usize>(
    finest: &FdmVector<N>,
    spacing: f64,
    max_number_of_levels: usize,
    ctx: &ExecutionContext,
) -> FdmMgLinearSystem<N> {
    let mut system = FdmMgLinearSystem::default();
    system.resize_with_finest(finest.size(), max_number_of_levels);
    fill_mg_laplacian(&mut system, spacing, ctx);
    system.b.levels[0].set(finest);
    system
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn laplacian_rows() {
        let a = laplacian_matrix([3, 3], 0.5);
        assert_eq!(a[[0, 0]].center, 16.0);
        assert_eq!(a[[0, 0]].neighbors, [-4.0, -4.0]);
        assert_eq!(a[[2, 1]].neighbors, [0.0, -4.0]);
        assert_eq!(a[[2, 2]].neighbors, [0.0, 0.0]);
    }

    #[test]
    fn mg_levels_double_spacing() {
        let b = FdmVector::<2>::filled([8, 8], 1.0);
        let system = mg_poisson_system(&b, 1.0, 3, &ExecutionContext::serial());
        assert_eq!(system.number_of_levels(), 3);
        assert_eq!(system.a.levels[0][[0, 0]].center, 4.0);
        assert_eq!(system.a.levels[1][[0, 0]].center, 1.0);
        assert_eq!(system.a.levels[2][[0, 0]].center, 0.25);
        assert!(system.b.levels[0].iter().all(|&v| v == 1.0));
        assert!(system.validate().is_ok());
    }
}
