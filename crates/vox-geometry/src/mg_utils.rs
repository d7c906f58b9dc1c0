//! Grid-hierarchy helpers for the multigrid solvers.
//!
//! Level 0 is the finest grid; level `k + 1` has exactly half the per-axis
//! resolution of level `k`.

use crate::execution::ExecutionContext;
use crate::grid::{FdmVector, Grid};

/// Separable restriction weights applied to fine cells
/// `2c - 1, 2c, 2c + 1, 2c + 2` along each axis.
const RESTRICT_KERNEL: [f64; 4] = [0.125, 0.375, 0.375, 0.125];

/// Resize `levels` to `number_of_levels` grids whose last (coarsest) level
/// has resolution `coarsest`, doubling every axis towards level 0.
///
/// `number_of_levels` is floored to 1.
pub fn resize_array_with_coarsest<T: Clone + Default, const N: usize>(
    coarsest: [usize; N],
    number_of_levels: usize,
    levels: &mut Vec<Grid<T, N>>,
) {
    let number_of_levels = number_of_levels.max(1);
    levels.resize_with(number_of_levels, Grid::default);

    let mut size = coarsest;
    for level in (0..number_of_levels).rev() {
        levels[level].resize(size);
        for s in size.iter_mut() {
            *s *= 2;
        }
    }
}

/// Resize `levels` to a hierarchy whose level 0 has resolution `finest`.
///
/// Axes are halved while every axis is even and fewer than
/// `max_number_of_levels` levels have been produced.
pub fn resize_array_with_finest<T: Clone + Default, const N: usize>(
    finest: [usize; N],
    max_number_of_levels: usize,
    levels: &mut Vec<Grid<T, N>>,
) {
    let mut coarsest = finest;
    let mut number_of_levels = 1;
    while number_of_levels < max_number_of_levels
        && coarsest.iter().all(|&s| s > 0 && s % 2 == 0)
    {
        for s in coarsest.iter_mut() {
            *s /= 2;
        }
        number_of_levels += 1;
    }
    resize_array_with_coarsest(coarsest, number_of_levels, levels);
}

/// Fine-grid indices feeding coarse index `c` on one axis.
#[inline]
fn restrict_taps(c: usize, coarse_n: usize) -> [usize; 4] {
    [
        if c > 0 { 2 * c - 1 } else { 2 * c },
        2 * c,
        2 * c + 1,
        if c + 1 < coarse_n { 2 * c + 2 } else { 2 * c + 1 },
    ]
}

/// Coarse-grid indices and weights interpolated into fine index `f` on one
/// axis.
#[inline]
fn correct_taps(f: usize, fine_n: usize) -> ([usize; 2], [f64; 2]) {
    let c = f / 2;
    if f % 2 == 0 {
        ([if f > 1 { c - 1 } else { c }, c], [0.25, 0.75])
    } else {
        ([c, if f + 1 < fine_n { c + 1 } else { c }], [0.75, 0.25])
    }
}

/// Restrict `finer` onto `coarser` with the separable
/// `(1/8, 3/8, 3/8, 1/8)` kernel. Edge taps are clamped into the grid.
///
/// # Panics
///
/// Debug-asserts that `finer` has twice the per-axis resolution of
/// `coarser`.
pub fn restrict<const N: usize>(
    finer: &FdmVector<N>,
    coarser: &mut FdmVector<N>,
    ctx: &ExecutionContext,
) {
    let coarse_size = coarser.size();
    debug_assert!(
        (0..N).all(|axis| finer.size()[axis] == 2 * coarse_size[axis]),
        "restrict: {:?} is not twice {:?}",
        finer.size(),
        coarse_size,
    );

    let fine_strides = finer.strides();
    let fine = finer.as_slice();
    let combos = 4usize.pow(N as u32);

    coarser.update_each(ctx, |_, coord, out| {
        let mut taps = [[0usize; 4]; N];
        for axis in 0..N {
            taps[axis] = restrict_taps(coord[axis], coarse_size[axis]);
        }

        let mut sum = 0.0;
        for combo in 0..combos {
            let mut rest = combo;
            let mut weight = 1.0;
            let mut index = 0;
            for axis in 0..N {
                let k = rest % 4;
                rest /= 4;
                weight *= RESTRICT_KERNEL[k];
                index += taps[axis][k] * fine_strides[axis];
            }
            sum += weight * fine[index];
        }
        *out = sum;
    });
}

/// Interpolate `coarser` with separable `(1/4, 3/4)` weights and add the
/// result into `finer`.
///
/// # Panics
///
/// Debug-asserts that `finer` has twice the per-axis resolution of
/// `coarser`.
pub fn correct<const N: usize>(
    coarser: &FdmVector<N>,
    finer: &mut FdmVector<N>,
    ctx: &ExecutionContext,
) {
    let fine_size = finer.size();
    debug_assert!(
        (0..N).all(|axis| fine_size[axis] == 2 * coarser.size()[axis]),
        "correct: {:?} is not twice {:?}",
        fine_size,
        coarser.size(),
    );

    let coarse_strides = coarser.strides();
    let coarse = coarser.as_slice();
    let combos = 1usize << N;

    finer.update_each(ctx, |_, coord, out| {
        let mut taps = [([0usize; 2], [0.0f64; 2]); N];
        for axis in 0..N {
            taps[axis] = correct_taps(coord[axis], fine_size[axis]);
        }

        let mut sum = 0.0;
        for combo in 0..combos {
            let mut weight = 1.0;
            let mut index = 0;
            for axis in 0..N {
                let k = (combo >> axis) & 1;
                weight *= taps[axis].1[k];
                index += taps[axis].0[k] * coarse_strides[axis];
            }
            sum += weight * coarse[index];
        }
        *out += sum;
    });
}
