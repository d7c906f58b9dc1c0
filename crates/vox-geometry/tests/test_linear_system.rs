//! Integration tests for the linear system containers and grid hierarchies.

mod helpers;

use vox_geometry::blas::{Blas, CompressedBlas, FdmBlas};
use vox_geometry::error::ValidationError;
use vox_geometry::execution::ExecutionContext;
use vox_geometry::grid::{FdmVector, Grid};
use vox_geometry::linear_system::{
    FdmCompressedLinearSystem, FdmLinearSystem, FdmMgLinearSystem,
};
use vox_geometry::mg_utils::{
    correct, resize_array_with_coarsest, resize_array_with_finest, restrict,
};
use vox_geometry::stencil::{laplacian_matrix, mg_poisson_system};

use helpers::{max_abs_diff, random_stencil_system, random_vector};

fn level_sizes<T, const N: usize>(levels: &[Grid<T, N>]) -> Vec<[usize; N]> {
    levels.iter().map(|l| l.size()).collect()
}

// ---------------------------------------------------------------------------
// Hierarchy sizing
// ---------------------------------------------------------------------------

#[test]
fn test_resize_with_finest_stops_at_odd_axis() {
    let mut levels: Vec<FdmVector<2>> = Vec::new();
    resize_array_with_finest([12, 20], 5, &mut levels);
    assert_eq!(level_sizes(&levels), vec![[12, 20], [6, 10], [3, 5]]);
}

#[test]
fn test_resize_with_finest_respects_level_cap() {
    let mut levels: Vec<FdmVector<3>> = Vec::new();
    resize_array_with_finest([64, 32, 16], 3, &mut levels);
    assert_eq!(
        level_sizes(&levels),
        vec![[64, 32, 16], [32, 16, 8], [16, 8, 4]]
    );
}

#[test]
fn test_finest_and_coarsest_agree() {
    let mut from_finest: Vec<FdmVector<2>> = Vec::new();
    let mut from_coarsest: Vec<FdmVector<2>> = Vec::new();
    resize_array_with_finest([24, 8], 10, &mut from_finest);
    resize_array_with_coarsest([3, 1], 4, &mut from_coarsest);
    assert_eq!(level_sizes(&from_finest), level_sizes(&from_coarsest));
}

#[test]
fn test_hierarchy_resize_idempotent() {
    let mut system = FdmMgLinearSystem::<2>::default();
    system.resize_with_finest([16, 8], 6);
    let first = level_sizes(&system.a.levels);
    system.resize_with_finest([16, 8], 6);
    assert_eq!(level_sizes(&system.a.levels), first);
    assert_eq!(first.len(), 4);

    system.resize_with_coarsest([2, 1], 4);
    assert_eq!(level_sizes(&system.x.levels), first);
    assert_eq!(level_sizes(&system.b.levels), first);
    assert!(system.validate().is_ok());
}

#[test]
fn test_resize_with_coarsest_floors_level_count() {
    let mut levels: Vec<FdmVector<3>> = Vec::new();
    resize_array_with_coarsest([2, 2, 2], 0, &mut levels);
    assert_eq!(level_sizes(&levels), vec![[2, 2, 2]]);
}

// ---------------------------------------------------------------------------
// Transfer operators
// ---------------------------------------------------------------------------

#[test]
fn test_restrict_and_correct_preserve_constants() {
    let ctx = ExecutionContext::serial();
    let fine = FdmVector::<3>::filled([8, 6, 4], 2.5);
    let mut coarse = FdmVector::<3>::new([4, 3, 2]);
    restrict(&fine, &mut coarse, &ctx);
    assert!(coarse.iter().all(|&v| (v - 2.5).abs() < 1e-14));

    let mut corrected = FdmVector::<3>::filled([8, 6, 4], 1.0);
    correct(&coarse, &mut corrected, &ctx);
    assert!(corrected.iter().all(|&v| (v - 3.5).abs() < 1e-14));
}

#[test]
fn test_transfer_parallel_matches_serial() {
    let mut fine = FdmVector::<2>::new([32, 16]);
    fine.as_mut_slice().copy_from_slice(&random_vector(32 * 16, 5));

    let mut serial = FdmVector::<2>::new([16, 8]);
    let mut parallel = serial.clone();
    restrict(&fine, &mut serial, &ExecutionContext::serial());
    restrict(&fine, &mut parallel, &ExecutionContext::parallel(3).unwrap());
    assert_eq!(serial, parallel);
}

// ---------------------------------------------------------------------------
// Compression
// ---------------------------------------------------------------------------

#[test]
fn test_compressed_product_matches_stencil() {
    let system = random_stencil_system([5, 4, 3], 9);
    let compressed = FdmCompressedLinearSystem::from_stencil(&system).unwrap();
    assert!(compressed.a.is_symmetric(0.0));
    assert_eq!(compressed.a.rows, 60);

    let mut v = FdmVector::<3>::new([5, 4, 3]);
    v.as_mut_slice().copy_from_slice(&random_vector(60, 10));
    let flat = v.as_slice().to_vec();

    let mut stencil_out = FdmVector::<3>::default();
    let mut csr_out = Vec::new();
    FdmBlas::<3>::mvm(&system.a, &v, &mut stencil_out);
    CompressedBlas::mvm(&compressed.a, &flat, &mut csr_out);
    assert!(max_abs_diff(stencil_out.as_slice(), &csr_out) < 1e-14);
}

#[test]
fn test_laplacian_rows_sum_to_boundary_weight() {
    let a = laplacian_matrix([4, 4], 1.0);
    // Interior rows sum to zero; a corner loses two neighbours.
    let interior: f64 = a.row_entries(a.index_of([1, 2])).iter().map(|e| e.1).sum();
    let corner: f64 = a.row_entries(0).iter().map(|e| e.1).sum();
    assert_eq!(interior, 0.0);
    assert_eq!(corner, 2.0);
}

#[test]
fn test_scatter_solution_round_trip() {
    let mut system = random_stencil_system([4, 3], 3);
    let mut compressed = FdmCompressedLinearSystem::from_stencil(&system).unwrap();
    compressed.x = (0..12).map(|i| i as f64).collect();

    compressed.scatter_solution(&mut system.x).unwrap();
    assert_eq!(system.x[[2, 1]], 6.0);
    assert_eq!(system.x.as_slice(), compressed.x.as_slice());
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[test]
fn test_stencil_size_mismatch_names_grid() {
    let mut system = FdmLinearSystem::<2>::new([4, 4]);
    system.b = FdmVector::new([4, 3]);

    match system.validate() {
        Err(ValidationError::SizeMismatch {
            what,
            expected,
            actual,
        }) => {
            assert_eq!(what, "b");
            assert_eq!(expected, vec![4, 4]);
            assert_eq!(actual, vec![4, 3]);
        }
        other => panic!("expected SizeMismatch, got {other:?}"),
    }
}

#[test]
fn test_compressed_length_mismatch() {
    let system = random_stencil_system([3, 3], 2);
    let mut compressed = FdmCompressedLinearSystem::from_stencil(&system).unwrap();
    compressed.x.pop();
    assert!(matches!(
        compressed.validate(),
        Err(ValidationError::DimensionMismatch(_))
    ));
}

#[test]
fn test_hierarchy_must_halve() {
    let b = FdmVector::<2>::filled([8, 8], 1.0);
    let mut system = mg_poisson_system(&b, 1.0, 3, &ExecutionContext::serial());
    assert!(system.validate().is_ok());

    system.a.levels[2] = Grid::new([3, 3]);
    system.x.levels[2] = FdmVector::new([3, 3]);
    system.b.levels[2] = FdmVector::new([3, 3]);
    assert!(matches!(
        system.validate(),
        Err(ValidationError::InvalidHierarchy { level: 2, .. })
    ));
}

#[test]
fn test_hierarchy_level_counts_must_match() {
    let b = FdmVector::<2>::filled([8, 8], 1.0);
    let mut system = mg_poisson_system(&b, 1.0, 3, &ExecutionContext::serial());
    system.x.levels.pop();
    assert!(matches!(
        system.validate(),
        Err(ValidationError::InvalidHierarchy { .. })
    ));
}
