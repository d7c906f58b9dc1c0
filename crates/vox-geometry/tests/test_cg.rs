//! Integration tests for the CG and diagonal-PCG solvers.
//!
//! Tests cover the zero-iteration contract, exact convergence on a small
//! SPD system, residual monotonicity, stencil/compressed agreement and the
//! success rule shared by the CG family.

mod helpers;

use approx::assert_relative_eq;
use vox_geometry::blas::FdmBlas;
use vox_geometry::cg::{cg, CgScratch, FdmCgSolver2, FdmCgSolver3, FdmPcgSolver2, FdmPcgSolver3};
use vox_geometry::grid::FdmVector;
use vox_geometry::linear_system::{FdmCompressedLinearSystem, FdmLinearSystem};
use vox_geometry::{FdmLinearSystemSolver, SolverError};

use helpers::{
    dense_solve_stencil, max_abs_diff, random_stencil_system, stencil_residual_norm,
    two_by_two_system, TWO_BY_TWO_SOLUTION,
};

// ---------------------------------------------------------------------------
// Zero iterations
// ---------------------------------------------------------------------------

#[test]
fn test_cg_zero_iterations_leave_x_untouched() {
    let system = random_stencil_system([4, 4], 3);
    let mut x = FdmVector::<2>::filled([4, 4], 0.25);
    let mut scratch = CgScratch::<FdmBlas<2>>::default();

    let outcome = cg::<FdmBlas<2>>(&system.a, &system.b, 0, 1e-10, &mut x, &mut scratch);

    assert_eq!(outcome.iterations, 0);
    assert!(outcome.convergence_history.is_empty());
    assert!(x.iter().all(|&v| v == 0.25));

    let mut with_x = system.clone();
    with_x.x = x;
    assert_relative_eq!(outcome.residual_norm, stencil_residual_norm(&with_x), epsilon = 1e-12);
}

#[test]
fn test_cg_solver_zero_iterations() {
    let mut system = random_stencil_system([4, 4], 3);
    let mut solver = FdmCgSolver2::new(0, 1e-10);

    let ok = solver.solve(&mut system).unwrap();

    assert!(!ok, "nothing was solved and the residual is above tolerance");
    assert_eq!(solver.last_number_of_iterations(), 0);
    assert_relative_eq!(
        solver.last_residual(),
        helpers::l2_norm(system.b.as_slice()),
        epsilon = 1e-12
    );
}

#[test]
fn test_cg_zero_rhs_converges_immediately() {
    let mut system = random_stencil_system([5, 3], 9);
    system.b.fill(0.0);
    let mut solver = FdmCgSolver2::new(100, 1e-12);

    assert!(solver.solve(&mut system).unwrap());
    assert_eq!(solver.last_number_of_iterations(), 0);
    assert_eq!(solver.last_residual(), 0.0);
}

// ---------------------------------------------------------------------------
// Known 2x2 system
// ---------------------------------------------------------------------------

#[test]
fn test_cg_two_by_two() {
    let mut system = two_by_two_system();
    let mut solver = FdmCgSolver2::new(10, 1e-12);

    assert!(solver.solve(&mut system).unwrap());
    assert!(solver.last_number_of_iterations() <= 2);
    assert_relative_eq!(system.x[[0, 0]], TWO_BY_TWO_SOLUTION[0], epsilon = 1e-12);
    assert_relative_eq!(system.x[[1, 0]], TWO_BY_TWO_SOLUTION[1], epsilon = 1e-12);
}

#[test]
fn test_cg_two_by_two_zero_tolerance() {
    let mut system = two_by_two_system();
    let mut solver = FdmCgSolver2::new(10, 0.0);

    assert!(solver.solve(&mut system).unwrap());
    assert!(solver.last_number_of_iterations() <= 2);
    assert_relative_eq!(system.x[[0, 0]], TWO_BY_TWO_SOLUTION[0], epsilon = 1e-14);
    assert_relative_eq!(system.x[[1, 0]], TWO_BY_TWO_SOLUTION[1], epsilon = 1e-14);
}

#[test]
fn test_pcg_two_by_two() {
    let mut system = two_by_two_system();
    let mut solver = FdmPcgSolver2::new(10, 1e-12);

    assert!(solver.solve(&mut system).unwrap());
    assert!(solver.last_number_of_iterations() <= 2);
    assert_relative_eq!(system.x[[0, 0]], TWO_BY_TWO_SOLUTION[0], epsilon = 1e-12);
    assert_relative_eq!(system.x[[1, 0]], TWO_BY_TWO_SOLUTION[1], epsilon = 1e-12);
}

#[test]
fn test_cg_two_by_two_compressed() {
    let mut compressed = FdmCompressedLinearSystem::from_stencil(&two_by_two_system()).unwrap();
    let mut solver = FdmCgSolver2::new(10, 1e-12);

    assert!(solver.solve_compressed(&mut compressed).unwrap());
    assert!(solver.last_number_of_iterations() <= 2);
    assert!(max_abs_diff(&compressed.x, &TWO_BY_TWO_SOLUTION) < 1e-12);
}

// ---------------------------------------------------------------------------
// Convergence behaviour
// ---------------------------------------------------------------------------

#[test]
fn test_cg_residual_monotone_on_diagonally_dominant_system() {
    let mut system = random_stencil_system([6, 6, 6], 7);
    let initial = helpers::l2_norm(system.b.as_slice());
    let mut solver = FdmCgSolver3::new(200, 1e-10);

    assert!(solver.solve(&mut system).unwrap());

    let history = solver.convergence_history();
    assert!(!history.is_empty());
    assert!(history[0].residual_norm < initial);
    for pair in history.windows(2) {
        assert!(
            pair[1].residual_norm <= pair[0].residual_norm,
            "residual grew at iteration {}: {:.3e} -> {:.3e}",
            pair[1].iteration,
            pair[0].residual_norm,
            pair[1].residual_norm
        );
    }
    assert_eq!(history.len(), solver.last_number_of_iterations());
}

#[test]
fn test_pcg_residual_monotone_on_diagonally_dominant_system() {
    let mut system = random_stencil_system([16, 16], 11);
    let mut solver = FdmPcgSolver2::new(200, 1e-10);

    assert!(solver.solve(&mut system).unwrap());

    let history = solver.convergence_history();
    for pair in history.windows(2) {
        assert!(pair[1].residual_norm <= pair[0].residual_norm);
    }
    assert!(stencil_residual_norm(&system) <= 1e-9);
}

#[test]
fn test_cg_matches_dense_solution() {
    let mut system = random_stencil_system([5, 4, 3], 21);
    let exact = dense_solve_stencil(&system);
    let mut solver = FdmCgSolver3::new(500, 1e-12);

    assert!(solver.solve(&mut system).unwrap());
    assert!(max_abs_diff(system.x.as_slice(), &exact) < 1e-10);
}

#[test]
fn test_stencil_and_compressed_solves_agree() {
    let mut system = random_stencil_system([7, 5], 5);
    let mut compressed = FdmCompressedLinearSystem::from_stencil(&system).unwrap();

    let mut pcg = FdmPcgSolver2::new(200, 1e-11);
    assert!(pcg.solve(&mut system).unwrap());
    let stencil_iterations = pcg.last_number_of_iterations();
    assert!(pcg.solve_compressed(&mut compressed).unwrap());

    // Summation order differs between the two layouts.
    assert!(pcg.last_number_of_iterations().abs_diff(stencil_iterations) <= 1);
    assert!(max_abs_diff(system.x.as_slice(), &compressed.x) < 1e-10);

    let mut scattered = FdmVector::<2>::new([7, 5]);
    compressed.scatter_solution(&mut scattered).unwrap();
    assert!(max_abs_diff(scattered.as_slice(), system.x.as_slice()) < 1e-10);
}

// ---------------------------------------------------------------------------
// Success rule
// ---------------------------------------------------------------------------

/// The CG family reports success when the residual meets the tolerance
/// *or* the iteration stopped before the cap. A singular (all-zero) matrix
/// breaks down on the first step, so the solve "succeeds" with a residual
/// far above tolerance.
#[test]
fn test_cg_success_rule_accepts_early_breakdown() {
    let mut system = FdmLinearSystem::<2>::new([3, 3]);
    system.b.fill(1.0);
    let mut solver = FdmCgSolver2::new(50, 1e-10);

    let ok = solver.solve(&mut system).unwrap();

    assert!(ok);
    assert_eq!(solver.last_number_of_iterations(), 0);
    assert!(solver.last_residual() > solver.tolerance());
}

#[test]
fn test_cg_reports_failure_at_iteration_cap() {
    let mut system = random_stencil_system([16, 16], 11);
    let mut solver = FdmCgSolver2::new(3, 1e-12);

    assert!(!solver.solve(&mut system).unwrap());
    assert_eq!(solver.last_number_of_iterations(), 3);
    assert!(solver.last_residual() > 1e-12);
}

// ---------------------------------------------------------------------------
// Invalid input
// ---------------------------------------------------------------------------

#[test]
fn test_cg_rejects_mismatched_sizes() {
    let mut system = random_stencil_system([4, 4], 1);
    system.b = FdmVector::new([4, 5]);
    let mut solver = FdmCgSolver2::new(10, 1e-8);

    assert!(matches!(
        solver.solve(&mut system),
        Err(SolverError::InvalidInput(_))
    ));
}

#[test]
fn test_pcg_rejects_non_finite_rhs() {
    let mut system = random_stencil_system([3, 3, 3], 1);
    system.b[[1, 1, 1]] = f64::NAN;
    let mut solver = FdmPcgSolver3::new(10, 1e-8);

    assert!(matches!(
        solver.solve(&mut system),
        Err(SolverError::InvalidInput(_))
    ));
}

#[test]
fn test_cg_rejects_negative_tolerance() {
    let mut system = two_by_two_system();
    let mut solver = FdmCgSolver2::new(10, -1.0);
    assert!(solver.solve(&mut system).is_err());
}
