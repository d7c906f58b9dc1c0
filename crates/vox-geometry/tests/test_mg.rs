//! Integration tests for the multigrid solver.

mod helpers;

use vox_geometry::blas::{Blas, FdmBlas};
use vox_geometry::execution::ExecutionContext;
use vox_geometry::grid::FdmVector;
use vox_geometry::linear_system::FdmMgLinearSystem;
use vox_geometry::mg::{FdmMgSolver2, FdmMgSolver3, MgParameters, RelaxationMethod};
use vox_geometry::stencil::mg_poisson_system;
use vox_geometry::{FdmLinearSystemSolver, FdmMgLinearSystemSolver, SolverError};

fn finest_residual<const N: usize>(system: &FdmMgLinearSystem<N>) -> f64 {
    let mut r = FdmVector::<N>::default();
    FdmBlas::<N>::residual(&system.a.levels[0], &system.x.levels[0], &system.b.levels[0], &mut r);
    FdmBlas::<N>::l2_norm(&r)
}

fn poisson_2d(levels: usize) -> FdmMgLinearSystem<2> {
    let b = FdmVector::<2>::filled([16, 16], 1.0);
    mg_poisson_system(&b, 1.0 / 16.0, levels, &ExecutionContext::serial())
}

fn params(levels: usize) -> MgParameters {
    MgParameters {
        max_number_of_levels: levels,
        ..MgParameters::default()
    }
}

#[test]
fn test_mg_converges_with_repeated_cycles() {
    let mut system = poisson_2d(4);
    assert_eq!(system.number_of_levels(), 4);
    let mut solver = FdmMgSolver2::new(params(4)).with_max_number_of_cycles(20);

    assert!(solver.solve_mg(&mut system).unwrap());
    assert!(solver.last_residual() < solver.params().max_tolerance);
    assert!(solver.last_number_of_iterations() <= 8);
    assert!(finest_residual(&system) < 1e-9);
}

#[test]
fn test_mg_each_cycle_reduces_residual() {
    let mut system = poisson_2d(4);
    let mut solver = FdmMgSolver2::new(params(4));
    assert_eq!(solver.max_number_of_cycles(), 1);

    let mut previous = finest_residual(&system);
    for _ in 0..4 {
        // One cycle per call, continuing from the current iterate.
        solver.solve_mg(&mut system).unwrap();
        assert!(solver.last_residual() < 0.1 * previous);
        previous = solver.last_residual();
    }
}

#[test]
fn test_mg_jacobi_relaxation_3d() {
    let b = FdmVector::<3>::filled([8, 8, 8], 1.0);
    let mut system = mg_poisson_system(&b, 1.0, 3, &ExecutionContext::serial());
    let initial = finest_residual(&system);

    let mut solver = FdmMgSolver3::new(MgParameters {
        max_number_of_levels: 3,
        relaxation: RelaxationMethod::Jacobi,
        max_tolerance: 1e-6,
        ..MgParameters::default()
    })
    .with_max_number_of_cycles(30);

    assert!(solver.solve_mg(&mut system).unwrap());
    assert!(solver.last_residual() < 1e-6 * initial);
}

#[test]
fn test_mg_parallel_matches_serial() {
    let mut serial = poisson_2d(3);
    let mut parallel = serial.clone();
    let red_black = MgParameters {
        max_number_of_levels: 3,
        use_red_black_ordering: true,
        sor_factor: 1.0,
        ..MgParameters::default()
    };

    let mut s = FdmMgSolver2::new(red_black.clone()).with_max_number_of_cycles(3);
    let mut p = FdmMgSolver2::new(red_black)
        .with_max_number_of_cycles(3)
        .with_execution(ExecutionContext::parallel(4).unwrap());
    s.solve_mg(&mut serial).unwrap();
    p.solve_mg(&mut parallel).unwrap();

    assert_eq!(serial.x.levels[0], parallel.x.levels[0]);
    assert_eq!(s.last_residual(), p.last_residual());
}

#[test]
fn test_mg_failure_when_cycles_exhausted() {
    let mut system = poisson_2d(4);
    let mut solver = FdmMgSolver2::new(params(4));

    assert!(!solver.solve_mg(&mut system).unwrap());
    assert_eq!(solver.last_number_of_iterations(), 1);
    assert_eq!(solver.max_number_of_iterations(), 1);
    assert_eq!(solver.tolerance(), 1e-9);
}

#[test]
fn test_mg_rejects_broken_hierarchy() {
    let mut system = poisson_2d(3);
    system.b.levels[2] = FdmVector::new([3, 3]);
    let mut solver = FdmMgSolver2::new(params(3));

    assert!(matches!(
        solver.solve_mg(&mut system),
        Err(SolverError::InvalidInput(_))
    ));
}

#[test]
fn test_mg_rejects_bad_parameters() {
    let mut system = poisson_2d(2);
    let mut solver = FdmMgSolver2::new(MgParameters {
        sor_factor: 2.5,
        ..params(2)
    });

    assert!(matches!(
        solver.solve_mg(&mut system),
        Err(SolverError::InvalidInput(_))
    ));
}
