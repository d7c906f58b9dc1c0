//! Finite-difference linear system solvers and spatial query engines.
//!
//! The solvers work on structured 2-D/3-D grids where the matrix is stored
//! as one symmetric stencil row per cell ([`grid::FdmMatrixRow`]), and most
//! of them also accept general CSR systems
//! ([`linear_system::FdmCompressedLinearSystem`]).
//!
//! # Available Solvers
//!
//! | Solver | Method |
//! |--------|--------|
//! | [`FdmCgSolver`](cg::FdmCgSolver) | Conjugate Gradient |
//! | [`FdmPcgSolver`](cg::FdmPcgSolver) | CG with a diagonal preconditioner |
//! | [`FdmIccgSolver`](iccg::FdmIccgSolver) | CG with an IC(0) preconditioner |
//! | [`FdmJacobiSolver`](jacobi::FdmJacobiSolver) | Jacobi iteration |
//! | [`FdmGaussSeidelSolver`](gauss_seidel::FdmGaussSeidelSolver) | Gauss-Seidel / SOR, optional red-black ordering |
//! | [`FdmMgSolver`](mg::FdmMgSolver) | Multigrid V-cycles |
//! | [`FdmMgpcgSolver`](mgpcg::FdmMgpcgSolver) | CG with a V-cycle preconditioner |
//!
//! Spatial queries live in [`query`]: a linear-scan intersection /
//! nearest-neighbour engine and hash-grid point neighbour search.
//!
//! # Example
//!
//! ```rust
//! use vox_geometry::cg::FdmCgSolver3;
//! use vox_geometry::execution::ExecutionContext;
//! use vox_geometry::stencil::poisson_system;
//! use vox_geometry::traits::FdmLinearSystemSolver;
//!
//! // -laplace(u) = 1 on an 8x8x8 grid
//! let mut system = poisson_system([8, 8, 8], 1.0, |_| 1.0, &ExecutionContext::serial());
//!
//! let mut solver = FdmCgSolver3::new(200, 1e-8);
//! assert!(solver.solve(&mut system).unwrap());
//! assert!(solver.last_residual() <= 1e-8);
//! ```

pub mod blas;
pub mod error;
pub mod execution;
pub mod grid;
pub mod linear_system;
pub mod mg_utils;
pub mod query;
pub mod stencil;
pub mod traits;
pub mod types;
pub mod validation;

pub mod cg;
pub mod gauss_seidel;
pub mod iccg;
pub mod jacobi;
pub mod mg;
pub mod mgpcg;

pub use error::{SolverError, ValidationError};
pub use execution::{ExecutionContext, ExecutionPolicy};
pub use traits::{FdmLinearSystemSolver, FdmMgLinearSystemSolver, Preconditioner};
