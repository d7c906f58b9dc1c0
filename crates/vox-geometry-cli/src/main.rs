//! CLI for the vox-geometry solvers and point searchers

use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use glam::DVec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Instant;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use vox_geometry::blas::{Blas, FdmBlas};
use vox_geometry::cg::{FdmCgSolver, FdmPcgSolver};
use vox_geometry::gauss_seidel::FdmGaussSeidelSolver;
use vox_geometry::grid::FdmVector;
use vox_geometry::iccg::FdmIccgSolver;
use vox_geometry::jacobi::FdmJacobiSolver;
use vox_geometry::linear_system::FdmMgLinearSystem;
use vox_geometry::mg::{FdmMgSolver, MgParameters};
use vox_geometry::mgpcg::FdmMgpcgSolver;
use vox_geometry::query::{
    PointNeighborSearcher3, PointParallelHashGridSearcher3, PointSimpleListSearcher3,
};
use vox_geometry::stencil::{mg_poisson_system, poisson_system};
use vox_geometry::{ExecutionContext, FdmLinearSystemSolver, FdmMgLinearSystemSolver};

#[derive(Parser)]
#[command(name = "vox")]
#[command(about = "Finite-difference solvers and spatial queries", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve the model Poisson problem -Δu = 1 on the unit square/cube
    Solve {
        /// Solver to run
        #[arg(short, long, value_enum, default_value_t = SolverKind::Mgpcg)]
        solver: SolverKind,

        /// Cells per axis
        #[arg(short, long, default_value_t = 64)]
        resolution: usize,

        /// Grid dimensionality (2 or 3)
        #[arg(short, long, default_value_t = 3, value_parser = clap::value_parser!(u8).range(2..=3))]
        dimensions: u8,

        /// Iteration cap (V-cycles for mg, CG iterations for mgpcg)
        #[arg(short, long, default_value_t = 1000)]
        max_iterations: usize,

        /// Absolute residual tolerance
        #[arg(short, long, default_value_t = 1e-8)]
        tolerance: f64,

        /// Maximum multigrid levels (mg and mgpcg only)
        #[arg(short, long, default_value_t = 5)]
        levels: usize,

        /// Worker threads (1 = serial, 0 = all cores)
        #[arg(long, default_value_t = 1)]
        threads: usize,
    },

    /// Index random points in a hash grid and run radius queries
    Search {
        /// Number of points
        #[arg(short, long, default_value_t = 100_000)]
        points: usize,

        /// Query radius
        #[arg(short, long, default_value_t = 1.0)]
        radius: f64,

        /// Hash-grid buckets per axis
        #[arg(long, default_value_t = 64)]
        resolution: usize,

        /// Number of random queries
        #[arg(short, long, default_value_t = 1000)]
        queries: usize,

        /// Also run the brute-force searcher and compare results
        #[arg(long)]
        verify: bool,

        /// Random seed
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Worker threads for the build (1 = serial, 0 = all cores)
        #[arg(long, default_value_t = 1)]
        threads: usize,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum SolverKind {
    Cg,
    Pcg,
    Iccg,
    Jacobi,
    GaussSeidel,
    Mg,
    Mgpcg,
}

struct SolveOptions {
    solver: SolverKind,
    resolution: usize,
    max_iterations: usize,
    tolerance: f64,
    levels: usize,
    ctx: ExecutionContext,
}

/// Outcome of a solve, reported the same way for every solver.
struct SolveReport {
    converged: bool,
    iterations: usize,
    residual: f64,
    true_residual: f64,
}

fn execution_context(threads: usize) -> anyhow::Result<ExecutionContext> {
    let ctx = match threads {
        0 => ExecutionContext::with_hardware_concurrency()?,
        1 => ExecutionContext::serial(),
        n => ExecutionContext::parallel(n)?,
    };
    debug!("execution policy {:?} with {} threads", ctx.policy(), ctx.threads());
    Ok(ctx)
}

fn mg_params(levels: usize) -> MgParameters {
    MgParameters {
        max_number_of_levels: levels,
        ..MgParameters::default()
    }
}

fn run_flat<const N: usize>(
    opts: &SolveOptions,
    mut solver: Box<dyn FdmLinearSystemSolver<N>>,
) -> anyhow::Result<SolveReport> {
    let n = opts.resolution;
    let mut system = poisson_system([n; N], 1.0 / n as f64, |_| 1.0, &opts.ctx);

    let converged = solver.solve(&mut system)?;

    let mut r = FdmVector::<N>::default();
    FdmBlas::<N>::residual(&system.a, &system.x, &system.b, &mut r);
    Ok(SolveReport {
        converged,
        iterations: solver.last_number_of_iterations(),
        residual: solver.last_residual(),
        true_residual: FdmBlas::<N>::l2_norm(&r),
    })
}

fn run_mg<const N: usize>(
    opts: &SolveOptions,
    mut solver: Box<dyn FdmMgLinearSystemSolver<N>>,
) -> anyhow::Result<SolveReport> {
    let n = opts.resolution;
    let b = FdmVector::<N>::filled([n; N], 1.0);
    let mut system: FdmMgLinearSystem<N> =
        mg_poisson_system(&b, 1.0 / n as f64, opts.levels, &opts.ctx);
    println!("  Levels: {}", system.number_of_levels());

    let converged = solver.solve_mg(&mut system)?;

    let mut r = FdmVector::<N>::default();
    FdmBlas::<N>::residual(
        &system.a.levels[0],
        &system.x.levels[0],
        &system.b.levels[0],
        &mut r,
    );
    Ok(SolveReport {
        converged,
        iterations: solver.last_number_of_iterations(),
        residual: solver.last_residual(),
        true_residual: FdmBlas::<N>::l2_norm(&r),
    })
}

fn solve<const N: usize>(opts: &SolveOptions) -> anyhow::Result<SolveReport> {
    let (max, tol, ctx) = (opts.max_iterations, opts.tolerance, opts.ctx.clone());
    match opts.solver {
        SolverKind::Cg => run_flat::<N>(opts, Box::new(FdmCgSolver::<N>::new(max, tol))),
        SolverKind::Pcg => run_flat::<N>(opts, Box::new(FdmPcgSolver::<N>::new(max, tol))),
        SolverKind::Iccg => run_flat::<N>(opts, Box::new(FdmIccgSolver::<N>::new(max, tol))),
        SolverKind::Jacobi => {
            let solver = FdmJacobiSolver::<N>::new(max, 1, tol).with_execution(ctx);
            run_flat::<N>(opts, Box::new(solver))
        }
        SolverKind::GaussSeidel => {
            // Red-black ordering is the only sweep that runs in parallel.
            let red_black = ctx.is_parallel();
            let solver =
                FdmGaussSeidelSolver::<N>::new(max, 10, tol, 1.0, red_black).with_execution(ctx);
            run_flat::<N>(opts, Box::new(solver))
        }
        SolverKind::Mg => {
            let params = MgParameters {
                max_tolerance: tol,
                ..mg_params(opts.levels)
            };
            let solver = FdmMgSolver::<N>::new(params)
                .with_max_number_of_cycles(max)
                .with_execution(ctx);
            run_mg::<N>(opts, Box::new(solver))
        }
        SolverKind::Mgpcg => {
            let solver =
                FdmMgpcgSolver::<N>::new(max, tol, mg_params(opts.levels)).with_execution(ctx);
            run_mg::<N>(opts, Box::new(solver))
        }
    }
}

fn random_points(rng: &mut StdRng, n: usize, extent: f64) -> Vec<DVec3> {
    (0..n)
        .map(|_| {
            DVec3::new(
                rng.gen_range(0.0..extent),
                rng.gen_range(0.0..extent),
                rng.gen_range(0.0..extent),
            )
        })
        .collect()
}

fn sorted_neighbors<S: PointNeighborSearcher3>(s: &S, origin: DVec3, radius: f64) -> Vec<usize> {
    let mut found = Vec::new();
    s.for_each_nearby_point(origin, radius, |i, _| found.push(i));
    found.sort_unstable();
    found
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Solve {
            solver,
            resolution,
            dimensions,
            max_iterations,
            tolerance,
            levels,
            threads,
        } => {
            let opts = SolveOptions {
                solver,
                resolution,
                max_iterations,
                tolerance,
                levels,
                ctx: execution_context(threads)?,
            };

            println!(
                "{} Solving {}D Poisson problem with {:?}...",
                "→".green().bold(),
                dimensions,
                solver
            );
            println!("  Resolution: {}", resolution);
            println!("  Threads: {}", opts.ctx.threads());

            let start = Instant::now();
            let report = if dimensions == 2 {
                solve::<2>(&opts)?
            } else {
                solve::<3>(&opts)?
            };
            let elapsed = start.elapsed();

            if report.converged {
                println!("{} Converged", "✓".green().bold());
            } else {
                println!("{} Did not converge", "✗".red().bold());
            }
            println!("  Iterations: {}", report.iterations.to_string().cyan());
            println!("  Residual: {:.6e}", report.residual);
            println!("  True residual: {:.6e}", report.true_residual);
            println!("  Time: {:?}", elapsed);
        }

        Commands::Search {
            points,
            radius,
            resolution,
            queries,
            verify,
            seed,
            threads,
        } => {
            let ctx = execution_context(threads)?;
            let spacing = 2.0 * radius;
            let extent = spacing * resolution as f64;

            println!("{} Generating {} points...", "→".yellow(), points);
            let mut rng = StdRng::seed_from_u64(seed);
            let cloud = random_points(&mut rng, points, extent);
            let origins = random_points(&mut rng, queries, extent);

            let mut grid =
                PointParallelHashGridSearcher3::new([resolution; 3], spacing)?.with_execution(ctx);

            let start = Instant::now();
            grid.build(&cloud);
            let build_time = start.elapsed();
            println!(
                "{} Built {} in {:?}",
                "✓".green().bold(),
                grid.type_name().cyan(),
                build_time
            );

            let start = Instant::now();
            let mut total = 0usize;
            for &origin in &origins {
                grid.for_each_nearby_point(origin, radius, |_, _| total += 1);
            }
            let query_time = start.elapsed();

            println!(
                "{} Completed {} queries in {:?}",
                "✓".green().bold(),
                queries,
                query_time
            );
            println!(
                "  Average neighbours: {:.2}",
                total as f64 / queries.max(1) as f64
            );
            println!(
                "  QPS: {:.0}",
                queries as f64 / query_time.as_secs_f64().max(f64::EPSILON)
            );

            if verify {
                println!("{} Verifying against brute force...", "→".yellow());
                let mut list = PointSimpleListSearcher3::new();
                list.build(&cloud);
                let mismatches = origins
                    .iter()
                    .filter(|&&o| {
                        sorted_neighbors(&grid, o, radius) != sorted_neighbors(&list, o, radius)
                    })
                    .count();
                if mismatches == 0 {
                    println!("{} All queries match", "✓".green().bold());
                } else {
                    anyhow::bail!("{} of {} queries disagree with brute force", mismatches, queries);
                }
            }
        }
    }

    Ok(())
}
