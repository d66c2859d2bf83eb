//! `halo-jacobi` command-line interface.
//!
//! ```sh
//! halo-jacobi 128 5000 --workers 4 --layout grid --mode overlapped
//! mpirun -n 4 halo-jacobi 128 5000 --layout grid --mpi   # with mpi-support
//! ```

use anyhow::{Context, bail};
use clap::Parser;
use halo_jacobi::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "halo-jacobi")]
#[command(about = "Distributed Jacobi relaxation for -Δu = 1 with halo exchange")]
#[command(version)]
struct Cli {
    /// Global grid side N; must be divisible by the decomposition factor.
    n: usize,
    /// Maximum number of Jacobi iterations.
    max_iters: usize,
    /// Number of in-process workers (ignored with --mpi).
    #[arg(short = 'p', long, default_value_t = 1)]
    workers: usize,
    /// Domain decomposition: strip (1 x P) or grid (√P x √P).
    #[arg(short, long, default_value = "strip")]
    layout: Decomposition,
    /// Halo exchange schedule: sync or overlapped.
    #[arg(short, long, default_value = "overlapped")]
    mode: ExchangeMode,
    /// Relative residual at which to stop.
    #[arg(short, long, default_value_t = halo_jacobi::solver::DEFAULT_TOLERANCE)]
    tolerance: f64,
    /// Iterations between residual checks.
    #[arg(short = 'k', long, default_value_t = halo_jacobi::solver::DEFAULT_CHECK_EVERY)]
    check_every: usize,
    /// Run one worker per MPI process instead of threads.
    #[arg(long)]
    mpi: bool,
}

impl Cli {
    fn config(&self) -> SolverConfig {
        SolverConfig::new(self.n, self.max_iters)
            .with_decomposition(self.layout)
            .with_mode(self.mode)
            .with_tolerance(self.tolerance)
            .with_check_every(self.check_every)
    }
}

/// Body every worker runs: banner, solve, rank-0 progress and timing.
fn worker<C: Communicator>(comm: &C, config: &SolverConfig) -> Result<WorkerOutput, JacobiError> {
    println!(
        "Rank {}/{} running on {}.",
        comm.rank(),
        comm.size(),
        comm.processor_name()
    );
    let rank = comm.rank();
    let out = solve_worker(comm, config, |p| {
        if rank == 0 {
            println!("Iter {}: Residual: {:e}", p.iteration, p.residual);
        }
    })?;
    if rank == 0 {
        println!("Time elapsed is {:.6} seconds.", out.elapsed.as_secs_f64());
        let r = &out.report;
        println!(
            "{} after {} iterations (residual {:e}, relative {:e})",
            r.outcome,
            r.iterations,
            r.residual,
            r.relative_residual()
        );
    }
    Ok(out)
}

#[cfg(feature = "mpi-support")]
fn run_mpi_world(config: &SolverConfig) -> anyhow::Result<()> {
    run_mpi(|comm| worker(comm, config)).context("MPI run failed")?;
    Ok(())
}

#[cfg(not(feature = "mpi-support"))]
fn run_mpi_world(_config: &SolverConfig) -> anyhow::Result<()> {
    bail!("this binary was built without the `mpi-support` feature")
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = cli.config();
    config.validate().context("invalid arguments")?;

    if cli.mpi {
        return run_mpi_world(&config);
    }

    let results = run_threads(cli.workers, |comm| worker(comm, &config));
    // report the root cause, not the peers that were released by the abort
    let mut errors: Vec<JacobiError> = results.into_iter().filter_map(Result::err).collect();
    if errors.is_empty() {
        return Ok(());
    }
    errors.sort_by_key(|e| !e.is_configuration());
    let first = errors.swap_remove(0);
    bail!("{} of {} workers aborted: {first}", errors.len() + 1, cli.workers)
}
