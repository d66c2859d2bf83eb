//! Launching workers: one thread per rank on a [`ThreadComm`] universe, or
//! one process per rank under MPI.
//!
//! A worker that fails calls [`Communicator::abort`] before returning, so
//! its peers do not block forever on messages that will never come.

use crate::algs::communicator::{Communicator, ThreadComm};
use crate::jacobi_error::JacobiError;
use crate::solver::{JacobiSolver, Progress, SolveReport, SolverConfig};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::{Duration, Instant};

/// A finished worker: its report and the barrier-aligned wall time.
#[derive(Clone, Debug)]
pub struct WorkerOutput {
    pub report: SolveReport,
    pub elapsed: Duration,
}

/// Solve on one worker: barrier, iterate, barrier, time.
///
/// Collective; every worker of `comm` must call it with the same `config`.
pub fn solve_worker<C, F>(comm: &C, config: &SolverConfig, on_check: F) -> Result<WorkerOutput, JacobiError>
where
    C: Communicator,
    F: FnMut(&Progress),
{
    let solver = JacobiSolver::new(comm, config.clone())?;
    comm.barrier()?;
    let start = Instant::now();
    let report = solver.run_with(on_check)?;
    comm.barrier()?;
    Ok(WorkerOutput {
        report,
        elapsed: start.elapsed(),
    })
}

/// Run `body` once per rank on its own thread and collect results in rank
/// order.
///
/// A failing or panicking worker aborts the universe; the remaining workers
/// then fail at their next wait instead of hanging.
pub fn run_threads<T, F>(workers: usize, body: F) -> Vec<Result<T, JacobiError>>
where
    T: Send,
    F: Fn(&ThreadComm) -> Result<T, JacobiError> + Sync,
{
    if workers == 0 {
        return vec![Err(JacobiError::InvalidWorkerCount { rank: 0, size: 0 })];
    }
    let world = ThreadComm::universe(workers);
    let body = &body;
    std::thread::scope(|s| {
        let handles: Vec<_> = world
            .iter()
            .map(|comm| {
                let spawned = std::thread::Builder::new()
                    .name(format!("jacobi-rank-{}", comm.rank()))
                    .spawn_scoped(s, move || run_guarded(comm, body));
                if spawned.is_err() {
                    comm.abort(1);
                }
                (comm.rank(), spawned)
            })
            .collect();
        handles
            .into_iter()
            .map(|(rank, spawned)| match spawned {
                Ok(h) => h.join().unwrap_or_else(|_| Err(panicked(rank))),
                Err(e) => Err(JacobiError::CommError {
                    neighbor: rank,
                    reason: format!("could not spawn worker thread: {e}"),
                }),
            })
            .collect()
    })
}

fn panicked(rank: usize) -> JacobiError {
    JacobiError::CommError {
        neighbor: rank,
        reason: "worker panicked".into(),
    }
}

fn run_guarded<C, T, F>(comm: &C, body: &F) -> Result<T, JacobiError>
where
    C: Communicator,
    F: Fn(&C) -> Result<T, JacobiError>,
{
    let out = catch_unwind(AssertUnwindSafe(|| body(comm))).unwrap_or_else(|_| Err(panicked(comm.rank())));
    if let Err(e) = &out {
        log::error!("rank {}/{}: {e}", comm.rank(), comm.size());
        comm.abort(1);
    }
    out
}

/// Run `body` as this MPI process's worker. On error the whole MPI job is
/// aborted, so this only returns `Err` if MPI could not be initialized.
#[cfg(feature = "mpi-support")]
pub fn run_mpi<T, F>(body: F) -> Result<T, JacobiError>
where
    F: Fn(&crate::algs::communicator::MpiComm) -> Result<T, JacobiError>,
{
    let comm = crate::algs::communicator::MpiComm::new().ok_or_else(|| {
        JacobiError::InvalidConfig("MPI could not be initialized".into())
    })?;
    run_guarded(&comm, &body)
}
