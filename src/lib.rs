#![cfg_attr(docsrs, feature(doc_cfg))]
//! # halo-jacobi
//!
//! halo-jacobi solves the 2D Poisson problem `-Δu = 1` on the unit square
//! (zero Dirichlet boundary, N×N interior unknowns) by Jacobi relaxation on a
//! fixed set of cooperating workers. Each worker owns one tile of the grid
//! plus a one-cell ghost border, and exchanges boundary rows/columns with
//! its neighbours every iteration.
//!
//! ## Features
//! - Strip (`1 x P`) and grid (`√P x √P`) domain decompositions
//! - Synchronous and overlapped (communication/computation overlap) halo
//!   exchange, one message per direction per iteration
//! - Globally reduced residual with a configurable check cadence
//! - Pluggable communication backends: serial, in-process threads, MPI
//!
//! ## Determinism
//!
//! The per-cell arithmetic does not depend on the decomposition or on the
//! exchange schedule, so every decomposition and both exchange modes produce
//! bitwise identical fields. The thread backend reduces in rank order, so
//! residuals are reproducible as well.
//!
//! ## Usage
//! ```toml
//! [dependencies]
//! halo-jacobi = "0.3"
//! # Optional features:
//! # features = ["mpi-support", "rayon"]
//! ```
//!
//! ```rust
//! use halo_jacobi::prelude::*;
//!
//! let config = SolverConfig::new(16, 1000)
//!     .with_decomposition(Decomposition::Grid)
//!     .with_tolerance(1e-2);
//! let results = run_threads(4, |comm| solve_worker(comm, &config, |_| {}));
//! let reports: Vec<SolveReport> = results
//!     .into_iter()
//!     .map(|r| r.map(|out| out.report))
//!     .collect::<Result<_, _>>()
//!     .unwrap();
//! assert!(reports.iter().all(|r| r.converged()));
//! ```

pub mod algs;
pub mod data;
pub mod driver;
pub mod jacobi_error;
pub mod problem;
pub mod solver;
pub mod topology;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::communicator::{Communicator, NoComm, ThreadComm, Wait};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::halo::{ExchangeMode, HaloExchanger};
    pub use crate::algs::stencil::Region;
    pub use crate::data::tile::LocalTile;
    #[cfg(feature = "mpi-support")]
    pub use crate::driver::run_mpi;
    pub use crate::driver::{WorkerOutput, run_threads, solve_worker};
    pub use crate::jacobi_error::JacobiError;
    pub use crate::problem::GlobalProblem;
    pub use crate::solver::{
        JacobiSolver, Outcome, Progress, SolveReport, SolverConfig, assemble_global,
    };
    pub use crate::topology::{Decomposition, Direction, ProcessTopology};
}
