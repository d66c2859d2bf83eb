//! Convergence-driven iteration loop and its inputs/outputs.

pub mod config;
pub mod controller;
pub mod report;

pub use config::{DEFAULT_CHECK_EVERY, DEFAULT_TOLERANCE, SolverConfig};
pub use controller::{IterationState, JacobiSolver};
pub use report::{Outcome, Progress, SolveReport, assemble_global};
