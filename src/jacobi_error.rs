//! JacobiError: unified error type for halo-jacobi public APIs
//!
//! Configuration errors are detected identically by every worker before any
//! tile is allocated; transport errors are never recovered. Both are fatal to
//! the whole run, the launcher decides how to bring the other workers down.

use crate::topology::{Decomposition, Direction};
use thiserror::Error;

/// Unified error type for solver operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum JacobiError {
    /// N is not a multiple of the decomposition factor.
    #[error("N = {n} must be a multiple of {factor} for a {decomposition} decomposition")]
    Indivisible {
        n: usize,
        factor: usize,
        decomposition: Decomposition,
    },
    /// Grid decomposition needs a perfect-square worker count.
    #[error("grid decomposition needs a square number of workers, got {workers}")]
    NotSquare { workers: usize },
    /// Rank outside `0..size`, or an empty world.
    #[error("invalid worker identity: rank {rank} of {size}")]
    InvalidWorkerCount { rank: usize, size: usize },
    /// Solver parameters that make no sense (zero cadence, non-positive tolerance).
    #[error("invalid solver configuration: {0}")]
    InvalidConfig(String),
    /// Communication with a neighbour failed or delivered garbage.
    #[error("communication error with rank {neighbor}: {reason}")]
    CommError { neighbor: usize, reason: String },
    /// A new exchange was posted before the previous one was completed.
    #[error("halo exchange toward {direction} is still in flight")]
    ExchangeInFlight { direction: Direction },
    /// Interior access outside `[1, rows] x [1, cols]`.
    #[error("cell ({i}, {j}) is outside the {rows}x{cols} interior")]
    OutOfBounds {
        i: usize,
        j: usize,
        rows: usize,
        cols: usize,
    },
    /// A ghost edge was given the wrong number of values.
    #[error("{direction} ghost edge expects {expected} values, got {got}")]
    EdgeLength {
        direction: Direction,
        expected: usize,
        got: usize,
    },
}

impl JacobiError {
    /// True for errors every worker detects on its own before allocating.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            JacobiError::Indivisible { .. }
                | JacobiError::NotSquare { .. }
                | JacobiError::InvalidWorkerCount { .. }
                | JacobiError::InvalidConfig(_)
        )
    }
}
