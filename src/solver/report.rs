//! What a worker hands back once its iteration loop has terminated.

use crate::data::tile::LocalTile;
use crate::topology::ProcessTopology;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal state of the iteration controller.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// `residual / reference ≤ tolerance` was observed at a check.
    Converged,
    /// The iteration cap ran out first; treat as "did not converge".
    MaxIterationsReached,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Converged => f.write_str("converged"),
            Outcome::MaxIterationsReached => f.write_str("max iterations reached"),
        }
    }
}

/// One convergence check, as seen identically by every worker.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub iteration: usize,
    pub residual: f64,
    pub relative: f64,
}

#[derive(Clone, Debug)]
pub struct SolveReport {
    pub outcome: Outcome,
    /// Completed Jacobi sweeps.
    pub iterations: usize,
    /// Global residual after the last sweep.
    pub residual: f64,
    /// Global residual of the zero initial guess.
    pub reference_residual: f64,
    /// Every check performed, in order.
    pub history: Vec<Progress>,
    pub topology: ProcessTopology,
    /// The worker's final "current" tile, ghosts included.
    pub tile: LocalTile,
}

impl SolveReport {
    pub fn converged(&self) -> bool {
        self.outcome == Outcome::Converged
    }

    pub fn relative_residual(&self) -> f64 {
        relative(self.residual, self.reference_residual)
    }
}

#[inline]
pub(crate) fn relative(residual: f64, reference: f64) -> f64 {
    if reference > 0.0 {
        residual / reference
    } else {
        0.0
    }
}

/// Stitch every worker's interior into a row-major `n x n` field.
///
/// `reports` must hold one report per worker of the same run, in any order.
pub fn assemble_global(reports: &[SolveReport], n: usize) -> Vec<f64> {
    let mut field = vec![0.0; n * n];
    for r in reports {
        let (r0, c0) = r.topology.global_origin();
        let cols = r.tile.cols();
        for (k, row) in r.tile.interior().chunks(cols).enumerate() {
            let start = (r0 + k) * n + c0;
            field[start..start + cols].copy_from_slice(row);
        }
    }
    field
}
