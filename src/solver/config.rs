//! Solver parameters, shared verbatim by every worker of a run.

use crate::algs::halo::ExchangeMode;
use crate::jacobi_error::JacobiError;
use crate::topology::Decomposition;
use serde::{Deserialize, Serialize};

/// Relative residual at which the run counts as converged.
pub const DEFAULT_TOLERANCE: f64 = 1e-5;
/// Iterations between two global residual reductions.
pub const DEFAULT_CHECK_EVERY: usize = 10;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Global grid side N (unknowns per side).
    pub n: usize,
    /// Iteration cap.
    pub max_iters: usize,
    /// Stop once `residual / reference ≤ tolerance`.
    pub tolerance: f64,
    /// Residual is reduced every `check_every` iterations.
    pub check_every: usize,
    pub mode: ExchangeMode,
    pub decomposition: Decomposition,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            n: 64,
            max_iters: 1000,
            tolerance: DEFAULT_TOLERANCE,
            check_every: DEFAULT_CHECK_EVERY,
            mode: ExchangeMode::default(),
            decomposition: Decomposition::default(),
        }
    }
}

impl SolverConfig {
    pub fn new(n: usize, max_iters: usize) -> Self {
        Self {
            n,
            max_iters,
            ..Default::default()
        }
    }

    pub fn with_mode(mut self, mode: ExchangeMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_decomposition(mut self, decomposition: Decomposition) -> Self {
        self.decomposition = decomposition;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_check_every(mut self, check_every: usize) -> Self {
        self.check_every = check_every;
        self
    }

    /// Reject parameters no run can honour. Divisibility of `n` is checked
    /// by the topology, which knows the worker count.
    pub fn validate(&self) -> Result<(), JacobiError> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(JacobiError::InvalidConfig(format!(
                "tolerance must be positive and finite, got {}",
                self.tolerance
            )));
        }
        if self.check_every == 0 {
            return Err(JacobiError::InvalidConfig(
                "check_every must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = SolverConfig::new(32, 100);
        assert_eq!(c.tolerance, 1e-5);
        assert_eq!(c.check_every, 10);
        assert_eq!(c.mode, ExchangeMode::Overlapped);
        assert_eq!(c.decomposition, Decomposition::Strip);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn validation() {
        assert!(SolverConfig::new(8, 1).with_check_every(0).validate().is_err());
        assert!(SolverConfig::new(8, 1).with_tolerance(0.0).validate().is_err());
        assert!(SolverConfig::new(8, 1).with_tolerance(f64::NAN).validate().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let c: SolverConfig =
            serde_json::from_str(r#"{ "n": 16, "mode": "synchronous", "decomposition": "grid" }"#)
                .unwrap();
        assert_eq!(c.n, 16);
        assert_eq!(c.mode, ExchangeMode::Synchronous);
        assert_eq!(c.decomposition, Decomposition::Grid);
        assert_eq!(c.check_every, DEFAULT_CHECK_EVERY);
        assert_eq!(c.max_iters, 1000);
    }
}
