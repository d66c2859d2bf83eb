//! `GlobalProblem`: the immutable, process-wide discretisation of `-Δu = 1`
//! on the unit square with zero Dirichlet boundary.

use serde::{Deserialize, Serialize};

/// Grid side and derived mesh constants, shared by every worker.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GlobalProblem {
    n: usize,
    h: f64,
    hsq: f64,
    inv_hsq: f64,
}

impl GlobalProblem {
    /// Discretise with `n` unknowns per side, `h = 1/(n+1)`.
    pub fn new(n: usize) -> Self {
        let h = 1.0 / (n as f64 + 1.0);
        let hsq = h * h;
        Self {
            n,
            h,
            hsq,
            inv_hsq: 1.0 / hsq,
        }
    }

    #[inline]
    pub fn n(&self) -> usize {
        self.n
    }

    #[inline]
    pub fn h(&self) -> f64 {
        self.h
    }

    /// `h²`, the forcing contribution in the Jacobi update.
    #[inline]
    pub fn hsq(&self) -> f64 {
        self.hsq
    }

    /// `1/h²`, the scale of the discrete Laplacian in the residual.
    #[inline]
    pub fn inv_hsq(&self) -> f64 {
        self.inv_hsq
    }
}
