//! Residual of the discrete Poisson equation and its global 2-norm.
//!
//! The local part assumes the tile's ghost values are current, i.e. it is
//! called after the iteration's halo exchange has completed.

use crate::algs::communicator::Communicator;
use crate::data::tile::LocalTile;
use crate::jacobi_error::JacobiError;
use itertools::iproduct;

/// Sum over the interior of `((4u - u_E - u_W - u_N - u_S) / h² - 1)²`.
pub fn local_squared_residual(tile: &LocalTile, inv_hsq: f64) -> f64 {
    let stride = tile.stride();
    let u = tile.as_slice();
    iproduct!(1..=tile.rows(), 1..=tile.cols())
        .map(|(i, j)| {
            let k = i * stride + j;
            let defect =
                (4.0 * u[k] - u[k + 1] - u[k - 1] - u[k - stride] - u[k + stride]) * inv_hsq - 1.0;
            defect * defect
        })
        .sum()
}

/// Combine every worker's squared residual and take the square root.
///
/// Collective: every worker must call it at the same point of the loop.
pub fn global_residual<C: Communicator>(comm: &C, local: f64) -> Result<f64, JacobiError> {
    Ok(comm.all_reduce_sum(local)?.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use approx::assert_relative_eq;

    #[test]
    fn zero_tile_residual_counts_cells() {
        // u = 0 everywhere: each defect is -1
        let t = LocalTile::new(4, 3);
        assert_eq!(local_squared_residual(&t, 25.0), 12.0);
        assert_eq!(global_residual(&NoComm, 12.0).unwrap(), 12f64.sqrt());
    }

    #[test]
    fn exact_discrete_solution_has_zero_residual() {
        // 1x1 tile, zero ghosts: 4u/h² = 1  =>  u = h²/4
        let hsq = 0.0625;
        let mut t = LocalTile::new(1, 1);
        t.set(1, 1, hsq / 4.0).unwrap();
        assert_relative_eq!(local_squared_residual(&t, 1.0 / hsq), 0.0, epsilon = 1e-24);
    }

    #[test]
    fn ghosts_enter_the_defect() {
        let mut t = LocalTile::new(1, 1);
        t[(0, 1)] = 1.0;
        // (0 - 1) * 1 - 1 = -2
        assert_eq!(local_squared_residual(&t, 1.0), 4.0);
    }
}
