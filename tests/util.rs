#![allow(dead_code)]
use halo_jacobi::prelude::*;

/// Tolerance that no test run reaches, so the cap decides.
pub const NEVER: f64 = 1e-300;

/// Run `workers` thread workers and return their reports in rank order.
pub fn solve(config: &SolverConfig, workers: usize) -> Vec<SolveReport> {
    run_threads(workers, |comm| solve_worker(comm, config, |_| {}))
        .into_iter()
        .enumerate()
        .map(|(rank, r)| r.unwrap_or_else(|e| panic!("rank {rank} failed: {e}")).report)
        .collect()
}

/// Exactly `iters` sweeps, independent of convergence.
pub fn fixed(n: usize, iters: usize) -> SolverConfig {
    SolverConfig::new(n, iters).with_tolerance(NEVER)
}

/// Straightforward single-array Jacobi on the padded `(n+2)²` grid; returns
/// the row-major `n x n` interior.
pub fn sequential_jacobi(n: usize, iters: usize) -> Vec<f64> {
    let w = n + 2;
    let h = 1.0 / (n as f64 + 1.0);
    let hsq = h * h;
    let mut u = vec![0.0; w * w];
    let mut unew = vec![0.0; w * w];
    for _ in 0..iters {
        for i in 1..=n {
            for j in 1..=n {
                let k = i * w + j;
                unew[k] = 0.25 * (hsq + u[k + 1] + u[k - 1] + u[k - w] + u[k + w]);
            }
        }
        std::mem::swap(&mut u, &mut unew);
    }
    (1..=n)
        .flat_map(|i| u[i * w + 1..i * w + 1 + n].to_vec())
        .collect()
}

/// Assert every ghost edge equals the owning neighbour's boundary edge.
pub fn assert_ghosts_match_neighbors(reports: &[SolveReport]) {
    for r in reports {
        for (dir, peer) in r.topology.neighbors() {
            let ghost = r.tile.ghost_edge(dir);
            let owned = reports[peer].tile.boundary_edge(dir.opposite());
            assert_eq!(
                ghost,
                owned,
                "rank {} {dir} ghost vs rank {peer} boundary",
                r.topology.rank()
            );
        }
    }
}
