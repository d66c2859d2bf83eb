use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use halo_jacobi::algs::residual::local_squared_residual;
use halo_jacobi::algs::stencil::{Region, update};
use halo_jacobi::prelude::*;

fn bench_stencil(c: &mut Criterion) {
    let mut group = c.benchmark_group("jacobi_sweep");
    for &n in &[64usize, 256, 512] {
        let problem = GlobalProblem::new(n);
        let mut src = LocalTile::new(n, n);
        for i in 1..=n {
            for j in 1..=n {
                src[(i, j)] = ((i * 31 + j * 17) % 101) as f64 * 1e-3;
            }
        }
        let mut dst = LocalTile::new(n, n);
        group.bench_with_input(BenchmarkId::new("update", n), &n, |b, _| {
            b.iter(|| update(black_box(&mut dst), black_box(&src), Region::All, problem.hsq()))
        });
        group.bench_with_input(BenchmarkId::new("residual", n), &n, |b, _| {
            b.iter(|| local_squared_residual(black_box(&src), problem.inv_hsq()))
        });
    }
    group.finish();
}

fn bench_threads(c: &mut Criterion) {
    let config = SolverConfig::new(128, 50)
        .with_tolerance(1e-300)
        .with_decomposition(Decomposition::Grid);
    c.bench_function("solve_128_grid_4", |b| {
        b.iter(|| run_threads(4, |comm| solve_worker(comm, &config, |_| {})))
    });
}

criterion_group!(benches, bench_stencil, bench_threads);
criterion_main!(benches);
