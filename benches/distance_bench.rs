//! Distance kernel benchmarks: serial reference vs the selected kernel.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use vectridx::metric::{cosine, dot, l2, Kernel};
use vectridx::MetricKind;

fn sample(n: usize) -> (Vec<f32>, Vec<f32>) {
    let a = (0..n).map(|i| (i as f32 * 0.37).sin()).collect();
    let b = (0..n).map(|i| (i as f32 * 0.73).cos()).collect();
    (a, b)
}

fn bench_kernels(c: &mut Criterion) {
    let mut group = c.benchmark_group("distance");

    for dims in [64usize, 256, 768, 1536] {
        let (a, b) = sample(dims);

        group.bench_with_input(BenchmarkId::new("l2sq/serial", dims), &dims, |bench, _| {
            bench.iter(|| l2::distance(black_box(&a), black_box(&b)));
        });
        let l2_kernel = Kernel::select(MetricKind::L2Sq);
        group.bench_with_input(
            BenchmarkId::new(format!("l2sq/{}", l2_kernel.isa().name()), dims),
            &dims,
            |bench, _| {
                bench.iter(|| l2_kernel.distance(black_box(&a), black_box(&b)));
            },
        );

        group.bench_with_input(BenchmarkId::new("cos/serial", dims), &dims, |bench, _| {
            bench.iter(|| cosine::distance(black_box(&a), black_box(&b)));
        });
        let cos_kernel = Kernel::select(MetricKind::Cos);
        group.bench_with_input(
            BenchmarkId::new(format!("cos/{}", cos_kernel.isa().name()), dims),
            &dims,
            |bench, _| {
                bench.iter(|| cos_kernel.distance(black_box(&a), black_box(&b)));
            },
        );

        group.bench_with_input(BenchmarkId::new("ip/serial", dims), &dims, |bench, _| {
            bench.iter(|| dot::distance(black_box(&a), black_box(&b)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_kernels);
criterion_main!(benches);
