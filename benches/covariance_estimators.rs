use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use haario_mcmc::adaptive::{adaptive_haario_with_config, AdaptationConfig, CovarianceEstimator};
use ndarray::Array2;
use rand::rngs::SmallRng;
use rand::SeedableRng;

fn bench_estimators(c: &mut Criterion) {
    let mut group = c.benchmark_group("adaptive_haario");
    group.sample_size(10);
    for dim in [2usize, 8] {
        let mean = ndarray::Array1::zeros(dim);
        let cov = Array2::from_shape_fn((dim, dim), |(i, j)| if i == j { 1.0 } else { 0.3 });
        for (name, estimator) in [
            ("recompute", CovarianceEstimator::Recompute),
            ("running", CovarianceEstimator::Running),
        ] {
            let config = AdaptationConfig::default().estimator(estimator);
            group.bench_with_input(BenchmarkId::new(name, dim), &dim, |b, _| {
                b.iter(|| {
                    adaptive_haario_with_config(
                        black_box(mean.clone()),
                        black_box(cov.clone()),
                        2_000,
                        config,
                        SmallRng::seed_from_u64(0),
                    )
                    .unwrap()
                })
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_estimators);
criterion_main!(benches);
