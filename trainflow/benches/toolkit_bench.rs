//! Benchmarks for the model toolkit.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use trainflow::data::FeatureSchema;
use trainflow::stages::{transform_table, TransformOptions};
use trainflow::testing::synthetic_table;
use trainflow::toolkit::{GridSearch, ParamGrid, StandardScaler};

fn toolkit_benchmark(c: &mut Criterion) {
    let table = synthetic_table(&FeatureSchema::default(), 569, 212, 7);
    let Ok((bundle, _)) = transform_table(&table, &TransformOptions::default()) else {
        return;
    };

    c.bench_function("transform_569_rows", |b| {
        b.iter(|| transform_table(black_box(&table), &TransformOptions::default()));
    });

    c.bench_function("scaler_fit", |b| {
        b.iter(|| StandardScaler::fit(black_box(&bundle.x_train)));
    });

    let mut group = c.benchmark_group("grid_search");
    group.sample_size(10);
    group.bench_function("default_grid_5_fold", |b| {
        b.iter(|| GridSearch::new(ParamGrid::default(), 5).fit(black_box(&bundle.x_train), &bundle.y_train));
    });
    group.finish();
}

criterion_group!(benches, toolkit_benchmark);
criterion_main!(benches);
