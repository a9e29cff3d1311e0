use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::{Array1, Array2};
use oof_trainer::metrics::roc_auc_score;
use oof_trainer::training::{CVStrategy, CrossValidator, KNNClassifier, KNNConfig, XGBoostClassifier, XGBoostConfig};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn create_classification_data(n_rows: usize, n_features: usize) -> (Array2<f64>, Array1<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let x = Array2::from_shape_fn((n_rows, n_features), |_| rng.gen::<f64>());
    let y = x
        .rows()
        .into_iter()
        .map(|row| if row[0] + 0.3 * row[1] + 0.1 * rng.gen::<f64>() > 0.7 { 1.0 } else { 0.0 })
        .collect();
    (x, y)
}

fn bench_split(c: &mut Criterion) {
    let mut group = c.benchmark_group("split");

    for n_rows in [1000, 10000, 100000].iter() {
        let (_, y) = create_classification_data(*n_rows, 1);
        let validator = CrossValidator::new(CVStrategy::StratifiedKFold { n_splits: 5, shuffle: true })
            .with_random_state(42);

        group.bench_with_input(BenchmarkId::new("stratified", n_rows), &y, |b, y| {
            b.iter(|| validator.split(black_box(y.len()), Some(y)).unwrap())
        });
    }

    group.finish();
}

fn bench_auc(c: &mut Criterion) {
    let mut group = c.benchmark_group("auc");

    for n_rows in [1000, 10000, 100000].iter() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let (_, y) = create_classification_data(*n_rows, 2);
        let scores: Array1<f64> = y.mapv(|label| label * 0.3 + rng.gen::<f64>() * 0.7);

        group.bench_with_input(BenchmarkId::new("roc_auc", n_rows), &(y, scores), |b, (y, s)| {
            b.iter(|| roc_auc_score(black_box(y), black_box(s)).unwrap())
        });
    }

    group.finish();
}

fn bench_models(c: &mut Criterion) {
    let mut group = c.benchmark_group("models");
    group.sample_size(10);

    let (x, y) = create_classification_data(2000, 10);
    let (x_test, _) = create_classification_data(500, 10);

    let mut knn = KNNClassifier::new(KNNConfig::default());
    knn.fit(&x, &y).unwrap();
    group.bench_function("knn_predict_500", |b| {
        b.iter(|| knn.predict_proba(black_box(&x_test)).unwrap())
    });

    group.bench_function("xgb_fit_50", |b| {
        b.iter(|| {
            let config = XGBoostConfig {
                n_estimators: 50,
                max_depth: 4,
                early_stopping_rounds: None,
                ..XGBoostConfig::default()
            };
            let mut model = XGBoostClassifier::new(config);
            model.fit(black_box(&x), black_box(&y)).unwrap();
            model
        })
    });

    group.finish();
}

criterion_group!(benches, bench_split, bench_auc, bench_models);
criterion_main!(benches);
