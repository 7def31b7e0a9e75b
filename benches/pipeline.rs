//! Pipeline benchmark: simulator sample → vectorization → window evaluation.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::Array2;

use spad_agent::config::{ModelConfig, SimConfig};
use spad_agent::error::EvalError;
use spad_agent::evaluator::StreamingEvaluator;
use spad_agent::features::Vectorizer;
use spad_agent::model::Reconstructor;
use spad_agent::scaling::StandardScaler;
use spad_agent::schema::FeatureSchema;
use spad_agent::sim::ShipSim;

struct IdentityRecon;

impl Reconstructor for IdentityRecon {
    fn reconstruct(&self, window: &Array2<f32>) -> Result<Array2<f32>, EvalError> {
        Ok(window.clone())
    }
}

fn bench_sim_step(c: &mut Criterion) {
    let mut sim = ShipSim::new(&SimConfig::default());
    c.bench_function("sim_step", |b| b.iter(|| black_box(sim.step())));
}

fn bench_vectorize(c: &mut Criterion) {
    let config = ModelConfig::default();
    let schema = Arc::new(FeatureSchema::from_columns(&config.feature_cols).unwrap());
    let vectorizer = Vectorizer::new(schema);
    let mut sim = ShipSim::new(&SimConfig::default());
    let sample = sim.step();

    c.bench_function("vectorize_ship_sample", |b| {
        b.iter(|| black_box(vectorizer.vectorize(black_box(&sample))))
    });
}

fn bench_push_and_eval(c: &mut Criterion) {
    let config = ModelConfig::default();
    let width = FeatureSchema::from_columns(&config.feature_cols)
        .unwrap()
        .default_scaled_columns()
        .len();
    let scaler = Arc::new(StandardScaler {
        mean: vec![0.0; width],
        scale: vec![1.0; width],
    });
    let mut eval = StreamingEvaluator::new(&config, scaler, Arc::new(IdentityRecon)).unwrap();

    let mut sim = ShipSim::new(&SimConfig::default());
    for _ in 0..config.seq_len {
        let _ = eval.push_sample_and_eval(&sim.step());
    }
    let sample = sim.step();

    c.bench_function("push_sample_and_eval_ready_window", |b| {
        b.iter(|| black_box(eval.push_sample_and_eval(black_box(&sample))))
    });
}

criterion_group!(benches, bench_sim_step, bench_vectorize, bench_push_and_eval);
criterion_main!(benches);
