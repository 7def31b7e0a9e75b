//! SPAD agent entrypoint: simulator-driven produce loop. Each tick generates
//! one telemetry sample, scores it, logs the result, and optionally records
//! it locally and reports it to the fleet API.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use ndarray::Array2;
use tracing::{debug, info, warn};

use spad_agent::{
    config::{AgentConfig, ModelConfig},
    error::EvalError,
    evaluator::StreamingEvaluator,
    features::Vectorizer,
    logging::StructuredLogger,
    model::OnnxReconstructor,
    scaling::StandardScaler,
    schema::FeatureSchema,
    sim::ShipSim,
    storage::{HistoryRow, HistoryStore},
    uplink::UplinkClient,
};

/// Fit a scaler from `seq_len` warmup samples when no scaler artifact is
/// shipped. The simulator keeps its state, so the live stream continues from
/// the warmed-up plant.
fn fit_warmup_scaler(
    sim: &mut ShipSim,
    model_cfg: &ModelConfig,
) -> Result<StandardScaler, EvalError> {
    let schema = FeatureSchema::from_columns(&model_cfg.feature_cols)?;
    let scaled_names = match &model_cfg.scaled_columns {
        Some(cols) => cols.clone(),
        None => schema.default_scaled_columns(),
    };
    let mut scale_idx = Vec::with_capacity(scaled_names.len());
    for name in &scaled_names {
        let i = schema.index_of(name).ok_or_else(|| {
            EvalError::mismatch(format!("scaled column '{}' not in feature_cols", name))
        })?;
        scale_idx.push(i);
    }

    let vectorizer = Vectorizer::new(Arc::new(schema));
    let t = model_cfg.seq_len;
    let mut block = Array2::<f32>::zeros((t, scale_idx.len()));
    let mut missing = Array2::<bool>::from_elem((t, scale_idx.len()), false);
    for ti in 0..t {
        let sample = sim.step();
        let row = vectorizer.vectorize(&sample);
        for (k, &j) in scale_idx.iter().enumerate() {
            block[(ti, k)] = row.values[j];
            missing[(ti, k)] = row.missing[j];
        }
    }
    Ok(StandardScaler::fit(&block, &missing))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config_path = std::env::var("SPAD_CONFIG_PATH")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| std::path::PathBuf::from("config.json"));
    let config = AgentConfig::load(&config_path);

    StructuredLogger::init(config.log.json, &config.log.level);

    info!(artifacts_dir = ?config.artifacts_dir, "SPAD agent starting");

    let model_cfg_path = config.artifacts_dir.join("model_config.json");
    let model_cfg = if model_cfg_path.exists() {
        ModelConfig::load(&model_cfg_path)?
    } else {
        warn!(path = %model_cfg_path.display(), "model config not found; using built-in ship schema");
        ModelConfig::default()
    };

    let mut sim = ShipSim::new(&config.sim);

    let scaler_path = config.artifacts_dir.join("scaler.json");
    let scaler = if scaler_path.exists() {
        StandardScaler::load(&scaler_path)?
    } else {
        warn!(path = %scaler_path.display(), "scaler artifact not found; fitting from warmup window");
        fit_warmup_scaler(&mut sim, &model_cfg)?
    };

    let reconstructor = OnnxReconstructor::load(&config.artifacts_dir.join("model.onnx"))?;

    let mut evaluator = StreamingEvaluator::new(
        &model_cfg,
        Arc::new(scaler),
        Arc::new(reconstructor),
    )?;

    let store = if config.history.enabled {
        std::fs::create_dir_all(&config.data_dir)?;
        Some(HistoryStore::open(&config.data_dir.join("history.db"))?)
    } else {
        None
    };

    let uplink = if config.uplink.enabled {
        UplinkClient::new(&config.uplink, model_cfg.feature_cols.clone())
    } else {
        None
    };

    let mut ticker = tokio::time::interval(Duration::from_secs(config.sim.tick_secs.max(1)));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(tick_secs = config.sim.tick_secs, "produce loop started (Ctrl+C to stop)");
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("SPAD agent stopping");
                break;
            }
            _ = ticker.tick() => {
                let sample = sim.step();
                // The forward pass may block; keep it off the event loop.
                let result = tokio::task::block_in_place(|| evaluator.push_sample_and_eval(&sample));
                let result = match result {
                    Ok(r) => r,
                    Err(e @ EvalError::ScalerDrift { .. }) => {
                        // Scores from a drifted scaler are meaningless.
                        return Err(e.into());
                    }
                    Err(e) => {
                        warn!(error = %e, "tick failed");
                        continue;
                    }
                };

                if result.is_anomaly {
                    info!(
                        score = ?result.score,
                        blackout_prob = result.blackout_prob,
                        consecutive_above = result.consecutive_above,
                        mode = sim.mode().label(),
                        "anomaly tick"
                    );
                } else {
                    debug!(ready = result.ready, score = ?result.score, "tick scored");
                }

                if let Some(ref store) = store {
                    let now_ms = Utc::now().timestamp_millis();
                    let row = HistoryRow {
                        ts: now_ms,
                        mode: sim.mode().label().to_string(),
                        score: result.score,
                        blackout_prob: result.blackout_prob,
                        is_anomaly: result.is_anomaly,
                        payload: serde_json::to_string(&result)?,
                    };
                    if let Err(e) = store.insert_tick(&row) {
                        warn!(error = %e, "history insert failed");
                    }
                    let _ = store.prune_before(now_ms - config.history.retain_secs * 1000);
                }

                if let Some(ref u) = uplink {
                    if let Err(e) = u.report(&sample, &result).await {
                        warn!(error = %e, "uplink tick failed");
                    }
                }
            }
        }
    }

    Ok(())
}
