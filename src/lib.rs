//! SPAD Agent — shipboard power-plant anomaly scoring agent.
//!
//! Modular structure:
//! - [`schema`] — Feature vocabulary, generator groups, base weights
//! - [`features`] — Fixed-order vectorization and the sliding window
//! - [`scaling`] — Imputation, rescaling, variance sanity check
//! - [`model`] — Reconstructor contract and ONNX inference
//! - [`scoring`] — Masked weighted error, calibration, top contributors
//! - [`evaluator`] — Per-stream orchestration
//! - [`sim`] — Physical plant telemetry simulator
//! - [`storage`] — Local score history
//! - [`logging`] — Structured JSON logging

pub mod config;
pub mod error;
pub mod evaluator;
pub mod features;
pub mod logging;
pub mod model;
pub mod scaling;
pub mod schema;
pub mod scoring;
pub mod sim;
pub mod storage;
pub mod uplink;

pub use config::{AgentConfig, ModelConfig};
pub use error::EvalError;
pub use evaluator::StreamingEvaluator;
pub use features::{Sample, Vectorizer, WindowBuffer};
pub use logging::StructuredLogger;
pub use model::{OnnxReconstructor, Reconstructor};
pub use scaling::{Scaler, ScalingStage, StandardScaler};
pub use schema::FeatureSchema;
pub use scoring::ScoreResult;
pub use sim::ShipSim;
pub use storage::HistoryStore;
