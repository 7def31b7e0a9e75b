//! Streaming evaluator: one instance per telemetry stream. The window fills
//! until it reaches capacity, then every subsequent push re-scores. Calls on
//! one instance must be serialized; independent streams get independent
//! instances over the same shared read-only artifacts.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::config::ModelConfig;
use crate::error::EvalError;
use crate::features::{Sample, Vectorizer, WindowBuffer};
use crate::model::Reconstructor;
use crate::scaling::{Scaler, ScalingStage};
use crate::schema::{BaseWeights, FeatureSchema};
use crate::scoring::{blackout_probability, rank_contributors, score, MaskBuilder, ScoreResult};

pub struct StreamingEvaluator {
    schema: Arc<FeatureSchema>,
    vectorizer: Vectorizer,
    window: WindowBuffer,
    scaling: ScalingStage,
    masker: MaskBuilder,
    reconstructor: Arc<dyn Reconstructor>,
    threshold: f32,
    prob_alpha: f32,
    topk: usize,
    smoothing_k: usize,
    recent_scores: VecDeque<f32>,
    consecutive_above: u32,
}

impl StreamingEvaluator {
    /// Build an evaluator over shared artifacts. Fails fast on any
    /// config/scaler/schema mismatch; there is no partially-usable instance.
    pub fn new(
        config: &ModelConfig,
        scaler: Arc<dyn Scaler>,
        reconstructor: Arc<dyn Reconstructor>,
    ) -> Result<Self, EvalError> {
        if config.seq_len == 0 {
            return Err(EvalError::mismatch("seq_len must be positive"));
        }
        if config.topk == 0 {
            return Err(EvalError::mismatch("topk must be positive"));
        }
        if config.smoothing_k == 0 {
            return Err(EvalError::mismatch("smoothing_k must be positive"));
        }
        if !config.threshold.is_finite() {
            return Err(EvalError::mismatch("threshold must be finite"));
        }
        if !config.prob_alpha.is_finite() || config.prob_alpha <= 0.0 {
            return Err(EvalError::mismatch("prob_alpha must be finite and positive"));
        }

        let schema = Arc::new(FeatureSchema::from_columns(&config.feature_cols)?);

        let scaled_names = match &config.scaled_columns {
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

        let scaling = ScalingStage::new(scaler, scale_idx)?;
        let base = BaseWeights::from_schema(&schema, &config.weight_overrides)?;
        let masker = MaskBuilder::new(&base, schema.groups());
        let vectorizer = Vectorizer::new(Arc::clone(&schema));
        let window = WindowBuffer::new(config.seq_len, schema.dim());

        Ok(Self {
            schema,
            vectorizer,
            window,
            scaling,
            masker,
            reconstructor,
            threshold: config.threshold,
            prob_alpha: config.prob_alpha,
            topk: config.topk,
            smoothing_k: config.smoothing_k,
            recent_scores: VecDeque::new(),
            consecutive_above: 0,
        })
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn is_ready(&self) -> bool {
        self.window.is_ready()
    }

    /// The single public scoring entry point: vectorize, push, and (once the
    /// window is full) scale, reconstruct, score, calibrate, rank.
    ///
    /// A scaling-sanity or reconstructor failure propagates to the caller;
    /// the window keeps its contents, so the next call is unaffected.
    pub fn push_sample_and_eval(&mut self, sample: &Sample) -> Result<ScoreResult, EvalError> {
        let row = self.vectorizer.vectorize(sample);
        self.window.push(row);

        if !self.window.is_ready() {
            return Ok(ScoreResult::not_ready(self.threshold));
        }

        let (raw, missing) = self.window.snapshot();
        let mut scaled = raw.clone();
        self.scaling.apply(&mut scaled, &missing)?;

        let reconstructed = self.reconstructor.reconstruct(&scaled)?;
        if reconstructed.dim() != scaled.dim() {
            return Err(EvalError::ShapeMismatch {
                expected: scaled.dim(),
                got: reconstructed.dim(),
            });
        }

        // Online flags are read from the raw window; scaled space is only
        // for the error computation.
        let weights = self.masker.build(&raw);
        let (raw_score, per_feature) = score(&scaled, &reconstructed, &weights);

        self.recent_scores.push_back(raw_score);
        while self.recent_scores.len() > self.smoothing_k {
            self.recent_scores.pop_front();
        }
        let smoothed =
            self.recent_scores.iter().map(|&s| s as f64).sum::<f64>() / self.recent_scores.len() as f64;
        let smoothed = smoothed as f32;

        let blackout_prob = blackout_probability(smoothed, self.threshold, self.prob_alpha);
        let is_anomaly = smoothed > self.threshold;
        self.consecutive_above = if is_anomaly {
            self.consecutive_above + 1
        } else {
            0
        };

        let top_contributors = rank_contributors(&per_feature, self.schema.names(), self.topk);

        Ok(ScoreResult {
            ready: true,
            score: Some(smoothed),
            threshold: self.threshold,
            blackout_prob,
            is_anomaly,
            consecutive_above: self.consecutive_above,
            top_contributors,
        })
    }
}
