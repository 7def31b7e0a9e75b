//! Imputation and rescaling of the continuous-column subset, with a
//! post-transform variance sanity check.

use std::path::Path;
use std::sync::Arc;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::EvalError;

/// Clamp applied to the full matrix after rescaling.
const CLIP_RANGE: f32 = 8.0;
/// Transformed-column std limits; exceeding either means the scaler and the
/// live feature set no longer line up.
const STD_MEDIAN_LIMIT: f32 = 3.0;
const STD_MAX_LIMIT: f32 = 10.0;

/// Rescaling artifact contract: an affine transform over the scaled subset,
/// a per-column center used for imputation, and the column count it was fit
/// on. Any numeric backend can implement it.
pub trait Scaler: Send + Sync {
    fn expected_width(&self) -> usize;

    /// Per-column center in raw space; imputed into missing cells.
    fn center(&self) -> &[f32];

    /// Transform a T×expected_width block in place.
    fn transform(&self, block: &mut Array2<f32>);
}

/// Column-wise standardization: (x - mean) / scale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f32>,
    pub scale: Vec<f32>,
}

impl StandardScaler {
    /// Load from a JSON artifact. Malformed parameters are fatal.
    pub fn load(path: &Path) -> Result<Self, EvalError> {
        let data = std::fs::read_to_string(path)?;
        let scaler: StandardScaler = serde_json::from_str(&data)?;
        scaler.validate()?;
        Ok(scaler)
    }

    pub fn validate(&self) -> Result<(), EvalError> {
        if self.mean.len() != self.scale.len() {
            return Err(EvalError::mismatch(format!(
                "scaler mean/scale length mismatch: {} vs {}",
                self.mean.len(),
                self.scale.len()
            )));
        }
        if self.mean.iter().any(|v| !v.is_finite()) {
            return Err(EvalError::mismatch("scaler mean contains non-finite values"));
        }
        if self.scale.iter().any(|v| !v.is_finite() || *v <= 0.0) {
            return Err(EvalError::mismatch(
                "scaler scale must be finite and positive",
            ));
        }
        Ok(())
    }

    /// Fit mean/std per column of a T×S warmup block, skipping cells flagged
    /// missing. Zero-variance columns get scale 1.0. This is tooling for
    /// simulator-driven runs and tests, not a training procedure.
    pub fn fit(block: &Array2<f32>, missing: &Array2<bool>) -> Self {
        let (t, s) = block.dim();
        let mut mean = vec![0.0f32; s];
        let mut scale = vec![1.0f32; s];
        for j in 0..s {
            let mut sum = 0.0f64;
            let mut n = 0.0f64;
            for ti in 0..t {
                let v = block[(ti, j)];
                if !missing[(ti, j)] && v.is_finite() {
                    sum += v as f64;
                    n += 1.0;
                }
            }
            if n == 0.0 {
                continue;
            }
            let m = sum / n;
            let mut var = 0.0f64;
            for ti in 0..t {
                let v = block[(ti, j)];
                if !missing[(ti, j)] && v.is_finite() {
                    let d = v as f64 - m;
                    var += d * d;
                }
            }
            var /= n;
            mean[j] = m as f32;
            let sd = var.sqrt() as f32;
            scale[j] = if sd > 1e-6 { sd } else { 1.0 };
        }
        Self { mean, scale }
    }
}

impl Scaler for StandardScaler {
    fn expected_width(&self) -> usize {
        self.mean.len()
    }

    fn center(&self) -> &[f32] {
        &self.mean
    }

    fn transform(&self, block: &mut Array2<f32>) {
        for ((_, j), v) in block.indexed_iter_mut() {
            *v = (*v - self.mean[j]) / self.scale[j];
        }
    }
}

/// Applies imputation, rescaling, clipping, and the variance sanity check to
/// a window matrix. Only the `scale_idx` columns are touched by the scaler;
/// binary/categorical columns pass through.
pub struct ScalingStage {
    scaler: Arc<dyn Scaler>,
    scale_idx: Vec<usize>,
}

impl ScalingStage {
    pub fn new(scaler: Arc<dyn Scaler>, scale_idx: Vec<usize>) -> Result<Self, EvalError> {
        if scale_idx.len() != scaler.expected_width() {
            return Err(EvalError::mismatch(format!(
                "scaled column count {} does not match scaler width {}",
                scale_idx.len(),
                scaler.expected_width()
            )));
        }
        Ok(Self { scaler, scale_idx })
    }

    /// Transform a T×D window in place. Fails on the variance sanity check;
    /// that failure signals schema/scaler drift and must reach the caller.
    pub fn apply(
        &self,
        window: &mut Array2<f32>,
        missing: &Array2<bool>,
    ) -> Result<(), EvalError> {
        let t = window.nrows();
        let center = self.scaler.center();

        // Impute: missing cells, plus any stray non-finite value.
        for (k, &j) in self.scale_idx.iter().enumerate() {
            for ti in 0..t {
                let v = window[(ti, j)];
                if missing[(ti, j)] || !v.is_finite() {
                    window[(ti, j)] = center[k];
                }
            }
        }

        // Gather the continuous block, rescale, scatter back.
        let mut block = Array2::<f32>::zeros((t, self.scale_idx.len()));
        for (k, &j) in self.scale_idx.iter().enumerate() {
            for ti in 0..t {
                block[(ti, k)] = window[(ti, j)];
            }
        }
        self.scaler.transform(&mut block);
        for (k, &j) in self.scale_idx.iter().enumerate() {
            for ti in 0..t {
                window[(ti, j)] = block[(ti, k)];
            }
        }

        for v in window.iter_mut() {
            *v = v.clamp(-CLIP_RANGE, CLIP_RANGE);
        }

        // Variance is checked on the unclipped transform: the clip bounds
        // pathological cells, but drift has to stay visible.
        self.sanity_check(&block)
    }

    /// Std per transformed continuous column; median or max out of bounds is
    /// a structural failure, not a transient data issue.
    fn sanity_check(&self, block: &Array2<f32>) -> Result<(), EvalError> {
        let (t, s) = block.dim();
        if t == 0 || s == 0 {
            return Ok(());
        }
        let mut stds = Vec::with_capacity(s);
        for j in 0..s {
            let mut sum = 0.0f64;
            for ti in 0..t {
                sum += block[(ti, j)] as f64;
            }
            let m = sum / t as f64;
            let mut var = 0.0f64;
            for ti in 0..t {
                let d = block[(ti, j)] as f64 - m;
                var += d * d;
            }
            stds.push((var / t as f64).sqrt() as f32);
        }

        let mut sorted = stds.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let median = if sorted.len() % 2 == 1 {
            sorted[sorted.len() / 2]
        } else {
            0.5 * (sorted[sorted.len() / 2 - 1] + sorted[sorted.len() / 2])
        };
        let max = sorted.last().copied().unwrap_or(0.0);

        if median > STD_MEDIAN_LIMIT || max > STD_MAX_LIMIT {
            return Err(EvalError::ScalerDrift {
                median,
                max,
                median_limit: STD_MEDIAN_LIMIT,
                max_limit: STD_MAX_LIMIT,
            });
        }
        Ok(())
    }
}
