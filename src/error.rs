//! Evaluator error taxonomy. Construction and per-call sanity failures are
//! loud; per-sample field jitter is absorbed inside the Vectorizer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvalError {
    /// Config/artifact mismatch detected at construction. No degraded mode.
    #[error("artifact mismatch: {0}")]
    ArtifactMismatch(String),

    /// Post-transform variance out of bounds: the scaler and the live
    /// feature set no longer agree (wrong column count/order). Scores from
    /// this state are meaningless, so the call fails instead of continuing.
    #[error("scaler drift: transformed column std median {median:.3} max {max:.3} (limits {median_limit:.1}/{max_limit:.1})")]
    ScalerDrift {
        median: f32,
        max: f32,
        median_limit: f32,
        max_limit: f32,
    },

    /// External reconstructor failed; passed through unmodified, no retry.
    #[error("reconstructor: {0}")]
    Reconstructor(String),

    /// Reconstructor returned a matrix of the wrong shape.
    #[error("reconstructor shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        got: (usize, usize),
    },

    #[error("artifact io: {0}")]
    Io(#[from] std::io::Error),

    #[error("artifact parse: {0}")]
    Parse(#[from] serde_json::Error),
}

impl EvalError {
    pub fn mismatch(msg: impl Into<String>) -> Self {
        Self::ArtifactMismatch(msg.into())
    }
}
