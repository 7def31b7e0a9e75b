//! Fixed-order vectorization of raw samples and the sliding window buffer.

mod vectorize;
mod window;

pub use vectorize::Vectorizer;
pub use window::WindowBuffer;

/// Raw telemetry sample: arbitrary key/value record off the stream.
pub type Sample = serde_json::Map<String, serde_json::Value>;

/// One vectorized sample: values in schema order plus a shadow mask marking
/// continuous cells whose source field was absent (candidates for
/// imputation downstream).
#[derive(Debug, Clone)]
pub struct VectorizedSample {
    pub values: Vec<f32>,
    pub missing: Vec<bool>,
}

impl VectorizedSample {
    pub fn dim(&self) -> usize {
        self.values.len()
    }
}
