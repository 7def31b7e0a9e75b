//! Sample → fixed-order vector. Pure function of the sample and the schema.

use std::sync::Arc;

use serde_json::Value;

use super::{Sample, VectorizedSample};
use crate::schema::{FeatureKind, FeatureSchema, PmsMode, MODE_CODE_COL};

/// Key carrying the string mode label when the sample has no numeric code.
const MODE_LABEL_KEY: &str = "mode";

pub struct Vectorizer {
    schema: Arc<FeatureSchema>,
}

impl Vectorizer {
    pub fn new(schema: Arc<FeatureSchema>) -> Self {
        Self { schema }
    }

    /// Vectorize one sample in schema order.
    ///
    /// Continuous fields that are absent are marked missing (imputed later);
    /// binary and categorical fields default to 0.0. A string "mode" label is
    /// mapped to the mode code before the default-fill step. Values that fail
    /// numeric coercion become 0.0; stream jitter is not an error.
    pub fn vectorize(&self, sample: &Sample) -> VectorizedSample {
        let dim = self.schema.dim();
        let mut values = vec![0.0f32; dim];
        let mut missing = vec![false; dim];

        for i in 0..dim {
            let name = self.schema.name(i);
            let kind = self.schema.kind(i);

            let raw = match sample.get(name) {
                Some(Value::Null) | None => {
                    // Mode label fallback happens before the generic default.
                    if kind == FeatureKind::Categorical && name == MODE_CODE_COL {
                        if let Some(Value::String(label)) = sample.get(MODE_LABEL_KEY) {
                            values[i] = PmsMode::code_for_label(label);
                            continue;
                        }
                    }
                    if kind == FeatureKind::Continuous {
                        missing[i] = true;
                    }
                    continue;
                }
                Some(v) => v,
            };

            values[i] = match coerce(raw) {
                Some(v) => v,
                None => 0.0,
            };

            // Flags stay exact 0/1 no matter what the stream sent.
            if kind == FeatureKind::Binary {
                values[i] = if values[i] > 0.5 { 1.0 } else { 0.0 };
            }
        }

        VectorizedSample { values, missing }
    }
}

fn coerce(v: &Value) -> Option<f32> {
    match v {
        Value::Number(n) => n.as_f64().map(|x| x as f32),
        Value::String(s) => s.trim().parse::<f32>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}
