//! ONNX Runtime reconstructor. Input: [1, T, D] f32, output: same shape.
//! Uses `ort`; if the model file is missing, runs in passthrough mode
//! (returns the window unchanged, i.e. zero reconstruction error).

use std::path::Path;
use std::sync::OnceLock;

use ndarray::{Array2, Array3};

use super::Reconstructor;
use crate::error::EvalError;

static ORT_ENV: OnceLock<ort::Environment> = OnceLock::new();

fn init_env() -> &'static ort::Environment {
    ORT_ENV.get_or_init(|| {
        ort::Environment::builder()
            .with_name("spad-agent")
            .build()
            .expect("ORT environment")
    })
}

pub struct OnnxReconstructor {
    session: Option<ort::Session>,
    input_name: String,
}

impl OnnxReconstructor {
    /// Load model from path. If the path is missing, the reconstructor runs
    /// in passthrough mode.
    pub fn load(path: &Path) -> Result<Self, EvalError> {
        let _env = init_env();
        if !path.exists() {
            tracing::warn!(path = %path.display(), "ONNX model not found; passthrough reconstruction");
            return Ok(Self {
                session: None,
                input_name: String::new(),
            });
        }

        let session = ort::Session::builder()
            .and_then(|b| b.commit_from_file(path))
            .map_err(|e| EvalError::Reconstructor(e.to_string()))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "input".to_string());

        Ok(Self {
            session: Some(session),
            input_name,
        })
    }

    pub fn has_model(&self) -> bool {
        self.session.is_some()
    }
}

impl Reconstructor for OnnxReconstructor {
    fn reconstruct(&self, window: &Array2<f32>) -> Result<Array2<f32>, EvalError> {
        let Some(ref session) = self.session else {
            return Ok(window.clone());
        };

        let (t, d) = window.dim();
        let batched: Array3<f32> = window
            .clone()
            .into_shape((1, t, d))
            .map_err(|e| EvalError::Reconstructor(e.to_string()))?;
        let input = ort::Value::from_array(batched.into_dyn())
            .map_err(|e| EvalError::Reconstructor(e.to_string()))?;

        let inputs = ort::inputs![self.input_name.as_str() => input]
            .map_err(|e| EvalError::Reconstructor(e.to_string()))?;
        let outputs = session
            .run(inputs)
            .map_err(|e| EvalError::Reconstructor(e.to_string()))?;

        let out = outputs
            .get(0)
            .ok_or_else(|| EvalError::Reconstructor("model produced no output".to_string()))?;
        let view = out
            .try_extract_raw_tensor::<f32>()
            .map_err(|e| EvalError::Reconstructor(e.to_string()))?;
        let flat = view.as_slice();
        if flat.len() != t * d {
            return Err(EvalError::ShapeMismatch {
                expected: (t, d),
                got: (flat.len() / d.max(1), d),
            });
        }

        Array2::from_shape_vec((t, d), flat.to_vec())
            .map_err(|e| EvalError::Reconstructor(e.to_string()))
    }
}
