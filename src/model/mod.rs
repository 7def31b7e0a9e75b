//! Sequence reconstructor contract and the ONNX-backed implementation.

mod onnx;

pub use onnx::OnnxReconstructor;

use ndarray::Array2;

use crate::error::EvalError;

/// Opaque window reconstructor: consumes a T×D window and emits a T×D
/// reconstruction, both in scaled space (the convention the shipped LSTM-AE
/// artifacts were trained with; wrap any raw-space model before handing it
/// to the evaluator). Backends may be native runtimes, remote calls, or test
/// stubs.
pub trait Reconstructor: Send + Sync {
    fn reconstruct(&self, window: &Array2<f32>) -> Result<Array2<f32>, EvalError>;
}
