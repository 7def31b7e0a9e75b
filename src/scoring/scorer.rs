//! Weighted squared reconstruction error: one aggregate score plus a
//! per-feature contribution vector. Both use T·D-cell mean semantics.

use ndarray::Array2;

/// Returns (total, per_feature). `total` is the mean weighted squared error
/// over all cells; `per_feature[j]` is the mean over time for column j.
pub fn score(
    window: &Array2<f32>,
    reconstructed: &Array2<f32>,
    weights: &Array2<f32>,
) -> (f32, Vec<f32>) {
    let (t, d) = window.dim();
    let mut per_feature = vec![0.0f32; d];
    let mut total = 0.0f64;

    for j in 0..d {
        let mut col = 0.0f64;
        for ti in 0..t {
            let diff = (window[(ti, j)] - reconstructed[(ti, j)]) as f64;
            col += weights[(ti, j)] as f64 * diff * diff;
        }
        per_feature[j] = (col / t as f64) as f32;
        total += col;
    }

    ((total / (t as f64 * d as f64)) as f32, per_feature)
}
