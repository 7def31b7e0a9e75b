//! Logistic calibration of the aggregate score, anchored at the decision
//! threshold: probability(threshold) = 0.5.

const EPS: f32 = 1e-6;

/// Monotonic in `score` for fixed threshold/alpha; bounded to (0, 1).
pub fn blackout_probability(score: f32, threshold: f32, alpha: f32) -> f32 {
    let denom = (alpha * threshold).max(EPS);
    let z = (score - threshold) / denom;
    1.0 / (1.0 + (-z).exp())
}
