//! Masked weighted reconstruction-error scoring, probability calibration,
//! and top-contributor ranking.

mod calibrate;
mod mask;
mod rank;
mod scorer;

pub use calibrate::blackout_probability;
pub use mask::MaskBuilder;
pub use rank::rank_contributors;
pub use scorer::score;

use serde::{Deserialize, Serialize};

/// One feature's share of the aggregate error, for explanation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopContributor {
    pub name: String,
    pub contribution: f32,
    pub percent: f32,
}

/// Result of one `push_sample_and_eval` call. Not persisted by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreResult {
    pub ready: bool,
    pub score: Option<f32>,
    pub threshold: f32,
    pub blackout_prob: f32,
    pub is_anomaly: bool,
    pub consecutive_above: u32,
    pub top_contributors: Vec<TopContributor>,
}

impl ScoreResult {
    /// Placeholder emitted while the window is still filling.
    pub fn not_ready(threshold: f32) -> Self {
        Self {
            ready: false,
            score: None,
            threshold,
            blackout_prob: 0.0,
            is_anomaly: false,
            consecutive_above: 0,
            top_contributors: Vec::new(),
        }
    }
}
