//! Agent configuration and the model artifact config. Runtime config loads
//! leniently (missing file → defaults); the model artifact loads strictly,
//! since a silently defaulted schema would corrupt every score after it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::EvalError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Directory holding model_config.json, scaler.json, model.onnx
    pub artifacts_dir: PathBuf,
    /// Data directory (history store)
    pub data_dir: PathBuf,
    /// Telemetry simulator parameters
    pub sim: SimConfig,
    /// Local score history
    pub history: HistoryConfig,
    /// Uplink: scored telemetry POSTed to the fleet API when enabled
    pub uplink: UplinkConfig,
    /// Logging
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    pub seed: u64,
    /// Simulated seconds per step
    pub dt_seconds: i64,
    /// Steps spent ramping generators before the plant stabilizes
    pub startup_steps: u64,
    /// Minimum dwell in stable before an excursion may start
    pub min_stable: u64,
    /// Minimum dwell in bad_env / high_load
    pub min_env: u64,
    /// Seconds after an excursion before the next may start
    pub cooldown_secs: i64,
    /// Wall-clock emission cadence of the produce loop
    pub tick_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    pub enabled: bool,
    /// Rows older than this are pruned each tick
    pub retain_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UplinkConfig {
    pub enabled: bool,
    /// Endpoint URL when enabled
    pub endpoint: Option<String>,
    /// Vessel node id reported to the fleet API
    pub vessel_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: PathBuf::from("artifacts"),
            data_dir: PathBuf::from(".spad"),
            sim: SimConfig::default(),
            history: HistoryConfig::default(),
            uplink: UplinkConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 123,
            dt_seconds: 5,
            startup_steps: 240,
            min_stable: 60,
            min_env: 40,
            cooldown_secs: 60,
            tick_secs: 1,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            retain_secs: 24 * 3600,
        }
    }
}

impl Default for UplinkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            vessel_id: None,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

impl AgentConfig {
    /// Load from JSON file if present; otherwise return default
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            if let Ok(data) = std::fs::read_to_string(path) {
                if let Ok(c) = serde_json::from_str::<AgentConfig>(&data) {
                    return c;
                }
            }
        }
        Self::default()
    }
}

/// Model artifact config: the feature order and scoring parameters the
/// reconstructor was trained with. Immutable for the evaluator's lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub feature_cols: Vec<String>,
    pub seq_len: usize,
    /// Decision threshold on the aggregate reconstruction error
    pub threshold: f32,
    /// Rescaled subset; defaults to every column not ending in "_online"
    #[serde(default)]
    pub scaled_columns: Option<Vec<String>>,
    /// Calibration slope relative to the threshold
    #[serde(default = "default_prob_alpha")]
    pub prob_alpha: f32,
    /// Contributors reported per result
    #[serde(default = "default_topk")]
    pub topk: usize,
    /// Reported score = mean of the last k raw window scores
    #[serde(default = "default_smoothing_k")]
    pub smoothing_k: usize,
    /// Reduced base weights for high-variance continuous channels
    #[serde(default)]
    pub weight_overrides: HashMap<String, f32>,
}

fn default_prob_alpha() -> f32 {
    0.25
}

fn default_topk() -> usize {
    5
}

fn default_smoothing_k() -> usize {
    3
}

impl ModelConfig {
    /// Strict load: a missing or malformed artifact is fatal.
    pub fn load(path: &Path) -> Result<Self, EvalError> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        let mut weight_overrides = HashMap::new();
        for i in 1..=4 {
            weight_overrides.insert(format!("g{}_vibration_level_mm_s", i), 0.7);
        }
        Self {
            feature_cols: default_feature_cols(),
            seq_len: 60,
            threshold: 0.48,
            scaled_columns: None,
            prob_alpha: default_prob_alpha(),
            topk: default_topk(),
            smoothing_k: default_smoothing_k(),
            weight_overrides,
        }
    }
}

/// Column order of the shipboard plant model: plant-wide channels, four
/// generator-set blocks, then the PMS mode code.
pub fn default_feature_cols() -> Vec<String> {
    let mut cols: Vec<String> = [
        "num_generators_online",
        "wave_height_meters",
        "wind_speed_knots",
        "ship_roll_degrees",
        "ship_pitch_degrees",
        "msb_total_active_power_kw",
        "msb_busbar_voltage_v",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    for i in 1..=4 {
        for sensor in [
            "online",
            "load_kw",
            "frequency_hz",
            "lube_oil_pressure_bar",
            "coolant_temperature_celsius",
            "exhaust_gas_temperature_celsius",
            "vibration_level_mm_s",
        ] {
            cols.push(format!("g{}_{}", i, sensor));
        }
    }

    cols.push("mode_code".to_string());
    cols
}
