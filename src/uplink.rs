//! Uplink client: report the vessel and scored telemetry ticks to the fleet
//! API.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::UplinkConfig;
use crate::features::Sample;
use crate::scoring::{ScoreResult, TopContributor};

/// Payloads for the fleet API (align with its ingest endpoints).
#[derive(Serialize)]
struct VesselPayload {
    node_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    first_seen: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_seen: Option<String>,
}

#[derive(Serialize)]
struct TelemetryPayload {
    vessel_id: String,
    timestamp: String,
    mode: String,
    score: Option<f32>,
    threshold: f32,
    blackout_prob: f32,
    is_anomaly: bool,
    consecutive_above: u32,
    top_contributors: Vec<TopContributor>,
    num_generators_online: f64,
    msb_total_active_power_kw: f64,
    ship_roll_degrees: f64,
    features_raw: serde_json::Map<String, Value>,
}

pub struct UplinkClient {
    client: reqwest::Client,
    base_url: String,
    vessel_id: String,
    feature_cols: Vec<String>,
    vessel_registered: AtomicBool,
}

impl UplinkClient {
    /// Vessel node id sent to the fleet API.
    pub fn vessel_id(&self) -> &str {
        &self.vessel_id
    }

    pub fn new(config: &UplinkConfig, feature_cols: Vec<String>) -> Option<Self> {
        let endpoint = config.endpoint.as_ref()?.trim_end_matches('/');
        let vessel_id = config
            .vessel_id
            .clone()
            .unwrap_or_else(|| "local-vessel".to_string());
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .ok()?;
        Some(Self {
            client,
            base_url: endpoint.to_string(),
            vessel_id,
            feature_cols,
            vessel_registered: AtomicBool::new(false),
        })
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<(), String> {
        let url = format!("{}{}", self.base_url, path);
        let res = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(format!("{} {}", status, text));
        }
        Ok(())
    }

    /// Register vessel once (idempotent).
    pub async fn ensure_vessel(&self) {
        if self.vessel_registered.load(Ordering::Relaxed) {
            return;
        }
        let now = Utc::now().to_rfc3339();
        let payload = VesselPayload {
            node_id: self.vessel_id.clone(),
            first_seen: Some(now.clone()),
            last_seen: Some(now),
        };
        if self.post("/api/v1/vessels", &payload).await.is_ok() {
            self.vessel_registered.store(true, Ordering::Relaxed);
            info!(vessel_id = %self.vessel_id, "uplink vessel registered");
        } else {
            warn!(vessel_id = %self.vessel_id, "uplink vessel registration failed");
        }
    }

    /// Report one scored tick: the prediction block, quick-summary channels,
    /// and the raw values of every model column present in the sample.
    pub async fn report(&self, sample: &Sample, result: &ScoreResult) -> Result<(), String> {
        self.ensure_vessel().await;

        let mut features_raw = serde_json::Map::new();
        for name in &self.feature_cols {
            if let Some(Value::Number(n)) = sample.get(name) {
                features_raw.insert(name.clone(), Value::Number(n.clone()));
            }
        }

        let payload = TelemetryPayload {
            vessel_id: self.vessel_id.clone(),
            timestamp: str_field(sample, "timestamp"),
            mode: str_field(sample, "mode"),
            score: result.score,
            threshold: result.threshold,
            blackout_prob: result.blackout_prob,
            is_anomaly: result.is_anomaly,
            consecutive_above: result.consecutive_above,
            top_contributors: result.top_contributors.clone(),
            num_generators_online: num_field(sample, "num_generators_online"),
            msb_total_active_power_kw: num_field(sample, "msb_total_active_power_kw"),
            ship_roll_degrees: num_field(sample, "ship_roll_degrees"),
            features_raw,
        };

        self.post("/api/v1/telemetry", &payload).await?;
        info!(score = ?result.score, blackout_prob = result.blackout_prob, "uplink tick reported");
        Ok(())
    }
}

fn str_field(sample: &Sample, key: &str) -> String {
    match sample.get(key) {
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    }
}

fn num_field(sample: &Sample, key: &str) -> f64 {
    match sample.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        _ => 0.0,
    }
}
