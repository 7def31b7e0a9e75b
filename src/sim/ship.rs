//! Plant state machine: startup → stable ↔ {bad_env, high_load}, with
//! wave→(roll, pitch)→vibration and load→(coolant, exhaust) correlations.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde_json::Value;

use super::ArParam;
use crate::config::SimConfig;
use crate::features::Sample;
use crate::schema::PmsMode;

const NUM_GENS: usize = 4;
const MSB_VOLTAGE_BASE: f64 = 690.0;

struct GenChannels {
    load_kw: ArParam,
    frequency_hz: ArParam,
    lube_oil_pressure_bar: ArParam,
    coolant_temperature_celsius: ArParam,
    exhaust_gas_temperature_celsius: ArParam,
    vibration_level_mm_s: ArParam,
}

impl GenChannels {
    fn new(i: usize) -> Self {
        let base_load = 900.0 + (i as f64 - 1.0) * 40.0;
        Self {
            load_kw: ArParam::new(base_load * 0.5, 0.01, Some(0.0), None),
            frequency_hz: ArParam::new(50.0, 0.0004, Some(49.5), Some(50.5)),
            lube_oil_pressure_bar: ArParam::new(1.6, 0.01, Some(0.0), None),
            coolant_temperature_celsius: ArParam::new(40.0, 0.01, Some(-10.0), None),
            exhaust_gas_temperature_celsius: ArParam::new(180.0, 0.01, Some(0.0), None),
            vibration_level_mm_s: ArParam::new(0.7 + 0.05 * (i as f64 - 1.0), 0.03, Some(0.0), None),
        }
    }
}

pub struct ShipSim {
    rng: StdRng,
    t: DateTime<Utc>,
    dt_seconds: i64,
    mode: PmsMode,
    mode_steps: u64,
    startup_steps: u64,
    min_stable: u64,
    min_env: u64,
    cooldown_secs: i64,
    last_env_exit: i64,
    num_online: usize,
    wave: ArParam,
    wind: ArParam,
    roll: ArParam,
    pitch: ArParam,
    gens: Vec<GenChannels>,
}

impl ShipSim {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            t: Utc::now(),
            dt_seconds: config.dt_seconds,
            mode: PmsMode::Startup,
            mode_steps: 0,
            startup_steps: config.startup_steps,
            min_stable: config.min_stable,
            min_env: config.min_env,
            cooldown_secs: config.cooldown_secs,
            last_env_exit: i64::MIN / 2,
            num_online: 2,
            wave: ArParam::new(0.5, 0.05, Some(0.0), None),
            wind: ArParam::new(8.0, 0.05, Some(0.0), None),
            roll: ArParam::new(0.5, 0.02, None, None),
            pitch: ArParam::new(0.5, 0.02, None, None),
            gens: (1..=NUM_GENS).map(GenChannels::new).collect(),
        }
    }

    pub fn mode(&self) -> PmsMode {
        self.mode
    }

    pub fn num_online(&self) -> usize {
        self.num_online
    }

    fn enter(&mut self, mode: PmsMode, num_online: Option<usize>) {
        self.mode = mode;
        self.mode_steps = 0;
        if let Some(n) = num_online {
            self.num_online = n;
        }
    }

    fn advance_mode(&mut self) {
        match self.mode {
            PmsMode::Startup => {
                if self.mode_steps >= self.startup_steps {
                    self.enter(PmsMode::Stable, Some(3));
                }
            }
            PmsMode::Stable => {
                let cooled = self.t.timestamp() - self.last_env_exit >= self.cooldown_secs;
                if self.mode_steps >= self.min_stable && cooled {
                    let u: f64 = self.rng.gen();
                    if u < 0.03 {
                        self.enter(PmsMode::HighLoad, Some(3));
                    } else if u < 0.08 {
                        self.enter(PmsMode::BadEnv, Some(3));
                    }
                }
            }
            PmsMode::BadEnv | PmsMode::HighLoad => {
                if self.mode_steps >= self.min_env && self.rng.gen::<f64>() < 0.08 {
                    self.last_env_exit = self.t.timestamp();
                    self.enter(PmsMode::Stable, Some(3));
                }
            }
        }
    }

    /// Produce one telemetry sample. Offline generator sets report their
    /// flag as 0 and omit their sensor keys entirely.
    pub fn step(&mut self) -> Sample {
        self.t = self.t + Duration::seconds(self.dt_seconds);
        self.mode_steps += 1;
        self.advance_mode();

        let env_mult = match self.mode {
            PmsMode::Startup => 0.4,
            PmsMode::Stable => 1.0,
            PmsMode::BadEnv => 2.0,
            PmsMode::HighLoad => 1.2,
        };

        let wave_target = 1.0 * env_mult;
        let wave = {
            let drift = (wave_target - self.wave.value()) * 0.02;
            self.wave.step(drift, &mut self.rng)
        };
        let wind = {
            let drift = (8.0 * env_mult - self.wind.value()) * 0.01;
            self.wind.step(drift, &mut self.rng)
        };
        let roll = {
            let drift = (1.4 * wave - self.roll.value()) * 0.15;
            self.roll.step(drift, &mut self.rng)
        };
        let pitch = {
            let drift = (0.7 * wave - self.pitch.value()) * 0.1;
            self.pitch.step(drift, &mut self.rng)
        };

        // Generator ramp during startup; rare online/offline toggles after.
        if self.mode == PmsMode::Startup {
            if self.mode_steps % 20 == 0 {
                self.num_online = (self.num_online + 1).min(NUM_GENS);
            }
        } else if self.rng.gen::<f64>() < 0.003 {
            let delta: isize = if self.rng.gen::<bool>() { 1 } else { -1 };
            self.num_online = (self.num_online as isize + delta).clamp(1, NUM_GENS as isize) as usize;
        }

        let mut row = Sample::new();
        row.insert("timestamp".into(), Value::String(self.t.to_rfc3339()));
        row.insert("mode".into(), Value::String(self.mode.label().to_string()));
        put(&mut row, "num_generators_online", self.num_online as f64);
        put(&mut row, "wave_height_meters", wave);
        put(&mut row, "wind_speed_knots", wind);
        put(&mut row, "ship_roll_degrees", roll);
        put(&mut row, "ship_pitch_degrees", pitch);

        let base_load = match self.mode {
            PmsMode::Startup => 600.0,
            PmsMode::HighLoad => 900.0 * 1.5,
            _ => 900.0,
        };

        let mut total_kw = 0.0;
        for i in 1..=NUM_GENS {
            let key = |sensor: &str| format!("g{}_{}", i, sensor);
            if i <= self.num_online {
                let env_load_factor = 1.0 + 0.02 * wave + 0.005 * wind;
                let target = (900.0 + 40.0 * (i as f64 - 1.0)) * env_load_factor;
                let target = base_load + (target - 900.0);

                let set = &mut self.gens[i - 1];
                let load = {
                    let drift = (target - set.load_kw.value()) * 0.05;
                    set.load_kw.step(drift, &mut self.rng)
                };
                let freq = set.frequency_hz.step(0.0, &mut self.rng);
                let lube = set.lube_oil_pressure_bar.step(0.0, &mut self.rng);
                let cool = set
                    .coolant_temperature_celsius
                    .step(0.02 * (load - 600.0) / 10.0, &mut self.rng);
                let exhaust = set
                    .exhaust_gas_temperature_celsius
                    .step(0.15 * load / 1000.0, &mut self.rng);
                let vib = {
                    let drift = 0.02 * (0.12 * roll.abs()) * set.vibration_level_mm_s.value();
                    set.vibration_level_mm_s.step(drift, &mut self.rng)
                };

                total_kw += load;
                put(&mut row, &key("online"), 1.0);
                put(&mut row, &key("load_kw"), load);
                put(&mut row, &key("frequency_hz"), freq);
                put(&mut row, &key("lube_oil_pressure_bar"), lube);
                put(&mut row, &key("coolant_temperature_celsius"), cool);
                put(&mut row, &key("exhaust_gas_temperature_celsius"), exhaust);
                put(&mut row, &key("vibration_level_mm_s"), vib);
            } else {
                put(&mut row, &key("online"), 0.0);
            }
        }

        let noise: f64 = self.rng.sample::<f64, _>(StandardNormal) * 3.0;
        put(&mut row, "msb_total_active_power_kw", total_kw + noise);
        let vnoise: f64 = self.rng.sample::<f64, _>(StandardNormal) * 2.0;
        put(
            &mut row,
            "msb_busbar_voltage_v",
            MSB_VOLTAGE_BASE + vnoise - 0.02 * roll,
        );

        row
    }
}

fn put(row: &mut Sample, key: &str, value: f64) {
    if let Some(n) = serde_json::Number::from_f64(value) {
        row.insert(key.to_string(), Value::Number(n));
    }
}
