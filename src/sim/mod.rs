//! Shipboard plant telemetry simulator: PMS mode state machine with
//! correlated environment, motion, and generator-set channels. Produces the
//! raw sample records the evaluator ingests.

mod ship;

pub use ship::ShipSim;

use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::StandardNormal;

/// Mean-reverting sensor channel: gaussian noise proportional to the current
/// value, external drift toward a target, optional hard bounds.
#[derive(Debug, Clone)]
pub(crate) struct ArParam {
    value: f64,
    rel_sigma: f64,
    min_val: Option<f64>,
    max_val: Option<f64>,
}

impl ArParam {
    pub(crate) fn new(base: f64, rel_sigma: f64, min_val: Option<f64>, max_val: Option<f64>) -> Self {
        Self {
            value: base,
            rel_sigma,
            min_val,
            max_val,
        }
    }

    pub(crate) fn value(&self) -> f64 {
        self.value
    }

    pub(crate) fn step(&mut self, drift: f64, rng: &mut StdRng) -> f64 {
        let sigma = (self.value.abs() * self.rel_sigma).max(1e-6);
        let z: f64 = rng.sample(StandardNormal);
        self.value += z * sigma + drift;
        if let Some(min) = self.min_val {
            self.value = self.value.max(min);
        }
        if let Some(max) = self.max_val {
            self.value = self.value.min(max);
        }
        self.value
    }
}
