//! Per-window weight tensor: static base weights plus dynamic zero-out of
//! offline generator groups, per timestep.

use ndarray::Array2;

use crate::schema::{BaseWeights, GeneratorGroup};

pub struct MaskBuilder {
    base: Vec<f32>,
    groups: Vec<GeneratorGroup>,
}

impl MaskBuilder {
    pub fn new(base: &BaseWeights, groups: &[GeneratorGroup]) -> Self {
        Self {
            base: base.as_slice().to_vec(),
            groups: groups.to_vec(),
        }
    }

    /// Build the T×D weight tensor for a window. A group's continuous
    /// columns are zeroed at exactly the timesteps where its online flag is
    /// ≤ 0.5; a unit can toggle within the window.
    pub fn build(&self, window: &Array2<f32>) -> Array2<f32> {
        let t = window.nrows();
        let d = self.base.len();
        let mut weights = Array2::<f32>::zeros((t, d));
        for ti in 0..t {
            for j in 0..d {
                weights[(ti, j)] = self.base[j];
            }
        }

        for group in &self.groups {
            for ti in 0..t {
                if window[(ti, group.online)] <= 0.5 {
                    for &j in &group.cont {
                        weights[(ti, j)] = 0.0;
                    }
                }
            }
        }

        weights
    }
}
