//! Fixed-capacity FIFO of vectorized samples, oldest first.

use std::collections::VecDeque;

use ndarray::Array2;

use super::VectorizedSample;

pub struct WindowBuffer {
    capacity: usize,
    dim: usize,
    rows: VecDeque<VectorizedSample>,
}

impl WindowBuffer {
    pub fn new(capacity: usize, dim: usize) -> Self {
        Self {
            capacity,
            dim,
            rows: VecDeque::with_capacity(capacity + 1),
        }
    }

    /// Append; evicts the oldest row past capacity.
    pub fn push(&mut self, row: VectorizedSample) {
        self.rows.push_back(row);
        while self.rows.len() > self.capacity {
            self.rows.pop_front();
        }
    }

    pub fn is_ready(&self) -> bool {
        self.rows.len() == self.capacity
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Copy out the window as T×D value and missing-mask matrices.
    /// Call only once ready.
    pub fn snapshot(&self) -> (Array2<f32>, Array2<bool>) {
        let t = self.rows.len();
        let mut values = Array2::<f32>::zeros((t, self.dim));
        let mut missing = Array2::<bool>::from_elem((t, self.dim), false);
        for (ti, row) in self.rows.iter().enumerate() {
            for j in 0..self.dim {
                values[(ti, j)] = row.values[j];
                missing[(ti, j)] = row.missing[j];
            }
        }
        (values, missing)
    }
}
