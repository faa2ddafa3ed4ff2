//! Trailing EAR window for the live chart

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default number of samples kept for the live chart
pub const DEFAULT_HISTORY_WINDOW: usize = 100;

/// Bounded trailing window of EAR samples
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarHistory {
    values: VecDeque<f64>,
    window_size: usize,
}

impl Default for EarHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_WINDOW)
    }
}

impl EarHistory {
    /// Create a history that keeps the last `window_size` samples
    pub fn new(window_size: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(window_size),
            window_size,
        }
    }

    /// Append a sample and drop the oldest ones beyond the window
    pub fn push(&mut self, ear: f64) {
        self.values.push_back(ear);
        while self.values.len() > self.window_size {
            self.values.pop_front();
        }
    }

    /// Samples from oldest to newest
    pub fn values(&self) -> impl ExactSizeIterator<Item = f64> + '_ {
        self.values.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.values.iter().copied().collect()
    }

    pub fn latest(&self) -> Option<f64> {
        self.values.back().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Mean of the samples in the window
    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        let sum: f64 = self.values.iter().sum();
        Some(sum / self.values.len() as f64)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}
