//! Frame-to-frame prediction smoothing
//!
//! Live predictions are gated twice: a frame whose top probability is below
//! the confidence threshold clears the history, and a letter is only
//! emitted when it covers the required share of the rolling buffer.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    pub confidence_threshold: f32,
    pub buffer_size: usize,
    pub required_consensus: f32,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.65,
            buffer_size: 3,
            required_consensus: 0.90,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PredictionSmoother {
    config: SmoothingConfig,
    buffer: VecDeque<String>,
}

impl PredictionSmoother {
    pub fn new(config: SmoothingConfig) -> Self {
        Self {
            buffer: VecDeque::with_capacity(config.buffer_size.max(1)),
            config,
        }
    }

    /// Feed one frame's prediction; returns the letter once it is stable
    pub fn push(&mut self, label: &str, probabilities: &[f32]) -> Option<String> {
        let top = probabilities.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        if top < self.config.confidence_threshold {
            self.buffer.clear();
            return None;
        }

        self.buffer.push_back(label.to_string());
        while self.buffer.len() > self.config.buffer_size.max(1) {
            self.buffer.pop_front();
        }

        let (letter, count) = self.majority()?;
        let consensus = count as f32 / self.buffer.len() as f32;
        (consensus >= self.config.required_consensus).then_some(letter)
    }

    /// Most frequent buffered label; ties go to the earliest seen
    fn majority(&self) -> Option<(String, usize)> {
        let mut counts: Vec<(&str, usize)> = Vec::new();
        for label in &self.buffer {
            match counts.iter_mut().find(|(l, _)| *l == label.as_str()) {
                Some((_, n)) => *n += 1,
                None => counts.push((label.as_str(), 1)),
            }
        }

        let mut best: Option<(&str, usize)> = None;
        for (label, n) in counts {
            if best.map_or(true, |(_, m)| n > m) {
                best = Some((label, n));
            }
        }
        best.map(|(label, n)| (label.to_string(), n))
    }
}

impl Default for PredictionSmoother {
    fn default() -> Self {
        Self::new(SmoothingConfig::default())
    }
}
