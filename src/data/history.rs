//! Reading history for sparklines.

use std::collections::{HashMap, VecDeque};

use cems_types::Parameter;

use super::decoder::Readings;

/// Maximum number of samples kept per parameter.
const MAX_HISTORY_SIZE: usize = 60;

/// Tracks recent readings per parameter.
///
/// Null readings are skipped rather than recorded as zero, so a sensor
/// dropout shows as a gap in time rather than a dip in the trend.
#[derive(Debug, Clone, Default)]
pub struct History {
    samples: HashMap<Parameter, VecDeque<f64>>,
}

impl History {
    /// Create a new empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one set of readings.
    pub fn record(&mut self, readings: &Readings) {
        for (parameter, value) in readings {
            let Some(value) = value else {
                continue;
            };
            let samples = self.samples.entry(*parameter).or_default();
            samples.push_back(*value);
            if samples.len() > MAX_HISTORY_SIZE {
                samples.pop_front();
            }
        }
    }

    /// Recorded samples for `parameter`, oldest first.
    pub fn samples(&self, parameter: Parameter) -> impl Iterator<Item = f64> + '_ {
        self.samples.get(&parameter).into_iter().flatten().copied()
    }

    /// Get sparkline data (normalized to 0-7 for 8 bar levels).
    ///
    /// Returns an empty Vec if there's not enough history.
    pub fn sparkline(&self, parameter: Parameter) -> Vec<u8> {
        let Some(values) = self.samples.get(&parameter) else {
            return Vec::new();
        };
        if values.len() < 2 {
            return Vec::new();
        }

        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = max - min;
        if range <= f64::EPSILON {
            return vec![3; values.len()];
        }

        values
            .iter()
            .map(|v| (((v - min) / range) * 7.0).round().min(7.0) as u8)
            .collect()
    }

    /// Change between the last two samples, if any.
    pub fn trend(&self, parameter: Parameter) -> Option<f64> {
        let values = self.samples.get(&parameter)?;
        let len = values.len();
        if len < 2 {
            return None;
        }
        Some(values[len - 1] - values[len - 2])
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
