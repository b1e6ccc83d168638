//! Alarm thresholds and breach classification.

use std::collections::HashMap;

use cems_types::{GasConfigResponse, Parameter};

/// Fraction of the alarm threshold at which a reading turns to warning.
pub const DEFAULT_WARN_FRACTION: f64 = 0.8;

/// Flow rates above this are treated as a sensor fault.
pub const FLOWRATE_LIMIT: f64 = 1_000_000.0;

/// Thresholds used when the backend configuration does not name one.
const FALLBACK_THRESHOLDS: &[(Parameter, f64)] = &[
    (Parameter::So2, 200.0),
    (Parameter::Nox, 300.0),
    (Parameter::Co, 100.0),
    (Parameter::Dust, 50.0),
    (Parameter::Temperature, 80.0),
    (Parameter::Pressure, 1000.0),
    (Parameter::Velocity, 30.0),
];

/// Severity of a reading relative to its limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BreachLevel {
    Normal,
    Warning,
    Breach,
}

impl BreachLevel {
    /// Returns a short symbol for display.
    pub fn symbol(&self) -> &'static str {
        match self {
            BreachLevel::Normal => "OK",
            BreachLevel::Warning => "WARN",
            BreachLevel::Breach => "OVER",
        }
    }
}

/// Alarm threshold for one parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdRule {
    pub threshold: Option<f64>,
    pub warn_fraction: f64,
}

impl Default for ThresholdRule {
    fn default() -> Self {
        Self {
            threshold: None,
            warn_fraction: DEFAULT_WARN_FRACTION,
        }
    }
}

impl ThresholdRule {
    pub fn new(threshold: Option<f64>, warn_fraction: f64) -> Self {
        Self {
            threshold,
            warn_fraction,
        }
    }

    /// Classify `value` against this rule alone.
    pub fn classify(&self, value: f64) -> BreachLevel {
        match self.threshold {
            Some(t) if value > t => BreachLevel::Breach,
            Some(t) if value >= t * self.warn_fraction => BreachLevel::Warning,
            _ => BreachLevel::Normal,
        }
    }
}

/// Classify a reading of `parameter`.
///
/// O2 is judged by fixed bands regardless of any configured threshold, and
/// an implausible flow rate is always a breach.
pub fn classify(parameter: Parameter, value: f64, rule: &ThresholdRule) -> BreachLevel {
    match parameter {
        Parameter::O2 => classify_oxygen(value),
        Parameter::Flowrate if value > FLOWRATE_LIMIT => BreachLevel::Breach,
        _ => rule.classify(value),
    }
}

fn classify_oxygen(value: f64) -> BreachLevel {
    if value > 21.0 || value < 3.0 {
        BreachLevel::Breach
    } else if value > 15.0 || value < 6.0 {
        BreachLevel::Warning
    } else {
        BreachLevel::Normal
    }
}

/// Threshold rules for every parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdTable {
    rules: HashMap<Parameter, ThresholdRule>,
    warn_fraction: f64,
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self::with_warn_fraction(DEFAULT_WARN_FRACTION)
    }
}

impl ThresholdTable {
    /// The fallback thresholds with the given warning fraction.
    pub fn with_warn_fraction(warn_fraction: f64) -> Self {
        let rules = FALLBACK_THRESHOLDS
            .iter()
            .map(|(p, t)| (*p, ThresholdRule::new(Some(*t), warn_fraction)))
            .collect();
        Self {
            rules,
            warn_fraction,
        }
    }

    /// Build the table from the backend gas configuration.
    ///
    /// A gas listed in the configuration uses its `alarm_threshold`, even
    /// when that is null; parameters it does not list keep the fallbacks.
    pub fn from_gas_config(config: &GasConfigResponse, warn_fraction: f64) -> Self {
        let mut table = Self::with_warn_fraction(warn_fraction);
        for parameter in Parameter::GAS_ORDER {
            if let Some(gas) = config.find(parameter) {
                table.set(parameter, gas.alarm_threshold);
            }
        }
        table
    }

    /// Override the threshold of one parameter.
    pub fn set(&mut self, parameter: Parameter, threshold: Option<f64>) {
        self.rules
            .insert(parameter, ThresholdRule::new(threshold, self.warn_fraction));
    }

    /// Rule for `parameter`; parameters without one never warn.
    pub fn rule(&self, parameter: Parameter) -> ThresholdRule {
        self.rules
            .get(&parameter)
            .copied()
            .unwrap_or_else(|| ThresholdRule::new(None, self.warn_fraction))
    }

    /// Classify a reading of `parameter` using this table.
    pub fn classify(&self, parameter: Parameter, value: f64) -> BreachLevel {
        classify(parameter, value, &self.rule(parameter))
    }
}
