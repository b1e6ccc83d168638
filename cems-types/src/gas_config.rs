//! Analyzer gas configuration as served by `GET /config/gas`.

use crate::Parameter;

/// Configuration of one analyzer gas channel.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GasConfig {
    /// Backend name of the gas (e.g. `"SO2"`).
    pub name: String,

    /// Human-readable label (e.g. `"SO₂"`).
    #[cfg_attr(feature = "serde", serde(default))]
    pub display_name: String,

    /// Measurement unit.
    #[cfg_attr(feature = "serde", serde(default))]
    pub unit: String,

    /// Whether the channel is shown and monitored.
    #[cfg_attr(feature = "serde", serde(default))]
    pub enabled: bool,

    /// Alarm threshold; `None` disables threshold alarms for this gas.
    #[cfg_attr(feature = "serde", serde(default))]
    pub alarm_threshold: Option<f64>,

    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub min_value: Option<f64>,

    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub max_value: Option<f64>,
}

impl GasConfig {
    /// Create an enabled gas channel without a threshold.
    pub fn new(name: impl Into<String>, unit: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            unit: unit.into(),
            enabled: true,
            alarm_threshold: None,
            min_value: None,
            max_value: None,
        }
    }

    /// Set the alarm threshold.
    pub fn alarm_threshold(mut self, threshold: f64) -> Self {
        self.alarm_threshold = Some(threshold);
        self
    }

    /// Set the enabled flag.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// The known parameter this gas maps to, if any.
    ///
    /// Falls back to the display name when the backend name is not recognised.
    pub fn parameter(&self) -> Option<Parameter> {
        Parameter::from_name(&self.name).or_else(|| Parameter::from_name(&self.display_name))
    }
}

/// Response body of `GET /config/gas`.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GasConfigResponse {
    #[cfg_attr(feature = "serde", serde(default))]
    pub default_gases: Vec<GasConfig>,

    #[cfg_attr(feature = "serde", serde(default))]
    pub additional_gases: Vec<GasConfig>,
}

impl GasConfigResponse {
    /// Create a builder.
    pub fn builder() -> GasConfigResponseBuilder {
        GasConfigResponseBuilder::default()
    }

    /// Iterate over all gases, default gases first.
    pub fn gases(&self) -> impl Iterator<Item = &GasConfig> {
        self.default_gases.iter().chain(self.additional_gases.iter())
    }

    /// Find the configuration for a parameter, preferring default gases.
    pub fn find(&self, parameter: Parameter) -> Option<&GasConfig> {
        self.gases().find(|g| g.parameter() == Some(parameter))
    }

    /// Enabled parameters in configuration order, without duplicates.
    pub fn enabled_parameters(&self) -> impl Iterator<Item = Parameter> + '_ {
        let mut seen = Vec::new();
        self.gases()
            .filter(|g| g.enabled)
            .filter_map(GasConfig::parameter)
            .filter(move |p| {
                if seen.contains(p) {
                    false
                } else {
                    seen.push(*p);
                    true
                }
            })
    }
}

/// Builder for [`GasConfigResponse`].
#[derive(Debug, Default)]
pub struct GasConfigResponseBuilder {
    default_gases: Vec<GasConfig>,
    additional_gases: Vec<GasConfig>,
}

impl GasConfigResponseBuilder {
    /// Add a default gas.
    pub fn default_gas(mut self, gas: GasConfig) -> Self {
        self.default_gases.push(gas);
        self
    }

    /// Add an additional gas.
    pub fn additional_gas(mut self, gas: GasConfig) -> Self {
        self.additional_gases.push(gas);
        self
    }

    /// Build the response.
    pub fn build(self) -> GasConfigResponse {
        GasConfigResponse {
            default_gases: self.default_gases,
            additional_gases: self.additional_gases,
        }
    }
}
