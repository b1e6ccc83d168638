//! Measured stack parameters.

use core::fmt;
use core::str::FromStr;

/// A parameter measured by the CEMS analyzers.
///
/// The five gas/particulate parameters come first, followed by the
/// stack flow conditions. The ordering of the enum matches
/// [`Parameter::GAS_ORDER`], so sorting a map keyed by `Parameter` yields
/// the same layout operators see on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Parameter {
    #[cfg_attr(feature = "serde", serde(rename = "SO2"))]
    So2,
    #[cfg_attr(feature = "serde", serde(rename = "NOx"))]
    Nox,
    O2,
    #[cfg_attr(feature = "serde", serde(rename = "CO"))]
    Co,
    Dust,
    Temperature,
    Velocity,
    Flowrate,
    Pressure,
}

impl Parameter {
    /// Positional layout of the `gas` vector on the gas feed.
    pub const GAS_ORDER: [Parameter; 9] = [
        Parameter::So2,
        Parameter::Nox,
        Parameter::O2,
        Parameter::Co,
        Parameter::Dust,
        Parameter::Temperature,
        Parameter::Velocity,
        Parameter::Flowrate,
        Parameter::Pressure,
    ];

    /// Parameters for which the backend reports an O2-corrected value.
    pub const CORRECTED: [Parameter; 4] =
        [Parameter::So2, Parameter::Nox, Parameter::Co, Parameter::Dust];

    /// Stack condition parameters that are always shown after the gases.
    pub const FLOW_CONDITIONS: [Parameter; 4] = [
        Parameter::Temperature,
        Parameter::Velocity,
        Parameter::Flowrate,
        Parameter::Pressure,
    ];

    /// Canonical name as used by the backend.
    pub const fn name(&self) -> &'static str {
        match self {
            Parameter::So2 => "SO2",
            Parameter::Nox => "NOx",
            Parameter::O2 => "O2",
            Parameter::Co => "CO",
            Parameter::Dust => "Dust",
            Parameter::Temperature => "Temperature",
            Parameter::Velocity => "Velocity",
            Parameter::Flowrate => "Flowrate",
            Parameter::Pressure => "Pressure",
        }
    }

    /// Display unit.
    pub const fn unit(&self) -> &'static str {
        match self {
            Parameter::So2 | Parameter::Nox | Parameter::Co => "ppm",
            Parameter::O2 => "%",
            Parameter::Dust => "mg/m³",
            Parameter::Temperature => "°C",
            Parameter::Velocity => "m/s",
            Parameter::Flowrate => "m³/h",
            Parameter::Pressure => "Pa",
        }
    }

    /// Key of the corrected-value side field on the gas feed, if any.
    pub const fn corrected_key(&self) -> Option<&'static str> {
        match self {
            Parameter::So2 => Some("SO2Corr"),
            Parameter::Nox => Some("NOxCorr"),
            Parameter::Co => Some("COCorr"),
            Parameter::Dust => Some("DustCorr"),
            _ => None,
        }
    }

    /// True for the gas and particulate parameters.
    pub const fn is_gas(&self) -> bool {
        matches!(
            self,
            Parameter::So2 | Parameter::Nox | Parameter::O2 | Parameter::Co | Parameter::Dust
        )
    }

    /// Resolve a loosely formatted name ("SO₂", "so2", "N-Ox") to a parameter.
    ///
    /// Non-alphanumeric characters are ignored and the comparison is
    /// case-insensitive. Subscript two is treated as a plain `2`.
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized: String = name
            .chars()
            .map(|c| if c == '₂' { '2' } else { c })
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();

        Self::GAS_ORDER
            .iter()
            .copied()
            .find(|p| p.name().eq_ignore_ascii_case(&normalized))
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a string does not name a known parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownParameter(pub String);

impl fmt::Display for UnknownParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown parameter: {}", self.0)
    }
}

impl std::error::Error for UnknownParameter {}

impl FromStr for Parameter {
    type Err = UnknownParameter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| UnknownParameter(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gas_order_matches_enum_order() {
        let mut sorted = Parameter::GAS_ORDER;
        sorted.sort();
        assert_eq!(sorted, Parameter::GAS_ORDER);
    }

    #[test]
    fn test_from_name_normalizes() {
        assert_eq!(Parameter::from_name("SO₂"), Some(Parameter::So2));
        assert_eq!(Parameter::from_name("nox"), Some(Parameter::Nox));
        assert_eq!(Parameter::from_name("O2"), Some(Parameter::O2));
        assert_eq!(Parameter::from_name("flow-rate"), Some(Parameter::Flowrate));
        assert_eq!(Parameter::from_name("H2S"), None);
    }

    #[test]
    fn test_from_str_error() {
        let err = "Mercury".parse::<Parameter>().unwrap_err();
        assert_eq!(err.to_string(), "unknown parameter: Mercury");
    }

    #[test]
    fn test_corrected_keys() {
        let keys: Vec<_> = Parameter::CORRECTED.iter().filter_map(|p| p.corrected_key()).collect();
        assert_eq!(keys, vec!["SO2Corr", "NOxCorr", "COCorr", "DustCorr"]);
        assert_eq!(Parameter::O2.corrected_key(), None);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&Parameter::Nox).unwrap();
        assert_eq!(json, "\"NOx\"");
        let parsed: Parameter = serde_json::from_str("\"SO2\"").unwrap();
        assert_eq!(parsed, Parameter::So2);
    }
}
