//! Read-only dashboard model derived from the aggregated state.

use std::time::Duration;

use cems_types::{GasConfigResponse, Parameter};
use tokio::sync::watch;
use tokio::time::Instant;

use super::thresholds::{BreachLevel, ThresholdTable};
use crate::data::{AggregatedState, ConnectionStatus};
use crate::stream::FeedEndpoint;

/// Default age after which a reading is shown as stale.
pub const DEFAULT_FRESHNESS_BUDGET: Duration = Duration::from_secs(10);

/// Reference O2 level for corrected concentrations, in percent.
const O2_REFERENCE: f64 = 7.0;

/// Labels of the alarm bits, in bit order.
pub const ALARM_LABELS: [&str; 4] = [
    "Temperature Controller Alarm",
    "Analyzer Malfunction",
    "Sample Probe Alarm",
    "Alarm Light",
];

/// Parameter card flagged by each alarm bit.
const ALARM_LINKS: [Parameter; 4] = [
    Parameter::Temperature,
    Parameter::Co,
    Parameter::Dust,
    Parameter::So2,
];

/// How current a displayed value is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Nothing has been received yet.
    NoData,
    Fresh,
    /// The last value is older than the freshness budget (or was cached).
    Stale,
}

/// Connection banner shown above the cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Banner {
    Success,
    DeviceError,
    ServerError,
}

impl Banner {
    /// The banner for a state, if one should be shown.
    pub fn for_state(state: &AggregatedState) -> Option<Self> {
        match state.settled_status? {
            ConnectionStatus::Connected if state.show_success => Some(Banner::Success),
            ConnectionStatus::Connected => None,
            ConnectionStatus::Degraded => Some(Banner::DeviceError),
            ConnectionStatus::Disconnected => Some(Banner::ServerError),
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Banner::Success => "Connected to analyzers, receiving live data",
            Banner::DeviceError => "Backend reachable but analyzer link reports an error",
            Banner::ServerError => "Cannot reach the CEMS backend, retrying",
        }
    }
}

/// Where the alarm bits sit in the status vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmLayout {
    pub offset: usize,
    pub count: usize,
}

impl Default for AlarmLayout {
    fn default() -> Self {
        Self {
            offset: 15,
            count: ALARM_LABELS.len(),
        }
    }
}

impl AlarmLayout {
    /// Extract the alarm bits; positions beyond the vector read as inactive.
    pub fn extract(&self, bits: &[bool]) -> Vec<bool> {
        (self.offset..self.offset.saturating_add(self.count))
            .map(|i| bits.get(i).copied().unwrap_or(false))
            .collect()
    }
}

/// One alarm indicator.
#[derive(Debug, Clone, PartialEq)]
pub struct Alarm {
    pub label: String,
    pub active: bool,
    pub linked: Option<Parameter>,
}

/// One parameter card.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterCard {
    pub parameter: Parameter,
    pub value: Option<f64>,
    /// `None` while there is no value to classify.
    pub level: Option<BreachLevel>,
    pub freshness: Freshness,
    /// A linked alarm bit is active.
    pub alarm_active: bool,
}

/// One O2-corrected value card.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectedCard {
    pub parameter: Parameter,
    pub value: Option<f64>,
    pub level: Option<BreachLevel>,
    /// Computed locally because the backend sent no corrected value.
    pub derived: bool,
}

/// Everything the console renders for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Dashboard {
    pub status: Option<ConnectionStatus>,
    pub banner: Option<Banner>,
    pub cards: Vec<ParameterCard>,
    pub corrected: Vec<CorrectedCard>,
    pub alarms: Vec<Alarm>,
    /// Age of the most recent update on any feed.
    pub last_update_age: Option<Duration>,
    pub malformed: u64,
}

impl Dashboard {
    pub fn active_alarms(&self) -> impl Iterator<Item = &Alarm> {
        self.alarms.iter().filter(|a| a.active)
    }

    /// Worst classification among the cards.
    pub fn worst_level(&self) -> Option<BreachLevel> {
        self.cards.iter().filter_map(|c| c.level).max()
    }
}

/// Parameters shown on the dashboard.
///
/// Enabled gases in configuration order come first, then the stack flow
/// conditions. Without a configuration every parameter is shown.
pub fn visible_parameters(config: Option<&GasConfigResponse>) -> Vec<Parameter> {
    let Some(config) = config else {
        return Parameter::GAS_ORDER.to_vec();
    };
    config
        .enabled_parameters()
        .filter(Parameter::is_gas)
        .chain(Parameter::FLOW_CONDITIONS)
        .collect()
}

/// Correct a concentration to the 7% O2 reference.
///
/// Outside `0 < O2 < 21` the value is returned unchanged.
pub fn o2_corrected(value: f64, o2: Option<f64>) -> f64 {
    match o2 {
        Some(o2) if o2 > 0.0 && o2 < 21.0 => value * (21.0 - O2_REFERENCE) / (21.0 - o2),
        _ => value,
    }
}

/// Reports alarms that became active since the previous update.
#[derive(Debug, Clone, Default)]
pub struct AlarmTracker {
    previous: Vec<bool>,
}

impl AlarmTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current alarm bits and return the indices that rose.
    pub fn update(&mut self, alarms: &[bool]) -> Vec<usize> {
        let rising = alarms
            .iter()
            .enumerate()
            .filter(|(i, active)| **active && !self.previous.get(*i).copied().unwrap_or(false))
            .map(|(i, _)| i)
            .collect();
        self.previous = alarms.to_vec();
        rising
    }
}

/// Reactive view over the aggregator's published state.
#[derive(Debug)]
pub struct PresentationView {
    rx: watch::Receiver<AggregatedState>,
    thresholds: ThresholdTable,
    parameters: Vec<Parameter>,
    alarm_layout: AlarmLayout,
    freshness_budget: Duration,
}

impl PresentationView {
    pub fn new(rx: watch::Receiver<AggregatedState>) -> Self {
        Self {
            rx,
            thresholds: ThresholdTable::default(),
            parameters: visible_parameters(None),
            alarm_layout: AlarmLayout::default(),
            freshness_budget: DEFAULT_FRESHNESS_BUDGET,
        }
    }

    pub fn with_thresholds(mut self, thresholds: ThresholdTable) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_parameters(mut self, parameters: Vec<Parameter>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_alarm_layout(mut self, layout: AlarmLayout) -> Self {
        self.alarm_layout = layout;
        self
    }

    pub fn with_freshness_budget(mut self, budget: Duration) -> Self {
        self.freshness_budget = budget;
        self
    }

    /// Apply a new backend gas configuration.
    pub fn set_gas_config(&mut self, config: &GasConfigResponse, warn_fraction: f64) {
        self.thresholds = ThresholdTable::from_gas_config(config, warn_fraction);
        self.parameters = visible_parameters(Some(config));
    }

    pub fn thresholds(&self) -> &ThresholdTable {
        &self.thresholds
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Wait for the next visible change. Returns false once the aggregator is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Check if a visible change is waiting.
    pub fn has_changed(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }

    /// Current alarm bits.
    pub fn alarm_bits(&self) -> Vec<bool> {
        self.alarm_layout.extract(&self.rx.borrow().bits)
    }

    /// Build the dashboard for `now`, marking the state as seen.
    pub fn snapshot(&mut self, now: Instant) -> Dashboard {
        let state = self.rx.borrow_and_update().clone();
        self.build(&state, now)
    }

    fn build(&self, state: &AggregatedState, now: Instant) -> Dashboard {
        let alarm_bits = self.alarm_layout.extract(&state.bits);
        let alarms: Vec<Alarm> = alarm_bits
            .iter()
            .enumerate()
            .map(|(i, active)| Alarm {
                label: ALARM_LABELS
                    .get(i)
                    .map(|l| l.to_string())
                    .unwrap_or_else(|| format!("Alarm {}", i + 1)),
                active: *active,
                linked: ALARM_LINKS.get(i).copied(),
            })
            .collect();

        let gas_updated = state
            .feed(&FeedEndpoint::gas())
            .and_then(|f| f.last_updated);

        let cards = self
            .parameters
            .iter()
            .map(|p| {
                let value = state.value(*p);
                ParameterCard {
                    parameter: *p,
                    value,
                    level: value.map(|v| self.thresholds.classify(*p, v)),
                    freshness: self.freshness(state.values.contains_key(p), gas_updated, now),
                    alarm_active: alarms.iter().any(|a| a.active && a.linked == Some(*p)),
                }
            })
            .collect();

        let corrected = Parameter::CORRECTED
            .iter()
            .filter(|p| self.parameters.contains(p))
            .map(|p| {
                let (value, derived) = match state.corrected(*p) {
                    Some(v) => (Some(v), false),
                    None => (
                        state
                            .value(*p)
                            .map(|v| o2_corrected(v, state.value(Parameter::O2))),
                        true,
                    ),
                };
                CorrectedCard {
                    parameter: *p,
                    value,
                    level: value.map(|v| self.thresholds.classify(*p, v)),
                    derived: derived && value.is_some(),
                }
            })
            .collect();

        Dashboard {
            status: state.settled_status,
            banner: Banner::for_state(state),
            cards,
            corrected,
            alarms,
            last_update_age: state.last_updated().map(|t| now.saturating_duration_since(t)),
            malformed: state.malformed_total(),
        }
    }

    fn freshness(&self, has_value: bool, updated: Option<Instant>, now: Instant) -> Freshness {
        match updated {
            None if !has_value => Freshness::NoData,
            None => Freshness::Stale,
            Some(at) if now.saturating_duration_since(at) > self.freshness_budget => {
                Freshness::Stale
            }
            Some(_) => Freshness::Fresh,
        }
    }
}
