//! Presentation adapter.
//!
//! Turns the published [`AggregatedState`](crate::data::AggregatedState) into
//! a [`Dashboard`]: classified parameter cards, freshness, the connection
//! banner and the alarm panel. Nothing here mutates the state.

pub mod dashboard;
pub mod thresholds;

pub use dashboard::{
    o2_corrected, visible_parameters, Alarm, AlarmLayout, AlarmTracker, Banner, CorrectedCard,
    Dashboard, Freshness, ParameterCard, PresentationView, ALARM_LABELS,
    DEFAULT_FRESHNESS_BUDGET,
};
pub use thresholds::{
    classify, BreachLevel, ThresholdRule, ThresholdTable, DEFAULT_WARN_FRACTION, FLOWRATE_LIMIT,
};
