//! Application state for the operator console.

use std::time::Duration;

use tokio::time::Instant;

use crate::data::{AggregatedState, History};
use crate::view::{AlarmTracker, Dashboard, PresentationView};
use crate::ui::Theme;

/// How long a status message stays in the status bar.
const STATUS_MESSAGE_TTL: Duration = Duration::from_secs(3);

/// Something the key handler asks the main loop to do.
///
/// These need the session or the backend client, which the app does not own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Tear the feeds down and reconnect.
    Refresh,
    /// Probe the backend health endpoint.
    CheckHealth,
}

/// Result of the last manual backend health check.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthCheck {
    pub ok: bool,
    pub detail: String,
    pub at: Instant,
}

/// Main application state.
pub struct App {
    pub running: bool,
    pub show_help: bool,

    view: PresentationView,
    pub dashboard: Dashboard,
    pub history: History,
    alarms: AlarmTracker,
    pub backend_url: String,
    pub health: Option<HealthCheck>,
    pub health_check_running: bool,

    // UI
    pub theme: Theme,

    // Status message (temporary feedback)
    pub status_message: Option<(String, Instant)>,
}

impl App {
    /// Create the app and build the first dashboard.
    pub fn new(mut view: PresentationView, backend_url: impl Into<String>, theme: Theme) -> Self {
        let dashboard = view.snapshot(Instant::now());
        Self {
            running: true,
            show_help: false,
            view,
            dashboard,
            history: History::new(),
            alarms: AlarmTracker::new(),
            backend_url: backend_url.into(),
            health: None,
            health_check_running: false,
            theme,
            status_message: None,
        }
    }

    pub fn view(&self) -> &PresentationView {
        &self.view
    }

    /// Set a temporary status message that will be shown for a few seconds.
    pub fn set_status_message(&mut self, message: String) {
        self.status_message = Some((message, Instant::now()));
    }

    /// Get the current status message if it hasn't expired.
    pub fn get_status_message(&self) -> Option<&str> {
        match &self.status_message {
            Some((msg, at)) if at.elapsed() < STATUS_MESSAGE_TTL => Some(msg),
            _ => None,
        }
    }

    /// Rebuild the dashboard for `now`.
    ///
    /// Runs every frame, not only on change, so ages and freshness advance
    /// while the feeds are quiet. Newly raised alarms become a status message.
    pub fn refresh(&mut self, now: Instant) {
        self.dashboard = self.view.snapshot(now);

        let bits: Vec<bool> = self.dashboard.alarms.iter().map(|a| a.active).collect();
        let raised: Vec<String> = self
            .alarms
            .update(&bits)
            .into_iter()
            .filter_map(|i| self.dashboard.alarms.get(i))
            .map(|a| a.label.clone())
            .collect();
        if !raised.is_empty() {
            self.set_status_message(format!("New alarm: {}", raised.join(", ")));
        }
    }

    /// Record the latest readings for the trend sparklines.
    pub fn record_readings(&mut self, state: &AggregatedState) {
        self.history.record(&state.values);
    }

    /// Note that a refresh was requested.
    pub fn refresh_started(&mut self) {
        self.history.clear();
        self.set_status_message("Refreshing connections...".to_string());
    }

    /// Store the outcome of a health check.
    pub fn health_checked(&mut self, result: Result<(), String>) {
        self.health_check_running = false;
        let (ok, detail) = match result {
            Ok(()) => (true, format!("{} is healthy", self.backend_url)),
            Err(e) => (false, format!("{} unreachable: {}", self.backend_url, e)),
        };
        self.set_status_message(detail.clone());
        self.health = Some(HealthCheck {
            ok,
            detail,
            at: Instant::now(),
        });
    }

    /// Toggle the help overlay.
    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    /// Signal the application to quit.
    pub fn quit(&mut self) {
        self.running = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Aggregator, AggregatorSettings};
    use crate::stream::{FeedEndpoint, FeedEvent, RawMessage};
    use cems_types::Parameter;

    fn message(endpoint: FeedEndpoint, payload: &str) -> FeedEvent {
        FeedEvent::Message {
            endpoint,
            message: RawMessage::new(payload),
        }
    }

    fn app(aggregator: &Aggregator) -> App {
        App::new(
            PresentationView::new(aggregator.subscribe()),
            "http://127.0.0.1:8000",
            Theme::dark(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_follows_state() {
        let mut aggregator = Aggregator::new(AggregatorSettings::default());
        let mut app = app(&aggregator);
        assert_eq!(app.dashboard.status, None);

        aggregator.handle_event(&message(
            FeedEndpoint::gas(),
            r#"{"gas":[210,45,7,12,3,150,12,85000,101325]}"#,
        ));
        app.record_readings(aggregator.state());
        app.refresh(Instant::now());

        assert!(app.dashboard.status.is_some());
        assert_eq!(app.history.samples(Parameter::So2).count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_alarm_sets_status_message() {
        let mut aggregator = Aggregator::new(AggregatorSettings::default());
        let mut app = app(&aggregator);
        app.refresh(Instant::now());
        assert_eq!(app.get_status_message(), None);

        aggregator.handle_event(&message(
            FeedEndpoint::status(),
            r#"{"type":"status","values":[0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,1]}"#,
        ));
        app.refresh(Instant::now());
        assert_eq!(
            app.get_status_message(),
            Some("New alarm: Sample Probe Alarm")
        );

        // Still active, nothing new to report
        app.status_message = None;
        app.refresh(Instant::now());
        assert_eq!(app.get_status_message(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_message_expires() {
        let aggregator = Aggregator::new(AggregatorSettings::default());
        let mut app = app(&aggregator);
        app.set_status_message("hello".to_string());
        assert_eq!(app.get_status_message(), Some("hello"));

        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(app.get_status_message(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_checked() {
        let aggregator = Aggregator::new(AggregatorSettings::default());
        let mut app = app(&aggregator);
        app.health_check_running = true;

        app.health_checked(Err("connection refused".to_string()));
        let health = app.health.as_ref().unwrap();
        assert!(!health.ok);
        assert!(health.detail.contains("connection refused"));
        assert!(!app.health_check_running);
    }
}
