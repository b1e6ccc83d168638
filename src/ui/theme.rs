//! Theme configuration for the TUI.
//!
//! Supports light and dark themes with automatic terminal detection.

use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::block::BorderType;

use crate::data::ConnectionStatus;
use crate::view::{Banner, BreachLevel, Freshness};

/// Color and style theme for the TUI.
///
/// Use [`Theme::auto_detect()`] for automatic theme selection based on
/// terminal background, or [`Theme::dark()`]/[`Theme::light()`] explicitly.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Accent color for highlights and active elements.
    pub highlight: Color,
    /// Color for readings approaching their threshold.
    pub warning: Color,
    /// Color for readings above their threshold and active alarms.
    pub critical: Color,
    /// Color for normal readings and a healthy connection.
    pub healthy: Color,
    /// Color for borders and separators.
    pub border: Color,
    /// Style for header rows in tables.
    pub header: Style,
    /// Style for values that are stale or missing.
    pub muted: Style,
    /// Border style (rounded, plain, etc.).
    pub border_type: BorderType,
}

impl Theme {
    /// Create a dark theme suitable for dark terminal backgrounds.
    pub fn dark() -> Self {
        Self {
            highlight: Color::Cyan,
            warning: Color::Yellow,
            critical: Color::Red,
            healthy: Color::Green,
            border: Color::Gray,
            header: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            muted: Style::default().fg(Color::DarkGray),
            border_type: BorderType::Rounded,
        }
    }

    /// Create a light theme suitable for light terminal backgrounds.
    pub fn light() -> Self {
        Self {
            highlight: Color::Blue,
            warning: Color::Yellow,
            critical: Color::Red,
            healthy: Color::Green,
            border: Color::DarkGray,
            header: Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            muted: Style::default().fg(Color::Gray),
            border_type: BorderType::Rounded,
        }
    }

    /// Auto-detect based on terminal background
    pub fn auto_detect() -> Self {
        match terminal_light::luma() {
            Ok(luma) if luma > 0.5 => Self::light(),
            _ => Self::dark(),
        }
    }

    /// Style for a breach classification.
    pub fn level_style(&self, level: Option<BreachLevel>) -> Style {
        match level {
            None => self.muted,
            Some(BreachLevel::Normal) => Style::default().fg(self.healthy),
            Some(BreachLevel::Warning) => Style::default().fg(self.warning),
            Some(BreachLevel::Breach) => {
                Style::default().fg(self.critical).add_modifier(Modifier::BOLD)
            }
        }
    }

    /// Style for the settled connection status.
    pub fn status_style(&self, status: Option<ConnectionStatus>) -> Style {
        match status {
            None => self.muted,
            Some(ConnectionStatus::Connected) => Style::default().fg(self.healthy),
            Some(ConnectionStatus::Degraded) => Style::default().fg(self.warning),
            Some(ConnectionStatus::Disconnected) => {
                Style::default().fg(self.critical).add_modifier(Modifier::BOLD)
            }
        }
    }

    /// Dim stale values, keep fresh ones as classified.
    pub fn freshness_style(&self, freshness: Freshness, base: Style) -> Style {
        match freshness {
            Freshness::Fresh => base,
            Freshness::Stale => base.add_modifier(Modifier::DIM),
            Freshness::NoData => self.muted,
        }
    }

    pub fn banner_style(&self, banner: Banner) -> Style {
        let color = match banner {
            Banner::Success => self.healthy,
            Banner::DeviceError => self.warning,
            Banner::ServerError => self.critical,
        };
        Style::default()
            .fg(Color::Black)
            .bg(color)
            .add_modifier(Modifier::BOLD)
    }
}
