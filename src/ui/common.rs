//! Common UI components.
//!
//! This module contains the header bar, the connection banner, the status bar
//! and the help overlay.

use ratatui::{
    layout::{Alignment, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use crate::app::App;
use crate::data::duration::format_age;
use crate::view::BreachLevel;

/// Render the header bar with the settled connection status.
///
/// Displays: status indicator, backend address, breach and alarm counts.
pub fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let dashboard = &app.dashboard;
    let status_style = app.theme.status_style(dashboard.status);
    let status_label = dashboard.status.map(|s| s.label()).unwrap_or("CONNECTING");

    let breaches = dashboard
        .cards
        .iter()
        .filter(|c| c.level == Some(BreachLevel::Breach))
        .count();
    let warnings = dashboard
        .cards
        .iter()
        .filter(|c| c.level == Some(BreachLevel::Warning))
        .count();
    let alarms = dashboard.active_alarms().count();

    let count = |n: usize, style: Style| {
        if n > 0 {
            Span::styled(n.to_string(), style)
        } else {
            Span::styled("0", Style::default().add_modifier(Modifier::DIM))
        }
    };

    let line = Line::from(vec![
        Span::styled(" ● ", status_style),
        Span::styled("CEMS ", Style::default().add_modifier(Modifier::BOLD)),
        Span::styled(status_label, status_style),
        Span::raw(" │ "),
        Span::raw(app.backend_url.as_str()),
        Span::raw(" │ "),
        count(
            breaches,
            Style::default().fg(app.theme.critical).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" over "),
        count(warnings, Style::default().fg(app.theme.warning)),
        Span::raw(" warn │ "),
        count(
            alarms,
            Style::default().fg(app.theme.critical).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" alarms"),
    ]);

    frame.render_widget(Paragraph::new(line), area);
}

/// Render the connection banner, or nothing when there is none to show.
pub fn render_banner(frame: &mut Frame, app: &App, area: Rect) {
    let Some(banner) = app.dashboard.banner else {
        return;
    };
    let paragraph = Paragraph::new(format!(" {} ", banner.message()))
        .style(app.theme.banner_style(banner))
        .alignment(Alignment::Center);
    frame.render_widget(paragraph, area);
}

/// Render the status bar at the bottom.
///
/// Shows: time since the last update, refresh and health-check state,
/// malformed message count, available controls. Temporary status messages
/// take precedence.
pub fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    if let Some(msg) = app.get_status_message() {
        let paragraph =
            Paragraph::new(format!(" {} ", msg)).style(Style::default().fg(app.theme.highlight));
        frame.render_widget(paragraph, area);
        return;
    }

    let dashboard = &app.dashboard;
    let updated = match dashboard.last_update_age {
        Some(age) => format!("Updated {} ago", format_age(age)),
        None => "Waiting for data".to_string(),
    };

    let mut parts = vec![updated];
    if dashboard.malformed > 0 {
        parts.push(format!("{} malformed", dashboard.malformed));
    }
    if let Some(ref health) = app.health {
        let age = format_age(health.at.elapsed());
        let result = if health.ok { "ok" } else { "failed" };
        parts.push(format!("Health {} ({} ago)", result, age));
    }
    parts.push("r:refresh c:check ?:help q:quit".to_string());

    let paragraph = Paragraph::new(format!(" {}", parts.join(" | ")))
        .style(Style::default().add_modifier(Modifier::DIM));
    frame.render_widget(paragraph, area);
}

/// Render the help overlay with keyboard shortcuts.
///
/// Displayed as a centered modal on top of the dashboard.
pub fn render_help(frame: &mut Frame, app: &App, area: Rect) {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let help_text = vec![
        Line::from(vec![Span::styled("Keyboard Shortcuts", app.theme.header)]),
        Line::from(""),
        Line::from(vec![Span::styled(" Connection", bold)]),
        Line::from("  r         Refresh feed connections"),
        Line::from("  c         Check backend health"),
        Line::from(""),
        Line::from(vec![Span::styled(" Readings", bold)]),
        Line::from("  OK        Below warning level"),
        Line::from("  WARN      Approaching threshold"),
        Line::from("  OVER      Above threshold"),
        Line::from("  dimmed    Stale (no recent update)"),
        Line::from("  *         O2-corrected locally"),
        Line::from(""),
        Line::from(vec![Span::styled(" General", bold)]),
        Line::from("  ?         Toggle help"),
        Line::from("  q         Quit"),
        Line::from(""),
        Line::from(vec![Span::styled(
            "Press any key to close",
            Style::default().add_modifier(Modifier::DIM),
        )]),
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.highlight));

    let paragraph = Paragraph::new(help_text).block(block);

    let help_width = 42u16.min(area.width.saturating_sub(4));
    let help_height = 20u16.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(help_width)) / 2;
    let y = area.y + (area.height.saturating_sub(help_height)) / 2;
    let help_area = Rect::new(x, y, help_width, help_height);

    frame.render_widget(Clear, help_area);
    frame.render_widget(paragraph, help_area);
}
