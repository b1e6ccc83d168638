//! Alarm panel rendering.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::app::App;

/// Render one line per alarm bit, active alarms highlighted.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let lines: Vec<Line> = app
        .dashboard
        .alarms
        .iter()
        .map(|alarm| {
            let (marker, style) = if alarm.active {
                (
                    "●",
                    Style::default().fg(app.theme.critical).add_modifier(Modifier::BOLD),
                )
            } else {
                ("○", Style::default().fg(app.theme.healthy))
            };
            let mut spans = vec![
                Span::styled(format!(" {} ", marker), style),
                Span::styled(alarm.label.clone(), style),
            ];
            if let Some(parameter) = alarm.linked {
                spans.push(Span::styled(
                    format!(" ({})", parameter.name()),
                    Style::default().add_modifier(Modifier::DIM),
                ));
            }
            Line::from(spans)
        })
        .collect();

    let active = app.dashboard.active_alarms().count();
    let border_color = if active > 0 {
        app.theme.critical
    } else {
        app.theme.border
    };

    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .title(format!(" Alarms ({} active) ", active))
            .borders(Borders::ALL)
            .border_type(app.theme.border_type)
            .border_style(Style::default().fg(border_color)),
    );

    frame.render_widget(paragraph, area);
}
