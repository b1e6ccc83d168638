//! Readings view rendering.
//!
//! Displays one row per visible parameter with its value, limit,
//! classification and a sparkline trend, followed by the O2-corrected values.

use ratatui::{
    layout::{Constraint, Rect},
    style::Style,
    widgets::{Block, Borders, Cell, Row, Table},
    Frame,
};

use crate::app::App;
use crate::view::{Freshness, ParameterCard};

/// Sparkline characters (8 levels of height).
const SPARKLINE_CHARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Number of samples shown in the trend column.
const SPARKLINE_WIDTH: usize = 12;

/// Render the parameter table.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let header = Row::new(vec!["Parameter", "Value", "Unit", "Limit", "Trend", "Status"])
        .height(1)
        .style(app.theme.header);

    let rows: Vec<Row> = app
        .dashboard
        .cards
        .iter()
        .map(|card| {
            let level_style = app.theme.level_style(card.level);
            let value_style = app.theme.freshness_style(card.freshness, level_style);
            let limit = app
                .view()
                .thresholds()
                .rule(card.parameter)
                .threshold
                .map(format_value)
                .unwrap_or_else(|| "-".to_string());
            let name_style = if card.alarm_active {
                Style::default().fg(app.theme.critical)
            } else {
                Style::default()
            };

            Row::new(vec![
                Cell::from(card_label(card)).style(name_style),
                Cell::from(card.value.map(format_value).unwrap_or_else(|| "--".to_string()))
                    .style(value_style),
                Cell::from(card.parameter.unit()),
                Cell::from(limit),
                Cell::from(render_sparkline(&app.history.sparkline(card.parameter))),
                Cell::from(status_text(card)).style(value_style),
            ])
        })
        .collect();

    let widths = [
        Constraint::Fill(2),
        Constraint::Fill(1),
        Constraint::Min(5),
        Constraint::Fill(1),
        Constraint::Min(SPARKLINE_WIDTH as u16),
        Constraint::Min(8),
    ];

    let table = Table::new(rows, widths).header(header).block(
        Block::default()
            .title(" Readings ")
            .borders(Borders::ALL)
            .border_type(app.theme.border_type)
            .border_style(Style::default().fg(app.theme.border)),
    );

    frame.render_widget(table, area);
}

/// Render the O2-corrected values.
pub fn render_corrected(frame: &mut Frame, app: &App, area: Rect) {
    let header = Row::new(vec!["Parameter", "Corrected", "Unit", "Status"])
        .height(1)
        .style(app.theme.header);

    let rows: Vec<Row> = app
        .dashboard
        .corrected
        .iter()
        .map(|card| {
            let style = app.theme.level_style(card.level);
            let value = match card.value {
                Some(v) if card.derived => format!("{}*", format_value(v)),
                Some(v) => format_value(v),
                None => "--".to_string(),
            };
            Row::new(vec![
                Cell::from(card.parameter.name()),
                Cell::from(value).style(style),
                Cell::from(card.parameter.unit()),
                Cell::from(card.level.map(|l| l.symbol()).unwrap_or("-")).style(style),
            ])
        })
        .collect();

    let widths = [
        Constraint::Fill(2),
        Constraint::Fill(1),
        Constraint::Min(5),
        Constraint::Min(6),
    ];

    let table = Table::new(rows, widths).header(header).block(
        Block::default()
            .title(" Corrected @ 7% O2 ")
            .borders(Borders::ALL)
            .border_type(app.theme.border_type)
            .border_style(Style::default().fg(app.theme.border)),
    );

    frame.render_widget(table, area);
}

fn card_label(card: &ParameterCard) -> String {
    if card.alarm_active {
        format!("{} !", card.parameter.name())
    } else {
        card.parameter.name().to_string()
    }
}

fn status_text(card: &ParameterCard) -> String {
    match (card.freshness, card.level) {
        (Freshness::NoData, _) | (_, None) => "NO DATA".to_string(),
        (Freshness::Stale, Some(level)) => format!("{} (stale)", level.symbol()),
        (Freshness::Fresh, Some(level)) => level.symbol().to_string(),
    }
}

/// Format a reading with precision suited to its magnitude.
fn format_value(v: f64) -> String {
    if v.abs() >= 10_000.0 {
        format!("{:.0}", v)
    } else if v.abs() >= 100.0 {
        format!("{:.1}", v)
    } else {
        format!("{:.2}", v)
    }
}

fn render_sparkline(data: &[u8]) -> String {
    if data.is_empty() {
        return " ".repeat(SPARKLINE_WIDTH);
    }

    let skip = data.len().saturating_sub(SPARKLINE_WIDTH);
    data[skip..]
        .iter()
        .map(|&v| SPARKLINE_CHARS[v.min(7) as usize])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::BreachLevel;
    use cems_types::Parameter;

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(7.0), "7.00");
        assert_eq!(format_value(210.0), "210.0");
        assert_eq!(format_value(101325.0), "101325");
    }

    #[test]
    fn test_sparkline_keeps_latest_samples() {
        assert_eq!(render_sparkline(&[]).chars().count(), SPARKLINE_WIDTH);
        let data: Vec<u8> = (0..20).map(|i| (i % 8) as u8).collect();
        let line = render_sparkline(&data);
        assert_eq!(line.chars().count(), SPARKLINE_WIDTH);
        assert!(line.ends_with('▄'));
    }

    #[test]
    fn test_status_text() {
        let mut card = ParameterCard {
            parameter: Parameter::So2,
            value: Some(210.0),
            level: Some(BreachLevel::Breach),
            freshness: Freshness::Stale,
            alarm_active: true,
        };
        assert_eq!(status_text(&card), "OVER (stale)");
        assert_eq!(card_label(&card), "SO2 !");

        card.freshness = Freshness::Fresh;
        assert_eq!(status_text(&card), "OVER");

        card.value = None;
        card.level = None;
        assert_eq!(status_text(&card), "NO DATA");
    }
}
