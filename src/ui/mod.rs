//! Terminal UI rendering using ratatui.
//!
//! ## Submodules
//!
//! - [`readings`]: Parameter table with limits, classification and trends,
//!   plus the O2-corrected values
//! - [`alarms`]: Alarm panel driven by the status feed
//! - [`common`]: Shared components (header, banner, status bar, help overlay)
//! - [`theme`]: Light/dark theme support with terminal auto-detection
//!
//! ## Layout
//!
//! [`render`] draws one frame:
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │ Header (common::render_header)       │
//! ├──────────────────────────────────────┤
//! │ Banner (common::render_banner)       │
//! ├──────────────────────────┬───────────┤
//! │                          │ Corrected │
//! │ Readings                 │           │
//! │ (readings::render)       ├───────────┤
//! │                          │ Alarms    │
//! ├──────────────────────────┴───────────┤
//! │ Status Bar (common::render_status)   │
//! └──────────────────────────────────────┘
//!         ↑
//!    Help overlay rendered on top
//! ```

pub mod alarms;
pub mod common;
pub mod readings;
pub mod theme;

pub use theme::Theme;

use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::Style,
    widgets::Paragraph,
    Frame,
};

use crate::app::App;

/// Minimum terminal size for usable display.
const MIN_WIDTH: u16 = 60;
const MIN_HEIGHT: u16 = 16;

/// Draw the whole console.
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
        let msg = format!(
            "Terminal too small: {}x{}\nMinimum: {}x{}\n\nResize to continue",
            area.width, area.height, MIN_WIDTH, MIN_HEIGHT
        );
        let paragraph = Paragraph::new(msg)
            .alignment(Alignment::Center)
            .style(Style::default().fg(app.theme.warning));
        let centered = Rect::new(0, (area.height / 2).saturating_sub(2), area.width, 5);
        frame.render_widget(paragraph, centered);
        return;
    }

    let chunks = Layout::vertical([
        Constraint::Length(1), // Header bar
        Constraint::Length(if app.dashboard.banner.is_some() { 1 } else { 0 }),
        Constraint::Min(10), // Content
        Constraint::Length(1), // Status bar
    ])
    .split(area);

    common::render_header(frame, app, chunks[0]);
    common::render_banner(frame, app, chunks[1]);

    let columns =
        Layout::horizontal([Constraint::Percentage(62), Constraint::Percentage(38)])
            .split(chunks[2]);
    readings::render(frame, app, columns[0]);

    let side = Layout::vertical([
        Constraint::Length(app.dashboard.corrected.len() as u16 + 3),
        Constraint::Min(app.dashboard.alarms.len() as u16 + 2),
    ])
    .split(columns[1]);
    readings::render_corrected(frame, app, side[0]);
    alarms::render(frame, app, side[1]);

    common::render_status_bar(frame, app, chunks[3]);

    if app.show_help {
        common::render_help(frame, app, area);
    }
}
