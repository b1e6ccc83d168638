use std::thread;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tokio::sync::mpsc;

use crate::app::{Action, App};

/// Poll for events with a timeout
pub fn poll_event(timeout: Duration) -> Result<Option<Event>> {
    if event::poll(timeout)? {
        Ok(Some(event::read()?))
    } else {
        Ok(None)
    }
}

/// Forward terminal events from a blocking thread into the async loop.
///
/// The thread exits once the receiver is dropped or the terminal errors.
pub fn spawn_input_thread() -> mpsc::UnboundedReceiver<Event> {
    let (tx, rx) = mpsc::unbounded_channel();
    thread::spawn(move || loop {
        match poll_event(Duration::from_millis(100)) {
            Ok(Some(event)) => {
                if tx.send(event).is_err() {
                    return;
                }
            }
            Ok(None) if tx.is_closed() => return,
            Ok(None) => {}
            Err(_) => return,
        }
    });
    rx
}

/// Handle a key event
pub fn handle_key_event(app: &mut App, key: KeyEvent) -> Option<Action> {
    if key.kind != KeyEventKind::Press {
        return None;
    }

    // If help is shown, any key closes it
    if app.show_help {
        app.show_help = false;
        return None;
    }

    match key.code {
        KeyCode::Char('q') => app.quit(),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => app.quit(),

        KeyCode::Char('r') => {
            app.refresh_started();
            return Some(Action::Refresh);
        }

        KeyCode::Char('c') => {
            if !app.health_check_running {
                app.health_check_running = true;
                app.set_status_message(format!("Checking {}...", app.backend_url));
                return Some(Action::CheckHealth);
            }
        }

        KeyCode::Char('?') => app.toggle_help(),

        _ => {}
    }
    None
}
