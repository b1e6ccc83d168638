use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::Event,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cems_console::app::{Action, App};
use cems_console::stream::FeedKind;
use cems_console::ui::{self, Theme};
use cems_console::view::ThresholdTable;
use cems_console::{
    events, BackendClient, ConsoleConfig, FeedEvent, PresentationView, Session, SessionEvent,
    WsTransport,
};

/// Redraw interval while nothing else happens, so ages keep counting.
const RENDER_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Parser, Debug)]
#[command(name = "cems-console")]
#[command(about = "Operator console for live CEMS emissions readings")]
struct Args {
    /// Backend base URL (overrides the config file and CEMS_BACKEND_URL)
    #[arg(short, long)]
    backend: Option<String>,

    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write logs to this file (the terminal is taken by the UI)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(ref path) = args.log_file {
        init_logging(path)?;
    }

    let mut config = ConsoleConfig::load(args.config.as_deref())?;
    if let Some(backend) = args.backend {
        config.backend_url = backend.trim_end_matches('/').to_string();
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(config))
}

fn init_logging(path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create log file {}", path.display()))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cems_console=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .init();
    Ok(())
}

/// Wait for the backend, then run the console until the operator quits.
async fn run(config: ConsoleConfig) -> Result<()> {
    let client = BackendClient::builder()
        .base_url(config.backend_url.as_str())
        .build()?;

    println!("Waiting for CEMS backend at {}...", config.backend_url);
    client
        .wait_until_ready(config.startup_attempts, config.startup_interval)
        .await
        .context("CEMS backend did not become ready")?;

    let mut session = Session::new(&config, Arc::new(WsTransport::default()));

    let mut view = PresentationView::new(session.subscribe())
        .with_thresholds(ThresholdTable::with_warn_fraction(config.warn_fraction))
        .with_alarm_layout(config.alarm_layout)
        .with_freshness_budget(config.freshness_budget);
    match client.gas_config().await {
        Ok(gas_config) => view.set_gas_config(&gas_config, config.warn_fraction),
        Err(e) => warn!("Using fallback thresholds, gas config unavailable: {}", e),
    }

    if let Err(e) = session.restore_cache() {
        warn!("Ignoring last-known cache: {:#}", e);
    }
    session.start();
    info!("Console started against {}", config.backend_url);

    let theme = Theme::auto_detect();
    let mut app = App::new(view, config.backend_url.clone(), theme);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Setup panic hook to restore terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic);
    }));

    let result = run_app(&mut terminal, &mut app, &mut session, &client).await;

    session.shutdown();

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    session: &mut Session,
    client: &BackendClient,
) -> Result<()> {
    let mut input = events::spawn_input_thread();
    let (health_tx, mut health_rx) = mpsc::unbounded_channel();
    let mut render_tick = tokio::time::interval(RENDER_INTERVAL);
    render_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    while app.running {
        app.refresh(Instant::now());
        terminal.draw(|frame| ui::render(frame, app))?;

        tokio::select! {
            event = session.next() => {
                if let SessionEvent::Feed(FeedEvent::Message { endpoint, .. }) = &event {
                    if endpoint.kind() == FeedKind::Gas {
                        app.record_readings(session.state());
                    }
                }
            }
            Some(event) = input.recv() => {
                let Event::Key(key) = event else {
                    continue;
                };
                match events::handle_key_event(app, key) {
                    Some(Action::Refresh) => session.refresh(),
                    Some(Action::CheckHealth) => {
                        let client = client.clone();
                        let tx = health_tx.clone();
                        tokio::spawn(async move {
                            let result = client.health().await.map_err(|e| e.to_string());
                            let _ = tx.send(result);
                        });
                    }
                    None => {}
                }
            }
            Some(result) = health_rx.recv() => app.health_checked(result),
            _ = render_tick.tick() => {}
        }
    }

    Ok(())
}
