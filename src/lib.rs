//! # cems-console
//!
//! Operator console for a Continuous Emissions Monitoring System.
//!
//! The console keeps live WebSocket feeds to the CEMS backend open, decodes
//! the gas and status messages into typed records, folds them into one
//! aggregated state with a debounced connection status, and presents that
//! state as classified readings, alarms and a connection banner in a terminal
//! UI.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            session                               │
//! │  ┌──────────┐  FeedEvent  ┌────────────┐  watch  ┌────────────┐  │
//! │  │  stream  │────────────▶│    data    │────────▶│    view    │  │
//! │  │ (manager)│             │(aggregator)│         │(dashboard) │  │
//! │  └────┬─────┘             └─────┬──────┘         └─────┬──────┘  │
//! │       │                         │                      │         │
//! │       ▼                         ▼                      ▼         │
//! │  per-connection tasks     last-known cache        app + ui       │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`stream`]**: Connection registry with idempotent connect, connect
//!   timeout, serialized reconnects and a manual-disconnect cool-down
//! - **[`data`]**: Feed decoding, the aggregated state with debounced
//!   status, the last-known cache and reading history
//! - **[`view`]**: Breach classification, freshness, banner and alarm panel
//! - **[`session`]**: Drives the manager and aggregator from one loop
//! - **[`backend`]**: HTTP client for `/health` and `/config/gas`
//! - **[`app`]**, **[`ui`]**, **[`events`]**: The terminal console
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! cems-console --backend http://10.0.0.5:8000 --log-file console.log
//! ```
//!
//! ### As a library
//!
//! ```no_run
//! use std::sync::Arc;
//! use cems_console::{ConsoleConfig, PresentationView, Session, WsTransport};
//!
//! # tokio_test::block_on(async {
//! let config = ConsoleConfig::default();
//! let mut session = Session::new(&config, Arc::new(WsTransport::default()));
//! let mut view = PresentationView::new(session.subscribe())
//!     .with_freshness_budget(config.freshness_budget);
//! session.start();
//!
//! loop {
//!     session.next().await;
//!     if view.has_changed() {
//!         let dashboard = view.snapshot(tokio::time::Instant::now());
//!         println!("{:?}", dashboard.status);
//!     }
//! }
//! # });
//! ```

pub mod app;
pub mod backend;
pub mod config;
pub mod data;
pub mod error;
pub mod events;
pub mod schedule;
pub mod session;
pub mod stream;
pub mod ui;
pub mod view;

// Re-export main types for convenience
pub use app::App;
pub use backend::BackendClient;
pub use config::ConsoleConfig;
pub use data::{AggregatedState, Aggregator, ConnectionStatus, DecodedRecord};
pub use error::{BackendError, StreamError};
pub use session::{Session, SessionEvent};
pub use stream::{FeedEndpoint, FeedEvent, StreamManager, StreamSettings, Transport, WsTransport};
pub use view::{BreachLevel, Dashboard, PresentationView};
