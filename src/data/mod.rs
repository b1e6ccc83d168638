//! Decoding and aggregation of feed data.
//!
//! This module turns raw feed payloads into the canonical console state.
//!
//! ## Submodules
//!
//! - [`decoder`]: Payload decoding into [`DecodedRecord`]s
//! - [`aggregator`]: Status coalescing, debounce and the success banner
//! - [`state`]: The published [`AggregatedState`] snapshot
//! - [`cache`]: Last-known readings persisted between sessions
//! - [`history`]: Per-parameter reading history for sparklines
//! - [`duration`]: Parsing and formatting of duration strings (e.g., "10s", "500ms")
//!
//! ## Data Flow
//!
//! ```text
//! FeedEvent::Message (raw JSON)
//!        │
//!        ▼
//! decoder::decode()
//!        │
//!        ▼
//! Aggregator (values, bits, per-feed status, debounce)
//!        │
//!        └──▶ watch::Receiver<AggregatedState> (presentation)
//! ```

pub mod aggregator;
pub mod cache;
pub mod decoder;
pub mod duration;
pub mod history;
pub mod state;

pub use aggregator::{Aggregator, AggregatorSettings};
pub use cache::{LastKnown, ReadingCache};
pub use decoder::{decode, DecodedRecord, LinkHealth, Readings};
pub use history::History;
pub use state::{AggregatedState, ConnectionStatus, FeedSnapshot};
