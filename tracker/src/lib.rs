//! Codepulse Tracker - local editor-activity telemetry aggregator.
//!
//! This crate accumulates fine-grained editor events (keystrokes, file
//! opens/closes, pastes, line additions/removals) into per-project session
//! payloads, decides when a session's data is worth transmitting, and hands
//! finished payloads to a dispatch path that either sends them immediately
//! or durably queues them for later delivery.
//!
//! # Pipeline
//!
//! ```text
//! editor events -> EventAggregator::record -> (session-close trigger)
//!     -> validator::has_signal -> finalizer::finalize
//!     -> DispatchRouter::send -> HttpBatchSender | FileOfflineStore
//! ```
//!
//! The session-close trigger (idle threshold, explicit flush, shutdown) is
//! owned by the embedding host (the daemon binary here, or an editor
//! integration), never by the core itself.
//!
//! # Modules
//!
//! - [`types`]: session payloads, per-file metrics, and the wire snapshot
//! - [`clock`]: timestamp and timezone source
//! - [`aggregator`]: per-project event aggregation
//! - [`validator`]: signal detection and dead-entry pruning
//! - [`finalizer`]: one-time stamping and project normalization
//! - [`dispatch`]: send-vs-queue routing over the transport/store seams
//! - [`sender`]: HTTP batch transport
//! - [`store`]: durable offline queue with all-or-nothing flush
//! - [`config`]: configuration from environment variables
//! - [`error`]: crate-level error aggregation

pub mod aggregator;
pub mod clock;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod finalizer;
pub mod sender;
pub mod store;
pub mod types;
pub mod validator;

pub use aggregator::{EventAggregator, RecordError};
pub use clock::{ClockError, ClockSource, NowTimes, SystemClock};
pub use config::{Config, ConfigError};
pub use dispatch::{BatchSender, Dispatch, DispatchError, DispatchRouter, OfflineStore};
pub use error::{Result, TrackerError};
pub use finalizer::{finalize, NULL_PROJECT_DIRECTORY};
pub use sender::{HttpBatchSender, TransportError};
pub use store::{FileOfflineStore, FlushError, StoreError};
pub use types::{
    EditorEvent, EnvironmentInfo, EventError, EventKind, FileMetrics, FinalizedPayload,
    ProjectIdentity, SessionPayload,
};
pub use validator::has_signal;
