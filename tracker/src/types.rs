//! Payload and event types for Codepulse session tracking.
//!
//! This module defines the in-flight session record ([`SessionPayload`]), its
//! per-file metrics, and the transmission-ready snapshot
//! ([`FinalizedPayload`]) whose JSON form is the ingestion endpoint's record
//! shape.
//!
//! # Wire shape
//!
//! `FinalizedPayload` serializes field-for-field as the endpoint expects it.
//! Most fields are snake_case (`local_start`, `local_end`), but `pluginId`,
//! `linesAdded`, and `linesRemoved` are camelCase. The casing is fixed by the
//! endpoint's record schema and must not be "tidied up."

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::NowTimes;

/// Errors raised when an incoming editor event is malformed.
///
/// A malformed event is rejected on its own; the session payload it would
/// have been folded into is left untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    /// The event carries no file identifier.
    #[error("event is missing a file identifier")]
    MissingFile,

    /// A counter delta is negative.
    #[error("negative value for {field}: {value}")]
    NegativeCounter { field: &'static str, value: i64 },
}

/// Classification of an incoming editor event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Characters typed into the file.
    Typed,
    /// Characters deleted from the file.
    Deleted,
    /// Text pasted into the file.
    Pasted,
    /// The file was opened.
    Opened,
    /// The file was closed.
    Closed,
    /// The file came into focus. Touches the file's entry without counting
    /// as activity; an entry that only ever saw focus is pruned as dead at
    /// validation.
    Focused,
}

impl EventKind {
    /// Whether this kind counts toward the session keystroke counter.
    ///
    /// Add/delete/paste of text are keystroke-class; open/close are not.
    #[must_use]
    pub fn is_keystroke(self) -> bool {
        matches!(self, Self::Typed | Self::Deleted | Self::Pasted)
    }
}

/// A single editor event as delivered by the host.
///
/// Line deltas arrive signed so malformed (negative) input can be rejected
/// by [`EditorEvent::validate`] instead of silently wrapping or clamping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorEvent {
    /// Path of the file the event applies to.
    pub file: String,

    /// What happened.
    pub kind: EventKind,

    /// Lines added by this event, if any.
    #[serde(default)]
    pub lines_added: i64,

    /// Lines removed by this event, if any.
    #[serde(default)]
    pub lines_removed: i64,
}

impl EditorEvent {
    /// Checks the event for a usable file identifier and non-negative deltas.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::MissingFile`] when the file path is empty and
    /// [`EventError::NegativeCounter`] when a line delta is negative.
    pub fn validate(&self) -> Result<(), EventError> {
        if self.file.trim().is_empty() {
            return Err(EventError::MissingFile);
        }
        if self.lines_added < 0 {
            return Err(EventError::NegativeCounter {
                field: "lines_added",
                value: self.lines_added,
            });
        }
        if self.lines_removed < 0 {
            return Err(EventError::NegativeCounter {
                field: "lines_removed",
                value: self.lines_removed,
            });
        }
        Ok(())
    }
}

/// Identity of the project a session belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectIdentity {
    /// Absolute path of the project root, or the `"null"` sentinel when the
    /// editor had no real project context.
    pub directory: String,

    /// Human-readable project name, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Stable identifier, typically the remote URL or the directory itself.
    pub identifier: String,

    /// Opaque resource descriptor (e.g. source-control remote details).
    #[serde(default)]
    pub resource: serde_json::Value,
}

/// Per-file activity counters within one session.
///
/// `end` / `local_end` default to 0, meaning "unset"; they are stamped at
/// finalization for entries the host never closed explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetrics {
    pub add: u64,
    pub paste: u64,
    pub open: u64,
    pub close: u64,
    pub delete: u64,
    #[serde(rename = "linesAdded")]
    pub lines_added: u64,
    #[serde(rename = "linesRemoved")]
    pub lines_removed: u64,
    #[serde(default)]
    pub end: i64,
    #[serde(default)]
    pub local_end: i64,
}

impl FileMetrics {
    /// Whether any activity counter is positive.
    ///
    /// Entries where this is `false` are dead and are pruned by validation.
    #[must_use]
    pub fn has_activity(&self) -> bool {
        self.add > 0
            || self.paste > 0
            || self.open > 0
            || self.close > 0
            || self.delete > 0
            || self.lines_added > 0
            || self.lines_removed > 0
    }
}

/// Static host metadata captured when a session payload is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentInfo {
    /// Numeric plugin identifier assigned by the ingestion service.
    pub plugin_id: u32,

    /// Tracker version string.
    pub version: String,

    /// Host operating system.
    pub os: String,
}

impl EnvironmentInfo {
    /// Captures metadata for the running tracker build.
    #[must_use]
    pub fn detect(plugin_id: u32) -> Self {
        Self {
            plugin_id,
            version: env!("CARGO_PKG_VERSION").to_string(),
            os: std::env::consts::OS.to_string(),
        }
    }
}

/// The live, mutable aggregation record for one (project, session).
///
/// Created when the first event for a project is observed, mutated only by
/// the aggregator, and consumed exactly once by finalization. `keystrokes`
/// only ever increases while the payload is live.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionPayload {
    /// File path → per-file metrics.
    pub source: HashMap<String, FileMetrics>,

    /// Session-wide keystroke counter.
    pub keystrokes: u64,

    /// Session start, epoch seconds UTC. Immutable after creation.
    pub start: i64,

    /// Session start, local wall-clock seconds. Immutable after creation.
    pub local_start: i64,

    /// Session end, epoch seconds UTC. 0 until finalization stamps it.
    pub end: i64,

    /// Session end, local wall-clock seconds. 0 until finalization.
    pub local_end: i64,

    /// Project identity as observed; normalized at finalization.
    pub project: ProjectIdentity,

    /// Static metadata captured at construction.
    pub plugin_id: u32,
    pub version: String,
    pub os: String,
}

impl SessionPayload {
    /// Creates an empty payload for `project`, stamped with the given clock
    /// reading and host metadata.
    #[must_use]
    pub fn new(project: ProjectIdentity, now: NowTimes, env: &EnvironmentInfo) -> Self {
        Self {
            source: HashMap::new(),
            keystrokes: 0,
            start: now.utc,
            local_start: now.local,
            end: 0,
            local_end: 0,
            project,
            plugin_id: env.plugin_id,
            version: env.version.clone(),
            os: env.os.clone(),
        }
    }
}

/// A deep, immutable, transmission-ready snapshot of a session.
///
/// Built field-by-field by the finalizer; mutating the live payload after
/// finalization cannot affect an already-produced snapshot. This is also the
/// storage form used for offline queuing, one JSON record per line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizedPayload {
    pub source: HashMap<String, FileMetrics>,
    pub keystrokes: u64,
    pub start: i64,
    pub local_start: i64,
    pub end: i64,
    pub local_end: i64,
    pub timezone: String,
    pub project: Option<ProjectIdentity>,
    #[serde(rename = "pluginId")]
    pub plugin_id: u32,
    pub version: String,
    pub os: String,
}
