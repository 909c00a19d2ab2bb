//! Event aggregation into per-project session payloads.
//!
//! The [`EventAggregator`] owns one in-flight [`SessionPayload`] per tracked
//! project, keyed by project directory. Recording an event folds its metric
//! deltas into the payload's per-file entry and bumps the session keystroke
//! counter for keystroke-class events. No network or disk I/O happens here.
//!
//! # Lifecycle
//!
//! A payload is created lazily on the first event observed for a project and
//! accumulates until the session-close trigger calls [`EventAggregator::take`].
//! `take` detaches the payload from the live slot before any suspending
//! finalize/dispatch step begins, so an event arriving mid-finalization
//! starts a fresh session instead of mutating a payload in flight.
//!
//! # Concurrency
//!
//! Designed for a single-writer host event loop; the aggregator holds no
//! locks and must not be shared across writers.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, trace};

use crate::clock::{ClockError, ClockSource};
use crate::types::{
    EditorEvent, EnvironmentInfo, EventError, EventKind, ProjectIdentity, SessionPayload,
};

/// Errors that can occur while recording an event.
///
/// Either way the failing event is rejected on its own: no session payload
/// is created or mutated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// The event itself is malformed.
    #[error("malformed event: {0}")]
    Event(#[from] EventError),

    /// The clock failed while stamping a new session's start times.
    #[error("clock error: {0}")]
    Clock(#[from] ClockError),
}

/// Accumulates editor events into per-project session payloads.
#[derive(Debug)]
pub struct EventAggregator<C> {
    clock: C,
    env: EnvironmentInfo,
    sessions: HashMap<String, SessionPayload>,
}

impl<C: ClockSource> EventAggregator<C> {
    /// Creates an aggregator with no in-flight sessions.
    #[must_use]
    pub fn new(clock: C, env: EnvironmentInfo) -> Self {
        Self {
            clock,
            env,
            sessions: HashMap::new(),
        }
    }

    /// Records one editor event against its project's live session.
    ///
    /// The event is validated before anything is touched; a malformed event
    /// is rejected without corrupting the session. On the first event for a
    /// project, a payload is created with start times from the clock and the
    /// host metadata captured at construction.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::Event`] for a malformed event and
    /// [`RecordError::Clock`] when a new session's start stamp cannot be
    /// read. In both cases only this event is lost.
    pub fn record(
        &mut self,
        project: &ProjectIdentity,
        event: &EditorEvent,
    ) -> Result<(), RecordError> {
        event.validate()?;

        let payload = match self.sessions.entry(project.directory.clone()) {
            Entry::Occupied(occupied) => occupied.into_mut(),
            Entry::Vacant(vacant) => {
                let now = self.clock.now()?;
                debug!(
                    project = %project.directory,
                    start = now.utc,
                    "Starting session payload"
                );
                vacant.insert(SessionPayload::new(project.clone(), now, &self.env))
            }
        };

        let metrics = payload.source.entry(event.file.clone()).or_default();
        match event.kind {
            EventKind::Typed => metrics.add += 1,
            EventKind::Deleted => metrics.delete += 1,
            EventKind::Pasted => metrics.paste += 1,
            EventKind::Opened => metrics.open += 1,
            EventKind::Closed => metrics.close += 1,
            // Focus only touches the entry; the zeroed entry created above
            // is pruned at validation if nothing else ever counts.
            EventKind::Focused => {}
        }
        // Deltas are validated non-negative above.
        metrics.lines_added += event.lines_added as u64;
        metrics.lines_removed += event.lines_removed as u64;

        if event.kind.is_keystroke() {
            payload.keystrokes += 1;
        }

        trace!(
            project = %project.directory,
            file = %event.file,
            kind = ?event.kind,
            keystrokes = payload.keystrokes,
            "Recorded event"
        );

        Ok(())
    }

    /// Detaches and returns the live payload for `directory`, if any.
    ///
    /// After this call the project has no live session; its next event
    /// creates a fresh payload. Call this before validating/finalizing so
    /// the detached payload can never race new events.
    pub fn take(&mut self, directory: &str) -> Option<SessionPayload> {
        self.sessions.remove(directory)
    }

    /// Detaches every live payload, e.g. for a shutdown flush-all.
    pub fn take_all(&mut self) -> Vec<SessionPayload> {
        self.sessions.drain().map(|(_, payload)| payload).collect()
    }

    /// Puts a detached payload back into its project's live slot.
    ///
    /// Used when finalization fails (e.g. the clock was unavailable) so the
    /// session keeps aggregating and can be retried on the next trigger.
    /// Callers must restore before recording further events for the project;
    /// a payload already in the slot is replaced.
    pub fn restore(&mut self, payload: SessionPayload) {
        self.sessions
            .insert(payload.project.directory.clone(), payload);
    }

    /// Borrows the live payload for `directory`, if any.
    #[must_use]
    pub fn session(&self, directory: &str) -> Option<&SessionPayload> {
        self.sessions.get(directory)
    }

    /// Number of projects with a live session.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
