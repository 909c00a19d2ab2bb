//! One-time finalization of a session payload into a transmission snapshot.
//!
//! Finalization stamps the session and per-file end times, resolves the
//! IANA timezone, normalizes the project identity, and produces a
//! [`FinalizedPayload`] built field-by-field, a deep snapshot that is
//! independent of the live payload it was read from.

use std::collections::HashMap;

use tracing::debug;

use crate::clock::{ClockError, ClockSource};
use crate::types::{FinalizedPayload, ProjectIdentity, SessionPayload};

/// Sentinel directory value meaning "no real project context".
pub const NULL_PROJECT_DIRECTORY: &str = "null";

/// Converts a detached session payload into a transmission-ready snapshot.
///
/// Steps, in order:
///
/// 1. Stamp the session `end` / `local_end` from one clock reading, unless
///    the payload already carries an end stamp, which is preserved untouched
///    (idempotent on already-stamped fields).
/// 2. Stamp each file entry whose `end` is unset from a *fresh* clock
///    reading. Each unstamped file may therefore get a slightly later
///    timestamp than the session stamp and than other files; this
///    best-effort backstamping can leave `file.end` past the session `end`
///    and is intentionally not reconciled.
/// 3. Resolve and stamp the IANA timezone.
/// 4. Normalize the project identity: an absent/empty directory or the
///    literal `"null"` sentinel nulls the project out entirely.
///
/// The input payload is not mutated; a failed call leaves the session
/// exactly as it was so finalization can be retried on the next trigger.
///
/// # Errors
///
/// Returns [`ClockError`] when a timestamp reading or the timezone lookup
/// fails. End times are never silently stamped with zero.
pub fn finalize<C: ClockSource>(
    payload: &SessionPayload,
    clock: &C,
) -> Result<FinalizedPayload, ClockError> {
    let (end, local_end) = if payload.end != 0 {
        (payload.end, payload.local_end)
    } else {
        let now = clock.now()?;
        (now.utc, now.local)
    };

    let mut source = HashMap::with_capacity(payload.source.len());
    for (file, metrics) in &payload.source {
        let mut metrics = metrics.clone();
        if metrics.end == 0 {
            let now = clock.now()?;
            metrics.end = now.utc;
            metrics.local_end = now.local;
        }
        source.insert(file.clone(), metrics);
    }

    let timezone = clock.timezone()?;
    let project = normalize_project(&payload.project);

    debug!(
        project = ?project.as_ref().map(|p| p.directory.as_str()),
        end,
        files = source.len(),
        "Finalized session payload"
    );

    Ok(FinalizedPayload {
        source,
        keystrokes: payload.keystrokes,
        start: payload.start,
        local_start: payload.local_start,
        end,
        local_end,
        timezone,
        project,
        plugin_id: payload.plugin_id,
        version: payload.version.clone(),
        os: payload.os.clone(),
    })
}

/// Nulls out identities whose directory is absent or the `"null"` sentinel.
fn normalize_project(project: &ProjectIdentity) -> Option<ProjectIdentity> {
    let directory = project.directory.trim();
    if directory.is_empty() || directory == NULL_PROJECT_DIRECTORY {
        None
    } else {
        Some(project.clone())
    }
}
