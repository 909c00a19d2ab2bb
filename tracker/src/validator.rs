//! Signal detection for aggregated session payloads.
//!
//! A payload is worth transmitting when it shows *signal*: a positive
//! session keystroke count, or any per-file entry with a positive activity
//! counter. Payloads without signal are discarded by the caller instead of
//! being finalized.

use tracing::debug;

use crate::types::SessionPayload;

/// Decides whether `payload` contains any transmittable signal.
///
/// If `payload.keystrokes > 0` this returns `true` immediately: keystroke
/// activity alone justifies sending, and the file entries are not scanned.
/// Otherwise every file entry is scanned, and **each all-zero entry is
/// deleted from `payload.source` during the scan**: dead-entry pruning
/// happens here and only here, even when the final answer is `false` (an
/// all-dead payload comes back empty). Callers rely on validated payloads
/// carrying no dead entries, so the mutation is part of this contract.
pub fn has_signal(payload: &mut SessionPayload) -> bool {
    if payload.keystrokes > 0 {
        return true;
    }

    let before = payload.source.len();
    let mut found = false;
    payload.source.retain(|_, metrics| {
        let alive = metrics.has_activity();
        found |= alive;
        alive
    });

    let pruned = before - payload.source.len();
    if pruned > 0 {
        debug!(pruned, "Pruned dead file entries during validation");
    }

    found
}
