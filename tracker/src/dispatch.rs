//! Routing of finalized payloads to the network or the offline queue.
//!
//! The [`DispatchRouter`] is the single exit point for finalized session
//! payloads: every payload handed to [`DispatchRouter::send`] ends up either
//! sent (a single-element batch through the [`BatchSender`]) or queued (one
//! [`OfflineStore`] append). Exactly one of the two happens, never both,
//! never neither, and nothing is silently dropped.
//!
//! The router performs no retries. A transport or persistence failure is
//! surfaced with the payload handed back, so the caller can decide policy
//! (typically queuing a payload whose immediate send failed).

use tracing::{debug, info};

use crate::sender::TransportError;
use crate::store::StoreError;
use crate::types::FinalizedPayload;

/// Network transport for batches of finalized payloads.
///
/// Implementations post the batch to the ingestion endpoint and surface the
/// failure kind to the caller; retry policy belongs to the orchestrating
/// scheduler, not the transport.
pub trait BatchSender {
    /// Delivers `batch` to the ingestion endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] describing the failure; the batch is not
    /// partially applied.
    fn send(
        &self,
        batch: &[FinalizedPayload],
    ) -> impl std::future::Future<Output = Result<(), TransportError>> + Send;
}

/// Durable, append-only persistence for payloads awaiting a later flush.
pub trait OfflineStore {
    /// Appends one finalized payload to the durable queue.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the append fails; the payload was not
    /// persisted and is lost for this attempt unless the caller retries.
    fn append(&self, payload: &FinalizedPayload) -> Result<(), StoreError>;
}

/// How a payload left the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Delivered to the ingestion endpoint now.
    Sent,
    /// Appended to the offline queue for a later batched flush.
    Queued,
}

/// Errors from a dispatch attempt.
///
/// Both variants hand the payload back so the caller can re-route it (e.g.
/// queue a payload whose immediate send failed) without having cloned it up
/// front.
#[derive(thiserror::Error, Debug)]
pub enum DispatchError {
    /// The immediate send failed.
    #[error("transport failure: {source}")]
    Transport {
        payload: Box<FinalizedPayload>,
        #[source]
        source: TransportError,
    },

    /// The offline append failed.
    #[error("persistence failure: {source}")]
    Store {
        payload: Box<FinalizedPayload>,
        #[source]
        source: StoreError,
    },
}

/// Routes finalized payloads to the sender or the offline queue.
#[derive(Debug)]
pub struct DispatchRouter<S, Q> {
    sender: S,
    store: Q,
}

impl<S: BatchSender, Q: OfflineStore> DispatchRouter<S, Q> {
    /// Creates a router over the given transport and queue.
    #[must_use]
    pub fn new(sender: S, store: Q) -> Self {
        Self { sender, store }
    }

    /// Dispatches one finalized payload.
    ///
    /// With `immediate` set, the payload goes to the [`BatchSender`] as a
    /// single-element batch right now; otherwise it is appended to the
    /// [`OfflineStore`] for a later batched flush.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] carrying the payload back; nothing was
    /// delivered or persisted in that case.
    pub async fn send(
        &self,
        payload: FinalizedPayload,
        immediate: bool,
    ) -> Result<Dispatch, DispatchError> {
        if immediate {
            match self.sender.send(std::slice::from_ref(&payload)).await {
                Ok(()) => {
                    info!(keystrokes = payload.keystrokes, "Sent session payload");
                    Ok(Dispatch::Sent)
                }
                Err(source) => Err(DispatchError::Transport {
                    payload: Box::new(payload),
                    source,
                }),
            }
        } else {
            match self.store.append(&payload) {
                Ok(()) => {
                    debug!(keystrokes = payload.keystrokes, "Queued session payload");
                    Ok(Dispatch::Queued)
                }
                Err(source) => Err(DispatchError::Store {
                    payload: Box::new(payload),
                    source,
                }),
            }
        }
    }

    /// Borrows the underlying transport.
    #[must_use]
    pub fn sender(&self) -> &S {
        &self.sender
    }

    /// Borrows the underlying offline queue.
    #[must_use]
    pub fn store(&self) -> &Q {
        &self.store
    }
}
