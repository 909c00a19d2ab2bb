//! Durable offline queue for finalized payloads.
//!
//! [`FileOfflineStore`] persists payloads that could not (or should not) be
//! sent immediately: one JSON record per line, appended to a local file that
//! survives process restart. A separate flush step drains the queue with an
//! exclusive read-then-truncate hand-off: the file is truncated only after
//! the ingestion endpoint acknowledged the whole batch, so a teardown
//! mid-flush leaves every unsent payload durable and never re-queues sent
//! ones (all-or-nothing per batch).
//!
//! Appends and flushes must be driven by a single queue owner; the store
//! takes no file locks.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::dispatch::{BatchSender, OfflineStore};
use crate::sender::TransportError;
use crate::types::FinalizedPayload;

/// Errors that can occur while reading or writing the queue file.
#[derive(Error, Debug)]
pub enum StoreError {
    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A payload could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur while flushing the queue.
#[derive(Error, Debug)]
pub enum FlushError {
    /// The queue file could not be read or truncated.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The batch was rejected or never reached the endpoint; the queue file
    /// is left untouched.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Append-only JSON-lines queue file.
#[derive(Debug, Clone)]
pub struct FileOfflineStore {
    path: PathBuf,
}

impl FileOfflineStore {
    /// Creates a store over the given queue file path.
    ///
    /// The file and its parent directories are created lazily on first
    /// append.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Path of the underlying queue file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every queued payload, in append order.
    ///
    /// A missing file means an empty queue. Lines that fail to parse are
    /// skipped with a warning rather than failing the whole read; a torn
    /// write must not wedge the queue forever.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file exists but cannot be read.
    pub fn load(&self) -> Result<Vec<FinalizedPayload>, StoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StoreError::Io(err)),
        };

        let mut payloads = Vec::new();
        for (index, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<FinalizedPayload>(line) {
                Ok(payload) => payloads.push(payload),
                Err(err) => {
                    warn!(line = index + 1, error = %err, "Skipping corrupt queue record");
                }
            }
        }
        Ok(payloads)
    }

    /// Sends every queued payload as one batch, truncating the file only
    /// after the endpoint acknowledged it.
    ///
    /// Returns the number of payloads delivered (0 for an empty queue,
    /// without touching the network).
    ///
    /// # Errors
    ///
    /// Returns [`FlushError::Transport`] when the batch was not
    /// acknowledged; the queue file is byte-for-byte untouched so the next
    /// flush retries the same records.
    pub async fn flush<S: BatchSender>(&self, sender: &S) -> Result<usize, FlushError> {
        let payloads = self.load()?;
        if payloads.is_empty() {
            debug!("Offline queue empty, nothing to flush");
            return Ok(0);
        }

        sender.send(&payloads).await?;

        fs::write(&self.path, "").map_err(StoreError::Io)?;
        info!(payloads = payloads.len(), "Flushed offline queue");
        Ok(payloads.len())
    }
}

impl OfflineStore for FileOfflineStore {
    fn append(&self, payload: &FinalizedPayload) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let record = serde_json::to_string(payload)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{record}")?;

        debug!(path = %self.path.display(), "Appended payload to offline queue");
        Ok(())
    }
}
