//! Error types for the Codepulse tracker.
//!
//! Each module defines its own focused error enum; this module aggregates
//! them into [`TrackerError`] so library callers can hold one error type
//! across the record → validate → finalize → dispatch pipeline.

use thiserror::Error;

use crate::aggregator::RecordError;
use crate::clock::ClockError;
use crate::config::ConfigError;
use crate::dispatch::DispatchError;
use crate::sender::TransportError;
use crate::store::{FlushError, StoreError};
use crate::types::EventError;

/// Errors that can occur during tracker operations.
#[derive(Error, Debug)]
pub enum TrackerError {
    /// Configuration-related error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An incoming editor event was malformed.
    #[error("event error: {0}")]
    Event(#[from] EventError),

    /// Recording an event failed (malformed event or clock failure at
    /// session start).
    #[error("record error: {0}")]
    Record(#[from] RecordError),

    /// The clock or timezone source failed.
    #[error("clock error: {0}")]
    Clock(#[from] ClockError),

    /// A finalized payload could not be routed.
    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// A batch could not be delivered to the ingestion endpoint.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The offline queue file could not be read or written.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// An offline queue flush failed.
    #[error("flush error: {0}")]
    Flush(#[from] FlushError),

    /// JSON parsing or serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized `Result` type for tracker operations.
pub type Result<T> = std::result::Result<T, TrackerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_converts() {
        let err: TrackerError = ConfigError::MissingEnvVar("CODEPULSE_API_URL".to_string()).into();
        assert!(matches!(err, TrackerError::Config(_)));
        assert_eq!(
            err.to_string(),
            "configuration error: missing required environment variable: CODEPULSE_API_URL"
        );
    }

    #[test]
    fn event_error_converts() {
        let err: TrackerError = EventError::MissingFile.into();
        assert!(matches!(err, TrackerError::Event(_)));
        assert_eq!(
            err.to_string(),
            "event error: event is missing a file identifier"
        );
    }

    #[test]
    fn clock_error_converts() {
        let err: TrackerError = ClockError::Unavailable("down".to_string()).into();
        assert!(matches!(err, TrackerError::Clock(_)));
    }

    #[test]
    fn io_error_preserves_source_chain() {
        use std::error::Error;

        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: TrackerError = io_err.into();
        assert!(matches!(err, TrackerError::Io(_)));
        assert!(err.source().is_some());
    }

    #[test]
    fn json_error_converts() {
        let json_err = serde_json::from_str::<serde_json::Value>("{ bad").unwrap_err();
        let err: TrackerError = json_err.into();
        assert!(matches!(err, TrackerError::Json(_)));
        assert!(err.to_string().contains("JSON error"));
    }

    #[test]
    fn result_type_alias_works() {
        fn ok_fn() -> Result<u32> {
            Ok(7)
        }

        fn err_fn() -> Result<u32> {
            Err(TrackerError::Clock(ClockError::Unavailable(
                "test".to_string(),
            )))
        }

        assert!(ok_fn().is_ok());
        assert!(err_fn().is_err());
    }
}
