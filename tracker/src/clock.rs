//! Clock and timezone source for session timestamps.
//!
//! All timestamps in a session payload are epoch seconds. Each reading pairs
//! the UTC value with a local wall-clock value (UTC plus the current zone
//! offset), which is what the ingestion endpoint expects in the
//! `local_start` / `local_end` fields.
//!
//! The [`ClockSource`] trait is the seam that lets the finalizer be driven
//! by a deterministic clock in tests; [`SystemClock`] is the production
//! implementation.

use chrono::{Local, Offset, Utc};
use thiserror::Error;

/// Errors from the clock or timezone source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClockError {
    /// The timestamp source failed.
    #[error("timestamp source unavailable: {0}")]
    Unavailable(String),

    /// The IANA timezone name could not be resolved.
    #[error("failed to resolve timezone: {0}")]
    Timezone(String),
}

/// One paired clock reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NowTimes {
    /// Epoch seconds, UTC.
    pub utc: i64,

    /// Local wall-clock seconds: UTC plus the current zone offset.
    pub local: i64,
}

/// Supplies timestamps and the resolved IANA timezone name.
pub trait ClockSource {
    /// Returns the current UTC and local-wall-clock epoch seconds.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::Unavailable`] if the timestamp source fails.
    /// Callers must treat this as "no timestamp" rather than stamping zero.
    fn now(&self) -> Result<NowTimes, ClockError>;

    /// Returns the environment's configured IANA timezone name.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::Timezone`] if the zone cannot be resolved.
    fn timezone(&self) -> Result<String, ClockError>;
}

/// Production clock backed by the system time and zone database.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn now(&self) -> Result<NowTimes, ClockError> {
        let utc = Utc::now().timestamp();
        let offset = i64::from(Local::now().offset().fix().local_minus_utc());
        Ok(NowTimes {
            utc,
            local: utc + offset,
        })
    }

    fn timezone(&self) -> Result<String, ClockError> {
        iana_time_zone::get_timezone().map_err(|e| ClockError::Timezone(e.to_string()))
    }
}
