//! Timestamp normalization.
//!
//! Tokenizers report datagram times at whatever resolution the instrument wrote
//! (100ns for EK80 raw files). Everything accumulated by the demultiplexer is
//! stamped with a [Timestamp] at millisecond resolution instead.
use std::fmt::Display;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// UTC time with millisecond resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Create from milliseconds since the Unix epoch.
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Normalize `dt`, truncating anything finer than a millisecond toward the past.
    #[must_use]
    pub fn normalize(dt: &DateTime<Utc>) -> Self {
        Self(dt.timestamp_millis())
    }

    /// Milliseconds since the Unix epoch.
    #[must_use]
    pub const fn millis(&self) -> i64 {
        self.0
    }

    /// Returns `None` if the value is outside the range chrono can represent.
    #[must_use]
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.0).single()
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::normalize(&dt)
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.datetime() {
            Some(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.3fZ")),
            None => write!(f, "{}ms", self.0),
        }
    }
}
