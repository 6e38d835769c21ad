//! Attendance session model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Attendance window keyed by an opaque identifier.
///
/// Window fields are optional because records are created elsewhere and may be
/// incomplete; the evaluator reports such records as a configuration error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque unique identifier
    pub id: String,
    /// Start of the registration window (UTC)
    pub start_time: Option<DateTime<Utc>>,
    /// Nominal end of the session (UTC)
    pub end_time: Option<DateTime<Utc>>,
    /// Grace period width in minutes
    pub tolerance_minutes: Option<i64>,
    /// Cleared once the session is past its late window, never set again
    pub active: bool,
    /// Last issued registration token
    pub dynamic_qr_code: Option<String>,
    /// When the token was last rotated
    pub last_updated: Option<DateTime<Utc>>,
}

impl Session {
    /// Create an active session without a token
    pub fn new(
        id: impl Into<String>,
        start_time: Option<DateTime<Utc>>,
        end_time: Option<DateTime<Utc>>,
        tolerance_minutes: Option<i64>,
    ) -> Self {
        Self {
            id: id.into(),
            start_time,
            end_time,
            tolerance_minutes,
            active: true,
            dynamic_qr_code: None,
            last_updated: None,
        }
    }
}
