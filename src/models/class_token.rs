//! Class token model

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Token issued for a class whose window is computed from a request duration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassToken {
    pub class_id: String,
    pub token: String,
    pub duration_minutes: i64,
    pub expires_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl ClassToken {
    /// Build a token record valid for `duration_minutes` from `issued_at`
    pub fn issue(
        class_id: impl Into<String>,
        token: String,
        duration_minutes: i64,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            class_id: class_id.into(),
            token,
            duration_minutes,
            expires_at: issued_at + Duration::minutes(duration_minutes),
            last_updated: issued_at,
        }
    }
}
