//! Attendance service
//!
//! Request-side orchestration: load the session, evaluate its window, close
//! it when expired, and rotate the token when registration is open. Classes
//! skip the stored window and get a token valid for the requested duration.

use chrono::DateTime;
use chrono_tz::Tz;
use std::sync::Arc;

use crate::db::repositories::SessionRepository;
use crate::models::Session;
use crate::services::clock::{to_local, Clock};
use crate::services::token::{QrSubject, TokenRotator};
use crate::services::window::{close_if_expired, WindowPolicy, WindowStatus};

/// Error types for attendance operations
#[derive(Debug, thiserror::Error)]
pub enum AttendanceError {
    /// Missing or malformed request parameter
    #[error("{0}")]
    InvalidParameter(String),

    #[error("Session '{0}' not found.")]
    SessionNotFound(String),

    #[error("The session has not started yet.")]
    NotStarted,

    #[error("The registration period is over.")]
    RegistrationClosed,

    /// The stored session lacks the fields its window needs
    #[error("Session '{0}' has no valid time window configured.")]
    MissingWindow(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub struct AttendanceService {
    sessions: Arc<dyn SessionRepository>,
    rotator: TokenRotator,
    clock: Arc<dyn Clock>,
    timezone: Tz,
    policy: WindowPolicy,
}

impl AttendanceService {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        rotator: TokenRotator,
        clock: Arc<dyn Clock>,
        timezone: Tz,
        policy: WindowPolicy,
    ) -> Self {
        Self {
            sessions,
            rotator,
            clock,
            timezone,
            policy,
        }
    }

    /// Current instant in the evaluation timezone
    pub fn local_now(&self) -> DateTime<Tz> {
        to_local(self.clock.now(), self.timezone)
    }

    /// Check that a session accepts registrations right now.
    ///
    /// Deactivates the session as a side effect once its window has closed.
    pub async fn check_session(&self, id: &str) -> Result<(Session, WindowStatus), AttendanceError> {
        let mut session = self
            .sessions
            .get_by_id(id)
            .await?
            .ok_or_else(|| AttendanceError::SessionNotFound(id.to_string()))?;

        let evaluation = close_if_expired(&mut session, self.local_now(), self.policy);
        if evaluation.deactivate {
            self.sessions.deactivate(&session.id).await?;
            tracing::info!(session_id = %session.id, "Session deactivated after its window closed");
        }

        if !session.active {
            return Err(AttendanceError::RegistrationClosed);
        }

        match evaluation.status {
            WindowStatus::MissingWindow => Err(AttendanceError::MissingWindow(session.id)),
            WindowStatus::NotStarted => Err(AttendanceError::NotStarted),
            WindowStatus::Closed => Err(AttendanceError::RegistrationClosed),
            status => Ok((session, status)),
        }
    }

    /// Validate the subject and issue a fresh token for it
    pub async fn issue_token(&self, subject: &QrSubject) -> Result<String, AttendanceError> {
        if let QrSubject::Session { id } = subject {
            let (_, status) = self.check_session(id).await?;
            tracing::debug!(session_id = %id, ?status, "Issuing token");
        }

        Ok(self.rotator.rotate(subject).await?)
    }
}
