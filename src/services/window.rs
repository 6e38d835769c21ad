//! Session window evaluation
//!
//! Decides where "now" falls relative to a session's attendance window.
//! Two tolerance formulas are in use and selected by [`WindowPolicy`]:
//!
//! - `registration_late`: registration runs from `start` to
//!   `start + tolerance`, late registration for another `2 * tolerance`.
//! - `end_tolerance`: registration stays open until `end + 2 * tolerance`,
//!   with no early/late distinction.
//!
//! The only state change the evaluator ever requests is `active = false`,
//! and only once the session is closed.

use chrono::{DateTime, Duration};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::models::Session;
use crate::services::clock::to_local;

/// Which tolerance formula closes a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowPolicy {
    /// Registration window then a late window twice as wide
    #[default]
    RegistrationLate,
    /// Single window ending at `end + 2 * tolerance`
    EndTolerance,
}

impl FromStr for WindowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "registration_late" => Ok(Self::RegistrationLate),
            "end_tolerance" => Ok(Self::EndTolerance),
            other => Err(format!("unknown window policy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowStatus {
    NotStarted,
    RegistrationOpen,
    LateOpen,
    Closed,
    /// The record lacks the fields the policy needs
    MissingWindow,
}

impl WindowStatus {
    /// Whether a token may be issued in this state
    pub fn accepts_registration(self) -> bool {
        matches!(self, Self::RegistrationOpen | Self::LateOpen)
    }
}

/// Outcome of evaluating a session at an instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub status: WindowStatus,
    /// The session is closed but still flagged active
    pub deactivate: bool,
}

/// Evaluate a session without touching it
pub fn evaluate(session: &Session, now: DateTime<Tz>, policy: WindowPolicy) -> Evaluation {
    let status = window_status(session, now, policy);
    Evaluation {
        status,
        deactivate: status == WindowStatus::Closed && session.active,
    }
}

/// Evaluate a session and clear its active flag once it is closed.
///
/// Shared by the request path and the periodic sweep. Callers persist the
/// change when the returned evaluation has `deactivate` set; a second call
/// on the same session never asks for it again.
pub fn close_if_expired(session: &mut Session, now: DateTime<Tz>, policy: WindowPolicy) -> Evaluation {
    let evaluation = evaluate(session, now, policy);
    if evaluation.deactivate {
        session.active = false;
    }
    evaluation
}

fn window_status(session: &Session, now: DateTime<Tz>, policy: WindowPolicy) -> WindowStatus {
    let tz = now.timezone();
    let Some(tolerance) = tolerance(session) else {
        return WindowStatus::MissingWindow;
    };

    match policy {
        WindowPolicy::RegistrationLate => {
            let (Some(start), Some(_)) = (session.start_time, session.end_time) else {
                return WindowStatus::MissingWindow;
            };
            let start = to_local(start, tz);
            if now < start {
                return WindowStatus::NotStarted;
            }

            let registration_end = start.checked_add_signed(tolerance);
            let late_end = registration_end
                .zip(tolerance.checked_mul(2))
                .and_then(|(end, late)| end.checked_add_signed(late));
            match (registration_end, late_end) {
                (Some(registration_end), _) if now <= registration_end => {
                    WindowStatus::RegistrationOpen
                }
                (Some(_), Some(late_end)) if now <= late_end => WindowStatus::LateOpen,
                (Some(_), Some(_)) => WindowStatus::Closed,
                _ => WindowStatus::MissingWindow,
            }
        }
        WindowPolicy::EndTolerance => {
            let Some(end) = session.end_time else {
                return WindowStatus::MissingWindow;
            };
            match tolerance
                .checked_mul(2)
                .and_then(|grace| to_local(end, tz).checked_add_signed(grace))
            {
                Some(total_allowed) if now > total_allowed => WindowStatus::Closed,
                Some(_) => WindowStatus::RegistrationOpen,
                None => WindowStatus::MissingWindow,
            }
        }
    }
}

/// Absent tolerance means no grace period; a negative one is unusable
fn tolerance(session: &Session) -> Option<Duration> {
    match session.tolerance_minutes {
        None => Some(Duration::zero()),
        Some(minutes) if minutes >= 0 => Duration::try_minutes(minutes),
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use chrono_tz::America::Lima;

    fn start() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 2, 13, 0, 0).unwrap()
    }

    fn session(tolerance: i64) -> Session {
        Session::new(
            "s1",
            Some(start()),
            Some(start() + Duration::hours(2)),
            Some(tolerance),
        )
    }

    fn at(minutes: i64) -> DateTime<Tz> {
        to_local(start() + Duration::minutes(minutes), Lima)
    }

    #[test]
    fn test_registration_late_scenario() {
        let s = session(5);
        let policy = WindowPolicy::RegistrationLate;

        assert_eq!(evaluate(&s, at(3), policy).status, WindowStatus::RegistrationOpen);
        assert_eq!(evaluate(&s, at(12), policy).status, WindowStatus::LateOpen);

        let closed = evaluate(&s, at(16), policy);
        assert_eq!(closed.status, WindowStatus::Closed);
        assert!(closed.deactivate);
    }

    #[test]
    fn test_window_boundaries_are_inclusive() {
        let s = session(5);
        let policy = WindowPolicy::RegistrationLate;

        assert_eq!(evaluate(&s, at(0), policy).status, WindowStatus::RegistrationOpen);
        assert_eq!(evaluate(&s, at(5), policy).status, WindowStatus::RegistrationOpen);
        assert_eq!(evaluate(&s, at(15), policy).status, WindowStatus::LateOpen);
        assert_eq!(
            evaluate(&s, at(15) + Duration::seconds(1), policy).status,
            WindowStatus::Closed
        );
    }

    #[test]
    fn test_not_started_requests_no_change() {
        let mut s = session(5);
        let evaluation = close_if_expired(&mut s, at(-1), WindowPolicy::RegistrationLate);

        assert_eq!(evaluation.status, WindowStatus::NotStarted);
        assert!(!evaluation.deactivate);
        assert!(s.active);
    }

    #[test]
    fn test_close_if_expired_is_idempotent() {
        let mut s = session(5);
        let policy = WindowPolicy::RegistrationLate;

        let first = close_if_expired(&mut s, at(16), policy);
        assert_eq!(first.status, WindowStatus::Closed);
        assert!(first.deactivate);
        assert!(!s.active);

        let second = close_if_expired(&mut s, at(16), policy);
        assert_eq!(second.status, WindowStatus::Closed);
        assert!(!second.deactivate);
        assert!(!s.active);
    }

    #[test]
    fn test_zero_tolerance_closes_right_after_start() {
        let s = session(0);
        let policy = WindowPolicy::RegistrationLate;

        assert_eq!(evaluate(&s, at(0), policy).status, WindowStatus::RegistrationOpen);
        assert_eq!(
            evaluate(&s, at(0) + Duration::seconds(1), policy).status,
            WindowStatus::Closed
        );
    }

    #[test]
    fn test_missing_window_fields() {
        let policy = WindowPolicy::RegistrationLate;

        let no_start = Session::new("a", None, Some(start()), Some(5));
        assert_eq!(evaluate(&no_start, at(0), policy).status, WindowStatus::MissingWindow);

        let no_end = Session::new("b", Some(start()), None, Some(5));
        assert_eq!(evaluate(&no_end, at(0), policy).status, WindowStatus::MissingWindow);

        let negative = session(-5);
        assert_eq!(evaluate(&negative, at(0), policy).status, WindowStatus::MissingWindow);
    }

    #[test]
    fn test_out_of_range_tolerance_is_missing_window() {
        let s = session(i64::MAX / 60_000);
        for policy in [WindowPolicy::RegistrationLate, WindowPolicy::EndTolerance] {
            assert_eq!(evaluate(&s, at(1), policy).status, WindowStatus::MissingWindow);
        }
    }

    #[test]
    fn test_missing_tolerance_counts_as_zero() {
        let s = Session::new("t", Some(start()), Some(start()), None);
        let policy = WindowPolicy::RegistrationLate;

        assert_eq!(evaluate(&s, at(0), policy).status, WindowStatus::RegistrationOpen);
        assert_eq!(evaluate(&s, at(1), policy).status, WindowStatus::Closed);
    }

    #[test]
    fn test_end_tolerance_policy() {
        // Ends at start + 2h, tolerance 5 → allowed until start + 2h10m
        let s = session(5);
        let policy = WindowPolicy::EndTolerance;

        assert_eq!(evaluate(&s, at(-30), policy).status, WindowStatus::RegistrationOpen);
        assert_eq!(evaluate(&s, at(130), policy).status, WindowStatus::RegistrationOpen);

        let closed = evaluate(&s, at(131), policy);
        assert_eq!(closed.status, WindowStatus::Closed);
        assert!(closed.deactivate);
    }

    #[test]
    fn test_end_tolerance_needs_only_end_time() {
        let s = Session::new("e", None, Some(start()), Some(1));
        let policy = WindowPolicy::EndTolerance;

        assert_eq!(evaluate(&s, at(2), policy).status, WindowStatus::RegistrationOpen);
        assert_eq!(evaluate(&s, at(3), policy).status, WindowStatus::Closed);

        let no_end = Session::new("f", Some(start()), None, Some(1));
        assert_eq!(evaluate(&no_end, at(0), policy).status, WindowStatus::MissingWindow);
    }

    #[test]
    fn test_inactive_session_is_not_flagged_again() {
        let mut s = session(5);
        s.active = false;

        let evaluation = evaluate(&s, at(3), WindowPolicy::RegistrationLate);
        assert_eq!(evaluation.status, WindowStatus::RegistrationOpen);
        assert!(!evaluation.deactivate);
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("registration_late".parse(), Ok(WindowPolicy::RegistrationLate));
        assert_eq!(" END_TOLERANCE ".parse(), Ok(WindowPolicy::EndTolerance));
        assert!("both".parse::<WindowPolicy>().is_err());
    }
}
