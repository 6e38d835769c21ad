//! QR API endpoints
//!
//! - GET / - Auto-refreshing page embedding the QR image
//! - GET /generate_qr - Rotate the token and return it as a PNG
//! - GET /server_time - Current time in the attendance timezone

use axum::{
    extract::{Query, State},
    http::header,
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState};
use crate::services::attendance::AttendanceError;
use crate::services::token::QrSubject;

/// Template name of the QR page
pub const QR_PAGE: &str = "qr_page.html";

/// Default class window when `duration` is omitted
pub const DEFAULT_DURATION_MINUTES: i64 = 1;

/// Longest class window a request may ask for
pub const MAX_DURATION_MINUTES: i64 = 24 * 60;

/// Query parameters shared by the page and the image endpoint
#[derive(Debug, Default, Deserialize)]
pub struct QrQuery {
    pub session_id: Option<String>,
    pub class_id: Option<String>,
    /// Class window in minutes, kept raw so a malformed value maps to a 400
    pub duration: Option<String>,
}

impl QrQuery {
    /// Resolve the subject; `session_id` wins when both ids are present
    pub fn subject(&self) -> Result<QrSubject, AttendanceError> {
        if let Some(id) = non_empty(&self.session_id) {
            return Ok(QrSubject::Session { id: id.to_string() });
        }

        if let Some(id) = non_empty(&self.class_id) {
            let duration_minutes = match non_empty(&self.duration) {
                None => DEFAULT_DURATION_MINUTES,
                Some(raw) => parse_duration(raw)?,
            };
            return Ok(QrSubject::Class {
                id: id.to_string(),
                duration_minutes,
            });
        }

        Err(AttendanceError::InvalidParameter(
            "'session_id' cannot be empty.".to_string(),
        ))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_duration(raw: &str) -> Result<i64, AttendanceError> {
    match raw.parse::<i64>() {
        Ok(minutes) if (1..=MAX_DURATION_MINUTES).contains(&minutes) => Ok(minutes),
        _ => Err(AttendanceError::InvalidParameter(format!(
            "'duration' must be a whole number of minutes between 1 and {}.",
            MAX_DURATION_MINUTES
        ))),
    }
}

/// Query string the page uses to request the image
pub fn subject_query(subject: &QrSubject) -> String {
    match subject {
        QrSubject::Session { id } => format!("session_id={}", urlencoding::encode(id)),
        QrSubject::Class {
            id,
            duration_minutes,
        } => format!(
            "class_id={}&duration={}",
            urlencoding::encode(id),
            duration_minutes
        ),
    }
}

/// GET / - HTML page that reloads itself and the QR image
///
/// Only the parameters are checked here; the window is checked when the
/// image is requested.
pub async fn qr_page(
    State(state): State<AppState>,
    Query(query): Query<QrQuery>,
) -> Result<Html<String>, ApiError> {
    let subject = query.subject()?;

    let mut context = tera::Context::new();
    context.insert("refresh_seconds", &state.refresh_seconds);
    context.insert("qr_query", &subject_query(&subject));

    let html = state.pages.render(QR_PAGE, &context).map_err(|e| {
        tracing::error!("Failed to render '{}': {}", QR_PAGE, e);
        ApiError::internal_error("Internal server error.")
    })?;

    Ok(Html(html))
}

/// GET /generate_qr - Rotate the subject's token and return the QR image
pub async fn generate_qr(
    State(state): State<AppState>,
    Query(query): Query<QrQuery>,
) -> Result<Response, ApiError> {
    let subject = query.subject()?;
    let token = state.attendance.issue_token(&subject).await?;

    let renderer = state.qr_renderer.clone();
    let png = tokio::task::spawn_blocking(move || renderer.render_png(&token))
        .await
        .map_err(|e| {
            tracing::error!("QR render task failed: {}", e);
            ApiError::internal_error("Internal server error.")
        })?
        .map_err(|e| {
            tracing::error!("Failed to render QR code: {:#}", e);
            ApiError::internal_error("Internal server error.")
        })?;

    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}

/// GET /server_time - `YYYY-MM-DD HH:MM:SS` in the attendance timezone
pub async fn server_time(State(state): State<AppState>) -> String {
    state
        .attendance
        .local_now()
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}
