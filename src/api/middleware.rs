//! API middleware
//!
//! Shared application state, the error type every handler returns, and the
//! cache header middleware applied to QR responses.

use axum::{
    extract::Request,
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tera::Tera;

use crate::services::attendance::{AttendanceError, AttendanceService};
use crate::services::qr::QrRenderer;

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub attendance: Arc<AttendanceService>,
    pub qr_renderer: Arc<QrRenderer>,
    pub pages: Arc<Tera>,
    /// Seconds between page reloads
    pub refresh_seconds: u64,
}

/// Error response for API errors
///
/// Rendered as a plain-text `Error: <message>` body.
#[derive(Debug)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        match self.code.as_str() {
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            format!("Error: {}", self.message),
        )
            .into_response()
    }
}

impl From<AttendanceError> for ApiError {
    fn from(err: AttendanceError) -> Self {
        match err {
            AttendanceError::InvalidParameter(_) | AttendanceError::MissingWindow(_) => {
                Self::validation_error(err.to_string())
            }
            AttendanceError::SessionNotFound(_) => Self::not_found(err.to_string()),
            AttendanceError::NotStarted | AttendanceError::RegistrationClosed => {
                Self::forbidden(err.to_string())
            }
            AttendanceError::Internal(e) => {
                tracing::error!("Attendance request failed: {:#}", e);
                Self::internal_error("Internal server error.")
            }
        }
    }
}

/// Middleware to keep browsers and proxies from caching rotated codes
pub async fn add_no_store_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}
