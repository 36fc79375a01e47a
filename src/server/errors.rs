use std::fmt;

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::{domain::enrollment::EnrollmentError, session::SessionError};

mod codes {
    pub const MALFORMED_INPUT: &str = "MALFORMED_INPUT";
    pub const SESSION_UNKNOWN: &str = "SESSION_UNKNOWN";
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const ATTRIBUTES_UNAVAILABLE: &str = "ATTRIBUTES_UNAVAILABLE";
    pub const PROTOCOL_FORMAT: &str = "PROTOCOL_FORMAT";
    pub const UPSTREAM_ERROR: &str = "UPSTREAM_ERROR";
    pub const UPSTREAM_TIMEOUT: &str = "UPSTREAM_TIMEOUT";
    pub const TOO_MANY_SESSIONS: &str = "TOO_MANY_SESSIONS";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// Errors as reported to clients.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed input: {0}")]
    InputInvalid(String),
    #[error("The session is unknown or has expired")]
    SessionUnknown,
    #[error("Not authorized: {0}")]
    Unauthorized(String),
    #[error("The document does not yield the required attributes")]
    AttributesUnavailable,
    #[error("Malformed smartcard response: {0}")]
    ProtocolFormat(String),
    #[error("An upstream service failed")]
    Upstream,
    #[error("An upstream service did not answer in time")]
    UpstreamTimeout,
    #[error("The maximum number of open sessions has been reached")]
    TooManySessions,
    #[error("The service has encountered an unexpected internal state")]
    Internal,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    status: u16,
    description: String,
}

impl AppError {
    /// Convenience function to create an internal error, keeping the details in the log
    pub fn internal<E: fmt::Debug>(e: E) -> Self {
        tracing::error!("Service failure: {e:?}");
        AppError::Internal
    }

    pub fn to_error_code(&self) -> &'static str {
        use AppError::*;

        match self {
            InputInvalid(_) => codes::MALFORMED_INPUT,
            SessionUnknown => codes::SESSION_UNKNOWN,
            Unauthorized(_) => codes::UNAUTHORIZED,
            AttributesUnavailable => codes::ATTRIBUTES_UNAVAILABLE,
            ProtocolFormat(_) => codes::PROTOCOL_FORMAT,
            Upstream => codes::UPSTREAM_ERROR,
            UpstreamTimeout => codes::UPSTREAM_TIMEOUT,
            TooManySessions => codes::TOO_MANY_SESSIONS,
            Internal => codes::INTERNAL_ERROR,
        }
    }

    pub fn status(&self) -> StatusCode {
        use AppError::*;

        match self {
            InputInvalid(_) | SessionUnknown | ProtocolFormat(_) => StatusCode::BAD_REQUEST,
            Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AttributesUnavailable | Internal => StatusCode::INTERNAL_SERVER_ERROR,
            Upstream => StatusCode::BAD_GATEWAY,
            UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            TooManySessions => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<EnrollmentError> for AppError {
    fn from(error: EnrollmentError) -> Self {
        match error {
            EnrollmentError::InputInvalid(msg) => AppError::InputInvalid(msg),
            EnrollmentError::SessionUnknown => AppError::SessionUnknown,
            EnrollmentError::Unauthorized(msg) => AppError::Unauthorized(msg),
            EnrollmentError::Info(e) => {
                tracing::warn!("Attribute derivation failed: {e}");
                AppError::AttributesUnavailable
            }
            EnrollmentError::ProtocolFormat(e) => AppError::ProtocolFormat(e.to_string()),
            EnrollmentError::Upstream(e) if e.is_timeout() => {
                tracing::error!("Upstream timeout: {e}");
                AppError::UpstreamTimeout
            }
            EnrollmentError::Upstream(e) => {
                tracing::error!("Upstream failure: {e:?}");
                AppError::Upstream
            }
            EnrollmentError::Session(SessionError::MaxSessions) => AppError::TooManySessions,
            EnrollmentError::Session(e) => AppError::internal(e),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InputInvalid(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.to_error_code(),
            status: status.as_u16(),
            description: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
