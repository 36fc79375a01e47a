use crate::{apdu, session::SessionError};

/// Failures of an enrollment operation. Every variant is terminal for the request.
#[derive(thiserror::Error, Debug)]
pub enum EnrollmentError {
    #[error("Invalid input: {0}")]
    InputInvalid(String),

    #[error("Unknown or expired session")]
    SessionUnknown,

    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error(transparent)]
    Info(#[from] InfoError),

    #[error("Protocol format error: {0}")]
    ProtocolFormat(#[from] apdu::Error),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// The document data could not be turned into attributes.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InfoError {
    #[error("Unparseable {field}: {value:?}")]
    InvalidDate { field: &'static str, value: String },

    #[error("Missing or empty {0}")]
    MissingName(&'static str),
}

/// A collaborator failed or answered with something unusable.
#[derive(thiserror::Error, Debug)]
pub enum UpstreamError {
    #[error("{service} did not answer within {secs}s")]
    Timeout { service: &'static str, secs: u64 },

    #[error("{service} request failed: {source}")]
    Http {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} returned an error: {message}")]
    Rejected {
        service: &'static str,
        message: String,
    },

    #[error("{service} returned a malformed response: {message}")]
    Malformed {
        service: &'static str,
        message: String,
    },

    #[error("Failed to sign issuing request: {0}")]
    Signing(String),
}

impl UpstreamError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
