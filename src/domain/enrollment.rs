//! Enrollment of identity documents into attribute credentials.

pub mod attributes;
pub mod errors;
pub mod models;
pub mod names;
pub mod ports;
pub mod service;

pub use attributes::AttributeDeriver;
pub use errors::{EnrollmentError, InfoError, UpstreamError};
pub use service::EnrollmentEngine;
