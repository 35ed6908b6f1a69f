//! Error types for the failover proxy.
//!
//! Two families of errors exist:
//!
//! - [`FailoverError`] is returned synchronously by the proxy itself: invalid construction,
//!   unsupported arguments, unknown event names and reserved parameters.
//! - [`BackendError`] is produced asynchronously by a storage backend and is never returned as an
//!   `Err` by the proxy. It drives failover or is delivered to the caller's `error` handler.
//!
//! # Example
//!
//! ```
//! use inferadb_common_storage_failover::{BackendError, FailoverError};
//!
//! let err = FailoverError::missing_configuration("primary_bucket");
//! assert_eq!(err.to_string(), "Missing configuration: primary_bucket is required");
//!
//! let backend_err = BackendError::with_status(503, "slow down");
//! assert_eq!(backend_err.status_code(), Some(503));
//! ```

use thiserror::Error;

use crate::types::Operation;

/// Result type alias for proxy operations.
pub type Result<T> = std::result::Result<T, FailoverError>;

/// Errors raised synchronously by the failover proxy.
///
/// # Non-exhaustive
///
/// New variants may be added in minor releases. Downstream match expressions
/// must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FailoverError {
    /// A required configuration field was absent or empty at construction.
    #[error("Missing configuration: {field} is required")]
    MissingConfiguration {
        /// Name of the missing field.
        field: &'static str,
    },

    /// Arguments were passed to an operation method.
    ///
    /// Argument passthrough to the backend is not supported; parameters are
    /// given to [`Request::send_with`](crate::Request::send_with) instead.
    #[error("Unsupported argument: {operation} does not accept arguments")]
    UnsupportedArgument {
        /// The operation that received arguments.
        operation: Operation,
    },

    /// A callback was registered under an unrecognized event name.
    #[error("Unknown event type: {name}")]
    UnknownEventType {
        /// The rejected event name.
        name: String,
    },

    /// The caller set a parameter owned by the proxy.
    #[error("Reserved parameter used: {parameter} is selected by the failover proxy")]
    ReservedParameterUsed {
        /// The reserved parameter name.
        parameter: &'static str,
    },
}

impl FailoverError {
    /// Creates a new `MissingConfiguration` error for the given field.
    #[must_use]
    pub fn missing_configuration(field: &'static str) -> Self {
        Self::MissingConfiguration { field }
    }

    /// Creates a new `UnsupportedArgument` error for the given operation.
    #[must_use]
    pub fn unsupported_argument(operation: Operation) -> Self {
        Self::UnsupportedArgument { operation }
    }

    /// Creates a new `UnknownEventType` error for the given name.
    #[must_use]
    pub fn unknown_event_type(name: impl Into<String>) -> Self {
        Self::UnknownEventType { name: name.into() }
    }

    /// Creates a new `ReservedParameterUsed` error for the given parameter.
    #[must_use]
    pub fn reserved_parameter_used(parameter: &'static str) -> Self {
        Self::ReservedParameterUsed { parameter }
    }
}

/// Validation errors for configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A value lies outside its permitted inclusive range.
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        /// Name of the offending field.
        field: &'static str,
        /// Inclusive lower bound.
        min: String,
        /// Inclusive upper bound.
        max: String,
        /// The rejected value.
        value: String,
    },
}

/// An error reported by a storage backend call.
///
/// Backends attach an HTTP-style status code when the failure is status-coded.
/// The status code is what the [`FailoverPolicy`](crate::FailoverPolicy) inspects
/// to decide whether the request should fail over. Errors without a status code
/// (for example a local serialization failure) are never failover-eligible.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Backend error ({}): {message}", describe_status(.status_code, .code))]
pub struct BackendError {
    status_code: Option<u16>,
    code: Option<String>,
    message: String,
}

fn describe_status(status_code: &Option<u16>, code: &Option<String>) -> String {
    match (status_code, code) {
        (Some(status), Some(code)) => format!("status {status}, {code}"),
        (Some(status), None) => format!("status {status}"),
        (None, Some(code)) => code.to_owned(),
        (None, None) => "no status".to_owned(),
    }
}

impl BackendError {
    /// Creates an error without a status code.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self { status_code: None, code: None, message: message.into() }
    }

    /// Creates a status-coded error.
    #[must_use]
    pub fn with_status(status_code: u16, message: impl Into<String>) -> Self {
        Self { status_code: Some(status_code), code: None, message: message.into() }
    }

    /// Attaches a backend-specific error code (e.g. `NoSuchKey`).
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Returns the status code, if the failure is status-coded.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    /// Returns the backend-specific error code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// Returns the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}
