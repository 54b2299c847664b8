//! Custom error types for the tunable laser adapter.
//!
//! `LaserError` is the single error type returned by every fallible operation in
//! the crate. The variants map onto the failure classes a caller has to tell apart
//! when driving an instrument:
//!
//! - **`Connection`**: the transport could not be opened, or a write/read on an
//!   open session failed (timeout, peer closed, VISA status error).
//! - **`InvalidResource`**: the resource string is malformed. It is reported
//!   before any I/O and counts as a connection-class failure.
//! - **`NotConnected`**: an operation was attempted without an open session.
//! - **`Protocol`**: the instrument answered, but the text does not parse into the
//!   expected numeric or enumerated form.
//! - **`InvalidParameter`**: a setter was handed a value that cannot be put on the
//!   wire (NaN, infinity).
//! - **`Config`** / **`Configuration`**: loading or validating configuration failed.
//! - **`FeatureNotEnabled`**: functionality compiled out via feature flags.
//!
//! No operation retries. Errors propagate to the caller as soon as they occur.

use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type AppResult<T> = std::result::Result<T, LaserError>;

/// Errors returned by the driver, its transports and configuration loading.
#[derive(Error, Debug)]
pub enum LaserError {
    /// Transport could not be opened, or I/O on it failed
    #[error("Connection error on '{resource}': {message}")]
    Connection {
        /// Resource the session was for
        resource: String,
        /// Underlying failure
        message: String,
    },

    /// Malformed resource string
    #[error("Invalid resource string '{resource}': {reason}")]
    InvalidResource {
        /// The rejected resource string
        resource: String,
        /// What is wrong with it
        reason: String,
    },

    /// No open session
    #[error("Instrument not connected")]
    NotConnected,

    /// Response did not parse into the expected form
    #[error("Unexpected response '{response}' to '{command}': {reason}")]
    Protocol {
        /// Query that was sent
        command: String,
        /// Text the instrument returned
        response: String,
        /// Why it was rejected
        reason: String,
    },

    /// Argument cannot be sent to the instrument
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Configuration source could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    /// Configuration loaded but failed validation
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// Functionality compiled out
    #[error("Feature '{0}' is not enabled. Please build with --features {0}")]
    FeatureNotEnabled(String),
}

impl LaserError {
    /// Build a `Connection` error from any displayable cause.
    pub fn connection(resource: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        LaserError::Connection {
            resource: resource.into(),
            message: cause.to_string(),
        }
    }

    /// Build a `Protocol` error for a response that failed to parse.
    pub fn protocol(
        command: impl Into<String>,
        response: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        LaserError::Protocol {
            command: command.into(),
            response: response.into(),
            reason: reason.into(),
        }
    }

    /// True for failures of the transport itself, including unusable addresses.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            LaserError::Connection { .. } | LaserError::InvalidResource { .. }
        )
    }
}
