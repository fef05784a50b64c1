//! Error types for the protocol crate.

use thiserror::Error;

/// Errors raised while turning raw request parameters into a [`Request`].
///
/// [`Request`]: crate::messages::Request
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// A parameter the action needs was not supplied.
    #[error("missing parameter: {0}")]
    MissingParameter(&'static str),

    /// A parameter was supplied but could not be interpreted.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name as it appears in the request.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// The request named no action this service understands.
    #[error("unknown action")]
    UnknownAction,

    /// Failed to deserialize an embedded JSON value.
    #[error("deserialization failed: {0}")]
    Deserialization(String),
}

/// Result type alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        ProtocolError::Deserialization(err.to_string())
    }
}
