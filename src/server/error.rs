//! Error types for the HTTP server.

use thiserror::Error;

use crate::parser::Error as ParserError;

/// Errors that can occur during HTTP server operation.
#[derive(Debug, Error)]
pub enum Error {
    /// A binding address could not be parsed or resolved.
    #[error("invalid binding address `{address}`: {reason}")]
    InvalidBindingAddress { address: String, reason: String },

    /// Binding a listener failed. Startup is aborted, already-bound
    /// listeners are released and the server stays stopped.
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Error parsing an HTTP request.
    #[error("parse error: {0}")]
    Parse(#[from] ParserError),

    /// A file could not be opened or read while writing a response.
    #[error("file I/O error for {path}: {source}")]
    FileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O error on the connection.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The default action diagnostic requires a `?` in the request target.
    #[error("malformed action URL (no query separator): {0}")]
    MalformedActionUrl(String),

    /// An action handler failed.
    #[error("action handler error: {0}")]
    Handler(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
