//! Error taxonomy for the Bolt client core.
//!
//! Locally-raised kinds are [`BoltError::Connection`], [`BoltError::Protocol`]
//! and [`BoltError::Service`]. Everything else is produced by
//! [`classify_failure`], which maps the dotted status code of a server
//! FAILURE (`Neo.ClientError.Statement.SyntaxError` and friends) onto a typed
//! kind so callers can match on the class instead of string-prefixing codes.

use std::io;

use thiserror::Error;

use super::packstream::PackStreamError;

/// Result type for Bolt operations.
pub type BoltResult<T> = Result<T, BoltError>;

/// Errors surfaced by the Bolt client core.
#[derive(Error, Debug)]
pub enum BoltError {
    /// Socket open/close/send/receive failure; the connection is unusable.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Framing, unknown signature, missing field or capability precondition.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The service cannot be reached or is not in a usable state.
    #[error("Service error: {0}")]
    Service(String),

    /// Server rejected the supplied credentials.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Server-side security violation other than authentication.
    #[error("Security error: {0}")]
    Security(String),

    /// The statement failed to parse.
    #[error("Syntax error: {0}")]
    Syntax(String),

    /// General database-side failure.
    #[error("Database error: {0}")]
    Database(String),

    /// A schema constraint was violated.
    #[error("Constraint error: {0}")]
    Constraint(String),

    /// Transaction could not be started, committed or rolled back.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Retryable server condition; a fresh attempt may succeed.
    #[error("Transient error: {0}")]
    Transient(String),

    /// Server failure with a code outside the known classification.
    #[error("Unknown error {code}: {message}")]
    Unknown {
        /// The raw dotted status code.
        code: String,
        /// The server-supplied message.
        message: String,
    },

    /// Value codec failure while encoding or decoding a message.
    #[error("PackStream error: {0}")]
    PackStream(#[from] PackStreamError),

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl BoltError {
    /// Whether a caller may reasonably retry the operation on a fresh
    /// connection.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BoltError::Transient(_) | BoltError::Connection(_) | BoltError::Service(_)
        )
    }

    /// Whether the error originated from a server FAILURE response.
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            BoltError::Authentication(_)
                | BoltError::Security(_)
                | BoltError::Syntax(_)
                | BoltError::Database(_)
                | BoltError::Constraint(_)
                | BoltError::Transaction(_)
                | BoltError::Transient(_)
                | BoltError::Unknown { .. }
        )
    }
}

/// Classify a server FAILURE into a typed [`BoltError`].
///
/// Codes follow the form `Neo.{Classification}.{Category}.{Title}`.
pub fn classify_failure(code: &str, message: &str) -> BoltError {
    let msg = message.to_string();
    let mut parts = code.split('.');
    let _vendor = parts.next();
    let classification = parts.next().unwrap_or("");
    let category = parts.next().unwrap_or("");
    let title = parts.next().unwrap_or("");

    match classification {
        "ClientError" => match category {
            "Security" => {
                if title.contains("Unauthorized") || title.contains("Authentication") {
                    BoltError::Authentication(msg)
                } else {
                    BoltError::Security(msg)
                }
            }
            "Statement" => {
                if title == "SyntaxError" {
                    BoltError::Syntax(msg)
                } else {
                    BoltError::Database(msg)
                }
            }
            "Schema" => {
                if title.contains("Constraint") {
                    BoltError::Constraint(msg)
                } else {
                    BoltError::Database(msg)
                }
            }
            "Transaction" => BoltError::Transaction(msg),
            "Request" => BoltError::Protocol(msg),
            _ => BoltError::Database(msg),
        },
        "TransientError" => BoltError::Transient(msg),
        "DatabaseError" => BoltError::Database(msg),
        _ => BoltError::Unknown {
            code: code.to_string(),
            message: msg,
        },
    }
}
