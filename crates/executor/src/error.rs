//! Error types for command execution.
//!
//! Everything a command can fail with is an [`Error`]. Engine failures are
//! wrapped unchanged; the variants added here cover the request itself
//! (unparseable body, unknown command, bad fields, missing scope).
//!
//! Each error maps to one entry of the response envelope's `errors` array
//! via [`Error::to_entry`].

use serde::{Deserialize, Serialize};
use tessera_engine::{Error as EngineError, ErrorKind};

/// Command execution errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Body is not a single-command JSON object
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// Command name is not recognised
    #[error("no command matched '{name}'")]
    NoCommandMatched { name: String },

    /// Command fields failed to deserialize
    #[error("request invalid for command '{command}': {reason}")]
    CommandFieldInvalid { command: String, reason: String },

    /// Command needs a namespace or collection the context does not carry
    #[error("command '{command}' requires a {scope}")]
    MissingScope {
        command: &'static str,
        scope: &'static str,
    },

    /// Failure reported by the engine
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl Error {
    /// Classification, shared with engine errors.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Engine(e) => e.kind(),
            _ => ErrorKind::Validation,
        }
    }

    /// Stable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidRequest { .. } | Error::MissingScope { .. } => "INVALID_REQUEST",
            Error::NoCommandMatched { .. } => "NO_COMMAND_MATCHED",
            Error::CommandFieldInvalid { .. } => "COMMAND_FIELD_INVALID",
            Error::Engine(e) => e.code(),
        }
    }

    /// Envelope entry for this error.
    pub fn to_entry(&self) -> ErrorEntry {
        ErrorEntry {
            message: self.to_string(),
            error_code: self.code().to_string(),
            exception_class: self.kind().exception_class().to_string(),
        }
    }
}

/// One element of the envelope's `errors` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEntry {
    /// Human-readable description
    pub message: String,
    /// Stable code
    pub error_code: String,
    /// Error class derived from the kind
    pub exception_class: String,
}
