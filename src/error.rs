//! Error types for the reconciliation engine

use std::fmt;

use thiserror::Error;

use crate::dyno::DynoType;

/// Caller input that cannot be turned into a canonical formation
///
/// These are always detected before any remote call is issued.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("either 'formation' or both 'size' and 'count' must be given, but not both")]
    ConflictingInputs,

    #[error("invalid 'formation' value: '{dyno_type}: {quantity}'")]
    InvalidFormation { dyno_type: String, quantity: i64 },

    #[error("no dynos allocated, the application cannot run without dynos")]
    EmptyFormation,

    #[error("invalid 'count' value: {0}, dyno counts cannot be negative")]
    NegativeCount(i64),
}

/// The application does not exist and cannot be created implicitly
#[derive(Debug, Error)]
#[error("application '{app}' does not exist, cannot {action} it")]
pub struct NotFoundError {
    pub app: String,
    pub action: &'static str,
}

/// A call to the remote platform failed
///
/// The error always carries the attempted action and the application name.
#[derive(Debug, Error)]
#[error("failed to {action} application '{app}': {source:#}")]
pub struct TransportError {
    pub action: &'static str,
    pub app: String,
    #[source]
    pub source: anyhow::Error,
}

impl TransportError {
    pub(crate) fn new(action: &'static str, app: impl Into<String>, source: anyhow::Error) -> Self {
        Self {
            action,
            app: app.into(),
            source,
        }
    }
}

/// The remote formation has a shape that cannot be keyed by dyno size
#[derive(Debug, Error)]
#[error("unsupported formation for application '{app}': {reason}")]
pub struct UnsupportedShapeError {
    pub app: String,
    pub reason: String,
}

impl UnsupportedShapeError {
    pub(crate) fn shared_size(app: &str, size: DynoType, first: &str, second: &str) -> Self {
        Self {
            app: app.to_string(),
            reason: format!("processes '{first}' and '{second}' both run on {size} dynos"),
        }
    }
}

#[derive(Debug, Error)]
#[error("invalid options: {0}")]
/// The configuration object does not match the option schema
pub struct OptionsError(#[from] serde_json::Error);

/// A list specifying categories of errors
///
/// used with the [`Error`] type
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The configuration object is malformed
    Options,
    /// The declared inputs are inconsistent
    Validation,
    /// The application is missing and may not be created
    NotFound,
    /// The remote platform reported an error
    Transport,
    /// The remote formation cannot be reconciled
    UnsupportedShape,
}

impl ErrorKind {
    pub(crate) fn as_str(&self) -> &'static str {
        use ErrorKind::*;
        match *self {
            Options => "invalid options",
            Validation => "validation failed",
            NotFound => "application not found",
            Transport => "transport error",
            UnsupportedShape => "unsupported formation",
        }
    }
}

impl fmt::Display for ErrorKind {
    /// Shows a human-readable description of the `ErrorKind`.
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(self.as_str())
    }
}

/// Any error terminating an invocation
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Options(#[from] OptionsError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    UnsupportedShape(#[from] UnsupportedShapeError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Options(_) => ErrorKind::Options,
            Error::Validation(_) => ErrorKind::Validation,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Transport(_) => ErrorKind::Transport,
            Error::UnsupportedShape(_) => ErrorKind::UnsupportedShape,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
