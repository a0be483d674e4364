//! Error types for Wharf

use std::fmt;

use thiserror::Error;

use crate::ContextError;

/// Boxed backend error kept in the `source()` chain of a [`WharfError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Coarse classification attached to every [`WharfError`].
///
/// Callers branch on the code instead of on backend-native error values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Caller misuse or malformed configuration. Never retried.
    Invalid,
    /// Operation conflicts with the current lifecycle state.
    Conflict,
    /// A required resource (connection, key) is absent.
    NotFound,
    /// Network or backend availability failure.
    InfraError,
    /// Backend rejected an operation on a live connection.
    Internal,
    /// The caller cancelled the operation.
    Cancelled,
    /// The caller's deadline elapsed.
    DeadlineExceeded,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Invalid => "invalid",
            ErrorCode::Conflict => "conflict",
            ErrorCode::NotFound => "not_found",
            ErrorCode::InfraError => "infra_error",
            ErrorCode::Internal => "internal",
            ErrorCode::Cancelled => "cancelled",
            ErrorCode::DeadlineExceeded => "deadline_exceeded",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered key/value pairs describing where an error happened
/// (host, database, statement, timeout, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext(Vec<(&'static str, String)>);

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field, replacing any previous value stored under `key`.
    pub fn with(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        let value = value.to_string();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
        self
    }

    /// Append every field of `other`.
    pub fn merge(mut self, other: ErrorContext) -> Self {
        for (key, value) in other.0 {
            self = self.with(key, value);
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", key, value)?;
        }
        Ok(())
    }
}

/// Core error type for Wharf operations.
///
/// Messages name the failed operation only. Backend error text is never part
/// of the `Display` output; it stays reachable through `source()`.
#[derive(Error, Debug)]
pub enum WharfError {
    #[error("invalid {resource} configuration: {reason}")]
    InvalidConfig {
        resource: &'static str,
        reason: String,
    },

    /// Malformed retry policy (missing strategy and the like).
    #[error("invalid retry configuration: {0}")]
    RetryConfig(String),

    #[error("{resource} already connected")]
    AlreadyConnected { resource: &'static str },

    #[error("{resource} not connected")]
    NotConnected { resource: &'static str },

    #[error("failed to open {resource} connection")]
    OpenFailed {
        resource: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("{resource} connection failed after retries")]
    ConnectionFailed {
        resource: &'static str,
        context: ErrorContext,
        #[source]
        source: Box<WharfError>,
    },

    #[error("failed to ping {resource}")]
    PingFailed {
        resource: &'static str,
        context: ErrorContext,
        #[source]
        source: BoxError,
    },

    #[error("failed to close {resource} connection")]
    CloseFailed {
        resource: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("failed to execute {resource} statement")]
    ExecFailed {
        resource: &'static str,
        context: ErrorContext,
        #[source]
        source: BoxError,
    },

    #[error("failed to execute {resource} query")]
    QueryFailed {
        resource: &'static str,
        context: ErrorContext,
        #[source]
        source: BoxError,
    },

    #[error("failed to begin {resource} transaction")]
    TransactionFailed {
        resource: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("key not found in cache")]
    KeyNotFound { key: String },

    #[error("operation failed after {attempts} attempts")]
    AttemptsExhausted {
        attempts: u32,
        #[source]
        source: Box<WharfError>,
    },

    #[error(transparent)]
    Context(#[from] ContextError),
}

impl WharfError {
    /// Classification code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            WharfError::InvalidConfig { .. } | WharfError::RetryConfig(_) => ErrorCode::Invalid,
            WharfError::AlreadyConnected { .. } => ErrorCode::Conflict,
            WharfError::NotConnected { .. } | WharfError::KeyNotFound { .. } => {
                ErrorCode::NotFound
            }
            WharfError::OpenFailed { .. }
            | WharfError::ConnectionFailed { .. }
            | WharfError::PingFailed { .. } => ErrorCode::InfraError,
            WharfError::CloseFailed { .. }
            | WharfError::ExecFailed { .. }
            | WharfError::QueryFailed { .. }
            | WharfError::TransactionFailed { .. } => ErrorCode::Internal,
            WharfError::AttemptsExhausted { source, .. } => source.code(),
            WharfError::Context(ContextError::Cancelled) => ErrorCode::Cancelled,
            WharfError::Context(ContextError::DeadlineExceeded) => ErrorCode::DeadlineExceeded,
        }
    }

    /// Context fields attached to this error, if the variant carries any.
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            WharfError::ConnectionFailed { context, .. }
            | WharfError::PingFailed { context, .. }
            | WharfError::ExecFailed { context, .. }
            | WharfError::QueryFailed { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Whether the caller's context aborted the operation, as opposed to the
    /// operation giving up on its own.
    pub fn is_cancellation(&self) -> bool {
        match self {
            WharfError::Context(_) => true,
            WharfError::ConnectionFailed { source, .. }
            | WharfError::AttemptsExhausted { source, .. } => source.is_cancellation(),
            _ => false,
        }
    }

    /// Whether a retry loop ran out of attempts somewhere in this chain.
    pub fn is_exhausted(&self) -> bool {
        match self {
            WharfError::AttemptsExhausted { .. } => true,
            WharfError::ConnectionFailed { source, .. } => source.is_exhausted(),
            _ => false,
        }
    }

    /// Follow wrapping `WharfError`s down to the innermost one.
    ///
    /// Useful to match the cause behind `ConnectionFailed` or
    /// `AttemptsExhausted`.
    pub fn root_cause(&self) -> &WharfError {
        match self {
            WharfError::ConnectionFailed { source, .. }
            | WharfError::AttemptsExhausted { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Result type alias for Wharf operations
pub type Result<T> = std::result::Result<T, WharfError>;
