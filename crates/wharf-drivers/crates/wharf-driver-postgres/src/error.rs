//! Backend error formatting

use deadpool_postgres::PoolError;
use thiserror::Error;
use wharf_core::BoxError;

/// A PostgreSQL failure with a readable message.
///
/// Server errors carry SQLSTATE, detail, hint and column. Everything else
/// keeps the client library's text.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct BackendError {
    message: String,
    code: Option<String>,
    #[source]
    source: tokio_postgres::Error,
}

impl BackendError {
    /// SQLSTATE code reported by the server, if any.
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn is_unique_violation(&self) -> bool {
        self.code() == Some("23505")
    }
}

impl From<tokio_postgres::Error> for BackendError {
    fn from(error: tokio_postgres::Error) -> Self {
        let Some(db_error) = error.as_db_error() else {
            return Self {
                message: error.to_string(),
                code: None,
                source: error,
            };
        };

        let code = db_error.code().code().to_string();
        let mut message = db_error.message().to_string();
        let extras = [
            ("detail", db_error.detail()),
            ("hint", db_error.hint()),
            ("column", db_error.column()),
        ];
        for (label, value) in extras {
            if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
                message.push_str(&format!(" ({}: {})", label, value));
            }
        }

        let message = match code.as_str() {
            "23505" => format!("duplicate value violates unique constraint: {}", message),
            "23503" => format!("foreign key violation: {}", message),
            "23502" => format!("null value violates not-null constraint: {}", message),
            "22007" => format!("invalid datetime format: {}", message),
            "22P02" => format!("invalid input syntax: {}", message),
            "40001" => format!("serialization failure: {}", message),
            _ => format!("{} (code: {})", message, code),
        };

        Self {
            message,
            code: Some(code),
            source: error,
        }
    }
}

pub(crate) fn backend(error: tokio_postgres::Error) -> BoxError {
    Box::new(BackendError::from(error))
}

/// Acquire failures: backend errors get formatted, pool errors pass through.
pub(crate) fn pool(error: PoolError) -> BoxError {
    match error {
        PoolError::Backend(error) => backend(error),
        other => Box::new(other),
    }
}
