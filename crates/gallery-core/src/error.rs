//! Error types module
//!
//! All failures surfaced by the gallery services are unified under [`AppError`].
//! Each variant maps onto one of the caller-facing categories in [`ErrorKind`]:
//! invalid parameters, missing resources, ownership/role violations, conflicts,
//! and upstream failures (Blob Store, search source, persistent Store).
//!
//! The `Database` variant and `From<sqlx::Error>` are gated behind the `sqlx` feature.

use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

/// Level at which a failed request is logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Caller mistakes: bad input, missing ids, repeated reviews.
    Debug,
    /// Access violations.
    Warn,
    /// Backend failures.
    Error,
}

/// Caller-facing error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidParams,
    NotFound,
    Forbidden,
    Conflict,
    Unauthorized,
    UpstreamFailure,
    Internal,
}

/// How an error is presented to clients and operators.
pub trait ErrorMetadata {
    fn http_status_code(&self) -> u16;

    /// Stable code clients can match on, e.g. `"CONFLICT"`.
    fn error_code(&self) -> &'static str;

    /// True when the same request may succeed later.
    fn is_recoverable(&self) -> bool;

    fn suggested_action(&self) -> Option<&'static str>;

    /// Message safe to show the caller.
    fn client_message(&self) -> String;

    /// Sensitive errors never expose their internal message.
    fn is_sensitive(&self) -> bool;

    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Upstream failure: {0}")]
    UpstreamFailure(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidParams(format!("JSON parsing error: {}", err))
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::InvalidParams(format!("UUID parsing error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidParams(format!("Validation error: {}", err))
    }
}

struct Presentation {
    status: u16,
    code: &'static str,
    recoverable: bool,
    action: Option<&'static str>,
    sensitive: bool,
    level: LogLevel,
}

const RETRY_LATER: Option<&str> = Some("Retry after a short delay");

impl AppError {
    fn presentation(&self) -> Presentation {
        match self {
            AppError::Database(_) => Presentation {
                status: 503,
                code: "DATABASE_ERROR",
                recoverable: true,
                action: RETRY_LATER,
                sensitive: true,
                level: LogLevel::Error,
            },
            AppError::InvalidParams(_) => Presentation {
                status: 400,
                code: "INVALID_PARAMS",
                recoverable: false,
                action: Some("Check request parameters and try again"),
                sensitive: false,
                level: LogLevel::Debug,
            },
            AppError::NotFound(_) => Presentation {
                status: 404,
                code: "NOT_FOUND",
                recoverable: false,
                action: Some("Verify the resource ID exists"),
                sensitive: false,
                level: LogLevel::Debug,
            },
            AppError::Forbidden(_) => Presentation {
                status: 403,
                code: "FORBIDDEN",
                recoverable: false,
                action: Some("Only the owner or an administrator may perform this action"),
                sensitive: false,
                level: LogLevel::Warn,
            },
            AppError::Conflict(_) => Presentation {
                status: 409,
                code: "CONFLICT",
                recoverable: false,
                action: Some("Reload the resource before retrying"),
                sensitive: false,
                level: LogLevel::Debug,
            },
            AppError::Unauthorized(_) => Presentation {
                status: 401,
                code: "UNAUTHORIZED",
                recoverable: false,
                action: Some("Sign in and retry"),
                sensitive: false,
                level: LogLevel::Debug,
            },
            AppError::UpstreamFailure(_) => Presentation {
                status: 502,
                code: "UPSTREAM_FAILURE",
                recoverable: true,
                action: RETRY_LATER,
                sensitive: true,
                level: LogLevel::Error,
            },
            AppError::Internal(_) | AppError::InternalWithSource { .. } => Presentation {
                status: 500,
                code: "INTERNAL_ERROR",
                recoverable: true,
                action: RETRY_LATER,
                sensitive: true,
                level: LogLevel::Error,
            },
        }
    }
}

impl AppError {
    /// Caller-facing category of this error. Store failures count as upstream failures.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Database(_) | AppError::UpstreamFailure(_) => ErrorKind::UpstreamFailure,
            AppError::InvalidParams(_) => ErrorKind::InvalidParams,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Forbidden(_) => ErrorKind::Forbidden,
            AppError::Conflict(_) => ErrorKind::Conflict,
            AppError::Unauthorized(_) => ErrorKind::Unauthorized,
            AppError::Internal(_) | AppError::InternalWithSource { .. } => ErrorKind::Internal,
        }
    }

    /// Variant name, reported as `error_type` outside production.
    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::Database(_) => "Database",
            AppError::InvalidParams(_) => "InvalidParams",
            AppError::NotFound(_) => "NotFound",
            AppError::Forbidden(_) => "Forbidden",
            AppError::Conflict(_) => "Conflict",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::UpstreamFailure(_) => "UpstreamFailure",
            AppError::Internal(_) | AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// The message followed by up to five `Caused by:` lines from the source chain.
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let causes: Vec<String> = std::iter::successors(self.source(), |err| (*err).source())
            .map(|err| format!("\n  Caused by: {}", err))
            .take(6)
            .collect();
        let mut details = self.to_string();
        for (i, cause) in causes.iter().enumerate() {
            if i == 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(cause);
        }
        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        self.presentation().status
    }

    fn error_code(&self) -> &'static str {
        self.presentation().code
    }

    fn is_recoverable(&self) -> bool {
        self.presentation().recoverable
    }

    fn suggested_action(&self) -> Option<&'static str> {
        self.presentation().action
    }

    fn is_sensitive(&self) -> bool {
        self.presentation().sensitive
    }

    fn log_level(&self) -> LogLevel {
        self.presentation().level
    }

    fn client_message(&self) -> String {
        match self {
            AppError::InvalidParams(msg)
            | AppError::NotFound(msg)
            | AppError::Forbidden(msg)
            | AppError::Conflict(msg)
            | AppError::Unauthorized(msg) => msg.clone(),
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::UpstreamFailure(_) => "An upstream service failed".to_string(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
        }
    }
}
