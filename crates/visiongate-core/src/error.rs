//! Error types module
//!
//! This module provides the error taxonomy used throughout the service. Every
//! request-time failure is an `AppError`; each variant maps onto exactly one
//! `ErrorKind`, which is what clients see in the `error_kind` field of the
//! error envelope. Configuration problems are `ConfigError`s (see `config`)
//! and are only ever raised at startup.

use std::fmt;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like rate limiting
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Client-visible error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnsupportedFileType,
    FileSizeExceeded,
    InvalidImage,
    InvalidRequest,
    RateLimitExceeded,
    DetectionError,
    ModerationError,
    ServiceUnavailable,
    NotFound,
    MethodNotAllowed,
    InternalError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnsupportedFileType => "UnsupportedFileType",
            ErrorKind::FileSizeExceeded => "FileSizeExceeded",
            ErrorKind::InvalidImage => "InvalidImage",
            ErrorKind::InvalidRequest => "InvalidRequest",
            ErrorKind::RateLimitExceeded => "RateLimitExceeded",
            ErrorKind::DetectionError => "DetectionError",
            ErrorKind::ModerationError => "ModerationError",
            ErrorKind::ServiceUnavailable => "ServiceUnavailable",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::MethodNotAllowed => "MethodNotAllowed",
            ErrorKind::InternalError => "InternalError",
        }
    }

    /// Best-effort classification of an error status produced outside of the
    /// typed error path (router fallbacks, body limits, extractor rejections).
    pub fn from_status(status: u16) -> Self {
        match status {
            404 => ErrorKind::NotFound,
            405 => ErrorKind::MethodNotAllowed,
            413 => ErrorKind::FileSizeExceeded,
            415 => ErrorKind::UnsupportedFileType,
            429 => ErrorKind::RateLimitExceeded,
            503 => ErrorKind::ServiceUnavailable,
            400..=499 => ErrorKind::InvalidRequest,
            _ => ErrorKind::InternalError,
        }
    }

    /// Generic message used when no typed error is available.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorKind::UnsupportedFileType => "Unsupported file type",
            ErrorKind::FileSizeExceeded => "Uploaded file exceeds the maximum allowed size",
            ErrorKind::InvalidImage => "Uploaded file is not a valid image",
            ErrorKind::InvalidRequest => "Invalid request",
            ErrorKind::RateLimitExceeded => "Too many requests. Please slow down.",
            ErrorKind::DetectionError => "Object detection failed",
            ErrorKind::ModerationError => "Content moderation failed",
            ErrorKind::ServiceUnavailable => "Service temporarily unavailable",
            ErrorKind::NotFound => "Resource not found",
            ErrorKind::MethodNotAllowed => "Method not allowed",
            ErrorKind::InternalError => "Internal server error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata for error responses - defines how an error should be presented
/// This trait allows errors to self-describe their HTTP response characteristics
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Client-visible error category
    fn error_kind(&self) -> ErrorKind;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details must be kept out of the response body
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileSizeExceeded { size: usize, max: usize },

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimitExceeded { retry_after_secs: u64 },

    #[error("Detection failed: {0}")]
    Detection(String),

    #[error("Detection timed out after {0}s")]
    DetectionTimeout(u64),

    #[error("Moderation failed: {0}")]
    Moderation(String),

    #[error("Moderation timed out after {0}s")]
    ModerationTimeout(u64),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

/// Static metadata for each variant: (http_status, kind, sensitive, log_level).
fn app_error_static_metadata(err: &AppError) -> (u16, ErrorKind, bool, LogLevel) {
    match err {
        AppError::UnsupportedFileType(_) => (
            415,
            ErrorKind::UnsupportedFileType,
            false,
            LogLevel::Debug,
        ),
        AppError::FileSizeExceeded { .. } | AppError::PayloadTooLarge(_) => (
            413,
            ErrorKind::FileSizeExceeded,
            false,
            LogLevel::Debug,
        ),
        AppError::InvalidImage(_) => (
            400,
            ErrorKind::InvalidImage,
            false,
            LogLevel::Debug,
        ),
        AppError::InvalidRequest(_) => (
            400,
            ErrorKind::InvalidRequest,
            false,
            LogLevel::Debug,
        ),
        AppError::RateLimitExceeded { .. } => (
            429,
            ErrorKind::RateLimitExceeded,
            false,
            LogLevel::Warn,
        ),
        AppError::Detection(_) => (
            500,
            ErrorKind::DetectionError,
            true,
            LogLevel::Error,
        ),
        AppError::DetectionTimeout(_) => (
            504,
            ErrorKind::DetectionError,
            false,
            LogLevel::Warn,
        ),
        AppError::Moderation(_) => (
            500,
            ErrorKind::ModerationError,
            true,
            LogLevel::Error,
        ),
        AppError::ModerationTimeout(_) => (
            504,
            ErrorKind::ModerationError,
            false,
            LogLevel::Warn,
        ),
        AppError::ServiceUnavailable(_) => (
            503,
            ErrorKind::ServiceUnavailable,
            false,
            LogLevel::Warn,
        ),
        AppError::NotFound(_) => (
            404,
            ErrorKind::NotFound,
            false,
            LogLevel::Debug,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            ErrorKind::InternalError,
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }

    /// Seconds a client should wait before retrying, when the error carries one.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            AppError::RateLimitExceeded { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_kind(&self) -> ErrorKind {
        app_error_static_metadata(self).1
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).3
    }

    fn client_message(&self) -> String {
        if self.is_sensitive() {
            return self.error_kind().default_message().to_string();
        }
        match self {
            AppError::UnsupportedFileType(ref msg) => msg.clone(),
            AppError::FileSizeExceeded { size, max } => format!(
                "File size {} bytes exceeds maximum allowed size of {} bytes",
                size, max
            ),
            AppError::PayloadTooLarge(ref msg) => msg.clone(),
            AppError::InvalidImage(ref msg) => msg.clone(),
            AppError::InvalidRequest(ref msg) => msg.clone(),
            AppError::RateLimitExceeded { .. } => {
                ErrorKind::RateLimitExceeded.default_message().to_string()
            }
            AppError::DetectionTimeout(secs) => {
                format!("Object detection timed out after {} seconds", secs)
            }
            AppError::ModerationTimeout(secs) => {
                format!("Content moderation timed out after {} seconds", secs)
            }
            AppError::ServiceUnavailable(ref msg) => msg.clone(),
            AppError::NotFound(ref msg) => msg.clone(),
            AppError::Detection(_)
            | AppError::Moderation(_)
            | AppError::Internal(_)
            | AppError::InternalWithSource { .. } => {
                self.error_kind().default_message().to_string()
            }
        }
    }
}
