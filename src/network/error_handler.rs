//! Centralized error handling and classification

use super::error::HttpError;
use crate::logging::LogLevel;

/// Centralized error handler for all network operations
#[derive(Debug, Clone, Default)]
pub struct ErrorHandler;

impl ErrorHandler {
    pub fn new() -> Self {
        Self
    }

    /// Classify error and determine appropriate log level
    pub fn classify_error(&self, error: &HttpError) -> LogLevel {
        match error {
            // Missing documents are an expected outcome of lookups
            HttpError::Http { status: 404, .. } => LogLevel::Debug,

            // Rate limiting - low priority
            HttpError::Http { status: 429, .. } => LogLevel::Debug,

            // Server errors - temporary issues
            HttpError::Http { status, .. } if (500..=599).contains(status) => LogLevel::Warn,

            // Authentication errors - critical
            HttpError::Http { status: 401 | 403, .. } => LogLevel::Error,

            // Malformed responses or configuration - critical
            HttpError::Decode(_) | HttpError::InvalidUrl(_) => LogLevel::Error,

            // Network issues - usually temporary
            HttpError::Reqwest(_) => LogLevel::Warn,

            // Other errors
            _ => LogLevel::Warn,
        }
    }

    /// Determine if an error should trigger retry logic
    pub fn should_retry(&self, error: &HttpError) -> bool {
        match error {
            // Retry on network/connection errors
            HttpError::Reqwest(e) => e.is_timeout() || e.is_connect() || e.is_request(),

            // HTTP errors - only server-side failures are transient
            HttpError::Http { status, .. } => matches!(*status, 500..=599),

            // A bad body or URL will not improve on retry
            HttpError::Decode(_) | HttpError::InvalidUrl(_) => false,
        }
    }
}
