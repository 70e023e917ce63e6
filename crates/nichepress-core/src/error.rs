use thiserror::Error;

/// Application-wide error types for nichepress.
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or invalid configuration (e.g. an empty credential pool).
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The upstream API reported that the current credential is out of quota.
    #[error("Quota exhausted (HTTP {status_code}): {message}")]
    QuotaExhausted { message: String, status_code: u16 },

    /// Every credential in a pool was tried without success.
    #[error("All credentials exhausted after {attempts} attempts: {last_error}")]
    CredentialsExhausted { attempts: usize, last_error: String },

    /// The upstream answered with a status we refuse to retry.
    #[error("Upstream rejected request (HTTP {status_code}): {message}")]
    UpstreamRejected { message: String, status_code: u16 },

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// LLM API call failed.
    #[error("LLM error (HTTP {status_code}): {message}")]
    LlmError { message: String, status_code: u16 },

    /// Page was fetched but did not contain what we needed.
    #[error("Scrape error: {0}")]
    ScrapeError(String),

    /// HTML-to-Markdown conversion failed.
    #[error("Cleaner error: {0}")]
    CleanerError(String),

    /// Publishing to the CMS failed.
    #[error("Publish error: {0}")]
    PublishError(String),

    /// Webhook notification failed.
    #[error("Notify error: {0}")]
    NotifyError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Filesystem operation failed (keyword worklist).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Returns true for errors that can never succeed by trying another
    /// credential or attempt.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AppError::ConfigError(_)
                | AppError::UpstreamRejected { .. }
                | AppError::SerializationError(_)
                | AppError::Io(_)
        )
    }

    /// Returns true if the upstream explicitly signalled quota exhaustion.
    pub fn is_quota(&self) -> bool {
        matches!(self, AppError::QuotaExhausted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_errors() {
        assert!(AppError::ConfigError("no keys".into()).is_fatal());
        assert!(!AppError::NetworkError("reset".into()).is_fatal());
        assert!(!AppError::Timeout(60).is_fatal());
        assert!(
            !AppError::LlmError {
                message: "server error".into(),
                status_code: 500,
            }
            .is_fatal()
        );
    }

    #[test]
    fn test_quota_display_carries_status() {
        let err = AppError::QuotaExhausted {
            message: "credits used up".into(),
            status_code: 402,
        };
        assert!(err.is_quota());
        assert!(err.to_string().contains("402"));
    }

    #[test]
    fn test_exhausted_display() {
        let err = AppError::CredentialsExhausted {
            attempts: 4,
            last_error: "HTTP 429".into(),
        };
        assert_eq!(
            err.to_string(),
            "All credentials exhausted after 4 attempts: HTTP 429"
        );
    }
}
