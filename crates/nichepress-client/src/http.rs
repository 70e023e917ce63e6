//! Shared reqwest plumbing for the adapters.

use std::time::Duration;

use nichepress_core::error::AppError;
use reqwest::Client;

pub(crate) const USER_AGENT: &str = "nichepress/0.1";

pub(crate) fn build_client(timeout: Duration) -> Result<Client, AppError> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::HttpError(e.to_string()))
}

/// Map a transport-level reqwest error into the app taxonomy.
pub(crate) fn send_error(e: reqwest::Error, timeout_secs: u64) -> AppError {
    if e.is_timeout() {
        AppError::Timeout(timeout_secs)
    } else if e.is_connect() {
        AppError::NetworkError(format!("Connection failed: {e}"))
    } else {
        AppError::HttpError(e.to_string())
    }
}

/// Cut a response body down for error messages.
pub(crate) fn snippet(body: &str) -> &str {
    match body.char_indices().nth(300) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_limits_long_bodies() {
        let body = "é".repeat(500);
        assert_eq!(snippet(&body).chars().count(), 300);
        assert_eq!(snippet("short"), "short");
    }
}
