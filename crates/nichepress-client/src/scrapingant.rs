use std::time::Duration;

use nichepress_core::error::AppError;
use nichepress_core::traits::{ProxyOptions, ScrapeProxy};
use reqwest::{Client, StatusCode};

use crate::http::{build_client, send_error, snippet};

const DEFAULT_ENDPOINT: &str = "https://api.scrapingant.com/v2/general";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// ScrapingAnt general endpoint. Each call uses the key it is given;
/// rotation happens in the caller.
#[derive(Clone)]
pub struct ScrapingAntClient {
    client: Client,
    endpoint: String,
    timeout_secs: u64,
    abort_on_unexpected_status: bool,
}

impl ScrapingAntClient {
    pub fn new() -> Result<Self, AppError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, AppError> {
        Ok(Self {
            client: build_client(timeout)?,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: timeout.as_secs(),
            abort_on_unexpected_status: false,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Treat statuses other than 200, 402 and 429 as fatal instead of
    /// moving on to the next key.
    pub fn abort_on_unexpected_status(mut self, abort: bool) -> Self {
        self.abort_on_unexpected_status = abort;
        self
    }
}

/// Query parameters for one request.
fn query_params<'a>(url: &'a str, options: &'a ProxyOptions) -> Vec<(&'static str, &'a str)> {
    let mut params = vec![
        ("url", url),
        ("browser", if options.browser { "true" } else { "false" }),
    ];
    if let Some(t) = &options.proxy_type {
        params.push(("proxy_type", t.as_str()));
    }
    if let Some(c) = &options.proxy_country {
        params.push(("proxy_country", c.as_str()));
    }
    params
}

/// Map a non-200 response to an error the retry loop understands.
fn status_error(status: StatusCode, body: &str, abort_on_unexpected: bool) -> AppError {
    let code = status.as_u16();
    let message = snippet(body).to_string();
    match status {
        StatusCode::TOO_MANY_REQUESTS | StatusCode::PAYMENT_REQUIRED => AppError::QuotaExhausted {
            message,
            status_code: code,
        },
        _ if abort_on_unexpected => AppError::UpstreamRejected {
            message,
            status_code: code,
        },
        _ => AppError::HttpError(format!("ScrapingAnt returned HTTP {code}: {message}")),
    }
}

impl ScrapeProxy for ScrapingAntClient {
    async fn fetch_once(
        &self,
        url: &str,
        api_key: &str,
        options: &ProxyOptions,
    ) -> Result<String, AppError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&query_params(url, options))
            .header("x-api-key", api_key)
            .send()
            .await
            .map_err(|e| send_error(e, self.timeout_secs))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body, self.abort_on_unexpected_status));
        }

        response
            .text()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to read response body: {e}")))
    }
}
