use std::time::Duration;

use nichepress_core::error::AppError;
use nichepress_core::models::WebhookPayload;
use nichepress_core::traits::Notifier;
use reqwest::{Client, StatusCode};

use crate::http::{build_client, send_error, snippet};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Posts published articles to an n8n webhook for social cross-posting.
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    webhook_url: String,
    timeout_secs: u64,
}

impl WebhookNotifier {
    pub fn new(webhook_url: &str) -> Result<Self, AppError> {
        url::Url::parse(webhook_url)
            .map_err(|e| AppError::ConfigError(format!("Invalid webhook URL: {e}")))?;
        Ok(Self {
            client: build_client(DEFAULT_TIMEOUT)?,
            webhook_url: webhook_url.to_string(),
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
        })
    }
}

impl Notifier for WebhookNotifier {
    async fn notify(&self, payload: &WebhookPayload) -> Result<(), AppError> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(payload)
            .send()
            .await
            .map_err(|e| send_error(e, self.timeout_secs))?;

        if response.status() != StatusCode::OK {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::NotifyError(format!(
                "Webhook returned HTTP {status}: {}",
                snippet(&body)
            )));
        }

        tracing::info!(title = %payload.title, "Webhook notified");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_webhook_url() {
        assert!(matches!(
            WebhookNotifier::new("not a url"),
            Err(AppError::ConfigError(_))
        ));
        assert!(WebhookNotifier::new("https://n8n.example/webhook/affiliate").is_ok());
    }

    #[test]
    fn payload_field_names() {
        let payload = WebhookPayload {
            title: "Review: Retro Stick...".into(),
            amazon_link: "https://www.amazon.com/dp/B0TEST0001".into(),
            image_url: None,
            social_caption: "Go retro".into(),
            category: "Tech".into(),
            long_description: "<p>x</p>".into(),
        };
        let value = serde_json::to_value(&payload).unwrap();
        for key in [
            "title",
            "amazon_link",
            "image_url",
            "social_caption",
            "category",
            "long_description",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
    }
}
