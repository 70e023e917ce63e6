use std::time::Duration;

use nichepress_core::error::AppError;
use nichepress_core::models::{PostDraft, PublishedPost};
use nichepress_core::traits::Publisher;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::http::{build_client, send_error, snippet};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Publishes posts through the WordPress REST API with an application
/// password.
#[derive(Clone)]
pub struct WordPressPublisher {
    client: Client,
    site_url: String,
    username: String,
    app_password: String,
    timeout_secs: u64,
}

impl WordPressPublisher {
    pub fn new(site_url: &str, username: &str, app_password: &str) -> Result<Self, AppError> {
        if site_url.trim().is_empty() || username.trim().is_empty() {
            return Err(AppError::ConfigError(
                "WordPress URL and username are required".into(),
            ));
        }
        Ok(Self {
            client: build_client(DEFAULT_TIMEOUT)?,
            site_url: site_url.trim().trim_end_matches('/').to_string(),
            username: username.to_string(),
            app_password: app_password.to_string(),
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/wp-json/wp/v2/{path}", self.site_url)
    }

    /// Download `image_url` and upload it to the media library. Returns the
    /// media id.
    pub async fn upload_media(&self, image_url: &str) -> Result<u64, AppError> {
        let image = self
            .client
            .get(image_url)
            .send()
            .await
            .map_err(|e| send_error(e, self.timeout_secs))?;

        if image.status() != StatusCode::OK {
            return Err(AppError::PublishError(format!(
                "Image download failed with HTTP {}",
                image.status().as_u16()
            )));
        }

        let content_type = image
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();
        let bytes = image
            .bytes()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to read image: {e}")))?;

        let response = self
            .client
            .post(self.endpoint("media"))
            .basic_auth(&self.username, Some(&self.app_password))
            .header(
                reqwest::header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", media_filename(image_url)),
            )
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| send_error(e, self.timeout_secs))?;

        if response.status() != StatusCode::CREATED {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::PublishError(format!(
                "Media upload failed with HTTP {status}: {}",
                snippet(&body)
            )));
        }

        let media: MediaResponse = response
            .json()
            .await
            .map_err(|e| AppError::PublishError(format!("Invalid media response: {e}")))?;
        Ok(media.id)
    }
}

#[derive(Serialize)]
struct PostBody<'a> {
    title: &'a str,
    content: &'a str,
    status: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    categories: Vec<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    featured_media: Option<u64>,
}

#[derive(Deserialize)]
struct MediaResponse {
    id: u64,
}

fn post_body(draft: &PostDraft, featured_media: Option<u64>) -> PostBody<'_> {
    PostBody {
        title: &draft.title,
        content: &draft.html,
        status: "publish",
        categories: draft.category_id.into_iter().collect(),
        featured_media,
    }
}

/// Last path segment of the image URL, without query string.
fn media_filename(image_url: &str) -> String {
    let path = image_url.split(['?', '#']).next().unwrap_or_default();
    match path.rsplit('/').next() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => "image.jpg".to_string(),
    }
}

impl Publisher for WordPressPublisher {
    async fn publish(&self, draft: &PostDraft) -> Result<PublishedPost, AppError> {
        // A missing featured image is not worth losing the post over.
        let featured_media = match &draft.featured_image_url {
            Some(url) => match self.upload_media(url).await {
                Ok(id) => Some(id),
                Err(e) => {
                    tracing::warn!(image = %url, error = %e, "Featured image upload failed");
                    None
                }
            },
            None => None,
        };

        let response = self
            .client
            .post(self.endpoint("posts"))
            .basic_auth(&self.username, Some(&self.app_password))
            .json(&post_body(draft, featured_media))
            .send()
            .await
            .map_err(|e| send_error(e, self.timeout_secs))?;

        if response.status() != StatusCode::CREATED {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::PublishError(format!(
                "Post creation failed with HTTP {status}: {}",
                snippet(&body)
            )));
        }

        let post: PublishedPost = response
            .json()
            .await
            .map_err(|e| AppError::PublishError(format!("Invalid post response: {e}")))?;

        tracing::info!(id = post.id, link = %post.link, "Post published");
        Ok(post)
    }
}
