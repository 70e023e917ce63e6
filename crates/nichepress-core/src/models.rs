use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Product data as scraped from a marketplace page.
///
/// Text fields keep the marketplace's own formatting ("$29.99",
/// "4.5 out of 5 stars", "1,234 ratings").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedProduct {
    pub asin: String,
    pub title: String,
    pub price: String,
    pub rating: String,
    pub review_count: String,
    pub image_url: Option<String>,
    pub product_url: String,
}

/// A product row as persisted in the store.
#[derive(Debug, Clone, Serialize)]
pub struct ProductRecord {
    pub id: Uuid,
    pub asin: String,
    pub title: String,
    pub price: String,
    pub rating: String,
    pub review_count: String,
    pub image_url: Option<String>,
    pub product_url: String,
    pub is_published: bool,
    pub post_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Whether a product is known and whether it has been published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    /// Never scraped.
    Unknown,
    /// Stored but no post yet.
    Scraped,
    Published,
}

/// Another stored product, offered to the model for a comparison table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonProduct {
    pub title: String,
    pub price: String,
    pub rating: String,
}

/// An already-published post the article may link to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalLink {
    pub title: String,
    pub link: String,
}

/// Short-form captions generated alongside the article.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialBundle {
    #[serde(default)]
    pub tweet: Option<String>,
    #[serde(default)]
    pub pinterest_title: Option<String>,
    #[serde(default)]
    pub pinterest_desc: Option<String>,
    #[serde(default)]
    pub linkedin: Option<String>,
}

/// An article produced by the model: HTML body plus optional captions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedArticle {
    pub html: String,
    pub social: Option<SocialBundle>,
    /// The model that produced the text.
    pub model: String,
}

/// A post ready to be sent to the CMS.
#[derive(Debug, Clone, Serialize)]
pub struct PostDraft {
    pub title: String,
    pub html: String,
    pub featured_image_url: Option<String>,
    pub category_id: Option<u64>,
}

/// The CMS's answer to a successful publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedPost {
    pub id: u64,
    pub link: String,
}

/// Body sent to the social automation webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub title: String,
    pub amazon_link: String,
    pub image_url: Option<String>,
    pub social_caption: String,
    pub category: String,
    pub long_description: String,
}

/// Compute a SHA-256 hash of a string, returned as 64-char hex.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_hash_consistency() {
        let h1 = compute_hash("hello world");
        let h2 = compute_hash("hello world");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn test_social_bundle_tolerates_missing_fields() {
        let bundle: SocialBundle = serde_json::from_str(r#"{"tweet": "Go retro!"}"#).unwrap();
        assert_eq!(bundle.tweet.as_deref(), Some("Go retro!"));
        assert!(bundle.linkedin.is_none());
    }

    #[test]
    fn test_product_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ProductStatus::Published).unwrap(),
            "\"published\""
        );
    }
}
