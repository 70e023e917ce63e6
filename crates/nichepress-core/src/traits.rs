use std::future::Future;

use crate::error::AppError;
use crate::models::{
    ComparisonProduct, InternalLink, PostDraft, ProductRecord, ProductStatus, PublishedPost,
    ScrapedProduct, WebhookPayload,
};

/// Per-request options for the scraping proxy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyOptions {
    /// Render the page in a headless browser on the proxy side.
    pub browser: bool,
    /// e.g. `"residential"`.
    pub proxy_type: Option<String>,
    /// e.g. `"US"`.
    pub proxy_country: Option<String>,
}

impl ProxyOptions {
    pub fn browser() -> Self {
        Self {
            browser: true,
            ..Self::default()
        }
    }

    pub fn plain() -> Self {
        Self::default()
    }

    /// Residential US exit, browser rendering. Needed for search engines.
    pub fn residential_us() -> Self {
        Self {
            browser: true,
            proxy_type: Some("residential".into()),
            proxy_country: Some("US".into()),
        }
    }
}

/// One keyed fetch through a scraping proxy. Retries and key rotation are
/// handled by the caller.
pub trait ScrapeProxy: Send + Sync + Clone {
    fn fetch_once(
        &self,
        url: &str,
        api_key: &str,
        options: &ProxyOptions,
    ) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// One keyed call to a text-generation API.
pub trait LanguageModel: Send + Sync + Clone {
    /// Generate text with `model`. `system` is prepended as instructions.
    fn generate(
        &self,
        api_key: &str,
        model: &str,
        system: Option<&str>,
        prompt: &str,
    ) -> impl Future<Output = Result<String, AppError>> + Send;

    /// Names of models that support text generation for this key.
    fn list_models(&self, api_key: &str)
    -> impl Future<Output = Result<Vec<String>, AppError>> + Send;
}

/// Converts raw HTML into clean Markdown text.
pub trait Cleaner: Send + Sync + Clone {
    fn clean(&self, html: &str) -> Result<String, AppError>;
}

/// Publishes an article to the CMS.
pub trait Publisher: Send + Sync + Clone {
    fn publish(
        &self,
        draft: &PostDraft,
    ) -> impl Future<Output = Result<PublishedPost, AppError>> + Send;
}

/// Forwards a published post to the social automation webhook.
pub trait Notifier: Send + Sync + Clone {
    fn notify(&self, payload: &WebhookPayload)
    -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Persists scraped products and their publication state.
pub trait ProductStore: Send + Sync + Clone {
    fn status(&self, asin: &str) -> impl Future<Output = Result<ProductStatus, AppError>> + Send;

    /// Insert or update by ASIN. Never touches the publication flag.
    fn upsert(
        &self,
        product: &ScrapedProduct,
    ) -> impl Future<Output = Result<ProductRecord, AppError>> + Send;

    /// Flip the publication flag and store the post URL. Only an
    /// unpublished product can be marked; returns whether a row changed.
    fn mark_published(
        &self,
        asin: &str,
        post_url: &str,
    ) -> impl Future<Output = Result<bool, AppError>> + Send;

    /// Random other stored products, for comparison tables.
    fn similar(
        &self,
        asin: &str,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<ComparisonProduct>, AppError>> + Send;

    /// Most recently published posts.
    fn recent_links(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<InternalLink>, AppError>> + Send;

    /// Published posts whose title contains the keyword's words, newest first.
    fn matching_links(
        &self,
        keyword: &str,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<InternalLink>, AppError>> + Send;
}
