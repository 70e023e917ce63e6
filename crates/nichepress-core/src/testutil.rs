//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    ComparisonProduct, InternalLink, PostDraft, ProductRecord, ProductStatus, PublishedPost,
    ScrapedProduct, WebhookPayload,
};
use crate::pipeline::{PipelineEvent, PipelineReporter};
use crate::traits::{
    Cleaner, LanguageModel, Notifier, ProductStore, ProxyOptions, Publisher, ScrapeProxy,
};

// ---------------------------------------------------------------------------
// MockProxy
// ---------------------------------------------------------------------------

/// One recorded proxy request.
#[derive(Debug, Clone)]
pub struct ProxyCall {
    pub url: String,
    pub key: String,
    pub options: ProxyOptions,
}

/// Mock scraping proxy. Queued responses are returned first, then the
/// fallback page on every further call.
#[derive(Clone)]
pub struct MockProxy {
    responses: Arc<Mutex<Vec<Result<String, AppError>>>>,
    fallback: String,
    calls: Arc<Mutex<Vec<ProxyCall>>>,
}

impl MockProxy {
    /// Always returns `html`.
    pub fn new(html: &str) -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            fallback: html.to_string(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_responses(responses: Vec<Result<String, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            fallback: "<html><body>default</body></html>".to_string(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Vec<ProxyCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl ScrapeProxy for MockProxy {
    async fn fetch_once(
        &self,
        url: &str,
        api_key: &str,
        options: &ProxyOptions,
    ) -> Result<String, AppError> {
        self.calls.lock().unwrap().push(ProxyCall {
            url: url.to_string(),
            key: api_key.to_string(),
            options: options.clone(),
        });
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(self.fallback.clone())
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockLlm
// ---------------------------------------------------------------------------

/// One recorded generation request.
#[derive(Debug, Clone)]
pub struct LlmCall {
    pub key: String,
    pub model: String,
    pub system: Option<String>,
    pub prompt: String,
}

/// Mock language model with queued responses and a fixed model list.
#[derive(Clone)]
pub struct MockLlm {
    responses: Arc<Mutex<Vec<Result<String, AppError>>>>,
    fallback: String,
    models: Vec<String>,
    pub generate_calls: Arc<Mutex<Vec<LlmCall>>>,
}

impl MockLlm {
    /// Always returns `text`.
    pub fn new(text: &str) -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            fallback: text.to_string(),
            models: Vec::new(),
            generate_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_responses(responses: Vec<Result<String, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            fallback: "<p>default</p>".to_string(),
            models: Vec::new(),
            generate_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Models reported by `list_models`.
    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.models = models;
        self
    }
}

impl LanguageModel for MockLlm {
    async fn generate(
        &self,
        api_key: &str,
        model: &str,
        system: Option<&str>,
        prompt: &str,
    ) -> Result<String, AppError> {
        self.generate_calls.lock().unwrap().push(LlmCall {
            key: api_key.to_string(),
            model: model.to_string(),
            system: system.map(str::to_string),
            prompt: prompt.to_string(),
        });
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(self.fallback.clone())
        } else {
            responses.remove(0)
        }
    }

    async fn list_models(&self, _api_key: &str) -> Result<Vec<String>, AppError> {
        Ok(self.models.clone())
    }
}

// ---------------------------------------------------------------------------
// MockCleaner
// ---------------------------------------------------------------------------

/// Mock cleaner that returns its input unchanged.
#[derive(Clone)]
pub struct MockCleaner {
    error: Arc<Mutex<Option<AppError>>>,
}

impl MockCleaner {
    pub fn passthrough() -> Self {
        Self {
            error: Arc::new(Mutex::new(None)),
        }
    }

    /// Fails once with `error`.
    pub fn with_error(error: AppError) -> Self {
        Self {
            error: Arc::new(Mutex::new(Some(error))),
        }
    }
}

impl Cleaner for MockCleaner {
    fn clean(&self, html: &str) -> Result<String, AppError> {
        if let Some(e) = self.error.lock().unwrap().take() {
            return Err(e);
        }
        Ok(html.to_string())
    }
}

// ---------------------------------------------------------------------------
// MockPublisher
// ---------------------------------------------------------------------------

/// Records drafts and hands out sequential post ids.
#[derive(Clone, Default)]
pub struct MockPublisher {
    drafts: Arc<Mutex<Vec<PostDraft>>>,
    error: Arc<Mutex<Option<AppError>>>,
}

impl MockPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next publish with `error`.
    pub fn fail_with(&self, error: AppError) {
        *self.error.lock().unwrap() = Some(error);
    }

    pub fn drafts(&self) -> Vec<PostDraft> {
        self.drafts.lock().unwrap().clone()
    }
}

impl Publisher for MockPublisher {
    async fn publish(&self, draft: &PostDraft) -> Result<PublishedPost, AppError> {
        if let Some(e) = self.error.lock().unwrap().take() {
            return Err(e);
        }
        let mut drafts = self.drafts.lock().unwrap();
        drafts.push(draft.clone());
        let id = drafts.len() as u64;
        Ok(PublishedPost {
            id,
            link: format!("https://blog.example/?p={id}"),
        })
    }
}

// ---------------------------------------------------------------------------
// MockNotifier
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct MockNotifier {
    payloads: Arc<Mutex<Vec<WebhookPayload>>>,
    error: Arc<Mutex<Option<AppError>>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next notification with `error`.
    pub fn fail_with(&self, error: AppError) {
        *self.error.lock().unwrap() = Some(error);
    }

    pub fn payloads(&self) -> Vec<WebhookPayload> {
        self.payloads.lock().unwrap().clone()
    }
}

impl Notifier for MockNotifier {
    async fn notify(&self, payload: &WebhookPayload) -> Result<(), AppError> {
        if let Some(e) = self.error.lock().unwrap().take() {
            return Err(e);
        }
        self.payloads.lock().unwrap().push(payload.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockStore
// ---------------------------------------------------------------------------

/// In-memory product store with the same upsert and publish rules as the
/// database.
#[derive(Clone, Default)]
pub struct MockStore {
    records: Arc<Mutex<Vec<ProductRecord>>>,
    /// ASINs in the order they were published.
    published: Arc<Mutex<Vec<String>>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, product: &ScrapedProduct) {
        let mut records = self.records.lock().unwrap();
        upsert_record(&mut records, product);
    }

    pub fn insert_published(&self, product: &ScrapedProduct, post_url: &str) {
        self.insert(product);
        self.flip(&product.asin, post_url);
    }

    pub fn status_of(&self, asin: &str) -> ProductStatus {
        let records = self.records.lock().unwrap();
        status_for(&records, asin)
    }

    pub fn post_url_of(&self, asin: &str) -> Option<String> {
        let records = self.records.lock().unwrap();
        records
            .iter()
            .find(|r| r.asin == asin)
            .and_then(|r| r.post_url.clone())
    }

    fn flip(&self, asin: &str, post_url: &str) -> bool {
        let mut records = self.records.lock().unwrap();
        let Some(record) = records
            .iter_mut()
            .find(|r| r.asin == asin && !r.is_published)
        else {
            return false;
        };
        record.is_published = true;
        record.post_url = Some(post_url.to_string());
        record.updated_at = Utc::now();
        self.published.lock().unwrap().push(asin.to_string());
        true
    }

    fn links_newest_first(&self) -> Vec<InternalLink> {
        let records = self.records.lock().unwrap();
        let published = self.published.lock().unwrap();
        published
            .iter()
            .rev()
            .filter_map(|asin| records.iter().find(|r| &r.asin == asin))
            .filter_map(|r| {
                r.post_url.as_ref().map(|link| InternalLink {
                    title: r.title.clone(),
                    link: link.clone(),
                })
            })
            .collect()
    }
}

fn upsert_record(records: &mut Vec<ProductRecord>, product: &ScrapedProduct) -> ProductRecord {
    if let Some(existing) = records.iter_mut().find(|r| r.asin == product.asin) {
        existing.title = product.title.clone();
        existing.price = product.price.clone();
        existing.rating = product.rating.clone();
        existing.review_count = product.review_count.clone();
        existing.image_url = product.image_url.clone();
        existing.product_url = product.product_url.clone();
        existing.updated_at = Utc::now();
        return existing.clone();
    }
    let now = Utc::now();
    let record = ProductRecord {
        id: Uuid::new_v4(),
        asin: product.asin.clone(),
        title: product.title.clone(),
        price: product.price.clone(),
        rating: product.rating.clone(),
        review_count: product.review_count.clone(),
        image_url: product.image_url.clone(),
        product_url: product.product_url.clone(),
        is_published: false,
        post_url: None,
        created_at: now,
        updated_at: now,
    };
    records.push(record.clone());
    record
}

fn status_for(records: &[ProductRecord], asin: &str) -> ProductStatus {
    match records.iter().find(|r| r.asin == asin) {
        None => ProductStatus::Unknown,
        Some(r) if r.is_published => ProductStatus::Published,
        Some(_) => ProductStatus::Scraped,
    }
}

impl ProductStore for MockStore {
    async fn status(&self, asin: &str) -> Result<ProductStatus, AppError> {
        Ok(self.status_of(asin))
    }

    async fn upsert(&self, product: &ScrapedProduct) -> Result<ProductRecord, AppError> {
        let mut records = self.records.lock().unwrap();
        Ok(upsert_record(&mut records, product))
    }

    async fn mark_published(&self, asin: &str, post_url: &str) -> Result<bool, AppError> {
        Ok(self.flip(asin, post_url))
    }

    async fn similar(&self, asin: &str, limit: usize) -> Result<Vec<ComparisonProduct>, AppError> {
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .filter(|r| r.asin != asin)
            .take(limit)
            .map(|r| ComparisonProduct {
                title: r.title.clone(),
                price: r.price.clone(),
                rating: r.rating.clone(),
            })
            .collect())
    }

    async fn recent_links(&self, limit: usize) -> Result<Vec<InternalLink>, AppError> {
        Ok(self.links_newest_first().into_iter().take(limit).collect())
    }

    async fn matching_links(
        &self,
        keyword: &str,
        limit: usize,
    ) -> Result<Vec<InternalLink>, AppError> {
        let words: Vec<String> = keyword
            .split_whitespace()
            .map(|w| w.to_lowercase())
            .collect();
        Ok(self
            .links_newest_first()
            .into_iter()
            .filter(|l| contains_in_order(&l.title.to_lowercase(), &words))
            .take(limit)
            .collect())
    }
}

// Mirrors `ILIKE '%w1%w2%'`.
fn contains_in_order(haystack: &str, words: &[String]) -> bool {
    let mut rest = haystack;
    for word in words {
        match rest.find(word.as_str()) {
            Some(idx) => rest = &rest[idx + word.len()..],
            None => return false,
        }
    }
    true
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Records pipeline events as short labels, e.g. `failed:scrape`.
#[derive(Default)]
pub struct MockReporter {
    events: Arc<Mutex<Vec<String>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl PipelineReporter for MockReporter {
    fn report(&self, event: PipelineEvent<'_>) {
        let label = match &event {
            PipelineEvent::KeywordStarted { keyword } => format!("keyword:{keyword}"),
            PipelineEvent::ProductsDiscovered { count, .. } => format!("discovered:{count}"),
            PipelineEvent::DiscoveryFailed { .. } => "discovery_failed".to_string(),
            PipelineEvent::ProductStarted { url } => format!("product:{url}"),
            PipelineEvent::ProductSkipped { asin } => format!("skipped:{asin}"),
            PipelineEvent::ProductPublished { asin, .. } => format!("published:{asin}"),
            PipelineEvent::ProductFailed { stage, .. } => format!("failed:{stage}"),
            PipelineEvent::NotifyFailed { asin, .. } => format!("notify_failed:{asin}"),
            PipelineEvent::KeywordFinished { .. } => "keyword_done".to_string(),
            PipelineEvent::Aborted { keyword, .. } => format!("aborted:{keyword}"),
            PipelineEvent::Cancelled => "cancelled".to_string(),
        };
        self.events.lock().unwrap().push(label);
    }
}
