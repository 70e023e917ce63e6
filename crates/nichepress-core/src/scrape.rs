use url::Url;

use crate::credentials::CredentialPool;
use crate::error::AppError;
use crate::extract::{self, SERP_BLOCK_MARKER, SerpRank};
use crate::models::ScrapedProduct;
use crate::retry::{QuotaAwareInvoker, RetryPolicy};
use crate::traits::{ProxyOptions, ScrapeProxy};

/// Fetches pages through a keyed scraping proxy and parses them.
///
/// Each fetch walks the key pool once at most: a key that fails is skipped
/// and the next one tried, so total attempts never exceed the pool size.
pub struct ScrapeService<P: ScrapeProxy> {
    proxy: P,
    pool: CredentialPool,
    invoker: QuotaAwareInvoker,
}

impl<P: ScrapeProxy> ScrapeService<P> {
    pub fn new(proxy: P, pool: CredentialPool) -> Self {
        Self {
            proxy,
            pool,
            invoker: QuotaAwareInvoker::new(RetryPolicy::single_pass()),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.invoker = QuotaAwareInvoker::new(policy);
        self
    }

    pub fn pool(&self) -> &CredentialPool {
        &self.pool
    }

    /// Raw HTML of `url`, rotating keys on failure.
    pub async fn fetch_page(
        &mut self,
        url: &str,
        options: &ProxyOptions,
    ) -> Result<String, AppError> {
        let proxy = &self.proxy;
        self.invoker
            .invoke(&mut self.pool, url, |key| async move {
                proxy.fetch_once(url, &key, options).await
            })
            .await
    }

    /// Scrape a product detail page. URLs without an ASIN are rejected
    /// before any request is made.
    pub async fn product(&mut self, url: &str) -> Result<ScrapedProduct, AppError> {
        let asin = extract::extract_asin(url)
            .ok_or_else(|| AppError::ScrapeError(format!("No ASIN in URL: {url}")))?;

        let html = self.fetch_page(url, &ProxyOptions::browser()).await?;
        let product = extract::parse_product_page(&html, &asin, url);

        tracing::info!(%asin, title = %product.title, "Scraped product");
        Ok(product)
    }

    /// Up to `limit` product URLs from the marketplace search for `keyword`.
    pub async fn search(&mut self, keyword: &str, limit: usize) -> Result<Vec<String>, AppError> {
        let url = extract::search_url(keyword)?;
        let html = self.fetch_page(&url, &ProxyOptions::browser()).await?;
        let urls = extract::parse_search_results(&html, limit);

        tracing::info!(%keyword, found = urls.len(), "Marketplace search done");
        Ok(urls)
    }

    /// h1-h3 headings of a competitor page. An empty result is an error.
    pub async fn headings(&mut self, url: &str) -> Result<Vec<String>, AppError> {
        let html = self.fetch_page(url, &ProxyOptions::browser()).await?;
        let headings = extract::parse_headings(&html);
        if headings.is_empty() {
            return Err(AppError::ScrapeError(format!("No headings found on {url}")));
        }
        Ok(headings)
    }

    /// First review video for a product title. Any failure is logged and
    /// reported as "no video".
    pub async fn find_video(&mut self, product_title: &str) -> Option<String> {
        let url = extract::video_search_url(product_title).ok()?;
        match self.fetch_page(&url, &ProxyOptions::browser()).await {
            Ok(html) => extract::find_video_id(&html),
            Err(e) => {
                tracing::debug!(error = %e, "Video lookup failed");
                None
            }
        }
    }

    /// Rank of `domain` in the first 100 Google results for `keyword`.
    pub async fn check_rank(&mut self, keyword: &str, domain: &str) -> Result<SerpRank, AppError> {
        let serp_url = Url::parse_with_params(
            "https://www.google.com/search",
            &[("q", keyword), ("num", "100"), ("hl", "en"), ("gl", "us")],
        )
        .map_err(|e| AppError::ConfigError(format!("Invalid search URL: {e}")))?;
        let serp_url = serp_url.as_str();

        let options = ProxyOptions::residential_us();
        let proxy = &self.proxy;
        let options = &options;

        // A block page is a failed attempt for this key.
        let html = self
            .invoker
            .invoke(&mut self.pool, keyword, |key| async move {
                let html = proxy.fetch_once(serp_url, &key, options).await?;
                if html.contains(SERP_BLOCK_MARKER) {
                    return Err(AppError::ScrapeError("Search engine served a block page".into()));
                }
                Ok(html)
            })
            .await?;

        let rank = extract::rank_domain(&html, domain);
        tracing::info!(%keyword, %domain, rank = ?rank.rank, scanned = rank.scanned, "Rank check done");
        Ok(rank)
    }
}
