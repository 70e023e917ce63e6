use std::fmt;

use tokio_util::sync::CancellationToken;

use crate::config::PipelineConfig;
use crate::error::AppError;
use crate::extract;
use crate::models::{InternalLink, PostDraft, ProductStatus, WebhookPayload};
use crate::prompt::{self, ArticleRequest, COMPETITOR_TEXT_LIMIT};
use crate::scrape::ScrapeService;
use crate::traits::{
    Cleaner, LanguageModel, Notifier, ProductStore, ProxyOptions, Publisher, ScrapeProxy,
};
use crate::worklist::KeywordWorklist;
use crate::writer::ContentWriter;

/// Fewer keyword matches than this and the internal links are topped up
/// with the most recent posts.
const MIN_RELEVANT_LINKS: usize = 2;

/// Where a product pass stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Status,
    Scrape,
    Store,
    Generate,
    Publish,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Status => "status",
            Stage::Scrape => "scrape",
            Stage::Store => "store",
            Stage::Generate => "generate",
            Stage::Publish => "publish",
        };
        f.write_str(s)
    }
}

/// Result of one product pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductOutcome {
    Published { asin: String, link: String },
    AlreadyPublished { asin: String },
    Failed { stage: Stage, error: String },
}

/// Counters for one keyword pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordReport {
    pub keyword: String,
    pub discovered: usize,
    pub published: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Set when the search itself failed; the keyword stays unprocessed.
    pub discovery_error: Option<String>,
    pub cancelled: bool,
}

impl KeywordReport {
    fn new(keyword: &str) -> Self {
        Self {
            keyword: keyword.to_string(),
            ..Self::default()
        }
    }

    fn record(&mut self, outcome: &ProductOutcome) {
        match outcome {
            ProductOutcome::Published { .. } => self.published += 1,
            ProductOutcome::AlreadyPublished { .. } => self.skipped += 1,
            ProductOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

/// Events emitted by the pipeline for monitoring/logging.
#[derive(Debug, Clone)]
pub enum PipelineEvent<'a> {
    KeywordStarted {
        keyword: &'a str,
    },
    ProductsDiscovered {
        keyword: &'a str,
        count: usize,
    },
    DiscoveryFailed {
        keyword: &'a str,
        error: &'a str,
    },
    ProductStarted {
        url: &'a str,
    },
    ProductSkipped {
        asin: &'a str,
    },
    ProductPublished {
        asin: &'a str,
        link: &'a str,
    },
    ProductFailed {
        url: &'a str,
        stage: Stage,
        error: &'a str,
    },
    NotifyFailed {
        asin: &'a str,
        error: &'a str,
    },
    KeywordFinished {
        report: &'a KeywordReport,
    },
    /// A fatal error stopped the run; the keyword stays unprocessed.
    Aborted {
        keyword: &'a str,
        error: &'a str,
    },
    Cancelled,
}

/// Receives pipeline events.
pub trait PipelineReporter: Send + Sync {
    fn report(&self, event: PipelineEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingPipelineReporter;

impl PipelineReporter for TracingPipelineReporter {
    fn report(&self, event: PipelineEvent<'_>) {
        match event {
            PipelineEvent::KeywordStarted { keyword } => {
                tracing::info!(%keyword, "Processing keyword");
            }
            PipelineEvent::ProductsDiscovered { keyword, count } => {
                tracing::info!(%keyword, %count, "Products discovered");
            }
            PipelineEvent::DiscoveryFailed { keyword, error } => {
                tracing::error!(%keyword, %error, "Product discovery failed");
            }
            PipelineEvent::ProductStarted { url } => {
                tracing::info!(%url, "Processing product");
            }
            PipelineEvent::ProductSkipped { asin } => {
                tracing::info!(%asin, "Already published, skipping");
            }
            PipelineEvent::ProductPublished { asin, link } => {
                tracing::info!(%asin, %link, "Published");
            }
            PipelineEvent::ProductFailed { url, stage, error } => {
                tracing::warn!(%url, %stage, %error, "Product failed");
            }
            PipelineEvent::NotifyFailed { asin, error } => {
                tracing::warn!(%asin, %error, "Webhook notification failed");
            }
            PipelineEvent::KeywordFinished { report } => {
                tracing::info!(
                    keyword = %report.keyword,
                    published = report.published,
                    skipped = report.skipped,
                    failed = report.failed,
                    "Keyword done"
                );
            }
            PipelineEvent::Aborted { keyword, error } => {
                tracing::error!(%keyword, %error, "Run aborted");
            }
            PipelineEvent::Cancelled => {
                tracing::info!("Run cancelled");
            }
        }
    }
}

/// Keyword → products → article → post.
///
/// Every product is its own unit of work: a failure is recorded and the
/// run moves on to the next product.
pub struct Pipeline<P, L, C, Pb, N, S>
where
    P: ScrapeProxy,
    L: LanguageModel,
    C: Cleaner,
    Pb: Publisher,
    N: Notifier,
    S: ProductStore,
{
    scraper: ScrapeService<P>,
    writer: ContentWriter<L>,
    cleaner: C,
    publisher: Pb,
    notifier: Option<N>,
    store: S,
    config: PipelineConfig,
}

impl<P, L, C, Pb, N, S> Pipeline<P, L, C, Pb, N, S>
where
    P: ScrapeProxy,
    L: LanguageModel,
    C: Cleaner,
    Pb: Publisher,
    N: Notifier,
    S: ProductStore,
{
    pub fn new(
        scraper: ScrapeService<P>,
        writer: ContentWriter<L>,
        cleaner: C,
        publisher: Pb,
        notifier: Option<N>,
        store: S,
        config: PipelineConfig,
    ) -> Self {
        Self {
            scraper,
            writer,
            cleaner,
            publisher,
            notifier,
            store,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process the next unprocessed keyword of the worklist, if any.
    ///
    /// The keyword is marked processed once discovery succeeded, even when
    /// no products were found. A failed discovery leaves it for the next
    /// run. Fatal errors are returned and the keyword is not marked.
    pub async fn run_next<R: PipelineReporter>(
        &mut self,
        worklist: &KeywordWorklist,
        cancel: &CancellationToken,
        reporter: &R,
    ) -> Result<Option<KeywordReport>, AppError> {
        let Some(keyword) = worklist.next()? else {
            tracing::info!("No unprocessed keywords left");
            return Ok(None);
        };

        let report = self.run_keyword(&keyword, cancel, reporter).await?;
        if report.discovery_error.is_none() && !report.cancelled {
            worklist.mark_processed(&keyword)?;
        }
        Ok(Some(report))
    }

    /// Process every unprocessed keyword until the worklist is empty, the
    /// run is cancelled or a fatal error occurs.
    pub async fn run_all<R: PipelineReporter>(
        &mut self,
        worklist: &KeywordWorklist,
        cancel: &CancellationToken,
        reporter: &R,
    ) -> Result<Vec<KeywordReport>, AppError> {
        let mut reports = Vec::new();

        for keyword in worklist.pending()? {
            if !reports.is_empty() && !self.config.keyword_delay.wait(cancel).await {
                reporter.report(PipelineEvent::Cancelled);
                break;
            }
            if cancel.is_cancelled() {
                reporter.report(PipelineEvent::Cancelled);
                break;
            }

            let report = self.run_keyword(&keyword, cancel, reporter).await?;
            if report.discovery_error.is_none() && !report.cancelled {
                worklist.mark_processed(&keyword)?;
            }
            let stop = report.cancelled;
            reports.push(report);
            if stop {
                break;
            }
        }

        Ok(reports)
    }

    /// Fails when either key pool is empty, before any request is made.
    pub fn check_credentials(&self) -> Result<(), AppError> {
        for pool in [self.scraper.pool(), self.writer.pool()] {
            if pool.is_empty() {
                return Err(pool.empty_error());
            }
        }
        Ok(())
    }

    /// Discover products for `keyword` and process each of them.
    ///
    /// Per-product failures are counted in the report. Fatal errors, such as
    /// a missing credential, end the keyword with `Err`.
    pub async fn run_keyword<R: PipelineReporter>(
        &mut self,
        keyword: &str,
        cancel: &CancellationToken,
        reporter: &R,
    ) -> Result<KeywordReport, AppError> {
        if let Err(e) = self.check_credentials() {
            reporter.report(PipelineEvent::Aborted {
                keyword,
                error: &e.to_string(),
            });
            return Err(e);
        }

        let mut report = KeywordReport::new(keyword);
        reporter.report(PipelineEvent::KeywordStarted { keyword });

        let urls = match self
            .scraper
            .search(keyword, self.config.products_per_keyword)
            .await
        {
            Ok(urls) => urls,
            Err(e) if e.is_fatal() => {
                reporter.report(PipelineEvent::Aborted {
                    keyword,
                    error: &e.to_string(),
                });
                return Err(e);
            }
            Err(e) => {
                let error = e.to_string();
                reporter.report(PipelineEvent::DiscoveryFailed {
                    keyword,
                    error: &error,
                });
                report.discovery_error = Some(error);
                reporter.report(PipelineEvent::KeywordFinished { report: &report });
                return Ok(report);
            }
        };

        report.discovered = urls.len();
        reporter.report(PipelineEvent::ProductsDiscovered {
            keyword,
            count: urls.len(),
        });

        let competitor_text = self.competitor_text().await;

        for (i, url) in urls.iter().enumerate() {
            if i > 0 && !self.config.product_delay.wait(cancel).await {
                report.cancelled = true;
                reporter.report(PipelineEvent::Cancelled);
                break;
            }
            if cancel.is_cancelled() {
                report.cancelled = true;
                reporter.report(PipelineEvent::Cancelled);
                break;
            }

            let outcome = match self
                .process_url(url, keyword, competitor_text.as_deref(), reporter)
                .await
            {
                Ok(outcome) => outcome,
                Err(e) => {
                    reporter.report(PipelineEvent::Aborted {
                        keyword,
                        error: &e.to_string(),
                    });
                    return Err(e);
                }
            };
            report.record(&outcome);
        }

        reporter.report(PipelineEvent::KeywordFinished { report: &report });
        Ok(report)
    }

    /// Scrape, store, write, publish and announce one product.
    ///
    /// A stage failure becomes `ProductOutcome::Failed`; only fatal errors
    /// are returned as `Err`.
    pub async fn process_url<R: PipelineReporter>(
        &mut self,
        url: &str,
        keyword: &str,
        competitor_text: Option<&str>,
        reporter: &R,
    ) -> Result<ProductOutcome, AppError> {
        reporter.report(PipelineEvent::ProductStarted { url });

        let fail = |stage: Stage, e: AppError| {
            let error = e.to_string();
            reporter.report(PipelineEvent::ProductFailed {
                url,
                stage,
                error: &error,
            });
            if e.is_fatal() {
                Err(e)
            } else {
                Ok(ProductOutcome::Failed { stage, error })
            }
        };

        let Some(asin) = extract::extract_asin(url) else {
            let e = AppError::ScrapeError(format!("No ASIN in URL: {url}"));
            return fail(Stage::Scrape, e);
        };

        match self.store.status(&asin).await {
            Ok(ProductStatus::Published) => {
                reporter.report(PipelineEvent::ProductSkipped { asin: &asin });
                return Ok(ProductOutcome::AlreadyPublished { asin });
            }
            Ok(_) => {}
            Err(e) => return fail(Stage::Status, e),
        }

        let product = match self.scraper.product(url).await {
            Ok(p) => p,
            Err(e) => return fail(Stage::Scrape, e),
        };

        if let Err(e) = self.store.upsert(&product).await {
            return fail(Stage::Store, e);
        }

        let comparisons = self
            .store
            .similar(&asin, self.config.comparison_limit)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(%asin, error = %e, "Could not load comparison products");
                Vec::new()
            });
        let links = self.internal_links(keyword).await;

        let video = if self.config.embed_video {
            self.scraper
                .find_video(&product.title)
                .await
                .map(|id| prompt::video_embed(&id, &product.title))
        } else {
            None
        };

        let request = ArticleRequest::new(&product)
            .with_comparisons(&comparisons)
            .with_internal_links(&links)
            .with_language(&self.config.language)
            .with_competitor_text(competitor_text)
            .with_video_embed(video.as_deref());

        let article = match self.writer.write_article(&request).await {
            Ok(a) => a,
            Err(e) => return fail(Stage::Generate, e),
        };

        let draft = PostDraft {
            title: self.config.post_title(&product.title),
            html: article.html.clone(),
            featured_image_url: product.image_url.clone(),
            category_id: self.config.category_id,
        };

        let post = match self.publisher.publish(&draft).await {
            Ok(p) => p,
            Err(e) => return fail(Stage::Publish, e),
        };

        // The post is live at this point; a store failure must not hide that.
        match self.store.mark_published(&asin, &post.link).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!(%asin, "Product was already marked as published"),
            Err(e) => tracing::error!(%asin, error = %e, "Published but could not mark product"),
        }

        if self.config.notify
            && let Some(notifier) = &self.notifier
        {
            let social_caption = article
                .social
                .as_ref()
                .and_then(|s| s.tweet.clone())
                .unwrap_or_else(|| draft.title.clone());
            let payload = WebhookPayload {
                title: draft.title.clone(),
                amazon_link: product.product_url.clone(),
                image_url: product.image_url.clone(),
                social_caption,
                category: self.config.webhook_category.clone(),
                long_description: article.html,
            };
            if let Err(e) = notifier.notify(&payload).await {
                reporter.report(PipelineEvent::NotifyFailed {
                    asin: &asin,
                    error: &e.to_string(),
                });
            }
        }

        reporter.report(PipelineEvent::ProductPublished {
            asin: &asin,
            link: &post.link,
        });
        Ok(ProductOutcome::Published {
            asin,
            link: post.link,
        })
    }

    /// Posts about `keyword`, topped up with the latest posts when too few
    /// match. Store errors give an empty list.
    pub async fn internal_links(&self, keyword: &str) -> Vec<InternalLink> {
        let limit = self.config.internal_link_limit;
        let mut links = self
            .store
            .matching_links(keyword, limit)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(%keyword, error = %e, "Could not load matching links");
                Vec::new()
            });

        if links.len() < MIN_RELEVANT_LINKS {
            match self.store.recent_links(limit).await {
                Ok(recent) => {
                    for link in recent {
                        if links.len() >= limit {
                            break;
                        }
                        if !links.iter().any(|l| l.link == link.link) {
                            links.push(link);
                        }
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Could not load recent links"),
            }
        }

        links
    }

    /// Cleaned text of the configured competitor page, fetched once per
    /// keyword.
    async fn competitor_text(&mut self) -> Option<String> {
        let url = self.config.competitor_url.clone()?;
        let options = ProxyOptions::browser();
        let html = match self.scraper.fetch_page(&url, &options).await {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!(%url, error = %e, "Competitor page unavailable");
                return None;
            }
        };
        match self.cleaner.clean(&html) {
            Ok(text) => Some(prompt::truncate_chars(&text, COMPETITOR_TEXT_LIMIT).to_string()),
            Err(e) => {
                tracing::warn!(%url, error = %e, "Could not clean competitor page");
                None
            }
        }
    }
}
