use std::time::Duration;

use crate::politeness::Politeness;

/// Knobs for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Product URLs taken from each keyword's search page.
    pub products_per_keyword: usize,
    /// Pause between products.
    pub product_delay: Politeness,
    /// Pause between keywords in a multi-keyword run.
    pub keyword_delay: Politeness,
    /// Article language.
    pub language: String,
    pub comparison_limit: usize,
    pub internal_link_limit: usize,
    /// Characters of the product title used in the post title.
    pub title_length: usize,
    /// CMS category for new posts.
    pub category_id: Option<u64>,
    /// Category label sent to the webhook.
    pub webhook_category: String,
    pub notify: bool,
    /// Look up and embed a review video.
    pub embed_video: bool,
    /// Competitor page whose text is used as a benchmark.
    pub competitor_url: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            products_per_keyword: 3,
            product_delay: Politeness::new(Duration::from_secs(5)),
            keyword_delay: Politeness::new(Duration::from_secs(5)),
            language: "English".to_string(),
            comparison_limit: 2,
            internal_link_limit: 5,
            title_length: 50,
            category_id: Some(1),
            webhook_category: "Tech".to_string(),
            notify: true,
            embed_video: true,
            competitor_url: None,
        }
    }
}

impl PipelineConfig {
    pub fn with_products_per_keyword(mut self, n: usize) -> Self {
        self.products_per_keyword = n;
        self
    }

    pub fn with_product_delay(mut self, delay: Politeness) -> Self {
        self.product_delay = delay;
        self
    }

    pub fn with_keyword_delay(mut self, delay: Politeness) -> Self {
        self.keyword_delay = delay;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_category_id(mut self, id: Option<u64>) -> Self {
        self.category_id = id;
        self
    }

    pub fn with_notify(mut self, notify: bool) -> Self {
        self.notify = notify;
        self
    }

    pub fn with_video(mut self, embed: bool) -> Self {
        self.embed_video = embed;
        self
    }

    pub fn with_competitor_url(mut self, url: Option<String>) -> Self {
        self.competitor_url = url;
        self
    }

    /// `Review: <first N chars of the title>...`
    pub fn post_title(&self, product_title: &str) -> String {
        let short = crate::prompt::truncate_chars(product_title, self.title_length);
        format!("Review: {short}...")
    }
}
