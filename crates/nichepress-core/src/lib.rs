pub mod config;
pub mod credentials;
pub mod error;
pub mod extract;
pub mod models;
pub mod pipeline;
pub mod politeness;
pub mod prompt;
pub mod retry;
pub mod scrape;
pub mod traits;
pub mod worklist;
pub mod writer;

#[cfg(test)]
pub mod testutil;

pub use config::PipelineConfig;
pub use credentials::CredentialPool;
pub use error::AppError;
pub use models::{GeneratedArticle, ProductStatus, ScrapedProduct, compute_hash};
pub use pipeline::{KeywordReport, Pipeline, PipelineReporter, TracingPipelineReporter};
pub use retry::{FailureKind, QuotaAwareInvoker, RetryPolicy, UnknownFailurePolicy, classify};
pub use scrape::ScrapeService;
pub use traits::{Cleaner, LanguageModel, Notifier, ProductStore, Publisher, ScrapeProxy};
pub use worklist::KeywordWorklist;
pub use writer::ContentWriter;
