pub mod cleaner;
pub mod gemini;
mod http;
pub mod n8n;
pub mod scrapingant;
pub mod wordpress;

pub use cleaner::HtmdCleaner;
pub use gemini::GeminiClient;
pub use n8n::WebhookNotifier;
pub use scrapingant::ScrapingAntClient;
pub use wordpress::WordPressPublisher;
