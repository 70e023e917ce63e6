use std::sync::LazyLock;

use regex::Regex;

use crate::credentials::CredentialPool;
use crate::error::AppError;
use crate::models::{GeneratedArticle, SocialBundle};
use crate::prompt::{self, ArticleRequest};
use crate::retry::{FailureKind, QuotaAwareInvoker, RetryPolicy, classify};
use crate::traits::LanguageModel;

/// Models tried in order before falling back to discovery.
pub const DEFAULT_MODELS: &[&str] = &[
    "gemini-1.5-flash",
    "gemini-1.5-pro",
    "gemini-1.0-pro",
    "gemini-pro",
];

static SOCIAL_JSON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```json\s*(\{.*?\})\s*```").expect("valid social block pattern")
});

/// Drafts articles through a [`LanguageModel`], rotating API keys on quota
/// errors and discovering a working model per key.
pub struct ContentWriter<L: LanguageModel> {
    llm: L,
    pool: CredentialPool,
    invoker: QuotaAwareInvoker,
    models: Vec<String>,
    /// Last model that produced text; tried first next time.
    resolved_model: Option<String>,
}

impl<L: LanguageModel> ContentWriter<L> {
    pub fn new(llm: L, pool: CredentialPool) -> Self {
        Self {
            llm,
            pool,
            invoker: QuotaAwareInvoker::new(RetryPolicy::default()),
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            resolved_model: None,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.invoker = QuotaAwareInvoker::new(policy);
        self
    }

    /// Replace the preferred model list.
    pub fn with_models(mut self, models: Vec<String>) -> Self {
        if !models.is_empty() {
            self.models = models;
        }
        self
    }

    pub fn pool(&self) -> &CredentialPool {
        &self.pool
    }

    pub fn resolved_model(&self) -> Option<&str> {
        self.resolved_model.as_deref()
    }

    /// Generate a review article. Either a complete article comes back or an
    /// error does; a partial article is never returned.
    pub async fn write_article(
        &mut self,
        request: &ArticleRequest<'_>,
    ) -> Result<GeneratedArticle, AppError> {
        let system = prompt::system_instruction(request.language);
        let user = prompt::article_prompt(request);

        let (model, raw) = self
            .generate(Some(&system), &user, &request.product.asin)
            .await?;

        let (html, social) = postprocess(&raw);
        if html.is_empty() {
            return Err(AppError::LlmError {
                message: "Model returned no article body".into(),
                status_code: 200,
            });
        }

        tracing::info!(
            asin = %request.product.asin,
            %model,
            bytes = html.len(),
            social = social.is_some(),
            "Article generated"
        );

        Ok(GeneratedArticle {
            html,
            social,
            model,
        })
    }

    /// Ask the model for the target keywords behind a list of headings.
    pub async fn suggest_keywords(&mut self, headings: &[String]) -> Result<Vec<String>, AppError> {
        let user = prompt::keyword_spy_prompt(headings);
        let (_, raw) = self.generate(None, &user, "keyword-spy").await?;
        let cleaned = raw.replace("```json", "").replace("```", "");
        Ok(serde_json::from_str(cleaned.trim())?)
    }

    /// Run one prompt through the key pool. Returns `(model, text)`.
    pub async fn generate(
        &mut self,
        system: Option<&str>,
        prompt: &str,
        label: &str,
    ) -> Result<(String, String), AppError> {
        let candidates = self.candidate_models();
        let llm = &self.llm;
        let candidates = &candidates;

        let (model, text) = self
            .invoker
            .invoke(&mut self.pool, label, |key| async move {
                generate_with_discovery(llm, &key, candidates, system, prompt).await
            })
            .await?;

        self.resolved_model = Some(model.clone());
        Ok((model, text))
    }

    fn candidate_models(&self) -> Vec<String> {
        let mut models = Vec::with_capacity(self.models.len() + 1);
        if let Some(resolved) = &self.resolved_model {
            models.push(resolved.clone());
        }
        for m in &self.models {
            if !models.contains(m) {
                models.push(m.clone());
            }
        }
        models
    }
}

/// Try each candidate model with one key, then ask the API which models the
/// key can use.
///
/// Quota and fatal errors are returned immediately so the caller rotates the
/// key. "Not found" errors just move on to the next model.
async fn generate_with_discovery<L: LanguageModel>(
    llm: &L,
    key: &str,
    candidates: &[String],
    system: Option<&str>,
    prompt: &str,
) -> Result<(String, String), AppError> {
    let mut last_error = None;

    for model in candidates {
        match llm.generate(key, model, system, prompt).await {
            Ok(text) if !text.trim().is_empty() => return Ok((model.clone(), text)),
            Ok(_) => {
                last_error = Some(AppError::LlmError {
                    message: format!("Empty response from {model}"),
                    status_code: 200,
                });
            }
            Err(e) => match classify(&e) {
                FailureKind::QuotaExhausted | FailureKind::Fatal => return Err(e),
                FailureKind::Transient if is_not_found(&e) => {
                    tracing::debug!(%model, "Model not available, trying next");
                }
                FailureKind::Transient => last_error = Some(e),
            },
        }
    }

    tracing::warn!("Preferred models failed, discovering models for this key");
    let available = llm.list_models(key).await?;

    let Some(model) = pick_model(&available) else {
        return Err(last_error.unwrap_or_else(|| AppError::LlmError {
            message: "No text generation model available for this key".into(),
            status_code: 200,
        }));
    };

    tracing::info!(%model, "Auto-selected model");
    let text = llm.generate(key, model, system, prompt).await?;
    if text.trim().is_empty() {
        return Err(AppError::LlmError {
            message: format!("Empty response from {model}"),
            status_code: 200,
        });
    }
    Ok((model.to_string(), text))
}

/// Prefer a "flash" model, else the first one listed.
pub fn pick_model(available: &[String]) -> Option<&str> {
    available
        .iter()
        .find(|m| m.contains("flash"))
        .or_else(|| available.first())
        .map(String::as_str)
}

fn is_not_found(error: &AppError) -> bool {
    let text = error.to_string().to_lowercase();
    text.contains("404") || text.contains("not found")
}

/// Split the model output into the HTML body and the optional social
/// bundle, and strip Markdown fences around the HTML.
pub fn postprocess(raw: &str) -> (String, Option<SocialBundle>) {
    let mut content = raw.to_string();
    let mut social = None;

    if let Some(caps) = SOCIAL_JSON_RE.captures(raw) {
        match serde_json::from_str::<SocialBundle>(&caps[1]) {
            Ok(bundle) => {
                social = Some(bundle);
                content = content.replace(&caps[0], "");
            }
            Err(e) => tracing::debug!(error = %e, "Ignoring invalid social JSON block"),
        }
    }

    (strip_code_fences(&content), social)
}

fn strip_code_fences(content: &str) -> String {
    let trimmed = content.trim();
    let unwrapped = if trimmed.starts_with("```html") {
        trimmed.replace("```html", "").replace("```", "")
    } else {
        trimmed.to_string()
    };
    unwrapped.trim().trim_matches('`').trim().to_string()
}
