//! Quota-aware invocation of keyed APIs.
//!
//! The upstream APIs we call (Gemini, ScrapingAnt) do not return structured
//! quota codes consistently, so failures are classified by looking at the
//! error text. All of that matching lives in [`classify`]; the retry loop in
//! [`QuotaAwareInvoker`] only acts on the resulting [`Outcome`].

use std::future::Future;
use std::time::Duration;

use crate::credentials::CredentialPool;
use crate::error::AppError;

/// Substrings (lowercase) that mark an error as quota/credit exhaustion.
pub const QUOTA_INDICATORS: &[&str] = &[
    "429",
    "quota exceeded",
    "quota",
    "resource exhausted",
    "rate limit",
    "permission denied",
    "403",
    "billing",
    "credit",
];

/// How a failed attempt should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The credential is out of quota; move on to the next one.
    QuotaExhausted,
    /// Unknown failure; may or may not be credential-specific.
    Transient,
    /// No credential or retry can fix this.
    Fatal,
}

/// Result of a single attempt, tagged by failure class.
#[derive(Debug)]
pub enum Outcome<T> {
    Success(T),
    QuotaExhausted(AppError),
    TransientFailure(AppError),
    FatalFailure(AppError),
}

impl<T> Outcome<T> {
    pub fn from_result(result: Result<T, AppError>) -> Self {
        match result {
            Ok(value) => Outcome::Success(value),
            Err(e) => match classify(&e) {
                FailureKind::QuotaExhausted => Outcome::QuotaExhausted(e),
                FailureKind::Transient => Outcome::TransientFailure(e),
                FailureKind::Fatal => Outcome::FatalFailure(e),
            },
        }
    }
}

/// Classify an error. Configuration-type errors are fatal; everything else
/// is matched case-insensitively against [`QUOTA_INDICATORS`].
pub fn classify(error: &AppError) -> FailureKind {
    if error.is_fatal() {
        return FailureKind::Fatal;
    }
    if error.is_quota() || is_quota_text(&error.to_string()) {
        FailureKind::QuotaExhausted
    } else {
        FailureKind::Transient
    }
}

/// True if `text` contains any quota indicator, ignoring case. Underscores
/// count as spaces so `RESOURCE_EXHAUSTED` matches too.
pub fn is_quota_text(text: &str) -> bool {
    let lower = text.to_lowercase().replace('_', " ");
    QUOTA_INDICATORS.iter().any(|needle| lower.contains(needle))
}

/// What to do with a failure that is neither quota nor fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownFailurePolicy {
    /// Advance to the next credential, in case the failure is key-specific.
    #[default]
    Rotate,
    /// Retry with the same credential.
    RetrySame,
}

/// Bounds and pacing for [`QuotaAwareInvoker`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Full passes over the pool. Total attempts = `pool.len() * passes`.
    pub passes: usize,
    /// Fixed sleep between attempts.
    pub backoff: Duration,
    pub on_unknown: UnknownFailurePolicy,
}

impl Default for RetryPolicy {
    /// Two passes over the pool (one extra in case a key recovers), 1s backoff.
    fn default() -> Self {
        Self {
            passes: 2,
            backoff: Duration::from_secs(1),
            on_unknown: UnknownFailurePolicy::Rotate,
        }
    }
}

impl RetryPolicy {
    /// One pass over the pool: each key is tried at most once.
    pub fn single_pass() -> Self {
        Self {
            passes: 1,
            ..Self::default()
        }
    }

    pub fn with_passes(mut self, passes: usize) -> Self {
        self.passes = passes.max(1);
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_unknown_failure_policy(mut self, policy: UnknownFailurePolicy) -> Self {
        self.on_unknown = policy;
        self
    }

    pub fn max_attempts(&self, pool_len: usize) -> usize {
        pool_len * self.passes.max(1)
    }
}

/// Runs an attempt against a [`CredentialPool`], rotating keys on failure
/// until one succeeds or the attempt budget is spent.
#[derive(Debug, Clone, Default)]
pub struct QuotaAwareInvoker {
    policy: RetryPolicy,
}

impl QuotaAwareInvoker {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Call `attempt` with the pool's current key until it succeeds.
    ///
    /// - An empty pool fails with [`AppError::ConfigError`] before `attempt`
    ///   is ever called.
    /// - Quota failures advance the pool; unknown failures follow
    ///   [`UnknownFailurePolicy`]; fatal failures are returned at once.
    /// - After `pool.len() * passes` failures, returns
    ///   [`AppError::CredentialsExhausted`].
    ///
    /// On success the pool is left pointing at the key that worked.
    pub async fn invoke<T, F, Fut>(
        &self,
        pool: &mut CredentialPool,
        label: &str,
        mut attempt: F,
    ) -> Result<T, AppError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        if pool.is_empty() {
            return Err(pool.empty_error());
        }

        let max_attempts = self.policy.max_attempts(pool.len());
        let mut last_error = String::new();

        for attempt_no in 1..=max_attempts {
            let key = pool.current()?.to_string();

            match Outcome::from_result(attempt(key).await) {
                Outcome::Success(value) => {
                    if attempt_no > 1 {
                        tracing::info!(
                            pool = %pool.name(),
                            key = %pool.position(),
                            %label,
                            attempt = attempt_no,
                            "Succeeded after rotation"
                        );
                    }
                    return Ok(value);
                }
                Outcome::FatalFailure(e) => {
                    tracing::error!(
                        pool = %pool.name(),
                        key = %pool.position(),
                        fingerprint = %pool.fingerprint(),
                        %label,
                        error = %e,
                        "Fatal error, not retrying"
                    );
                    return Err(e);
                }
                Outcome::QuotaExhausted(e) => {
                    tracing::warn!(
                        pool = %pool.name(),
                        key = %pool.position(),
                        fingerprint = %pool.fingerprint(),
                        %label,
                        error = %e,
                        "Quota exhausted on current key"
                    );
                    last_error = e.to_string();
                    pool.advance();
                }
                Outcome::TransientFailure(e) => {
                    tracing::warn!(
                        pool = %pool.name(),
                        key = %pool.position(),
                        fingerprint = %pool.fingerprint(),
                        %label,
                        error = %e,
                        attempt = attempt_no,
                        "Attempt failed"
                    );
                    last_error = e.to_string();
                    if self.policy.on_unknown == UnknownFailurePolicy::Rotate {
                        pool.advance();
                    }
                }
            }

            if attempt_no < max_attempts && !self.policy.backoff.is_zero() {
                tokio::time::sleep(self.policy.backoff).await;
            }
        }

        tracing::error!(
            pool = %pool.name(),
            %label,
            attempts = max_attempts,
            "All API keys failed"
        );

        Err(AppError::CredentialsExhausted {
            attempts: max_attempts,
            last_error,
        })
    }
}
