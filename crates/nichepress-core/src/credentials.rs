//! Rotating pool of interchangeable API keys.
//!
//! A pool is a ring: when a key runs out of quota the cursor moves on to the
//! next one, wrapping to the start after the last key. Keys are never
//! removed, only skipped for the current cycle. Each service that talks to a
//! keyed API owns its own pool, so rotating one API's keys never disturbs
//! another's.

use std::fmt;

use crate::error::AppError;
use crate::models::compute_hash;

/// An ordered, immutable set of API keys with a mutable cursor.
#[derive(Clone)]
pub struct CredentialPool {
    name: String,
    keys: Vec<String>,
    cursor: usize,
}

impl CredentialPool {
    /// Create a pool from already-split keys. Blank entries are dropped.
    pub fn new(name: impl Into<String>, keys: Vec<String>) -> Self {
        let keys = keys
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        Self {
            name: name.into(),
            keys,
            cursor: 0,
        }
    }

    /// Parse a comma-separated list, as found in `.env` files
    /// (`GEMINI_API_KEYS=key1, key2,key3`).
    pub fn from_csv(name: impl Into<String>, raw: &str) -> Self {
        Self::new(name, raw.split(',').map(str::to_string).collect())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Index of the current key, always in `[0, len)` for a non-empty pool.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The key at the cursor.
    pub fn current(&self) -> Result<&str, AppError> {
        self.keys
            .get(self.cursor)
            .map(String::as_str)
            .ok_or_else(|| self.empty_error())
    }

    /// Move the cursor to the next key, wrapping after the last one.
    pub fn advance(&mut self) {
        if self.keys.is_empty() {
            return;
        }
        self.cursor = (self.cursor + 1) % self.keys.len();
        tracing::info!(
            pool = %self.name,
            key = %self.position(),
            "Switched to next API key"
        );
    }

    /// Human-readable 1-based position, e.g. `2/3`.
    pub fn position(&self) -> String {
        format!("{}/{}", self.cursor + 1, self.keys.len())
    }

    /// Short SHA-256 fingerprint of the current key, safe to log.
    pub fn fingerprint(&self) -> String {
        self.keys
            .get(self.cursor)
            .map(|k| fingerprint(k))
            .unwrap_or_else(|| "-".to_string())
    }

    pub(crate) fn empty_error(&self) -> AppError {
        AppError::ConfigError(format!("No API keys configured for {}", self.name))
    }
}

/// First 8 hex chars of the key's SHA-256.
pub fn fingerprint(key: &str) -> String {
    compute_hash(key)[..8].to_string()
}

// Keys must never end up in logs through `{:?}`.
impl fmt::Debug for CredentialPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPool")
            .field("name", &self.name)
            .field("len", &self.keys.len())
            .field("cursor", &self.cursor)
            .finish()
    }
}
