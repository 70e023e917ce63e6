//! Keyword worklist backed by two line-delimited files.
//!
//! `keywords.txt` holds the niche keywords to cover, one per line.
//! `processed_keywords.txt` is an append-only log of keywords already
//! handled. The next keyword is the first one not yet in the log.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::AppError;

pub const KEYWORDS_FILE: &str = "keywords.txt";
pub const PROCESSED_FILE: &str = "processed_keywords.txt";

#[derive(Debug, Clone)]
pub struct KeywordWorklist {
    keywords_path: PathBuf,
    processed_path: PathBuf,
}

impl KeywordWorklist {
    pub fn new(keywords_path: impl Into<PathBuf>, processed_path: impl Into<PathBuf>) -> Self {
        Self {
            keywords_path: keywords_path.into(),
            processed_path: processed_path.into(),
        }
    }

    /// Use the default file names inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self::new(dir.join(KEYWORDS_FILE), dir.join(PROCESSED_FILE))
    }

    pub fn keywords(&self) -> Result<Vec<String>, AppError> {
        read_lines(&self.keywords_path)
    }

    /// Keywords already handled. A missing log means none.
    pub fn processed(&self) -> Result<HashSet<String>, AppError> {
        Ok(read_lines(&self.processed_path)?.into_iter().collect())
    }

    /// First keyword not yet processed.
    pub fn next(&self) -> Result<Option<String>, AppError> {
        Ok(self.pending()?.into_iter().next())
    }

    /// All unprocessed keywords, in file order.
    pub fn pending(&self) -> Result<Vec<String>, AppError> {
        let done = self.processed()?;
        Ok(self
            .keywords()?
            .into_iter()
            .filter(|k| !done.contains(k))
            .collect())
    }

    pub fn mark_processed(&self, keyword: &str) -> Result<(), AppError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.processed_path)?;
        writeln!(file, "{}", keyword.trim())?;
        tracing::debug!(%keyword, "Keyword marked as processed");
        Ok(())
    }
}

fn read_lines(path: &Path) -> Result<Vec<String>, AppError> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}
