//! Results-document retrieval.
//!
//! A contest descriptor's `source` is either a local path or an http(s) URL.
//! Each document is read once with a blocking call; there are no retries.
//! The trait exists so tests can serve fixture pages without touching disk
//! or network.

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::error::DataError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentLocation {
    Path(PathBuf),
    Url(String),
}

impl DocumentLocation {
    /// Classify `raw`; relative paths resolve against `base_dir` when given.
    pub fn parse(raw: &str, base_dir: Option<&Path>) -> Self {
        let trimmed = raw.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            return DocumentLocation::Url(trimmed.to_string());
        }
        let path = PathBuf::from(trimmed);
        match base_dir {
            Some(base) if path.is_relative() => DocumentLocation::Path(base.join(path)),
            _ => DocumentLocation::Path(path),
        }
    }
}

impl std::fmt::Display for DocumentLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentLocation::Path(p) => write!(f, "{}", p.display()),
            DocumentLocation::Url(u) => f.write_str(u),
        }
    }
}

/// Source of results documents.
pub trait DocumentFetcher {
    fn fetch(&self, location: &DocumentLocation) -> Result<String, DataError>;
}

/// Reads local files directly and fetches URLs with a blocking HTTP client.
pub struct BlockingFetcher {
    client: reqwest::blocking::Client,
}

impl BlockingFetcher {
    pub fn new() -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("primarylab/0.1")
            .build()
            .map_err(|e| DataError::Fetch {
                location: "http client".into(),
                reason: e.to_string(),
            })?;
        Ok(Self { client })
    }

    fn fetch_url(&self, url: &str) -> Result<String, DataError> {
        let fetch_err = |e: reqwest::Error| DataError::Fetch {
            location: url.to_string(),
            reason: e.to_string(),
        };
        tracing::info!(url, "fetching results page");
        self.client
            .get(url)
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.text())
            .map_err(fetch_err)
    }
}

impl DocumentFetcher for BlockingFetcher {
    fn fetch(&self, location: &DocumentLocation) -> Result<String, DataError> {
        match location {
            DocumentLocation::Path(path) => {
                std::fs::read_to_string(path).map_err(|source| DataError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
            DocumentLocation::Url(url) => self.fetch_url(url),
        }
    }
}
