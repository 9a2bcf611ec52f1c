//! Registry snapshot fetcher. The upstream wire format is not ours to
//! define; the HTTP implementation expects a JSON array of rows and the
//! poller works against the trait.

use crate::config::FetchWindow;
use crate::registry::types::RawRegistryEntry;
use async_trait::async_trait;
use chrono::{Duration, Utc};

#[derive(Debug)]
pub enum FetchError {
    Http(String),
    Decode(String),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Http(e) => write!(f, "registry fetch failed: {}", e),
            FetchError::Decode(e) => write!(f, "registry payload undecodable: {}", e),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else {
            FetchError::Http(err.to_string())
        }
    }
}

#[async_trait]
pub trait RegistryFetcher: Send + Sync {
    async fn fetch(&self, window: &FetchWindow) -> Result<Vec<RawRegistryEntry>, FetchError>;
}

pub struct HttpRegistryFetcher {
    base_url: String,
    client: reqwest::Client,
}

impl HttpRegistryFetcher {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl RegistryFetcher for HttpRegistryFetcher {
    async fn fetch(&self, window: &FetchWindow) -> Result<Vec<RawRegistryEntry>, FetchError> {
        let since = match window {
            FetchWindow::All => "all".to_string(),
            FetchWindow::DaysAgo(n) => (Utc::now() - Duration::days(*n as i64))
                .format("%Y%m%d")
                .to_string(),
        };
        let url = format!("{}?since={}", self.base_url, since);
        log::info!("fetching registry snapshot: {}", url);

        let rows: Vec<RawRegistryEntry> = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| FetchError::Http(e.to_string()))?
            .json()
            .await?;

        log::info!("registry returned {} rows", rows.len());
        Ok(rows)
    }
}
