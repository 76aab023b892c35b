//! Source adapters
//!
//! Each adapter turns one provider's wire format into a `PictureDraft`.
//! Adapters are looked up through `FetcherRegistry`, keyed by the closed
//! `Source` enum.

mod bing;
mod nasa;
mod wikipedia;
pub mod wikitext;

pub use bing::BingFetcher;
pub use nasa::NasaFetcher;
pub use wikipedia::WikipediaFetcher;

use async_trait::async_trait;
use chrono::NaiveDate;
use potd_common::config::SourcesConfig;
use potd_common::{PictureDraft, Source};
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::{PipelineError, PipelineResult};

/// Largest history window any provider serves in one batch
pub const MAX_BATCH_DAYS: u32 = 15;

/// Capability shared by every picture source
#[async_trait]
pub trait PictureFetcher: Send + Sync {
    fn source(&self) -> Source;

    /// Fetch and normalize the picture published for `date`
    async fn fetch(&self, date: NaiveDate) -> PipelineResult<PictureDraft>;

    /// Public page for a date. Pure, never fails.
    fn source_url(&self, date: NaiveDate) -> String;

    fn supports_batch(&self) -> bool {
        false
    }

    /// Every picture the provider still serves, up to `max_days`
    async fn fetch_all_available(&self, _max_days: u32) -> PipelineResult<Vec<PictureDraft>> {
        Err(PipelineError::Unsupported {
            source_id: self.source().as_str().to_string(),
            operation: "Batch fetch".to_string(),
        })
    }
}

/// Lookup table from source to adapter
#[derive(Default, Clone)]
pub struct FetcherRegistry {
    fetchers: HashMap<Source, Arc<dyn PictureFetcher>>,
}

impl FetcherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in adapter
    pub fn from_config(config: &SourcesConfig) -> PipelineResult<Self> {
        let client = http_client(config, config.timeout())?;

        let mut registry = Self::new();
        registry.register(Arc::new(NasaFetcher::new(client.clone(), config)));
        registry.register(Arc::new(WikipediaFetcher::new(client.clone(), config)));
        registry.register(Arc::new(BingFetcher::new(client, config)));
        Ok(registry)
    }

    pub fn register(&mut self, fetcher: Arc<dyn PictureFetcher>) {
        self.fetchers.insert(fetcher.source(), fetcher);
    }

    pub fn get(&self, source: Source) -> PipelineResult<Arc<dyn PictureFetcher>> {
        self.fetchers
            .get(&source)
            .cloned()
            .ok_or_else(|| PipelineError::UnknownSource(source.as_str().to_string()))
    }
}

/// Shared client for provider calls, bounded by `timeout`
pub fn http_client(
    config: &SourcesConfig,
    timeout: std::time::Duration,
) -> PipelineResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(timeout)
        .build()
        .map_err(|e| PipelineError::Store(e.into()))
}

/// GET a URL and return the body, mapping transport and status failures
/// to `PipelineError::Upstream`
pub(crate) async fn get_text(
    client: &reqwest::Client,
    source: Source,
    url: &str,
    query: &[(&str, &str)],
) -> PipelineResult<String> {
    let response = client
        .get(url)
        .query(query)
        .send()
        .await
        .map_err(|e| PipelineError::upstream(source, format!("Request failed: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(PipelineError::upstream(
            source,
            format!("Upstream returned {}", status),
        ));
    }

    response
        .text()
        .await
        .map_err(|e| PipelineError::upstream(source, format!("Failed to read body: {}", e)))
}

/// Deserialize a provider payload, reporting parse errors as upstream failures
pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(
    source: Source,
    body: &str,
) -> PipelineResult<T> {
    serde_json::from_str(body)
        .map_err(|e| PipelineError::upstream(source, format!("Malformed payload: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_resolves_every_source() {
        let registry = FetcherRegistry::from_config(&SourcesConfig::default()).unwrap();
        for source in Source::ALL {
            assert_eq!(registry.get(source).unwrap().source(), source);
        }
        assert!(registry.get(Source::Bing).unwrap().supports_batch());
        assert!(!registry.get(Source::Apod).unwrap().supports_batch());
    }

    #[test]
    fn test_unregistered_source() {
        let registry = FetcherRegistry::new();
        assert!(matches!(
            registry.get(Source::Apod),
            Err(PipelineError::UnknownSource(_))
        ));
    }

    #[tokio::test]
    async fn test_batch_unsupported_by_default() {
        let registry = FetcherRegistry::from_config(&SourcesConfig::default()).unwrap();
        let err = registry
            .get(Source::Wikipedia)
            .unwrap()
            .fetch_all_available(8)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Unsupported { .. }));
    }
}
