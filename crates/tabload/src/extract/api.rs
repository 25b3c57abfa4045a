//! Paginated HTTP API extractor.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::ApiSourceConfig;
use crate::error::{PipelineError, Result};
use crate::model::RawRecord;

/// Timeout for a single page request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One page of the API response envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct PageEnvelope {
    /// Total page count, when the API reports one.
    #[serde(default)]
    pub total_pages: Option<u32>,

    /// Records on this page.
    pub data: Vec<RawRecord>,
}

impl PageEnvelope {
    /// Whether `page` was the last page: an empty page always terminates, and
    /// a reported `total_pages` terminates once reached.
    pub(crate) fn is_last(&self, page: u32) -> bool {
        self.data.is_empty() || self.total_pages.is_some_and(|total| page >= total)
    }
}

/// HTTP client for a paginated records endpoint.
///
/// Makes one network round-trip per page with no local caching; transport and
/// auth failures surface as [`PipelineError::Extraction`] carrying the page
/// number.
pub struct ApiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl ApiClient {
    /// Create a new API client.
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Walk pages from `start_page` until the source signals no further
    /// pages, returning every record seen.
    pub async fn fetch_all(&self, config: &ApiSourceConfig) -> Result<Vec<RawRecord>> {
        let mut records = Vec::new();
        let mut page = config.start_page;

        loop {
            let envelope = self.fetch_page(config, page).await?;
            debug!("Fetched page {} with {} records", page, envelope.data.len());
            let last = envelope.is_last(page);
            records.extend(envelope.data);
            if last {
                break;
            }
            page += 1;
        }

        Ok(records)
    }

    async fn fetch_page(&self, config: &ApiSourceConfig, page: u32) -> Result<PageEnvelope> {
        let url = format!("{}{}", self.base_url, config.path);
        let position = format!("page {}", page);

        let response = self
            .client
            .get(&url)
            .header("x-api-key", &self.api_key)
            .query(&[
                ("page", page.to_string()),
                ("per_page", config.page_size.to_string()),
            ])
            .query(&config.params)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| PipelineError::extraction("api", position.as_str(), e))?;

        response
            .json::<PageEnvelope>()
            .await
            .map_err(|e| PipelineError::extraction("api", position.as_str(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_parses_without_total_pages() {
        let envelope: PageEnvelope = serde_json::from_str(
            r#"{"data": [{"id": 1, "first_name": "a", "last_name": "b"}]}"#,
        )
        .unwrap();
        assert_eq!(envelope.total_pages, None);
        assert_eq!(envelope.data.len(), 1);
    }

    #[test]
    fn test_empty_page_is_last() {
        let envelope = PageEnvelope {
            total_pages: None,
            data: Vec::new(),
        };
        assert!(envelope.is_last(1));
    }

    #[test]
    fn test_total_pages_terminates_iteration() {
        let envelope: PageEnvelope = serde_json::from_str(
            r#"{"page": 2, "total_pages": 2, "data": [{"id": 7}]}"#,
        )
        .unwrap();
        assert!(!envelope.is_last(1));
        assert!(envelope.is_last(2));
    }
}
