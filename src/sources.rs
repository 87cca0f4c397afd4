use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use crate::data_models::{ProviderResponse, SearchBundle};
use crate::error::{DegradedReason, StageResult};

pub const SEARCH_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_LOCATION: &str = "us";
pub const NUM_RESULTS: u32 = 20;
pub const NUM_RESULTS_PRO: u32 = 10;

/// Body posted to the search provider.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub q: String,
    pub num: u32,
    pub gl: String,
}

impl SearchQuery {
    pub fn new(query: &str, pro_mode: bool, location: Option<&str>) -> SearchQuery {
        let gl = location
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(DEFAULT_LOCATION)
            .to_lowercase();
        // pro mode fetches fewer hits and scrapes the top ones instead
        let num = if pro_mode { NUM_RESULTS_PRO } else { NUM_RESULTS };
        SearchQuery {
            q: query.to_string(),
            num,
            gl,
        }
    }
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> StageResult<SearchBundle>;
}

/// Serper (google.serper.dev) search client.
pub struct SerperClient {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
}

impl SerperClient {
    pub fn new(api_url: &str, api_key: Option<String>) -> Result<SerperClient> {
        SerperClient::with_timeout(api_url, api_key, SEARCH_TIMEOUT)
    }

    pub fn with_timeout(
        api_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<SerperClient> {
        if api_key.is_none() {
            log::error!("SERPER_API_KEY is not set, search results will be empty");
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build search http client")?;
        Ok(SerperClient {
            client,
            api_url: api_url.to_string(),
            api_key,
        })
    }

    async fn post_search(&self, api_key: &str, query: &SearchQuery) -> Result<SearchBundle> {
        let res = self
            .client
            .post(&self.api_url)
            .header("X-API-KEY", api_key)
            .json(query)
            .send()
            .await
            .context("search request failed")?
            .error_for_status()?;

        let body = res.bytes().await.context("failed to read search body")?;
        let parsed: ProviderResponse =
            serde_json::from_slice(&body).context("search body is not valid json")?;
        Ok(SearchBundle::from(parsed))
    }
}

#[async_trait]
impl SearchProvider for SerperClient {
    async fn search(&self, query: &SearchQuery) -> StageResult<SearchBundle> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(DegradedReason::MissingCredential("SERPER_API_KEY"));
        };
        self.post_search(api_key, query)
            .await
            .map_err(|e| DegradedReason::from_anyhow(&e))
    }
}

/// Fetches sources for a query. Any failure yields the empty bundle, which
/// callers treat as "no sources".
pub async fn get_sources(
    provider: &dyn SearchProvider,
    query: &str,
    pro_mode: bool,
    location: Option<&str>,
) -> SearchBundle {
    let search_query = SearchQuery::new(query, pro_mode, location);
    match provider.search(&search_query).await {
        Ok(bundle) => bundle,
        Err(DegradedReason::MissingCredential(key)) => {
            log::debug!("skipping search, {key} is not configured");
            SearchBundle::default()
        }
        Err(reason) => {
            log::error!("error getting sources for {:?}: {}", search_query.q, reason);
            SearchBundle::default()
        }
    }
}
