//! JSON-over-HTTP retrieval for connected knowledge bases and web search
//! proxies.
//!
//! Request: `POST {endpoint}` with `{"query": "...", "limit": N}`.
//! Response: `{"passages": [{"text": "...", "identifier": "...", "anchor": "...",
//! "title": "...", "author": "..."}]}`. Only `text` and `identifier` are
//! required.

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{Passage, RetrievalSource, SourceCategory};
use crate::config::HttpSourceConfig;
use crate::error::{MemoryError, MemoryResult};

pub struct HttpSource {
    category: SourceCategory,
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct RetrieveRequest<'a> {
    query: &'a str,
    limit: usize,
}

#[derive(Deserialize)]
struct RetrieveResponse {
    #[serde(default)]
    passages: Vec<RemotePassage>,
}

#[derive(Deserialize)]
struct RemotePassage {
    text: String,
    #[serde(alias = "url")]
    identifier: String,
    #[serde(default)]
    anchor: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    author: Option<String>,
}

impl HttpSource {
    pub fn new(
        category: SourceCategory,
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            category,
            endpoint: endpoint.into(),
            api_key: None,
            client,
        })
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// `None` when no endpoint is configured for this category.
    pub fn from_config(
        category: SourceCategory,
        config: &HttpSourceConfig,
    ) -> anyhow::Result<Option<Self>> {
        let Some(endpoint) = config.endpoint.as_deref().filter(|e| !e.is_empty()) else {
            tracing::info!(category = %category, "no endpoint configured, source disabled");
            return Ok(None);
        };
        let mut source = Self::new(category, endpoint, Duration::from_millis(config.timeout_ms))?;
        if let Some(var) = &config.api_key_env {
            match std::env::var(var) {
                Ok(key) if !key.is_empty() => source = source.with_api_key(key),
                _ => tracing::warn!(category = %category, env = %var, "API key variable is not set"),
            }
        }
        Ok(Some(source))
    }

    fn unavailable(&self, reason: impl std::fmt::Display) -> MemoryError {
        MemoryError::RetrievalUnavailable {
            category: self.category,
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl RetrievalSource for HttpSource {
    fn category(&self) -> SourceCategory {
        self.category
    }

    async fn retrieve(&self, query: &str, limit: usize) -> MemoryResult<Vec<Passage>> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&RetrieveRequest { query, limit });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| self.unavailable(e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(self.unavailable(format!("HTTP {status}")));
        }
        let body: RetrieveResponse = response.json().await.map_err(|e| self.unavailable(e))?;

        Ok(body
            .passages
            .into_iter()
            .take(limit)
            .map(|p| {
                let mut passage = Passage::new(self.category, p.identifier, p.text);
                passage.anchor = p.anchor;
                passage.title = p.title;
                passage.author = p.author;
                passage
            })
            .collect())
    }
}
