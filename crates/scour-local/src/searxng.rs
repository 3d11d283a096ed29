//! SearXNG search provider (self-hosted metasearch, JSON API).

use serde::Deserialize;

use scour_core::{Error, Result, SearchHit, SearchProvider, SearchQuery, SearchResponse};

use crate::{env, timeout_ms_from_query};

#[derive(Debug, Clone)]
pub struct SearxngSearchProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl SearxngSearchProvider {
    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let endpoint = env("SCOUR_SEARXNG_ENDPOINT").ok_or_else(|| {
            Error::NotConfigured("missing SCOUR_SEARXNG_ENDPOINT".to_string())
        })?;
        Ok(Self::with_endpoint(client, endpoint))
    }

    pub fn with_endpoint(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    fn endpoint_search(&self) -> String {
        // Accept either a base URL (…/) or a full /search endpoint.
        let mut base = self.endpoint.trim().trim_end_matches('/').to_string();
        if !base.ends_with("/search") {
            base.push_str("/search");
        }
        base
    }
}

#[derive(Debug, Deserialize)]
struct SearxngSearchResponse {
    results: Option<Vec<SearxngResult>>,
}

#[derive(Debug, Deserialize)]
struct SearxngResult {
    url: Option<String>,
    title: Option<String>,
    // SearXNG uses `content` for snippets in JSON format.
    content: Option<String>,
}

#[async_trait::async_trait]
impl SearchProvider for SearxngSearchProvider {
    fn name(&self) -> &'static str {
        "searxng"
    }

    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse> {
        let max_results = q.max_results.unwrap_or(10).min(20);
        let timeout_ms = timeout_ms_from_query(q);

        let resp = self
            .client
            .get(self.endpoint_search())
            .query(&[("q", q.query.as_str()), ("format", "json")])
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .send()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Search(format!("searxng search HTTP {status}")));
        }

        let parsed: SearxngSearchResponse = resp
            .json()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;

        let mut hits = Vec::new();
        if let Some(rs) = parsed.results {
            for r in rs.into_iter().take(max_results) {
                let Some(url) = r.url else { continue };
                hits.push(SearchHit::web(
                    hits.len(),
                    r.title.unwrap_or_default(),
                    url,
                    r.content.unwrap_or_default(),
                ));
            }
        }

        Ok(SearchResponse {
            hits,
            provider: "searxng".to_string(),
        })
    }
}
