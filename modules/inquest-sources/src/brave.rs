use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::info;

use inquest_common::{RawResult, SearchParams};

use crate::client::SourceClient;
use crate::error::{Result, SourceError};

const BRAVE_API_URL: &str = "https://api.search.brave.com/res/v1/web/search";

/// Brave web search — the reference implementation of the source contract
/// and the default endpoint for fallback searches.
pub struct BraveSearcher {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
    max_results: usize,
}

#[derive(Debug, serde::Deserialize)]
struct BraveResponse {
    #[serde(default)]
    web: BraveWeb,
}

#[derive(Debug, Default, serde::Deserialize)]
struct BraveWeb {
    #[serde(default)]
    results: Vec<BraveResult>,
}

#[derive(Debug, serde::Deserialize)]
struct BraveResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    description: String,
}

impl BraveSearcher {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            client: reqwest::Client::new(),
            base_url: BRAVE_API_URL.to_string(),
            max_results: 20,
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }
}

#[async_trait]
impl SourceClient for BraveSearcher {
    fn endpoint(&self) -> &str {
        "brave_search"
    }

    async fn search(&self, params: &SearchParams, timeout: Duration) -> Result<Vec<RawResult>> {
        let query = params
            .get("query")
            .ok_or_else(|| SourceError::Permanent("missing required parameter: query".into()))?;

        info!(query, "Brave search");

        let mut request = self
            .client
            .get(&self.base_url)
            .header("X-Subscription-Token", &self.api_key)
            .header("Accept", "application/json")
            .timeout(timeout)
            .query(&[("q", query), ("count", &self.max_results.to_string())]);

        if let Some(freshness) = params.get("freshness") {
            request = request.query(&[("freshness", freshness)]);
        }

        let response = tokio::time::timeout(timeout, request.send())
            .await
            .map_err(|_| SourceError::Transient(format!("search timed out after {timeout:?}")))?
            .map_err(SourceError::from)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let data: BraveResponse = response.json().await.map_err(SourceError::from)?;

        let results: Vec<RawResult> = data
            .web
            .results
            .into_iter()
            .map(|r| RawResult {
                title: r.title,
                text: r.description,
                url: Some(r.url),
                published_at: None,
            })
            .collect();

        info!(query, count = results.len(), "Brave search complete");
        Ok(results)
    }
}

fn classify_status(status: StatusCode, body: String) -> SourceError {
    match status.as_u16() {
        429 => SourceError::RateLimited(body),
        401 | 403 => SourceError::Permanent(format!("authentication failed ({status}): {body}")),
        400 | 404 | 422 => SourceError::Permanent(format!("bad request ({status}): {body}")),
        _ => SourceError::Transient(format!("API error ({status}): {body}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, String::new()),
            SourceError::RateLimited(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, String::new()),
            SourceError::Permanent(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, String::new()),
            SourceError::Transient(_)
        ));
    }

    #[test]
    fn response_parses_without_optional_fields() {
        let json = r#"{"web":{"results":[{"title":"t","url":"https://example.com"}]}}"#;
        let parsed: BraveResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.web.results.len(), 1);
        assert!(parsed.web.results[0].description.is_empty());
    }
}
