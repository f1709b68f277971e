//! # Search Gateway
//!
//! Forwards a keyword query to the external full-text search service and
//! hands back its payload unexamined.
//!
//! The request is `GET <base_url><path>?q=fragment:<word>[&size=N]`. Ranking
//! and the response schema belong to the search service.

use crate::config::SearchConfig;
use thiserror::Error;

/// Upper bound on the `size` parameter forwarded upstream.
pub const MAX_SEARCH_SIZE: usize = 1000;

/// Errors from the search layer.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The query word is empty.
    #[error("Malformed search query: {0}")]
    MalformedQuery(String),

    /// Cannot reach the search service, or it timed out.
    #[error("Search service unavailable: {0}")]
    Unavailable(String),

    /// The search service answered with a non-2xx status.
    #[error("Search service returned {status}: {body}")]
    Upstream { status: u16, body: String },
}

/// The upstream answer, passed through as-is.
#[derive(Debug, Clone)]
pub struct SearchResponse {
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// HTTP client for the search service.
#[derive(Debug, Clone)]
pub struct SearchGateway {
    http: reqwest::Client,
    endpoint: String,
}

impl SearchGateway {
    /// Build a gateway from configuration.
    pub fn new(config: &SearchConfig) -> Result<Self, SearchError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| SearchError::Unavailable(format!("client setup failed: {e}")))?;
        let endpoint = format!("{}{}", config.base_url.trim_end_matches('/'), config.path);
        Ok(Self { http, endpoint })
    }

    /// Full URL queried, without parameters.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Search slice fragments for `word`. `size` is capped at `MAX_SEARCH_SIZE`.
    pub async fn search(
        &self,
        word: &str,
        size: Option<usize>,
    ) -> Result<SearchResponse, SearchError> {
        let word = word.trim();
        if word.is_empty() {
            return Err(SearchError::MalformedQuery("empty search word".to_string()));
        }

        let mut params = vec![("q", format!("fragment:{word}"))];
        if let Some(size) = size {
            params.push(("size", size.min(MAX_SEARCH_SIZE).to_string()));
        }

        let resp = self
            .http
            .get(&self.endpoint)
            .query(&params)
            .send()
            .await
            .map_err(|e| SearchError::Unavailable(format!("{}: {e}", self.endpoint)))?;

        let status = resp.status();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp
            .bytes()
            .await
            .map_err(|e| SearchError::Unavailable(format!("reading response: {e}")))?
            .to_vec();

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "search service error");
            return Err(SearchError::Upstream {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        tracing::debug!(word, bytes = body.len(), "search forwarded");
        Ok(SearchResponse { content_type, body })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_base_and_path() {
        let config = SearchConfig {
            base_url: "http://es:9200/".to_string(),
            ..SearchConfig::default()
        };
        let gateway = SearchGateway::new(&config).expect("gateway");
        assert_eq!(gateway.endpoint(), "http://es:9200/slices/slices/_search");
    }

    #[tokio::test]
    async fn empty_word_is_malformed() {
        let gateway = SearchGateway::new(&SearchConfig::default()).expect("gateway");
        assert!(matches!(
            gateway.search("  ", None).await,
            Err(SearchError::MalformedQuery(_))
        ));
    }
}
