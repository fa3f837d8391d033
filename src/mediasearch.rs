//! External media-search provider
//!
//! Best-effort enrichment: a free-text search against the MediaWiki
//! Action API, derived from a page title, returning candidate filenames
//! with a fixed low confidence and no further metadata. The provider
//! sits behind a trait so the merge layer can be exercised without a
//! network.

use crate::config::MediaSearchConfig;
use crate::error::{Error, Result};
use crate::models::{Source, SourceDetails, SourceInfo, Suggestion};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Narrow query/response contract for the external provider
#[async_trait]
pub trait MediaSearchProvider: Send + Sync {
    /// Search for up to `limit` candidate images for a page title
    async fn search(&self, page_title: &str, limit: usize) -> Result<Vec<Suggestion>>;
}

/// HTTP client against the MediaWiki Action API search generator
pub struct MediaSearchClient {
    http: reqwest::Client,
    api_url: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    query: Option<ApiQuery>,
}

#[derive(Debug, Deserialize)]
struct ApiQuery {
    searchinfo: ApiSearchInfo,
    #[serde(default)]
    pages: Vec<ApiPage>,
}

#[derive(Debug, Deserialize)]
struct ApiSearchInfo {
    totalhits: i64,
}

#[derive(Debug, Deserialize)]
struct ApiPage {
    title: String,
    index: i64,
}

impl MediaSearchClient {
    pub fn new(config: &MediaSearchConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_url: config.api_url.clone(),
        })
    }
}

#[async_trait]
impl MediaSearchProvider for MediaSearchClient {
    async fn search(&self, page_title: &str, limit: usize) -> Result<Vec<Suggestion>> {
        debug!("media search for '{}' (limit {})", page_title, limit);

        let search = format!("filetype:bitmap|drawing {}", page_title);
        let limit = limit.to_string();
        let response = self
            .http
            .get(&self.api_url)
            .query(&[
                ("action", "query"),
                ("format", "json"),
                ("formatversion", "2"),
                ("generator", "search"),
                ("gsrsearch", search.as_str()),
                ("gsrlimit", limit.as_str()),
                ("gsroffset", "0"),
                ("gsrnamespace", "6"),
                ("gsrinfo", "totalhits|suggestion"),
                ("uselang", "en"),
            ])
            .send()
            .await
            .map_err(upstream)?;

        if !response.status().is_success() {
            return Err(Error::Upstream(format!(
                "media search returned status {}",
                response.status()
            )));
        }

        let body: ApiResponse = response.json().await.map_err(upstream)?;
        let Some(query) = body.query else {
            return Ok(Vec::new());
        };
        if query.searchinfo.totalhits == 0 {
            return Ok(Vec::new());
        }

        // Match the ranking shown by the provider's own UI
        let mut pages = query.pages;
        pages.sort_by_key(|p| p.index);

        Ok(pages
            .into_iter()
            .map(|page| Suggestion {
                filename: page
                    .title
                    .strip_prefix("File:")
                    .unwrap_or(&page.title)
                    .to_string(),
                confidence_rating: "low".to_string(),
                source: SourceInfo {
                    name: Source::Ms,
                    // No extra details available for this source type
                    details: SourceDetails::default(),
                },
            })
            .collect())
    }
}

fn upstream(err: reqwest::Error) -> Error {
    Error::Upstream(format!("Unable to retrieve mediasearch results: {}", err))
}
