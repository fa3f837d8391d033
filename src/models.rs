//! Response shapes and shared enums for the suggestions pipeline

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The origin of a suggestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Precomputed image matching algorithm results
    Ima,
    /// External media-search provider
    Ms,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Ima => write!(f, "ima"),
            Source::Ms => write!(f, "ms"),
        }
    }
}

impl FromStr for Source {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ima" => Ok(Source::Ima),
            "ms" => Ok(Source::Ms),
            _ => Err(Error::Validation(format!("Unrecognized source: {}", s))),
        }
    }
}

/// Which query shape the store should use for a request.
///
/// Requests restricted to the algorithm source let the database drop
/// pages without suggestions via an inner join. Everything else needs
/// the page rows even when no algorithm suggestions exist, because the
/// external provider may still contribute some.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    ImaOnly,
    AllSources,
}

impl QueryMode {
    pub fn from_filter(filter: Option<Source>) -> Self {
        match filter {
            Some(Source::Ima) => QueryMode::ImaOnly,
            _ => QueryMode::AllSources,
        }
    }
}

/// Top-level response for a pages request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagesResponse {
    pub seed: u64,
    pub pages: Vec<PageSuggestions>,
}

/// One page with its merged suggestion list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSuggestions {
    pub project: String,
    pub page: String,
    pub page_id: i64,
    pub suggestions: Vec<Suggestion>,
}

/// A single candidate image for a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub filename: String,
    pub confidence_rating: String,
    pub source: SourceInfo,
}

/// Suggestion origin with per-source detail block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub name: Source,
    pub details: SourceDetails,
}

/// Extra metadata carried by algorithm suggestions; empty for the
/// external provider, which returns filenames only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_wiki: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub found_on: Option<String>,
}
