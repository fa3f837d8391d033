//! Custom error types for image-suggestions

use serde::Serialize;
use thiserror::Error;

/// Main error type for suggestion store operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Internal(err.to_string())
    }
}

impl Error {
    /// HTTP-style status code for the caller-facing error shape
    pub fn status(&self) -> u16 {
        match self {
            Error::NotFound(_) => 404,
            Error::Validation(_) => 400,
            Error::Upstream(_) => 502,
            _ => 500,
        }
    }

    fn category(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "not_found",
            Error::Validation(_) => "bad_request",
            Error::Upstream(_) => "upstream_error",
            _ => "internal_error",
        }
    }

    fn title(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "Not Found",
            Error::Validation(_) => "Bad Request",
            Error::Upstream(_) => "Bad Gateway",
            _ => "Internal Server Error",
        }
    }

    /// Serializable status/category/detail shape surfaced to callers
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            status: self.status(),
            error_type: self.category().to_string(),
            title: self.title().to_string(),
            detail: self.to_string(),
        }
    }
}

/// Caller-facing error body
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub status: u16,
    #[serde(rename = "type")]
    pub error_type: String,
    pub title: String,
    pub detail: String,
}

/// Result type alias for image-suggestions
pub type Result<T> = std::result::Result<T, Error>;
