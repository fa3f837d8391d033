//! Default values for configuration

use std::path::PathBuf;

/// Default directory holding per-partition TSV result files
pub fn default_tsv_dir() -> PathBuf {
    std::env::var("SUGGESTIONS_TSV_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./static"))
}

/// Default batch size for ingestion inserts
pub fn default_insert_chunk() -> usize {
    40
}

/// Default number of pages returned per request
pub fn default_limit() -> usize {
    10
}

/// Maximum number of pages a caller may request
pub fn default_max_limit() -> usize {
    100
}

/// Per-page suggestion quota shared between sources
pub fn default_max_suggestions_per_page() -> usize {
    10
}

/// Default media-search Action API endpoint
pub fn default_media_search_api_url() -> String {
    std::env::var("SUGGESTIONS_MEDIA_SEARCH_URL")
        .unwrap_or_else(|_| "https://commons.wikimedia.org/w/api.php".to_string())
}

/// Default timeout for the whole media-search fan-out, in seconds
pub fn default_media_search_timeout() -> u64 {
    10
}

/// Default user agent for media-search requests
pub fn default_media_search_user_agent() -> String {
    concat!("image-suggestions/", env!("CARGO_PKG_VERSION")).to_string()
}
