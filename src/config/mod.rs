//! Configuration management for image-suggestions
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Ingestion configuration
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Query configuration
    #[serde(default)]
    pub query: QueryConfig,

    /// Media-search provider configuration
    #[serde(default)]
    pub media_search: MediaSearchConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// Ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Directory holding one TSV result file per partition
    #[serde(default = "default_tsv_dir")]
    pub tsv_dir: PathBuf,

    /// Rows per insert batch
    #[serde(default = "default_insert_chunk")]
    pub insert_chunk: usize,
}

/// Query configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Default number of pages per request
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Maximum pages a caller may request
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,

    /// Per-page suggestion quota shared between sources
    #[serde(default = "default_max_suggestions_per_page")]
    pub max_suggestions_per_page: usize,
}

/// Media-search provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaSearchConfig {
    /// Action API endpoint
    #[serde(default = "default_media_search_api_url")]
    pub api_url: String,

    /// Timeout for the whole per-request fan-out, in seconds
    #[serde(default = "default_media_search_timeout")]
    pub timeout_secs: u64,

    /// User agent string
    #[serde(default = "default_media_search_user_agent")]
    pub user_agent: String,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for suggestion data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Path to SQLite database
    pub db_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ingest: IngestConfig::default(),
            query: QueryConfig::default(),
            media_search: MediaSearchConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            tsv_dir: default_tsv_dir(),
            insert_chunk: default_insert_chunk(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            max_suggestions_per_page: default_max_suggestions_per_page(),
        }
    }
}

impl Default for MediaSearchConfig {
    fn default() -> Self {
        Self {
            api_url: default_media_search_api_url(),
            timeout_secs: default_media_search_timeout(),
            user_agent: default_media_search_user_agent(),
        }
    }
}

impl Config {
    /// Get the default base directory (~/.image-suggestions)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".image-suggestions")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Initialize paths configuration
    fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            db_file: base.join("suggestions.db"),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        // Set up paths based on config file location
        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            db_file: base.join("suggestions.db"),
            base_dir: base,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific base directory, falling back
    /// to defaults when no config file exists there
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::default();
        config.init_paths(base_dir);

        if config.paths.config_file.exists() {
            debug!("Loading config from {:?}", config.paths.config_file);
            let content = std::fs::read_to_string(&config.paths.config_file)?;
            let mut loaded: Config = toml::from_str(&content)?;
            loaded.paths = config.paths;
            config = loaded;
            config.validate()?;
        } else {
            debug!("No config file found, using defaults");
        }

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.ingest.insert_chunk == 0 {
            return Err(Error::Config(
                "ingest.insert_chunk must be at least 1".to_string(),
            ));
        }

        if self.query.max_limit == 0 {
            return Err(Error::Config("query.max_limit must be positive".to_string()));
        }

        if self.query.default_limit > self.query.max_limit {
            return Err(Error::Config(
                "query.default_limit must be <= query.max_limit".to_string(),
            ));
        }

        if self.query.max_suggestions_per_page == 0 {
            return Err(Error::Config(
                "query.max_suggestions_per_page must be positive".to_string(),
            ));
        }

        url::Url::parse(&self.media_search.api_url)
            .map_err(|e| Error::Config(format!("media_search.api_url is not a valid URL: {}", e)))?;

        if self.media_search.timeout_secs == 0 {
            return Err(Error::Config(
                "media_search.timeout_secs must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
