use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// JCR path holding the documents that get indexed.
pub const DEFAULT_DOCUMENTS_ROOT: &str = "/content/documents";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub indexing: IndexingConfig,
    pub repository: RepositoryConfig,
    pub sink: SinkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    /// Number of documents submitted to the sink in one request
    pub batch_size: usize,
    pub documents_root: String,
    /// Delay between two repository probes while waiting at startup
    pub startup_poll_secs: u64,
    /// Static field id -> property path mappings, merged under the ones found in the repository
    pub field_mappings: HashMap<String, String>,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            documents_root: DEFAULT_DOCUMENTS_ROOT.to_string(),
            startup_poll_secs: 60,
            field_mappings: HashMap::from([("id".to_string(), "jcr:uuid".to_string())]),
        }
    }
}

impl IndexingConfig {
    pub fn startup_poll_interval(&self) -> Duration {
        Duration::from_secs(self.startup_poll_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// JSON export of the content repository
    pub snapshot_path: PathBuf,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("content.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub url: String,
    pub timeout_secs: u64,
    /// Batches buffered ahead of the dispatch worker
    pub dispatch_capacity: usize,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8983/solr/collection1".to_string(),
            timeout_secs: 30,
            dispatch_capacity: 4,
        }
    }
}

impl SinkConfig {
    pub fn parsed_url(&self) -> Result<Url> {
        Url::parse(self.url.trim()).map_err(|source| ConfigError::InvalidUrl {
            url: self.url.clone(),
            source,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl SystemConfig {
    /// Read and validate a TOML configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: SystemConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.indexing.batch_size == 0 {
            return Err(ConfigError::Validation(
                "indexing.batch_size must be positive".to_string(),
            ));
        }
        if self.indexing.startup_poll_secs == 0 {
            return Err(ConfigError::Validation(
                "indexing.startup_poll_secs must be positive".to_string(),
            ));
        }
        if self.indexing.documents_root.trim().is_empty() {
            return Err(ConfigError::Validation(
                "indexing.documents_root must not be empty".to_string(),
            ));
        }
        if self.sink.url.trim().is_empty() {
            return Err(ConfigError::Validation("sink.url must not be empty".to_string()));
        }
        if self.sink.dispatch_capacity == 0 {
            return Err(ConfigError::Validation(
                "sink.dispatch_capacity must be positive".to_string(),
            ));
        }
        self.sink.parsed_url()?;
        Ok(())
    }
}
