//! Service configuration.
//!
//! A JSON document describes the cache and the sources to register:
//!
//! ```json
//! {
//!   "cacheTtlSecs": 1800,
//!   "cacheDir": "/var/cache/component-docs",
//!   "sources": [
//!     { "name": "adobe-spectrum-2", "type": "github", "owner": "adobe",
//!       "repo": "react-spectrum", "path": "packages/@react-spectrum/s2/src",
//!       "layout": "flat", "branch": "main" }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::fs;

use crate::cache::{ComponentCache, FileStore};
use crate::github::{DEFAULT_API_BASE_URL, DEFAULT_USER_AGENT};
use crate::orchestrator::SourceOrchestrator;
use crate::source::{ClientSettings, Source};

pub const DEFAULT_CACHE_TTL_SECS: u64 = 30 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

fn default_cache_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Directory for the durable cache tier; the cache is memory-only without it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    #[serde(default)]
    pub sources: Vec<Source>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            user_agent: default_user_agent(),
            api_base_url: default_api_base_url(),
            cache_dir: None,
            sources: Vec::new(),
        }
    }
}

impl ServiceConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: ServiceConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await.map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!("Loaded configuration from {:?}", path);
        Self::from_json_str(&content)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_ttl_secs == 0 {
            return Err(ConfigError::Invalid("cacheTtlSecs must be positive".to_string()));
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.name.trim().is_empty() {
                return Err(ConfigError::Invalid("source name must not be empty".to_string()));
            }
            if !seen.insert(source.name.as_str()) {
                tracing::warn!("Source {} is configured more than once; the last entry wins", source.name);
            }
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            user_agent: self.user_agent.clone(),
            api_base_url: self.api_base_url.clone(),
        }
    }

    pub fn build_cache(&self) -> ComponentCache {
        let cache = ComponentCache::new(self.cache_ttl());
        match &self.cache_dir {
            Some(dir) => cache.with_store(Arc::new(FileStore::new(dir.clone()))),
            None => cache,
        }
    }

    /// Builds an orchestrator with every configured source registered in order.
    pub async fn build_orchestrator(&self) -> Arc<SourceOrchestrator> {
        let orchestrator = SourceOrchestrator::new(self.build_cache());
        let settings = self.client_settings();
        for source in &self.sources {
            orchestrator
                .register_source(source.clone().with_settings(settings.clone()))
                .await;
        }
        Arc::new(orchestrator)
    }
}
