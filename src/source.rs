//! Component sources.
//!
//! Each source kind is a variant of [`SourceConfig`] and knows how to turn its
//! configuration into component records. The orchestrator only sees the
//! [`ComponentSource`] trait, so tests and embedders can register their own.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::fetcher::{FetchError, LocalFetcher};
use crate::github::{DEFAULT_API_BASE_URL, DEFAULT_USER_AGENT, GitHubClient};
use crate::model::ComponentRecord;
use crate::parser::{ComponentParser, Layout, ParseError};

/// Marker shown in place of a configured credential.
pub const REDACTED: &str = "[REDACTED]";

#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GitHubSourceConfig {
    pub owner: String,
    pub repo: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default)]
    pub layout: Layout,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docs_path: Option<String>,
    /// Display name used in fallback descriptions; defaults to `owner/repo`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library: Option<String>,
}

impl fmt::Debug for GitHubSourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubSourceConfig")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("path", &self.path)
            .field("branch", &self.branch)
            .field("token", &self.token.as_ref().map(|_| REDACTED))
            .field("layout", &self.layout)
            .field("docs_path", &self.docs_path)
            .field("library", &self.library)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LocalSourceConfig {
    pub root: PathBuf,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub layout: Layout,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docs_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library: Option<String>,
}

/// Per-kind source configuration, tagged by `type` in serialized form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceConfig {
    GitHub(GitHubSourceConfig),
    Local(LocalSourceConfig),
}

/// HTTP settings shared by every remote source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub user_agent: String,
    pub api_base_url: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }
}

impl SourceConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            SourceConfig::GitHub(_) => "github",
            SourceConfig::Local(_) => "local",
        }
    }

    /// Serialized configuration with any credential replaced by [`REDACTED`].
    /// An absent credential stays absent.
    pub fn redacted(&self) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(map) = value.as_object_mut() {
            map.remove("type");
            if map.contains_key("token") {
                map.insert("token".to_string(), Value::String(REDACTED.to_string()));
            }
        }
        value
    }

    pub async fn fetch_components(
        &self,
        settings: &ClientSettings,
    ) -> Result<Vec<ComponentRecord>, SourceError> {
        let components = match self {
            SourceConfig::GitHub(config) => {
                let client =
                    GitHubClient::new_with_base_url(&settings.api_base_url, &config.owner, &config.repo)
                        .with_branch(config.branch.clone())
                        .with_token(config.token.clone())
                        .with_user_agent(&settings.user_agent);
                let library = config
                    .library
                    .clone()
                    .unwrap_or_else(|| format!("{}/{}", config.owner, config.repo));

                ComponentParser::new(client, config.path.as_str(), library)
                    .with_layout(config.layout)
                    .with_docs_path(config.docs_path.clone())
                    .fetch_components()
                    .await?
            }
            SourceConfig::Local(config) => {
                let library = config
                    .library
                    .clone()
                    .unwrap_or_else(|| config.root.display().to_string());

                ComponentParser::new(LocalFetcher::new(&config.root), config.path.as_str(), library)
                    .with_layout(config.layout)
                    .with_docs_path(config.docs_path.clone())
                    .fetch_components()
                    .await?
            }
        };
        Ok(components)
    }
}

/// Externally visible description of a registered source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub config: Value,
}

/// A named origin of component records.
#[async_trait]
pub trait ComponentSource: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> &str;

    /// Configuration safe to show to callers.
    fn redacted_config(&self) -> Value;

    async fn fetch_components(&self) -> Result<Vec<ComponentRecord>, SourceError>;

    fn info(&self) -> SourceInfo {
        SourceInfo {
            name: self.name().to_string(),
            kind: self.kind().to_string(),
            config: self.redacted_config(),
        }
    }
}

/// A configured source, as read from service configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Source {
    pub name: String,
    #[serde(flatten)]
    pub config: SourceConfig,
    #[serde(skip)]
    settings: ClientSettings,
}

impl Source {
    pub fn new(name: impl Into<String>, config: SourceConfig) -> Self {
        Self {
            name: name.into(),
            config,
            settings: ClientSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: ClientSettings) -> Self {
        self.settings = settings;
        self
    }
}

#[async_trait]
impl ComponentSource for Source {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        self.config.kind()
    }

    fn redacted_config(&self) -> Value {
        self.config.redacted()
    }

    async fn fetch_components(&self) -> Result<Vec<ComponentRecord>, SourceError> {
        tracing::info!("Fetching fresh data from {}", self.name);
        self.config.fetch_components(&self.settings).await
    }
}
