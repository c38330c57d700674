//! Caller-facing query operations.
//!
//! Every operation returns plain serializable data or a [`QueryError`]; a transport layer only has
//! to encode one or the other.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use crate::model::{ComponentRecord, DesignToken, ExampleSpec};
use crate::orchestrator::SourceOrchestrator;
use crate::source::SourceInfo;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("{kind} \"{name}\" not found")]
    NotFound { kind: &'static str, name: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl QueryError {
    pub fn source_not_found(name: &str) -> Self {
        QueryError::NotFound {
            kind: "Source",
            name: name.to_string(),
        }
    }

    pub fn component_not_found(name: &str) -> Self {
        QueryError::NotFound {
            kind: "Component",
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSummary {
    pub name: String,
    pub category: String,
    pub description: String,
    pub props_count: usize,
    pub examples_count: usize,
}

impl From<&ComponentRecord> for ComponentSummary {
    fn from(record: &ComponentRecord) -> Self {
        Self {
            name: record.name.clone(),
            category: record.category.clone(),
            description: record.description.clone(),
            props_count: record.props.len(),
            examples_count: record.examples.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentList {
    pub components: Vec<ComponentSummary>,
    pub total: usize,
    pub last_updated: DateTime<Utc>,
}

impl ComponentList {
    fn from_records(records: &[Arc<ComponentRecord>]) -> Self {
        let components: Vec<ComponentSummary> =
            records.iter().map(|r| ComponentSummary::from(r.as_ref())).collect();
        Self {
            total: components.len(),
            components,
            last_updated: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    #[serde(flatten)]
    pub summary: ComponentSummary,
    /// Names of the props whose name or description contains the query.
    pub relevant_props: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    pub query: String,
    pub results: Vec<SearchHit>,
    pub total: usize,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentExamples {
    pub component: String,
    pub examples: Vec<ExampleSpec>,
    pub total_examples: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignTokens {
    /// Component name, or `all` when tokens were gathered from every component.
    pub component: String,
    pub tokens: Vec<DesignToken>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceList {
    pub data_sources: Vec<SourceInfo>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshOutcome {
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub name: String,
    pub version: String,
    pub status: String,
    pub components: usize,
    pub data_sources: usize,
    pub last_updated: DateTime<Utc>,
}

fn require(value: &str, what: &str) -> Result<(), QueryError> {
    if value.trim().is_empty() {
        return Err(QueryError::InvalidInput(format!("{} is required", what)));
    }
    Ok(())
}

/// Query operations over a shared orchestrator.
#[derive(Clone)]
pub struct ComponentQueries {
    orchestrator: Arc<SourceOrchestrator>,
}

impl ComponentQueries {
    pub fn new(orchestrator: Arc<SourceOrchestrator>) -> Self {
        Self { orchestrator }
    }

    pub fn orchestrator(&self) -> &Arc<SourceOrchestrator> {
        &self.orchestrator
    }

    /// Lists component summaries, optionally narrowed to one category and/or one source.
    ///
    /// Naming an unregistered source is a [`QueryError::NotFound`].
    pub async fn list_components(
        &self,
        category: Option<&str>,
        source: Option<&str>,
    ) -> Result<ComponentList, QueryError> {
        let records = match source.filter(|s| !s.is_empty()) {
            Some(source) => self.orchestrator.get_components(source).await?,
            None => self.orchestrator.get_all_components().await,
        };

        let records: Vec<Arc<ComponentRecord>> = match category.filter(|c| !c.is_empty()) {
            Some(category) => records
                .into_iter()
                .filter(|r| r.matches_category(category))
                .collect(),
            None => records,
        };

        Ok(ComponentList::from_records(&records))
    }

    pub async fn get_component(&self, name: &str) -> Result<Arc<ComponentRecord>, QueryError> {
        require(name, "Component name")?;
        self.orchestrator
            .get_component_by_name(name)
            .await
            .ok_or_else(|| QueryError::component_not_found(name))
    }

    pub async fn search_components(&self, query: &str) -> Result<SearchResults, QueryError> {
        require(query, "Search query")?;
        let needle = query.to_lowercase();

        let results: Vec<SearchHit> = self
            .orchestrator
            .search_components(query)
            .await
            .iter()
            .map(|record| SearchHit {
                summary: ComponentSummary::from(record.as_ref()),
                relevant_props: record
                    .props
                    .iter()
                    .filter(|p| p.matches_query(&needle))
                    .map(|p| p.name.clone())
                    .collect(),
            })
            .collect();

        Ok(SearchResults {
            query: query.to_string(),
            total: results.len(),
            results,
            last_updated: Utc::now(),
        })
    }

    pub async fn get_components_by_category(&self, category: &str) -> Result<ComponentList, QueryError> {
        require(category, "Category")?;
        let records = self.orchestrator.get_components_by_category(category).await;
        Ok(ComponentList::from_records(&records))
    }

    pub async fn get_component_examples(&self, name: &str) -> Result<ComponentExamples, QueryError> {
        let component = self.get_component(name).await?;
        Ok(ComponentExamples {
            component: component.name.clone(),
            total_examples: component.examples.len(),
            examples: component.examples.clone(),
        })
    }

    /// Design tokens of one component, or of every component when `component` is absent.
    pub async fn get_design_tokens(&self, component: Option<&str>) -> Result<DesignTokens, QueryError> {
        let (label, tokens) = match component.filter(|c| !c.is_empty()) {
            Some(name) => {
                let record = self.get_component(name).await?;
                (name.to_string(), record.design_tokens.clone())
            }
            None => {
                let tokens: Vec<DesignToken> = self
                    .orchestrator
                    .get_all_components()
                    .await
                    .iter()
                    .flat_map(|r| r.design_tokens.iter().cloned())
                    .collect();
                ("all".to_string(), tokens)
            }
        };

        Ok(DesignTokens {
            component: label,
            total: tokens.len(),
            tokens,
        })
    }

    pub async fn list_sources(&self) -> SourceList {
        let data_sources = self.orchestrator.list_sources().await;
        SourceList {
            total: data_sources.len(),
            data_sources,
        }
    }

    pub async fn refresh_cache(&self, source: Option<&str>) -> Result<RefreshOutcome, QueryError> {
        let source = source.filter(|s| !s.is_empty());
        self.orchestrator.refresh_cache(source).await?;

        let message = match source {
            Some(name) => format!("Cache refreshed for source: {}", name),
            None => "Cache refreshed for all sources".to_string(),
        };
        tracing::info!("{}", message);
        Ok(RefreshOutcome {
            message,
            timestamp: Utc::now(),
        })
    }

    pub async fn health(&self) -> HealthReport {
        let components = self.orchestrator.get_all_components().await.len();
        HealthReport {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            status: "healthy".to_string(),
            components,
            data_sources: self.orchestrator.source_count().await,
            last_updated: Utc::now(),
        }
    }
}
