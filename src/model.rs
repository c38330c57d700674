//! Canonical component schema shared by every source.
//!
//! Records are immutable once built; the orchestrator hands them out as
//! `Arc<ComponentRecord>` and merges by swapping whole records.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::parser::ParseError;

/// Note attached to every record; no source carries richer screen-reader data.
pub const SCREEN_READER_NOTE: &str = "Standard screen reader support";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PropSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub prop_type: String,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExampleSpec {
    pub title: String,
    pub description: String,
    pub code: String,
    /// Rendered preview location, when a source publishes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AccessibilityInfo {
    pub aria_labels: Vec<String>,
    pub keyboard_support: Vec<String>,
    pub screen_reader_support: String,
}

impl AccessibilityInfo {
    pub fn new(aria_labels: Vec<String>, keyboard_support: Vec<String>) -> Self {
        Self {
            aria_labels,
            keyboard_support,
            screen_reader_support: SCREEN_READER_NOTE.to_string(),
        }
    }
}

impl Default for AccessibilityInfo {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DesignToken {
    pub name: String,
    pub value: String,
    pub category: String,
    pub description: String,
}

/// Normalized description of one UI component.
///
/// The name is the dedup key across sources and is compared case-insensitively.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ComponentRecord {
    pub name: String,
    pub category: String,
    pub description: String,
    pub props: Vec<PropSpec>,
    pub examples: Vec<ExampleSpec>,
    pub accessibility: AccessibilityInfo,
    pub design_tokens: Vec<DesignToken>,
}

impl ComponentRecord {
    /// Builds a record, rejecting an empty name and dropping repeated prop names.
    ///
    /// The first prop with a given name is kept; later duplicates are discarded.
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        description: impl Into<String>,
        props: Vec<PropSpec>,
        examples: Vec<ExampleSpec>,
        accessibility: AccessibilityInfo,
        design_tokens: Vec<DesignToken>,
    ) -> Result<Self, ParseError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ParseError::EmptyName);
        }

        Ok(Self {
            name,
            category: category.into(),
            description: description.into(),
            props: dedup_props(props),
            examples,
            accessibility,
            design_tokens,
        })
    }

    /// Lowercased name used to merge records from different sources.
    pub fn dedup_key(&self) -> String {
        self.name.to_lowercase()
    }

    pub fn matches_name(&self, name: &str) -> bool {
        self.dedup_key() == name.to_lowercase()
    }

    pub fn matches_category(&self, category: &str) -> bool {
        self.category.to_lowercase() == category.to_lowercase()
    }

    /// Case-insensitive substring match over name, description, category and props.
    ///
    /// `needle` must already be lowercased.
    pub fn matches_query(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle)
            || self.description.to_lowercase().contains(needle)
            || self.category.to_lowercase().contains(needle)
            || self.props.iter().any(|prop| prop.matches_query(needle))
    }
}

impl PropSpec {
    pub fn matches_query(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle) || self.description.to_lowercase().contains(needle)
    }
}

fn dedup_props(props: Vec<PropSpec>) -> Vec<PropSpec> {
    let mut seen = HashSet::new();
    props
        .into_iter()
        .filter(|prop| seen.insert(prop.name.clone()))
        .collect()
}
