//! Turns a repository tree into component records.
//!
//! A source root is split into units (one directory per component, or one
//! file per component) and each unit is parsed on its own. A unit that fails
//! is logged and skipped; only failing to list the root fails the batch.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::extractor::{
    extract_aria_labels, extract_description, extract_design_tokens, extract_examples,
    extract_keyboard_support, extract_props, find_examples, infer_category,
};
use crate::fetcher::{FetchError, RepoEntry, RepositoryFetcher};
use crate::model::{AccessibilityInfo, ComponentRecord};
use crate::source::SourceError;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Component name is empty")]
    EmptyName,

    #[error("No documentation or source files found for component '{0}'")]
    NoDocumentation(String),
}

/// How components are laid out under a source root.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// Every sub-directory is a component package.
    #[default]
    Directory,
    /// Every capitalised `.ts`/`.tsx` file is a component.
    Flat,
}

/// Raw text gathered for one unit before extraction.
#[derive(Debug, Default)]
struct UnitTexts {
    package_description: Option<String>,
    readme: Option<String>,
    sources: Vec<String>,
    styles: Vec<String>,
}

impl UnitTexts {
    fn is_empty(&self) -> bool {
        self.package_description.is_none()
            && self.readme.is_none()
            && self.sources.is_empty()
            && self.styles.is_empty()
    }
}

pub struct ComponentParser<F> {
    fetcher: F,
    root: String,
    layout: Layout,
    docs_path: Option<String>,
    library: String,
}

impl<F: RepositoryFetcher> ComponentParser<F> {
    /// `library` names the component library in fallback descriptions.
    pub fn new(fetcher: F, root: impl Into<String>, library: impl Into<String>) -> Self {
        Self {
            fetcher,
            root: root.into(),
            layout: Layout::default(),
            docs_path: None,
            library: library.into(),
        }
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    /// Directory holding `<Name>.md` docs for the flat layout.
    pub fn with_docs_path(mut self, docs_path: Option<String>) -> Self {
        self.docs_path = docs_path;
        self
    }

    pub async fn fetch_components(&self) -> Result<Vec<ComponentRecord>, FetchError> {
        let entries = self.fetcher.list_directory(&self.root).await?;

        let components = match self.layout {
            Layout::Directory => self.parse_directories(&entries).await,
            Layout::Flat => self.parse_files(&entries).await,
        };

        tracing::info!(
            "Parsed {} components from '{}' ({:?} layout)",
            components.len(),
            self.root,
            self.layout
        );
        Ok(components)
    }

    async fn parse_directories(&self, entries: &[RepoEntry]) -> Vec<ComponentRecord> {
        let mut components = Vec::new();
        for unit in entries.iter().filter(|e| e.is_dir()) {
            match self.parse_directory_unit(unit).await {
                Ok(record) => components.push(record),
                Err(e) => tracing::warn!("Skipping component '{}': {}", unit.name, e),
            }
        }
        components
    }

    async fn parse_files(&self, entries: &[RepoEntry]) -> Vec<ComponentRecord> {
        let docs = match &self.docs_path {
            Some(path) => self.fetcher.list_directory(path).await.unwrap_or_else(|e| {
                tracing::warn!("Failed to list docs directory '{}': {}", path, e);
                Vec::new()
            }),
            None => Vec::new(),
        };

        let mut components = Vec::new();
        for (unit, name) in entries
            .iter()
            .filter_map(|e| component_file_name(e).map(|name| (e, name)))
        {
            match self.parse_file_unit(unit, name, &docs).await {
                Ok(record) => components.push(record),
                Err(e) => tracing::warn!("Skipping component '{}': {}", name, e),
            }
        }
        components
    }

    async fn parse_directory_unit(&self, unit: &RepoEntry) -> Result<ComponentRecord, SourceError> {
        tracing::debug!("Parsing component directory {}", unit.path);
        let files = self.fetcher.list_directory(&unit.path).await?;
        let mut texts = UnitTexts::default();

        if let Some(package) = files.iter().find(|f| f.is_file() && f.name == "package.json") {
            texts.package_description = self
                .fetch_optional(package, &unit.name)
                .await
                .and_then(|content| package_description(&content));
        }

        if let Some(readme) = files
            .iter()
            .find(|f| f.is_file() && f.name.to_lowercase().contains("readme"))
        {
            texts.readme = self.fetch_optional(readme, &unit.name).await;
        }

        let source_entries = match files.iter().find(|f| f.is_dir() && f.name == "src") {
            Some(src) => self.fetcher.list_directory(&src.path).await.unwrap_or_else(|e| {
                tracing::warn!("Failed to list src directory for {}: {}", unit.name, e);
                Vec::new()
            }),
            None => files.clone(),
        };

        for entry in &source_entries {
            if is_script(entry) {
                if let Some(content) = self.fetch_optional(entry, &unit.name).await {
                    texts.sources.push(content);
                }
            } else if is_style(entry) {
                if let Some(content) = self.fetch_optional(entry, &unit.name).await {
                    texts.styles.push(content);
                }
            }
        }

        if texts.is_empty() {
            return Err(ParseError::NoDocumentation(unit.name.clone()).into());
        }
        Ok(self.assemble(&unit.name, texts)?)
    }

    async fn parse_file_unit(
        &self,
        unit: &RepoEntry,
        name: &str,
        docs: &[RepoEntry],
    ) -> Result<ComponentRecord, SourceError> {
        tracing::debug!("Parsing component file {}", unit.path);
        let mut texts = UnitTexts::default();
        texts.sources.push(self.fetcher.fetch_file(unit).await?);

        if let Some(doc) = docs.iter().find(|d| is_doc_for(d, name)) {
            texts.readme = self.fetch_optional(doc, name).await;
        }

        Ok(self.assemble(name, texts)?)
    }

    /// Sub-file fetches degrade to "absent" instead of failing the unit.
    async fn fetch_optional(&self, entry: &RepoEntry, component: &str) -> Option<String> {
        match self.fetcher.fetch_file(entry).await {
            Ok(content) => Some(content),
            Err(e) => {
                tracing::warn!("Failed to fetch {} for {}: {}", entry.name, component, e);
                None
            }
        }
    }

    fn assemble(&self, name: &str, texts: UnitTexts) -> Result<ComponentRecord, ParseError> {
        let source_text = texts.sources.join("\n");
        let props = texts.sources.iter().flat_map(|s| extract_props(s)).collect::<Vec<_>>();

        let examples = texts
            .readme
            .as_deref()
            .map(|readme| find_examples(readme, name))
            .filter(|examples| !examples.is_empty())
            .unwrap_or_else(|| extract_examples(&source_text, name));

        let description = texts
            .package_description
            .unwrap_or_else(|| extract_description(&source_text, name, &self.library));

        let accessibility = AccessibilityInfo::new(
            extract_aria_labels(&props).into_iter().unique().collect(),
            extract_keyboard_support(&source_text),
        );

        let token_text = texts
            .sources
            .iter()
            .chain(texts.styles.iter())
            .chain(texts.readme.iter())
            .join("\n");

        ComponentRecord::new(
            name,
            infer_category(name),
            description,
            props,
            examples,
            accessibility,
            extract_design_tokens(&token_text),
        )
    }
}

fn package_description(content: &str) -> Option<String> {
    match serde_json::from_str::<serde_json::Value>(content) {
        Ok(package) => package
            .get("description")
            .and_then(|d| d.as_str())
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string),
        Err(e) => {
            tracing::warn!("Failed to parse package.json: {}", e);
            None
        }
    }
}

fn is_script(entry: &RepoEntry) -> bool {
    let name = entry.name.to_lowercase();
    entry.is_file()
        && matches!(entry.extension().as_deref(), Some("ts" | "tsx"))
        && !name.ends_with(".d.ts")
        && ![".test.", ".spec.", ".stories."]
            .iter()
            .any(|marker| name.contains(marker))
}

fn is_style(entry: &RepoEntry) -> bool {
    entry.is_file() && entry.extension().as_deref() == Some("css")
}

/// Component name for a flat-layout file, if the file looks like one.
fn component_file_name(entry: &RepoEntry) -> Option<&str> {
    if !is_script(entry) {
        return None;
    }
    let stem = entry.name.split('.').next()?;
    stem.chars()
        .next()
        .filter(|c| c.is_ascii_uppercase())
        .map(|_| stem)
}

fn is_doc_for(entry: &RepoEntry, name: &str) -> bool {
    entry.is_file()
        && matches!(entry.extension().as_deref(), Some("md" | "mdx"))
        && entry
            .name
            .rsplit_once('.')
            .is_some_and(|(stem, _)| stem.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::LocalFetcher;
    use async_trait::async_trait;
    use std::path::Path;
    use tempfile::tempdir;
    use tokio::fs;

    async fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        fs::write(path, content).await.unwrap();
    }

    const BUTTON_SOURCE: &str = r#"
export interface ButtonProps {
  /** The visual style of the button. */
  variant?: 'accent' | 'primary' | 'secondary',
  /** Accessible label when no visible text is present. */
  'aria-label'?: string,
  children: ReactNode
}

export function Button(props: ButtonProps) {
  let onKeyDown = (e) => e.key === 'Enter';
  return <button className="var(--spectrum-button-background-color)" />;
}
"#;

    const BUTTON_README: &str = "# Button\n\n```tsx\n<Button variant=\"accent\">Save</Button>\n```\n";

    #[tokio::test]
    async fn test_directory_layout() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(root, "s2/Button/package.json", r#"{"name": "@s2/button", "description": "Buttons perform actions."}"#).await;
        write(root, "s2/Button/README.md", BUTTON_README).await;
        write(root, "s2/Button/src/Button.tsx", BUTTON_SOURCE).await;
        write(root, "s2/Button/src/Button.test.tsx", "interface IgnoredProps { nope: string }").await;
        write(root, "s2/Button/src/button.css", ".b { padding: var(--spectrum-spacing-100); }").await;
        fs::create_dir_all(root.join("s2/Empty")).await.unwrap();
        write(root, "s2/notes.txt", "not a component").await;

        let parser = ComponentParser::new(LocalFetcher::new(root), "s2", "Spectrum 2");
        let components = parser.fetch_components().await.unwrap();

        assert_eq!(components.len(), 1);
        let button = &components[0];
        assert_eq!(button.name, "Button");
        assert_eq!(button.category, "Actions");
        assert_eq!(button.description, "Buttons perform actions.");
        assert_eq!(button.props.len(), 3);
        assert!(!button.props.iter().any(|p| p.name == "nope"));
        assert_eq!(button.examples.len(), 1);
        assert_eq!(button.examples[0].code, "<Button variant=\"accent\">Save</Button>");
        assert_eq!(button.accessibility.aria_labels, vec!["aria-label"]);
        assert_eq!(
            button.accessibility.keyboard_support,
            vec!["Keyboard event handling", "Enter"]
        );
        let tokens: Vec<&str> = button.design_tokens.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            tokens,
            vec!["--spectrum-button-background-color", "--spectrum-spacing-100"]
        );
    }

    #[tokio::test]
    async fn test_directory_without_src_uses_unit_files() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(
            root,
            "pkg/Link/Link.tsx",
            "/** Links navigate to another page. */\ninterface LinkProps { href: string }",
        )
        .await;

        let parser = ComponentParser::new(LocalFetcher::new(root), "pkg", "Spectrum 2");
        let components = parser.fetch_components().await.unwrap();

        assert_eq!(components.len(), 1);
        assert_eq!(components[0].description, "Links navigate to another page.");
        assert_eq!(components[0].category, "Navigation");
        assert_eq!(components[0].examples[0].code, "<Link />");
    }

    #[tokio::test]
    async fn test_flat_layout_with_docs() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(root, "src/Button.tsx", BUTTON_SOURCE).await;
        write(root, "src/index.ts", "export * from './Button';").await;
        write(root, "src/utils.ts", "export const x = 1;").await;
        write(root, "src/Button.stories.tsx", "export default {};").await;
        write(root, "src/types.d.ts", "declare module 'x';").await;
        write(root, "docs/button.md", BUTTON_README).await;

        let parser = ComponentParser::new(LocalFetcher::new(root), "src", "Spectrum 2")
            .with_layout(Layout::Flat)
            .with_docs_path(Some("docs".to_string()));
        let components = parser.fetch_components().await.unwrap();

        assert_eq!(components.len(), 1);
        assert_eq!(components[0].name, "Button");
        assert_eq!(components[0].description, "Button component from Spectrum 2");
        assert_eq!(components[0].examples[0].title, "Example 1");
    }

    #[tokio::test]
    async fn test_missing_root_fails() {
        let dir = tempdir().unwrap();
        let parser = ComponentParser::new(LocalFetcher::new(dir.path()), "missing", "lib");
        assert!(parser.fetch_components().await.is_err());
    }

    /// Fails every read of a path containing "Broken".
    struct FlakyFetcher(LocalFetcher);

    #[async_trait]
    impl RepositoryFetcher for FlakyFetcher {
        async fn list_directory(&self, path: &str) -> Result<Vec<RepoEntry>, FetchError> {
            if path.contains("Broken") {
                return Err(FetchError::Status {
                    status: 500,
                    reason: "Internal Server Error".to_string(),
                    url: path.to_string(),
                });
            }
            self.0.list_directory(path).await
        }

        async fn fetch_file(&self, entry: &RepoEntry) -> Result<String, FetchError> {
            if entry.path.contains("Broken") {
                return Err(FetchError::MissingDownloadUrl(entry.path.clone()));
            }
            self.0.fetch_file(entry).await
        }
    }

    #[tokio::test]
    async fn test_unit_failures_are_isolated() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(root, "dirs/Broken/src/Broken.tsx", "interface BrokenProps { a: string }").await;
        write(root, "dirs/Switch/src/Switch.tsx", "interface SwitchProps { isSelected?: boolean }").await;
        write(root, "flat/Broken.tsx", "interface BrokenProps { a: string }").await;
        write(root, "flat/Slider.tsx", "interface SliderProps { value: number }").await;

        let by_dir = ComponentParser::new(FlakyFetcher(LocalFetcher::new(root)), "dirs", "lib");
        let names: Vec<String> = by_dir
            .fetch_components()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Switch"]);

        let flat = ComponentParser::new(FlakyFetcher(LocalFetcher::new(root)), "flat", "lib")
            .with_layout(Layout::Flat);
        let names: Vec<String> = flat
            .fetch_components()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Slider"]);
    }

    #[test]
    fn test_component_file_name() {
        let entry = |name: &str| RepoEntry {
            name: name.to_string(),
            kind: crate::fetcher::EntryKind::File,
            path: name.to_string(),
            download_url: None,
        };
        assert_eq!(component_file_name(&entry("TextField.tsx")), Some("TextField"));
        assert_eq!(component_file_name(&entry("useButton.ts")), None);
        assert_eq!(component_file_name(&entry("Button.test.tsx")), None);
        assert_eq!(component_file_name(&entry("Button.md")), None);
    }
}
