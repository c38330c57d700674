//! Multi-source component registry.
//!
//! [`SourceOrchestrator`] fronts every registered [`ComponentSource`], answers from the
//! [`ComponentCache`] when it can, and merges the per-source lists into one deduplicated view.
//!
//! # Example
//! ```no_run
//! use component_docs::cache::ComponentCache;
//! use component_docs::orchestrator::SourceOrchestrator;
//! use component_docs::parser::Layout;
//! use component_docs::source::{LocalSourceConfig, Source, SourceConfig};
//!
//! async fn example() {
//!     let orchestrator = SourceOrchestrator::new(ComponentCache::default());
//!     orchestrator
//!         .register_source(Source::new(
//!             "local",
//!             SourceConfig::Local(LocalSourceConfig {
//!                 root: "checkout".into(),
//!                 path: "packages/components".to_string(),
//!                 layout: Layout::Directory,
//!                 docs_path: None,
//!                 library: None,
//!             }),
//!         ))
//!         .await;
//!     let buttons = orchestrator.search_components("button").await;
//! }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::cache::ComponentCache;
use crate::model::ComponentRecord;
use crate::query::QueryError;
use crate::source::{ComponentSource, SourceInfo};

pub struct SourceOrchestrator {
    /// Registered sources in registration order.
    sources: RwLock<Vec<Arc<dyn ComponentSource>>>,
    cache: ComponentCache,
    /// One fetch lock per source name.
    in_flight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SourceOrchestrator {
    pub fn new(cache: ComponentCache) -> Self {
        Self {
            sources: RwLock::new(Vec::new()),
            cache,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn cache(&self) -> &ComponentCache {
        &self.cache
    }

    /// Registers a source under its name.
    ///
    /// Registering a name twice replaces the earlier source in place and drops its cached
    /// components, so the next read goes to the new source.
    pub async fn register_source<S: ComponentSource + 'static>(&self, source: S) {
        let source: Arc<dyn ComponentSource> = Arc::new(source);
        let name = source.name().to_string();

        let replaced = {
            let mut sources = self.sources.write().await;
            match sources.iter().position(|s| s.name() == name) {
                Some(index) => {
                    sources[index] = source;
                    true
                }
                None => {
                    sources.push(source);
                    false
                }
            }
        };

        if replaced {
            tracing::info!("Replaced data source {}", name);
            self.cache.invalidate(&name).await;
        } else {
            tracing::info!("Registered data source {}", name);
        }
    }

    pub async fn source_count(&self) -> usize {
        self.sources.read().await.len()
    }

    async fn find_source(&self, name: &str) -> Option<Arc<dyn ComponentSource>> {
        self.sources
            .read()
            .await
            .iter()
            .find(|s| s.name() == name)
            .cloned()
    }

    async fn flight_lock(&self, name: &str) -> Arc<Mutex<()>> {
        self.in_flight
            .lock()
            .await
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    /// Components of one source, from cache when fresh.
    ///
    /// # Arguments
    /// * `name` - Registered source name
    ///
    /// # Returns
    /// * `Ok(components)` - The source's components; empty when its fetch failed
    /// * `Err(QueryError::NotFound)` - If no source has that name
    pub async fn get_components(&self, name: &str) -> Result<Vec<Arc<ComponentRecord>>, QueryError> {
        let source = self
            .find_source(name)
            .await
            .ok_or_else(|| QueryError::source_not_found(name))?;
        Ok(self.load(source.as_ref()).await)
    }

    async fn load(&self, source: &dyn ComponentSource) -> Vec<Arc<ComponentRecord>> {
        let name = source.name();
        if let Some(components) = self.cache.get(name).await {
            return components;
        }

        let lock = self.flight_lock(name).await;
        let _guard = lock.lock().await;

        // Another task may have filled the cache while we waited.
        if let Some(components) = self.cache.get(name).await {
            return components;
        }

        // A refresh during the fetch bumps the generation and the result is not stored.
        let generation = self.cache.generation(name).await;
        tracing::info!("Cache miss for {}. Fetching...", name);
        match source.fetch_components().await {
            Ok(records) => {
                let components: Vec<Arc<ComponentRecord>> =
                    records.into_iter().map(Arc::new).collect();
                tracing::info!("Fetched {} components from {}", components.len(), name);
                self.cache
                    .put_if_current(name, components.clone(), generation)
                    .await;
                components
            }
            Err(e) => {
                tracing::warn!("Failed to fetch components from {}: {}", name, e);
                Vec::new()
            }
        }
    }

    /// Every component from every source, deduplicated by case-insensitive name.
    ///
    /// When two sources share a name the record with strictly more props wins. It takes the
    /// slot and the spelling of the name of the first one seen.
    pub async fn get_all_components(&self) -> Vec<Arc<ComponentRecord>> {
        let sources = self.sources.read().await.clone();

        let mut merged: Vec<Arc<ComponentRecord>> = Vec::new();
        let mut slots: HashMap<String, usize> = HashMap::new();
        for source in sources {
            for record in self.load(source.as_ref()).await {
                match slots.get(&record.dedup_key()) {
                    Some(&index) => {
                        if record.props.len() > merged[index].props.len() {
                            let winner = renamed(record, &merged[index].name);
                            merged[index] = winner;
                        }
                    }
                    None => {
                        slots.insert(record.dedup_key(), merged.len());
                        merged.push(record);
                    }
                }
            }
        }
        merged
    }

    pub async fn search_components(&self, query: &str) -> Vec<Arc<ComponentRecord>> {
        let needle = query.to_lowercase();
        self.get_all_components()
            .await
            .into_iter()
            .filter(|c| c.matches_query(&needle))
            .collect()
    }

    pub async fn get_component_by_name(&self, name: &str) -> Option<Arc<ComponentRecord>> {
        self.get_all_components()
            .await
            .into_iter()
            .find(|c| c.matches_name(name))
    }

    pub async fn get_components_by_category(&self, category: &str) -> Vec<Arc<ComponentRecord>> {
        self.get_all_components()
            .await
            .into_iter()
            .filter(|c| c.matches_category(category))
            .collect()
    }

    /// Drops cached components for one source, or for all of them.
    ///
    /// Nothing is refetched until the next read. Returns the names that were cleared.
    pub async fn refresh_cache(&self, name: Option<&str>) -> Result<Vec<String>, QueryError> {
        let names: Vec<String> = match name {
            Some(name) => {
                let source = self
                    .find_source(name)
                    .await
                    .ok_or_else(|| QueryError::source_not_found(name))?;
                vec![source.name().to_string()]
            }
            None => self
                .sources
                .read()
                .await
                .iter()
                .map(|s| s.name().to_string())
                .collect(),
        };

        for name in &names {
            self.cache.invalidate(name).await;
        }
        Ok(names)
    }

    /// Registered sources with credentials masked.
    pub async fn list_sources(&self) -> Vec<SourceInfo> {
        self.sources.read().await.iter().map(|s| s.info()).collect()
    }
}

fn renamed(record: Arc<ComponentRecord>, name: &str) -> Arc<ComponentRecord> {
    if record.name == name {
        return record;
    }
    let mut record = Arc::unwrap_or_clone(record);
    record.name = name.to_string();
    Arc::new(record)
}

impl Default for SourceOrchestrator {
    fn default() -> Self {
        Self::new(ComponentCache::default())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cache::tests::{BrokenStore, ManualClock};
    use crate::cache::{DEFAULT_TTL, MemoryStore};
    use crate::fetcher::FetchError;
    use crate::model::{AccessibilityInfo, PropSpec};
    use crate::source::{REDACTED, SourceError};
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    pub(crate) fn record(name: &str, category: &str, props: &[&str]) -> ComponentRecord {
        ComponentRecord::new(
            name,
            category,
            format!("The {} component.", name),
            props
                .iter()
                .map(|p| PropSpec {
                    name: p.to_string(),
                    prop_type: "string".to_string(),
                    required: false,
                    default_value: None,
                    description: format!("{} prop", p),
                    options: None,
                })
                .collect(),
            vec![],
            AccessibilityInfo::default(),
            vec![],
        )
        .unwrap()
    }

    /// Source returning a fixed list and counting how often it is asked.
    pub(crate) struct StaticSource {
        pub(crate) name: String,
        pub(crate) records: Vec<ComponentRecord>,
        pub(crate) fail: bool,
        pub(crate) delay: Duration,
        pub(crate) calls: Arc<AtomicUsize>,
    }

    impl StaticSource {
        pub(crate) fn new(name: &str, records: Vec<ComponentRecord>) -> Self {
            Self {
                name: name.to_string(),
                records,
                fail: false,
                delay: Duration::ZERO,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub(crate) fn failing(name: &str) -> Self {
            Self {
                fail: true,
                ..Self::new(name, vec![])
            }
        }

        pub(crate) fn counter(&self) -> Arc<AtomicUsize> {
            self.calls.clone()
        }
    }

    #[async_trait]
    impl ComponentSource for StaticSource {
        fn name(&self) -> &str {
            &self.name
        }

        fn kind(&self) -> &str {
            "static"
        }

        fn redacted_config(&self) -> Value {
            json!({ "token": REDACTED })
        }

        async fn fetch_components(&self) -> Result<Vec<ComponentRecord>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(SourceError::Fetch(FetchError::Status {
                    status: 500,
                    reason: "Internal Server Error".to_string(),
                    url: "https://api.example.test".to_string(),
                }));
            }
            Ok(self.records.clone())
        }
    }

    #[tokio::test]
    async fn test_get_components_is_cached() {
        let orchestrator = SourceOrchestrator::default();
        let source = StaticSource::new("a", vec![record("Button", "Actions", &["label"])]);
        let calls = source.counter();
        orchestrator.register_source(source).await;

        let first = orchestrator.get_all_components().await;
        let second = orchestrator.get_all_components().await;

        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_source_is_not_found() {
        let orchestrator = SourceOrchestrator::default();
        let result = orchestrator.get_components("missing").await;
        assert!(matches!(result, Err(QueryError::NotFound { .. })));

        let result = orchestrator.refresh_cache(Some("missing")).await;
        assert!(matches!(result, Err(QueryError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_dedup_prefers_more_props() {
        let orchestrator = SourceOrchestrator::default();
        orchestrator
            .register_source(StaticSource::new(
                "a",
                vec![
                    record("Button", "Actions", &["label", "variant"]),
                    record("Link", "Navigation", &["href"]),
                ],
            ))
            .await;
        orchestrator
            .register_source(StaticSource::new(
                "b",
                vec![record("button", "Actions", &["a", "b", "c", "d", "e"])],
            ))
            .await;

        let all = orchestrator.get_all_components().await;
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "Button");
        assert_eq!(all[0].props.len(), 5);
        assert_eq!(all[0].props[4].name, "e");
        assert_eq!(all[1].name, "Link");
    }

    #[tokio::test]
    async fn test_dedup_keeps_first_name_across_several_winners() {
        let orchestrator = SourceOrchestrator::default();
        for (source, name, props) in [
            ("a", "Button", &["x"][..]),
            ("b", "button", &["x", "y"][..]),
            ("c", "BUTTON", &["x", "y", "z"][..]),
        ] {
            orchestrator
                .register_source(StaticSource::new(source, vec![record(name, "Actions", props)]))
                .await;
        }

        let all = orchestrator.get_all_components().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "Button");
        assert_eq!(all[0].props.len(), 3);
    }

    #[tokio::test]
    async fn test_dedup_tie_keeps_first_seen() {
        let orchestrator = SourceOrchestrator::default();
        orchestrator
            .register_source(StaticSource::new("a", vec![record("Button", "Actions", &["x"])]))
            .await;
        orchestrator
            .register_source(StaticSource::new("b", vec![record("BUTTON", "Forms", &["y"])]))
            .await;

        let all = orchestrator.get_all_components().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "Button");
        assert_eq!(all[0].category, "Actions");
    }

    #[tokio::test]
    async fn test_search_matches_prop_names() {
        let orchestrator = SourceOrchestrator::default();
        orchestrator
            .register_source(StaticSource::new(
                "a",
                vec![
                    record("Switch", "Forms", &["ariaLabel"]),
                    record("Divider", "Layout", &["size"]),
                ],
            ))
            .await;

        let hits = orchestrator.search_components("aria").await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Switch");

        let hits = orchestrator.search_components("LAYOUT").await;
        assert_eq!(hits[0].name, "Divider");
    }

    #[tokio::test]
    async fn test_name_and_category_lookups_ignore_case() {
        let orchestrator = SourceOrchestrator::default();
        orchestrator
            .register_source(StaticSource::new(
                "a",
                vec![record("ActionButton", "Actions", &[]), record("Picker", "Forms", &[])],
            ))
            .await;

        assert!(orchestrator.get_component_by_name("actionbutton").await.is_some());
        assert!(orchestrator.get_component_by_name("Action").await.is_none());
        assert_eq!(orchestrator.get_components_by_category("forms").await.len(), 1);
        assert!(orchestrator.get_components_by_category("Form").await.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_forces_refetch() {
        let orchestrator = SourceOrchestrator::default();
        let source = StaticSource::new("a", vec![record("Button", "Actions", &[])]);
        let calls = source.counter();
        orchestrator.register_source(source).await;

        orchestrator.get_components("a").await.unwrap();
        let cleared = orchestrator.refresh_cache(Some("a")).await.unwrap();
        assert_eq!(cleared, vec!["a".to_string()]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        orchestrator.get_components("a").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_refresh_all_sources() {
        let orchestrator = SourceOrchestrator::default();
        let a = StaticSource::new("a", vec![record("Button", "Actions", &[])]);
        let b = StaticSource::new("b", vec![record("Link", "Navigation", &[])]);
        let (a_calls, b_calls) = (a.counter(), b.counter());
        orchestrator.register_source(a).await;
        orchestrator.register_source(b).await;

        orchestrator.get_all_components().await;
        orchestrator.refresh_cache(None).await.unwrap();
        orchestrator.get_all_components().await;

        assert_eq!(a_calls.load(Ordering::SeqCst), 2);
        assert_eq!(b_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failing_source_is_isolated_and_not_cached() {
        let orchestrator = SourceOrchestrator::default();
        let broken = StaticSource::failing("broken");
        let broken_calls = broken.counter();
        orchestrator.register_source(broken).await;
        orchestrator
            .register_source(StaticSource::new("ok", vec![record("Button", "Actions", &[])]))
            .await;

        let all = orchestrator.get_all_components().await;
        assert_eq!(all.len(), 1);
        assert!(orchestrator.get_components("broken").await.unwrap().is_empty());
        assert_eq!(broken_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_reregistration_replaces_and_invalidates() {
        let orchestrator = SourceOrchestrator::default();
        orchestrator
            .register_source(StaticSource::new("first", vec![record("Old", "Components", &[])]))
            .await;
        orchestrator
            .register_source(StaticSource::new("a", vec![record("Old", "Components", &[])]))
            .await;
        assert_eq!(orchestrator.get_components("a").await.unwrap()[0].name, "Old");

        orchestrator
            .register_source(StaticSource::new("a", vec![record("New", "Components", &[])]))
            .await;

        assert_eq!(orchestrator.source_count().await, 2);
        assert_eq!(orchestrator.list_sources().await[1].name, "a");
        assert_eq!(orchestrator.get_components("a").await.unwrap()[0].name, "New");
    }

    #[tokio::test]
    async fn test_list_sources_masks_credentials() {
        let orchestrator = SourceOrchestrator::default();
        orchestrator
            .register_source(StaticSource::new("a", vec![]))
            .await;

        let sources = orchestrator.list_sources().await;
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].kind, "static");
        assert_eq!(sources[0].config["token"], REDACTED);
    }

    #[tokio::test]
    async fn test_concurrent_misses_fetch_once() {
        let orchestrator = Arc::new(SourceOrchestrator::default());
        let mut source = StaticSource::new("slow", vec![record("Button", "Actions", &[])]);
        source.delay = Duration::from_millis(50);
        let calls = source.counter();
        orchestrator.register_source(source).await;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let orchestrator = orchestrator.clone();
                tokio::spawn(async move { orchestrator.get_components("slow").await.unwrap() })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap().len(), 1);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refresh_during_fetch_discards_the_result() {
        let orchestrator = Arc::new(SourceOrchestrator::default());
        let mut source = StaticSource::new("slow", vec![record("Button", "Actions", &[])]);
        source.delay = Duration::from_millis(100);
        let calls = source.counter();
        orchestrator.register_source(source).await;

        let fetch = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.get_components("slow").await.unwrap() })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        orchestrator.refresh_cache(Some("slow")).await.unwrap();

        assert_eq!(fetch.await.unwrap().len(), 1);
        assert!(!orchestrator.cache().contains_fresh("slow").await);

        orchestrator.get_components("slow").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(orchestrator.cache().contains_fresh("slow").await);
    }

    #[tokio::test]
    async fn test_expired_entry_is_refetched() {
        let clock = ManualClock::at(0);
        let cache = ComponentCache::new(DEFAULT_TTL).with_clock(clock.clone());
        let orchestrator = SourceOrchestrator::new(cache);
        let source = StaticSource::new("a", vec![record("Button", "Actions", &[])]);
        let calls = source.counter();
        orchestrator.register_source(source).await;

        orchestrator.get_components("a").await.unwrap();
        clock.set(DEFAULT_TTL.as_millis() as i64 - 1);
        orchestrator.get_components("a").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        clock.set(DEFAULT_TTL.as_millis() as i64 + 1);
        orchestrator.get_components("a").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_durable_entry_survives_new_orchestrator() {
        let store = Arc::new(MemoryStore::new());

        let first = SourceOrchestrator::new(ComponentCache::default().with_store(store.clone()));
        first
            .register_source(StaticSource::new("a", vec![record("Button", "Actions", &[])]))
            .await;
        first.get_all_components().await;

        let second = SourceOrchestrator::new(ComponentCache::default().with_store(store));
        let source = StaticSource::new("a", vec![]);
        let calls = source.counter();
        second.register_source(source).await;

        let all = second.get_all_components().await;
        assert_eq!(all.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_broken_durable_store_degrades_to_fetching() {
        let orchestrator =
            SourceOrchestrator::new(ComponentCache::default().with_store(Arc::new(BrokenStore)));
        let source = StaticSource::new("a", vec![record("Button", "Actions", &[])]);
        let calls = source.counter();
        orchestrator.register_source(source).await;

        assert_eq!(orchestrator.get_all_components().await.len(), 1);
        assert_eq!(orchestrator.get_all_components().await.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
