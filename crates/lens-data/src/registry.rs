//! Name → pipeline factory lookup for the tables of a session

use std::sync::Arc;

use indexmap::IndexMap;
use lens_core::FilterPipeline;
use parking_lot::RwLock;
use tracing::debug;

use crate::table::{MemoryTable, Record};
use crate::DataError;

/// Builds a fresh pipeline for one table
pub type PipelineFactory = Arc<dyn Fn() -> Result<FilterPipeline<Record>, DataError> + Send + Sync>;

/// Explicit registry of the tables views can be opened on, in registration order
#[derive(Default)]
pub struct TableRegistry {
    factories: RwLock<IndexMap<String, PipelineFactory>>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory, replacing any previous one with the same name
    pub fn register(&self, name: impl Into<String>, factory: PipelineFactory) {
        let name = name.into();
        debug!(table = %name, "table registered");
        self.factories.write().insert(name, factory);
    }

    /// Register an unfiltered pipeline over a loaded table
    pub fn register_table(&self, table: Arc<MemoryTable>) {
        let name = table.name().to_string();
        self.register(
            name,
            Arc::new(move || {
                Ok(FilterPipeline::new(
                    table.supplier(),
                    table.entity_builder(),
                )?)
            }),
        );
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.factories.write().shift_remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.read().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.factories.read().keys().cloned().collect()
    }

    /// Create a new pipeline for the named table
    pub fn pipeline(&self, name: &str) -> Result<FilterPipeline<Record>, DataError> {
        let factory = self
            .factories
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| DataError::UnknownTable(name.to_string()))?;
        factory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::tests::sample_batch;
    use lens_core::TimeIntervalFilter;

    #[test]
    fn test_pipelines_are_independent() {
        let registry = TableRegistry::new();
        registry.register_table(MemoryTable::new("cities", sample_batch()).unwrap());

        let first = registry.pipeline("cities").unwrap();
        let second = registry.pipeline("cities").unwrap();
        first
            .set_time_interval_filter(Some(TimeIntervalFilter::new("created", 0, 3_000)))
            .unwrap();

        assert_eq!(first.record_count().get(), 2);
        assert_eq!(second.record_count().get(), 6);
    }

    #[test]
    fn test_unknown_table() {
        let registry = TableRegistry::new();
        assert!(matches!(
            registry.pipeline("missing"),
            Err(DataError::UnknownTable(name)) if name == "missing"
        ));
    }

    #[test]
    fn test_names_keep_registration_order() {
        let registry = TableRegistry::new();
        registry.register_table(MemoryTable::new("b", sample_batch()).unwrap());
        registry.register_table(MemoryTable::new("a", sample_batch()).unwrap());
        assert_eq!(registry.names(), vec!["b".to_string(), "a".to_string()]);
        assert!(registry.unregister("b"));
        assert!(!registry.contains("b"));
    }
}
