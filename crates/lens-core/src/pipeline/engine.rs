//! Filter pipeline coordinator

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use super::Stage;
use crate::error::PipelineError;
use crate::events::{ObservableValue, PipelineEvents};
use crate::filter::{Filter, Sorting, TimeIntervalFilter, TimestampScale};
use crate::query::{EntityBuilder, Query, QuerySupplier, TableIndex};
use crate::record::{CachedRecordSet, RecordSet};

/// Filters currently applied by the stages
#[derive(Clone, Default)]
struct StageFilters {
    time: Option<(TimeIntervalFilter, TimestampScale)>,
    geo: Option<Filter>,
    group: Option<Filter>,
    full_text: Option<String>,
}

/// Derived query of one stage and its memoized record set
struct StageState {
    query: Box<dyn Query>,
    records: CachedRecordSet,
}

/// State guarded by the pipeline lock
struct PipelineState {
    supplier: QuerySupplier,
    filters: StageFilters,
    stages: Vec<StageState>,
}

/// Outcome of a rebuild, published once the lock is released
struct Rebuilt {
    from: Stage,
    count: u64,
}

/// Coordinates the base → time → geo → grouping → full-text filter chain
///
/// Every filter mutation rebuilds the derived queries of its stage and of all
/// downstream stages, marks their record sets stale, eagerly executes the
/// final stage to keep [`record_count`](Self::record_count) current, and then
/// publishes the data-changed notifications upstream first.
pub struct FilterPipeline<E> {
    table: Arc<dyn TableIndex>,
    entity_builder: Arc<dyn EntityBuilder<E>>,
    state: Mutex<PipelineState>,
    record_count: ObservableValue<u64>,
    selected_record: RwLock<Option<E>>,
    events: PipelineEvents<E>,
}

impl<E: Clone + Send + Sync + 'static> FilterPipeline<E> {
    /// Create a pipeline over the queries produced by `supplier`
    pub fn new(
        supplier: QuerySupplier,
        entity_builder: Arc<dyn EntityBuilder<E>>,
    ) -> Result<Self, PipelineError> {
        let table = supplier().table();
        let filters = StageFilters::default();
        let (queries, final_set) = Self::build_stages(&supplier, &filters, Stage::Base)?;
        let count = final_set.len();

        let mut stages: Vec<StageState> = queries
            .into_iter()
            .map(|query| StageState {
                query,
                records: CachedRecordSet::Stale,
            })
            .collect();
        stages[Stage::FullText.index()].records = CachedRecordSet::Fresh(Arc::new(final_set));

        debug!(count, "filter pipeline created");

        Ok(Self {
            table,
            entity_builder,
            state: Mutex::new(PipelineState {
                supplier,
                filters,
                stages,
            }),
            record_count: ObservableValue::new(count),
            selected_record: RwLock::new(None),
            events: PipelineEvents::new(),
        })
    }

    /// Replace the base query supplier and rebuild every stage
    pub fn set_base_query(&self, supplier: QuerySupplier) -> Result<(), PipelineError> {
        let rebuilt = self.rebuild(Stage::Base, Some(supplier), |_| {})?;
        self.publish(rebuilt);
        Ok(())
    }

    /// Set or clear the time interval filter
    pub fn set_time_interval_filter(
        &self,
        filter: Option<TimeIntervalFilter>,
    ) -> Result<(), PipelineError> {
        let time = match filter {
            Some(filter) => {
                let data_type = self
                    .table
                    .column_type(&filter.field_name)
                    .ok_or_else(|| PipelineError::UnknownField(filter.field_name.clone()))?;
                let scale = TimestampScale::for_column(&filter.field_name, &data_type)?;
                Some((filter, scale))
            }
            None => None,
        };

        let rebuilt = self.rebuild(Stage::Time, None, |filters| filters.time = time)?;
        self.publish(rebuilt);
        self.events
            .time_filter_changed
            .fire(&self.time_interval_filter());
        Ok(())
    }

    /// Set or clear the geo filter
    pub fn set_geo_filter(&self, filter: Option<Filter>) -> Result<(), PipelineError> {
        self.check_fields(filter.as_ref())?;
        let rebuilt = self.rebuild(Stage::Geo, None, |filters| filters.geo = filter.clone())?;
        self.publish(rebuilt);
        self.events.geo_filter_changed.fire(&filter);
        Ok(())
    }

    /// Set or clear the group filter
    pub fn set_group_filter(&self, filter: Option<Filter>) -> Result<(), PipelineError> {
        self.check_fields(filter.as_ref())?;
        let rebuilt = self.rebuild(Stage::Grouping, None, |filters| filters.group = filter.clone())?;
        self.publish(rebuilt);
        self.events.group_filter_changed.fire(&filter);
        Ok(())
    }

    /// Set or clear the full-text search; blank text counts as cleared
    pub fn set_full_text_query(&self, text: Option<String>) -> Result<(), PipelineError> {
        let text = text.filter(|t| !t.trim().is_empty());
        let rebuilt = self.rebuild(Stage::FullText, None, |filters| filters.full_text = text.clone())?;
        self.publish(rebuilt);
        self.events.full_text_query_changed.fire(&text);
        Ok(())
    }

    /// Record set of a stage, executed on first access after invalidation
    pub fn record_set(&self, stage: Stage) -> Result<Arc<RecordSet>, PipelineError> {
        let mut state = self.state.lock();
        let slot = &mut state.stages[stage.index()];
        if let Some(records) = slot.records.get() {
            return Ok(records.clone());
        }

        let records = Arc::new(slot.query.execute_to_record_set()?);
        debug!(%stage, count = records.len(), "stage record set computed");
        slot.records = CachedRecordSet::Fresh(records.clone());
        Ok(records)
    }

    pub fn base_record_set(&self) -> Result<Arc<RecordSet>, PipelineError> {
        self.record_set(Stage::Base)
    }

    pub fn time_record_set(&self) -> Result<Arc<RecordSet>, PipelineError> {
        self.record_set(Stage::Time)
    }

    pub fn geo_record_set(&self) -> Result<Arc<RecordSet>, PipelineError> {
        self.record_set(Stage::Geo)
    }

    pub fn grouping_record_set(&self) -> Result<Arc<RecordSet>, PipelineError> {
        self.record_set(Stage::Grouping)
    }

    pub fn final_record_set(&self) -> Result<Arc<RecordSet>, PipelineError> {
        self.record_set(Stage::FullText)
    }

    /// Whether the stage's record set is currently memoized
    pub fn is_cached(&self, stage: Stage) -> bool {
        self.state.lock().stages[stage.index()].records.is_fresh()
    }

    /// A freshly built query equivalent to the stage's derived query
    pub fn query_for(&self, stage: Stage) -> Box<dyn Query> {
        let (supplier, filters) = {
            let state = self.state.lock();
            (state.supplier.clone(), state.filters.clone())
        };
        Self::build_query(&supplier, &filters, stage)
    }

    /// Execute the final query and materialize one page of entities
    pub fn page(
        &self,
        offset: usize,
        length: usize,
        sorting: Option<&Sorting>,
    ) -> Result<Vec<E>, PipelineError> {
        let ids = {
            let state = self.state.lock();
            state.stages[Stage::FullText.index()]
                .query
                .execute(offset, length, sorting)?
        };
        Ok(ids.into_iter().map(|id| self.entity_builder.build(id)).collect())
    }

    /// Materialize one entity per record id, in ascending id order
    pub fn entities(&self, records: &RecordSet) -> Vec<E> {
        records.iter().map(|id| self.entity_builder.build(id)).collect()
    }

    /// Remember the selected entity and notify listeners
    pub fn select_record(&self, entity: E) {
        *self.selected_record.write() = Some(entity.clone());
        self.events.record_selected.fire(&entity);
    }

    pub fn selected_record(&self) -> Option<E> {
        self.selected_record.read().clone()
    }

    /// Cardinality of the final stage's record set
    pub fn record_count(&self) -> &ObservableValue<u64> {
        &self.record_count
    }

    pub fn events(&self) -> &PipelineEvents<E> {
        &self.events
    }

    pub fn table(&self) -> &Arc<dyn TableIndex> {
        &self.table
    }

    pub fn time_interval_filter(&self) -> Option<TimeIntervalFilter> {
        self.state.lock().filters.time.as_ref().map(|(f, _)| f.clone())
    }

    pub fn geo_filter(&self) -> Option<Filter> {
        self.state.lock().filters.geo.clone()
    }

    pub fn group_filter(&self) -> Option<Filter> {
        self.state.lock().filters.group.clone()
    }

    pub fn full_text_query(&self) -> Option<String> {
        self.state.lock().filters.full_text.clone()
    }

    fn check_fields(&self, filter: Option<&Filter>) -> Result<(), PipelineError> {
        if let Some(filter) = filter {
            for field in filter.fields() {
                if self.table.column_type(field).is_none() {
                    return Err(PipelineError::UnknownField(field.to_string()));
                }
            }
        }
        Ok(())
    }

    /// Apply `update` to the current filters and rebuild `from` and every
    /// downstream stage under a single lock. Nothing is committed unless every
    /// query could be built and the final stage executed.
    fn rebuild(
        &self,
        from: Stage,
        supplier: Option<QuerySupplier>,
        update: impl FnOnce(&mut StageFilters),
    ) -> Result<Rebuilt, PipelineError> {
        let mut state = self.state.lock();
        let supplier = supplier.unwrap_or_else(|| state.supplier.clone());
        let mut filters = state.filters.clone();
        update(&mut filters);

        let (queries, final_set) = Self::build_stages(&supplier, &filters, from)?;
        let count = final_set.len();

        let offset = from.index();
        for (i, query) in queries.into_iter().enumerate() {
            let slot = &mut state.stages[offset + i];
            slot.query = query;
            slot.records.invalidate();
        }
        state.stages[Stage::FullText.index()].records = CachedRecordSet::Fresh(Arc::new(final_set));
        state.supplier = supplier;
        state.filters = filters;

        debug!(%from, count, "filter pipeline rebuilt");
        Ok(Rebuilt { from, count })
    }

    /// Fire notifications for a committed rebuild
    fn publish(&self, rebuilt: Rebuilt) {
        self.record_count.set(rebuilt.count);
        for stage in rebuilt.from.downstream() {
            let event = match stage {
                Stage::Base => &self.events.base_data_changed,
                Stage::Time => &self.events.time_data_changed,
                Stage::Geo => &self.events.geo_data_changed,
                Stage::Grouping => &self.events.grouping_data_changed,
                Stage::FullText => &self.events.final_data_changed,
            };
            event.fire(&());
        }
    }

    /// Derived queries for `from` onwards plus the executed final record set
    fn build_stages(
        supplier: &QuerySupplier,
        filters: &StageFilters,
        from: Stage,
    ) -> Result<(Vec<Box<dyn Query>>, RecordSet), PipelineError> {
        let queries: Vec<Box<dyn Query>> = from
            .downstream()
            .map(|stage| Self::build_query(supplier, filters, stage))
            .collect();

        let final_set = match queries.last() {
            Some(last) => last.execute_to_record_set()?,
            None => RecordSet::new(),
        };
        Ok((queries, final_set))
    }

    /// Fresh base query with every filter up to and including `stage`
    fn build_query(supplier: &QuerySupplier, filters: &StageFilters, stage: Stage) -> Box<dyn Query> {
        let mut query = supplier();

        if stage >= Stage::Time {
            if let Some((filter, scale)) = &filters.time {
                query.add_numeric_filter(&filter.field_name, filter.filter_for(*scale));
            }
        }
        if stage >= Stage::Geo {
            if let Some(filter) = &filters.geo {
                query.and(filter);
            }
        }
        if stage >= Stage::Grouping {
            if let Some(filter) = &filters.group {
                query.and(filter);
            }
        }
        if stage >= Stage::FullText {
            if let Some(text) = &filters.full_text {
                query.add_full_text_query(text);
            }
        }

        query
    }
}
