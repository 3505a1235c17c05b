//! Paged records of the final stage

use std::sync::Arc;

use lens_core::{Event, FilterPipeline, Sorting};

use crate::fields::FieldSet;
use crate::subscription::Subscription;
use crate::ViewError;

/// Rows of a table view; pages are rebuilt on every request
pub struct TableModel<E> {
    pipeline: Arc<FilterPipeline<E>>,
    fields: FieldSet,
    all_data_changed: Arc<Event<()>>,
    _final_changed: Subscription,
}

impl<E: Clone + Send + Sync + 'static> TableModel<E> {
    pub fn new(pipeline: Arc<FilterPipeline<E>>, fields: FieldSet) -> Self {
        let all_data_changed = Arc::new(Event::new());
        let relay = all_data_changed.clone();
        let final_changed = Subscription::listen(
            &pipeline,
            |p| &p.events().final_data_changed,
            move |_| relay.fire(&()),
        );

        Self {
            pipeline,
            fields,
            all_data_changed,
            _final_changed: final_changed,
        }
    }

    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    pub fn count(&self) -> u64 {
        self.pipeline.record_count().get()
    }

    /// One page of the final records, in id order unless `sorting` names a field
    pub fn records(
        &self,
        start: usize,
        length: usize,
        sorting: Option<&Sorting>,
    ) -> Result<Vec<E>, ViewError> {
        match sorting {
            Some(sorting) => Ok(self.pipeline.page(start, length, Some(sorting))?),
            None => {
                let records = self.pipeline.final_record_set()?;
                let page = records.iter().skip(start).take(length).collect();
                Ok(self.pipeline.entities(&page))
            }
        }
    }

    /// Select the record shown in detail views
    pub fn select(&self, entity: E) {
        self.pipeline.select_record(entity);
    }

    /// Fired whenever the final records changed
    pub fn on_all_data_changed(&self) -> &Event<()> {
        &self.all_data_changed
    }
}
