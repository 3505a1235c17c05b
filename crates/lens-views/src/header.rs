//! Search input and record-count title of a view

use std::sync::Arc;

use lens_core::{FilterPipeline, ObservableValue};

use crate::context::PresentationContext;
use crate::subscription::Subscription;
use crate::ViewError;

pub struct HeaderModel<E> {
    pipeline: Arc<FilterPipeline<E>>,
    view_title: Arc<ObservableValue<String>>,
    _count_changed: Subscription,
}

impl<E: Clone + Send + Sync + 'static> HeaderModel<E> {
    pub fn new(
        pipeline: Arc<FilterPipeline<E>>,
        context: PresentationContext,
        title: impl Into<String>,
    ) -> Self {
        let title = title.into();
        let view_title = Arc::new(ObservableValue::new(
            context.title_with_count(&title, pipeline.record_count().get()),
        ));

        let observed = view_title.clone();
        let count_changed = Subscription::listen(
            &pipeline,
            |p| p.record_count().on_changed(),
            move |count| observed.set(context.title_with_count(&title, *count)),
        );

        Self {
            pipeline,
            view_title,
            _count_changed: count_changed,
        }
    }

    /// `"<title> (<count>)"`, kept current with the pipeline's record count
    pub fn view_title(&self) -> &ObservableValue<String> {
        &self.view_title
    }

    /// Blank text clears the search
    pub fn set_search_text(&self, text: &str) -> Result<(), ViewError> {
        let text = text.trim();
        let query = (!text.is_empty()).then(|| text.to_string());
        self.pipeline.set_full_text_query(query)?;
        Ok(())
    }

    pub fn search_text(&self) -> Option<String> {
        self.pipeline.full_text_query()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use lens_core::Filter;
    use parking_lot::Mutex;

    #[test]
    fn test_title_follows_record_count() {
        let pipeline = testing::pipeline();
        let header = HeaderModel::new(pipeline.clone(), PresentationContext::default(), "Incidents");
        assert_eq!(header.view_title().get(), "Incidents (6)");

        let titles = Arc::new(Mutex::new(Vec::new()));
        let seen = titles.clone();
        header
            .view_title()
            .on_changed()
            .add_listener(move |title: &String| seen.lock().push(title.clone()));

        pipeline.set_group_filter(Some(Filter::boolean("verified", true))).unwrap();
        assert_eq!(header.view_title().get(), "Incidents (3)");
        // the count is unchanged, so the title is not republished
        pipeline.set_group_filter(Some(Filter::boolean("verified", true))).unwrap();
        assert_eq!(*titles.lock(), vec!["Incidents (3)".to_string()]);
    }

    #[test]
    fn test_search_text_drives_full_text_query() {
        let pipeline = testing::pipeline();
        let header = HeaderModel::new(pipeline.clone(), PresentationContext::default(), "Incidents");

        header.set_search_text("  kitch ").unwrap();
        assert_eq!(header.search_text().as_deref(), Some("kitch"));
        assert_eq!(header.view_title().get(), "Incidents (1)");

        header.set_search_text("").unwrap();
        assert!(header.search_text().is_none());
        assert_eq!(pipeline.record_count().get(), 6);
    }
}
