//! Listener registrations that end with their owner

use std::sync::Arc;

use lens_core::{Event, FilterPipeline};

/// Selects one of the pipeline's events
pub type EventSelector<E, T> = fn(&FilterPipeline<E>) -> &Event<T>;

/// Removes its listener from the pipeline when dropped
pub struct Subscription {
    remove: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn listen<E, T, F>(
        pipeline: &Arc<FilterPipeline<E>>,
        select: EventSelector<E, T>,
        listener: F,
    ) -> Self
    where
        E: Clone + Send + Sync + 'static,
        T: 'static,
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = select(pipeline.as_ref()).add_listener(listener);
        let pipeline = pipeline.clone();
        Self {
            remove: Some(Box::new(move || {
                select(pipeline.as_ref()).remove_listener(id);
            })),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}
