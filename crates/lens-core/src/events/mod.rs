use std::sync::Arc;

use parking_lot::RwLock;
use uuid::Uuid;

use crate::filter::{Filter, TimeIntervalFilter};

/// Handle returned when registering a listener
pub type ListenerId = Uuid;

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Typed observer list with synchronous fan-out
pub struct Event<T> {
    listeners: RwLock<Vec<(ListenerId, Listener<T>)>>,
}

impl<T> Event<T> {
    /// Create an event without listeners
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Register a listener; listeners run in registration order
    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = Uuid::new_v4();
        self.listeners.write().push((id, Arc::new(listener)));
        id
    }

    /// Unregister a listener, returning whether it was registered
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Invoke every listener with `value`
    pub fn fire(&self, value: &T) {
        // Snapshot so listeners may register, unregister or fire re-entrantly
        let listeners: Vec<Listener<T>> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in listeners {
            listener(value);
        }
    }
}

impl<T> Default for Event<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A value whose changes are published through an event
pub struct ObservableValue<T> {
    value: RwLock<T>,
    on_changed: Event<T>,
}

impl<T: Clone + PartialEq> ObservableValue<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: RwLock::new(value),
            on_changed: Event::new(),
        }
    }

    pub fn get(&self) -> T {
        self.value.read().clone()
    }

    /// Store a new value; listeners are notified only when it differs
    pub fn set(&self, value: T) {
        {
            let mut current = self.value.write();
            if *current == value {
                return;
            }
            *current = value.clone();
        }
        self.on_changed.fire(&value);
    }

    pub fn on_changed(&self) -> &Event<T> {
        &self.on_changed
    }
}

impl<T: Clone + PartialEq + Default> Default for ObservableValue<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Notifications published by the filter pipeline
///
/// Data-changed events fire upstream first (base, time, geo, grouping,
/// final) after the pipeline state has been committed. Filter-changed events
/// fire last and carry the newly stored filter.
pub struct PipelineEvents<E> {
    pub base_data_changed: Event<()>,
    pub time_data_changed: Event<()>,
    pub geo_data_changed: Event<()>,
    pub grouping_data_changed: Event<()>,
    pub final_data_changed: Event<()>,

    pub time_filter_changed: Event<Option<TimeIntervalFilter>>,
    pub geo_filter_changed: Event<Option<Filter>>,
    pub group_filter_changed: Event<Option<Filter>>,
    pub full_text_query_changed: Event<Option<String>>,

    pub record_selected: Event<E>,
}

impl<E> PipelineEvents<E> {
    pub fn new() -> Self {
        Self {
            base_data_changed: Event::new(),
            time_data_changed: Event::new(),
            geo_data_changed: Event::new(),
            grouping_data_changed: Event::new(),
            final_data_changed: Event::new(),
            time_filter_changed: Event::new(),
            geo_filter_changed: Event::new(),
            group_filter_changed: Event::new(),
            full_text_query_changed: Event::new(),
            record_selected: Event::new(),
        }
    }
}

impl<E> Default for PipelineEvents<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_fires_in_registration_order() {
        let event = Event::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let first = seen.clone();
        event.add_listener(move |v| first.lock().push(("first", *v)));
        let second = seen.clone();
        event.add_listener(move |v| second.lock().push(("second", *v)));

        event.fire(&7);
        assert_eq!(*seen.lock(), vec![("first", 7), ("second", 7)]);
    }

    #[test]
    fn test_remove_listener() {
        let event = Event::<()>::new();
        let id = event.add_listener(|_| {});
        assert_eq!(event.listener_count(), 1);
        assert!(event.remove_listener(id));
        assert!(!event.remove_listener(id));
        assert_eq!(event.listener_count(), 0);
    }

    #[test]
    fn test_listener_may_register_while_firing() {
        let event = Arc::new(Event::<()>::new());
        let inner = event.clone();
        event.add_listener(move |_| {
            inner.add_listener(|_| {});
        });
        event.fire(&());
        assert_eq!(event.listener_count(), 2);
    }

    #[test]
    fn test_observable_fires_only_on_change() {
        let value = ObservableValue::new(0u64);
        let changes = Arc::new(Mutex::new(Vec::new()));
        let sink = changes.clone();
        value.on_changed().add_listener(move |v| sink.lock().push(*v));

        value.set(3);
        value.set(3);
        value.set(4);

        assert_eq!(value.get(), 4);
        assert_eq!(*changes.lock(), vec![3, 4]);
    }
}
