//! Detail form of the selected record and the actions allowed on it

use std::sync::{Arc, Weak};

use lens_core::{Event, FilterPipeline};
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::fields::{Field, FieldSet};
use crate::subscription::Subscription;
use crate::ViewError;

pub type Decider<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;
pub type Validator<E> = Arc<dyn Fn(&E) -> Result<(), String> + Send + Sync>;

/// Permissions and validation applied by the form
pub struct DeciderSet<E> {
    pub allow_creation: bool,
    pub allow_reading_deleted: bool,
    modification: Decider<E>,
    deletion: Decider<E>,
    restore: Decider<E>,
    validation: Validator<E>,
}

impl<E> Clone for DeciderSet<E> {
    fn clone(&self) -> Self {
        Self {
            allow_creation: self.allow_creation,
            allow_reading_deleted: self.allow_reading_deleted,
            modification: self.modification.clone(),
            deletion: self.deletion.clone(),
            restore: self.restore.clone(),
            validation: self.validation.clone(),
        }
    }
}

impl<E: 'static> DeciderSet<E> {
    /// Fixed permissions; every record passes validation
    pub fn create(
        allow_creation: bool,
        allow_modification: bool,
        allow_deletion: bool,
        allow_reading_deleted: bool,
        allow_restore: bool,
    ) -> Self {
        Self {
            allow_creation,
            allow_reading_deleted,
            modification: Arc::new(move |_: &E| allow_modification),
            deletion: Arc::new(move |_: &E| allow_deletion),
            restore: Arc::new(move |_: &E| allow_restore),
            validation: Arc::new(accept_all::<E>),
        }
    }

    pub fn read_only() -> Self {
        Self::create(false, false, false, false, false)
    }

    pub fn with_modification(mut self, decider: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        self.modification = Arc::new(decider);
        self
    }

    pub fn with_deletion(mut self, decider: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        self.deletion = Arc::new(decider);
        self
    }

    pub fn with_validation(
        mut self,
        validator: impl Fn(&E) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.validation = Arc::new(validator);
        self
    }

    pub fn allow_modification(&self, entity: &E) -> bool {
        (self.modification)(entity)
    }

    pub fn allow_deletion(&self, entity: &E) -> bool {
        (self.deletion)(entity)
    }

    pub fn allow_restore(&self, entity: &E) -> bool {
        (self.restore)(entity)
    }

    pub fn validate(&self, entity: &E) -> Result<(), String> {
        (self.validation)(entity)
    }
}

fn accept_all<E>(_: &E) -> Result<(), String> {
    Ok(())
}

/// Toolbar state of the form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FormActions {
    pub can_create: bool,
    pub can_save: bool,
    pub can_delete: bool,
}

struct Displayed<E> {
    entity: E,
    /// Created with `new_record` and never saved
    is_new: bool,
}

pub struct FormModel<E> {
    pipeline: Arc<FilterPipeline<E>>,
    fields: FieldSet,
    deciders: DeciderSet<E>,
    new_entity: Box<dyn Fn() -> E + Send + Sync>,
    displayed: RwLock<Option<Displayed<E>>>,
    displayed_changed: Event<Option<E>>,
    _record_selected: Subscription,
}

impl<E: Clone + Send + Sync + 'static> FormModel<E> {
    /// `new_entity` builds the blank record shown by [`new_record`](Self::new_record)
    pub fn new(
        pipeline: Arc<FilterPipeline<E>>,
        fields: FieldSet,
        deciders: DeciderSet<E>,
        new_entity: impl Fn() -> E + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let weak = weak.clone();
            let record_selected = Subscription::listen(
                &pipeline,
                |p| &p.events().record_selected,
                move |entity: &E| {
                    if let Some(model) = weak.upgrade() {
                        model.display(Some(entity.clone()), false);
                    }
                },
            );

            Self {
                pipeline: pipeline.clone(),
                fields,
                deciders,
                new_entity: Box::new(new_entity),
                displayed: RwLock::new(None),
                displayed_changed: Event::new(),
                _record_selected: record_selected,
            }
        })
    }

    pub fn displayed(&self) -> Option<E> {
        self.displayed.read().as_ref().map(|d| d.entity.clone())
    }

    pub fn is_new(&self) -> bool {
        self.displayed.read().as_ref().is_some_and(|d| d.is_new)
    }

    /// Fields the form may write; store-maintained metadata is excluded
    pub fn editable_fields(&self) -> Vec<&Field> {
        self.fields.iter().filter(|f| f.editable).collect()
    }

    pub fn actions(&self) -> FormActions {
        let displayed = self.displayed.read();
        let (can_save, can_delete) = match displayed.as_ref() {
            Some(Displayed { is_new: true, .. }) => (self.deciders.allow_creation, false),
            Some(Displayed { entity, is_new: false }) => (
                self.deciders.allow_modification(entity),
                self.deciders.allow_deletion(entity),
            ),
            None => (false, false),
        };
        FormActions {
            can_create: self.deciders.allow_creation,
            can_save,
            can_delete,
        }
    }

    /// Show a blank record
    pub fn new_record(&self) -> Result<(), ViewError> {
        if !self.deciders.allow_creation {
            return Err(ViewError::NotAllowed("creation"));
        }
        self.display(Some((self.new_entity)()), true);
        Ok(())
    }

    /// Validate the displayed record and hand it to `store`
    ///
    /// The record returned by `store` replaces the displayed one.
    pub fn save<F>(&self, store: F) -> Result<E, ViewError>
    where
        F: FnOnce(&E) -> Result<E, String>,
    {
        let entity = self
            .displayed()
            .ok_or(ViewError::NotConfigured("displayed record"))?;
        if !self.actions().can_save {
            return Err(ViewError::NotAllowed(if self.is_new() {
                "creation"
            } else {
                "modification"
            }));
        }

        self.deciders.validate(&entity).map_err(ViewError::Validation)?;
        let saved = store(&entity).map_err(ViewError::Save)?;
        info!(new = self.is_new(), "record saved");
        self.display(Some(saved.clone()), false);
        Ok(saved)
    }

    /// Hand the displayed record to `remove` and clear the form
    pub fn delete<F>(&self, remove: F) -> Result<(), ViewError>
    where
        F: FnOnce(&E) -> Result<(), String>,
    {
        let entity = self
            .displayed()
            .ok_or(ViewError::NotConfigured("displayed record"))?;
        if !self.actions().can_delete {
            return Err(ViewError::NotAllowed("deletion"));
        }

        remove(&entity).map_err(ViewError::Save)?;
        info!("record deleted");
        self.display(None, false);
        Ok(())
    }

    /// Show a record in the form and every other view of the pipeline
    pub fn select(&self, entity: E) {
        self.pipeline.select_record(entity);
    }

    pub fn on_displayed_changed(&self) -> &Event<Option<E>> {
        &self.displayed_changed
    }

    fn display(&self, entity: Option<E>, is_new: bool) {
        debug!(is_new, present = entity.is_some(), "form record changed");
        *self.displayed.write() = entity.clone().map(|entity| Displayed { entity, is_new });
        self.displayed_changed.fire(&entity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use indexmap::IndexMap;
    use lens_core::Value;
    use lens_data::Record;

    fn blank() -> Record {
        Record {
            id: 0,
            values: IndexMap::new(),
        }
    }

    fn named(record: &Record) -> Result<(), String> {
        match record.get("name") {
            Some(Value::Text(name)) if !name.is_empty() => Ok(()),
            _ => Err("name is required".to_string()),
        }
    }

    fn form(deciders: DeciderSet<Record>) -> (Arc<FilterPipeline<Record>>, Arc<FormModel<Record>>) {
        let pipeline = testing::pipeline();
        let fields = FieldSet::from_schema(&pipeline.table().schema());
        let model = FormModel::new(pipeline.clone(), fields, deciders, blank);
        (pipeline, model)
    }

    #[test]
    fn test_follows_record_selection() {
        let (pipeline, model) = form(DeciderSet::create(true, true, false, false, false));
        assert_eq!(model.actions(), FormActions { can_create: true, ..FormActions::default() });

        let record = pipeline.entities(&[3u32].into_iter().collect()).remove(0);
        pipeline.select_record(record.clone());
        assert_eq!(model.displayed(), Some(record));
        assert_eq!(
            model.actions(),
            FormActions { can_create: true, can_save: true, can_delete: false }
        );
    }

    #[test]
    fn test_save_validates_before_storing() {
        let deciders = DeciderSet::create(true, true, true, false, false).with_validation(named);
        let (_pipeline, model) = form(deciders);
        model.new_record().unwrap();
        assert!(model.is_new());
        assert!(!model.actions().can_delete);

        let mut stored = false;
        let result = model.save(|_| {
            stored = true;
            Ok(blank())
        });
        assert_eq!(result, Err(ViewError::Validation("name is required".to_string())));
        assert!(!stored);

        model.select(Record {
            id: 7,
            values: IndexMap::from([("name".to_string(), Value::Text("Flood".to_string()))]),
        });
        let saved = model
            .save(|record| Ok(Record { id: 8, ..record.clone() }))
            .unwrap();
        assert_eq!(saved.id, 8);
        assert_eq!(model.displayed().map(|r| r.id), Some(8));
        assert!(!model.is_new());
    }

    #[test]
    fn test_read_only_refuses_every_action() {
        let (pipeline, model) = form(DeciderSet::read_only());
        assert_eq!(model.new_record(), Err(ViewError::NotAllowed("creation")));

        let record = pipeline.entities(&[1u32].into_iter().collect()).remove(0);
        model.select(record);
        assert_eq!(model.save(|r| Ok(r.clone())), Err(ViewError::NotAllowed("modification")));
        assert_eq!(model.delete(|_| Ok(())), Err(ViewError::NotAllowed("deletion")));
    }

    #[test]
    fn test_delete_clears_form() {
        let deciders = DeciderSet::create(false, false, true, false, false)
            .with_deletion(|record: &Record| record.id != 2);
        let (pipeline, model) = form(deciders);

        model.select(pipeline.entities(&[2u32].into_iter().collect()).remove(0));
        assert!(!model.actions().can_delete);

        model.select(pipeline.entities(&[4u32].into_iter().collect()).remove(0));
        model.delete(|_| Ok(())).unwrap();
        assert!(model.displayed().is_none());
    }

    #[test]
    fn test_store_failure_keeps_record() {
        let (_pipeline, model) = form(DeciderSet::create(true, true, false, false, false));
        model.new_record().unwrap();
        assert_eq!(
            model.save(|_| Err("disk full".to_string())),
            Err(ViewError::Save("disk full".to_string()))
        );
        assert!(model.is_new());
    }

    #[test]
    fn test_editable_fields() {
        let (_pipeline, model) = form(DeciderSet::read_only());
        assert_eq!(model.editable_fields().len(), 8);
    }
}
