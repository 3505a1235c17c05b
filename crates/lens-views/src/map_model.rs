//! Located records of the time stage, and area selection

use std::sync::Arc;

use geo::Rect;
use lens_core::{Event, Filter, FilterPipeline, RecordId, RecordSet, TableIndex};
use parking_lot::RwLock;
use tracing::debug;

use crate::fields::FieldKind;
use crate::subscription::Subscription;
use crate::ViewError;

/// A record placed on the map
#[derive(Debug, Clone, PartialEq)]
pub struct Marker<E> {
    pub entity: E,
    pub id: RecordId,
    pub latitude: f64,
    pub longitude: f64,
    /// Pixel offset of the marker icon from its anchor
    pub offset_x: i32,
    pub offset_y: i32,
}

struct MapState {
    latitude_field: Option<String>,
    longitude_field: Option<String>,
    marker_offset: (i32, i32),
}

pub struct MapModel<E> {
    pipeline: Arc<FilterPipeline<E>>,
    state: RwLock<MapState>,
    all_data_changed: Arc<Event<()>>,
    _time_changed: Subscription,
}

impl<E: Clone + Send + Sync + 'static> MapModel<E> {
    /// Locations default to `latitude`/`longitude` when both are float columns
    pub fn new(pipeline: Arc<FilterPipeline<E>>) -> Self {
        let defaults = ("latitude", "longitude");
        let table = pipeline.table().as_ref();
        let located = is_float_column(table, defaults.0) && is_float_column(table, defaults.1);

        let all_data_changed = Arc::new(Event::new());
        let relay = all_data_changed.clone();
        let time_changed = Subscription::listen(
            &pipeline,
            |p| &p.events().time_data_changed,
            move |_| relay.fire(&()),
        );

        Self {
            pipeline,
            state: RwLock::new(MapState {
                latitude_field: located.then(|| defaults.0.to_string()),
                longitude_field: located.then(|| defaults.1.to_string()),
                marker_offset: (0, 0),
            }),
            all_data_changed,
            _time_changed: time_changed,
        }
    }

    pub fn location_fields(&self) -> Option<(String, String)> {
        let state = self.state.read();
        Some((state.latitude_field.clone()?, state.longitude_field.clone()?))
    }

    pub fn set_location_fields(&self, latitude: &str, longitude: &str) -> Result<(), ViewError> {
        for field in [latitude, longitude] {
            if self.pipeline.table().column_type(field).is_none() {
                return Err(ViewError::UnknownField(field.to_string()));
            }
            if !is_float_column(self.pipeline.table().as_ref(), field) {
                return Err(ViewError::InvalidField {
                    field: field.to_string(),
                    reason: "location fields must be floating point".to_string(),
                });
            }
        }

        {
            let mut state = self.state.write();
            state.latitude_field = Some(latitude.to_string());
            state.longitude_field = Some(longitude.to_string());
        }
        self.all_data_changed.fire(&());
        Ok(())
    }

    pub fn set_marker_offset(&self, x: i32, y: i32) {
        self.state.write().marker_offset = (x, y);
    }

    /// Markers for every time-stage record with a latitude other than zero
    pub fn markers(&self) -> Result<Vec<Marker<E>>, ViewError> {
        let (latitude_field, longitude_field) = self
            .location_fields()
            .ok_or(ViewError::NotConfigured("location fields"))?;
        let (offset_x, offset_y) = self.state.read().marker_offset;

        let records = self.pipeline.time_record_set()?;
        let table = self.pipeline.table();
        let mut located = RecordSet::new();
        let mut positions = Vec::new();
        for id in records.iter() {
            let Some(latitude) = table.value(&latitude_field, id)?.as_f64() else { continue };
            if latitude == 0.0 {
                continue;
            }
            let Some(longitude) = table.value(&longitude_field, id)?.as_f64() else { continue };
            located.insert(id);
            positions.push((id, latitude, longitude));
        }
        debug!(records = records.len(), markers = positions.len(), "map markers built");

        let markers = self
            .pipeline
            .entities(&located)
            .into_iter()
            .zip(positions)
            .map(|(entity, (id, latitude, longitude))| Marker {
                entity,
                id,
                latitude,
                longitude,
                offset_x,
                offset_y,
            })
            .collect();
        Ok(markers)
    }

    /// Restrict the pipeline to records inside `bounds` (x = longitude)
    pub fn select_area(&self, bounds: Rect<f64>) -> Result<(), ViewError> {
        let (latitude_field, longitude_field) = self
            .location_fields()
            .ok_or(ViewError::NotConfigured("location fields"))?;
        self.pipeline
            .set_geo_filter(Some(Filter::within(latitude_field, longitude_field, bounds)))?;
        Ok(())
    }

    pub fn clear_area(&self) -> Result<(), ViewError> {
        self.pipeline.set_geo_filter(None)?;
        Ok(())
    }

    pub fn selected_area(&self) -> Option<Rect<f64>> {
        match self.pipeline.geo_filter() {
            Some(Filter::Within { bounds, .. }) => Some(bounds),
            _ => None,
        }
    }

    /// Fired whenever the time stage changed
    pub fn on_all_data_changed(&self) -> &Event<()> {
        &self.all_data_changed
    }
}

fn is_float_column(table: &dyn TableIndex, field: &str) -> bool {
    table
        .column_type(field)
        .is_some_and(|t| FieldKind::of(&t) == FieldKind::Float)
}
