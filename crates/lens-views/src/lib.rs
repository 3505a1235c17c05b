//! Headless view models driven by the filter pipeline
//!
//! Each model observes a shared [`FilterPipeline`](lens_core::FilterPipeline)
//! and either exposes data derived from one of its stages or feeds user
//! selections back into one of its filters.

pub mod context;
pub mod fields;
pub mod form;
pub mod grouping;
pub mod header;
pub mod map_model;
pub mod subscription;
pub mod table_model;
pub mod time_graph;

#[cfg(test)]
pub(crate) mod testing;

use lens_core::{PipelineError, QueryError};
use thiserror::Error;

pub use context::PresentationContext;
pub use fields::{Field, FieldKind, FieldSet};
pub use form::{DeciderSet, FormActions, FormModel};
pub use grouping::{GroupFilter, GroupingEntry, GroupingKind, GroupingModel, GroupingNode};
pub use header::HeaderModel;
pub use map_model::{MapModel, Marker};
pub use table_model::TableModel;
pub use time_graph::{Interval, Series, TimeGraphModel};

/// Errors raised by view models
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ViewError {
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Field '{field}' cannot be used here: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("No {0} is configured")]
    NotConfigured(&'static str),

    #[error("Not allowed: {0}")]
    NotAllowed(&'static str),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Save failed: {0}")]
    Save(String),
}
