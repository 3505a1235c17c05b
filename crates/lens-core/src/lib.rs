//! Core functionality for the record-set filter pipeline
//!
//! This crate provides the filter pipeline coordinator together with the
//! abstractions it is built on: record sets, the filter model, the query and
//! table traits implemented by a query engine, and typed change notifications.

pub mod error;
pub mod events;
pub mod filter;
pub mod pipeline;
pub mod query;
pub mod record;
pub mod text;

// Re-export commonly used types
pub use error::{PipelineError, QueryError};
pub use events::{Event, ListenerId, ObservableValue, PipelineEvents};
pub use filter::{
    Filter, NumericFilter, Sorting, TextFilter, TimeIntervalFilter, TimestampScale,
};
pub use pipeline::{FilterPipeline, Stage};
pub use query::{EntityBuilder, Query, QuerySupplier, TableIndex};
pub use record::{CachedRecordSet, RecordId, RecordSet, Value};
