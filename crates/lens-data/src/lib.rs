//! In-memory query engine and table sources for the filter pipeline

pub mod config;
pub mod index;
pub mod query;
pub mod registry;
pub mod sources;
pub mod table;

use arrow::error::ArrowError;
use lens_core::{PipelineError, QueryError};
use thiserror::Error;
use tokio::task::JoinError;

// Re-exports
pub use config::{NullConfig, SerializableDataType, TableConfig};
pub use index::FullTextIndex;
pub use query::MemoryQuery;
pub use registry::TableRegistry;
pub use sources::{CsvSource, TableSource};
pub use table::{MemoryTable, Record};

/// Errors that can occur in data operations
#[derive(Error, Debug)]
pub enum DataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Join error: {0}")]
    Join(#[from] JoinError),

    #[error("{0}")]
    Other(String),
}
