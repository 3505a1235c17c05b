//! Sources producing in-memory tables

pub mod csv_source;

use std::sync::Arc;

use async_trait::async_trait;

use crate::table::MemoryTable;
use crate::DataError;

pub use csv_source::CsvSource;

/// Loads a complete table; implementations move blocking I/O off the runtime
#[async_trait]
pub trait TableSource: Send + Sync {
    fn name(&self) -> &str;

    async fn load(&self) -> Result<Arc<MemoryTable>, DataError>;
}
