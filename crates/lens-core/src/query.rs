//! Traits implemented by the query engine the pipeline delegates to

use std::sync::Arc;

use arrow::datatypes::SchemaRef;

use crate::error::QueryError;
use crate::filter::{Filter, NumericFilter, Sorting};
use crate::record::{RecordId, RecordSet, Value};

/// Column metadata and cell access for a single table
pub trait TableIndex: Send + Sync {
    /// Column names and storage types
    fn schema(&self) -> SchemaRef;

    /// Read one cell
    fn value(&self, field: &str, id: RecordId) -> Result<Value, QueryError>;

    /// Number of records stored in the table
    fn record_count(&self) -> usize;

    /// Storage type of a column, if it exists
    fn column_type(&self, field: &str) -> Option<arrow::datatypes::DataType> {
        self.schema()
            .field_with_name(field)
            .ok()
            .map(|f| f.data_type().clone())
    }
}

/// A query under construction. Filters are only ever added; a query whose
/// parent changed is rebuilt from scratch rather than mutated back.
pub trait Query: Send {
    /// Table the query runs against
    fn table(&self) -> Arc<dyn TableIndex>;

    /// Restrict the query with an arbitrary filter
    fn and(&mut self, filter: &Filter);

    /// Restrict a numeric column to the given filter
    fn add_numeric_filter(&mut self, field: &str, filter: NumericFilter);

    /// Restrict the query to records matching a full-text search
    fn add_full_text_query(&mut self, text: &str);

    /// Execute the query and collect the matching record ids
    fn execute_to_record_set(&self) -> Result<RecordSet, QueryError>;

    /// Execute the query, optionally sorted, and return one page of ids
    fn execute(
        &self,
        offset: usize,
        length: usize,
        sorting: Option<&Sorting>,
    ) -> Result<Vec<RecordId>, QueryError>;
}

/// Factory returning a fresh, unfiltered base query on every call
pub type QuerySupplier = Arc<dyn Fn() -> Box<dyn Query> + Send + Sync>;

/// Materializes an entity for a record id
pub trait EntityBuilder<E>: Send + Sync {
    fn build(&self, id: RecordId) -> E;
}

impl<E, F> EntityBuilder<E> for F
where
    F: Fn(RecordId) -> E + Send + Sync,
{
    fn build(&self, id: RecordId) -> E {
        (self)(id)
    }
}
