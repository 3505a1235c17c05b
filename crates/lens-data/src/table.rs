//! Columnar in-memory table backed by an arrow record batch

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{
    DataType, Date32Type, Date64Type, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type,
    Int8Type, SchemaRef, TimeUnit, TimestampMicrosecondType, TimestampMillisecondType,
    TimestampNanosecondType, TimestampSecondType, UInt16Type, UInt32Type, UInt64Type, UInt8Type,
};
use arrow::record_batch::RecordBatch;
use arrow::util::display::array_value_to_string;
use indexmap::IndexMap;
use lens_core::{EntityBuilder, Query, QueryError, QuerySupplier, RecordId, RecordSet, TableIndex, Value};
use tracing::info;

use crate::index::FullTextIndex;
use crate::query::MemoryQuery;
use crate::DataError;

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Materialized record: its id and every column value in schema order
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: RecordId,
    pub values: IndexMap<String, Value>,
}

impl Record {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }
}

/// Immutable table; record `n` is stored in row `n - 1`
pub struct MemoryTable {
    name: String,
    batch: RecordBatch,
    full_text: FullTextIndex,
}

impl MemoryTable {
    /// Create a table indexing every text column for full-text search
    pub fn new(name: impl Into<String>, batch: RecordBatch) -> Result<Arc<Self>, DataError> {
        let columns: Vec<String> = batch
            .schema()
            .fields()
            .iter()
            .filter(|f| matches!(f.data_type(), DataType::Utf8 | DataType::LargeUtf8))
            .map(|f| f.name().clone())
            .collect();
        Self::with_full_text_columns(name, batch, &columns)
    }

    /// Create a table indexing only the given text columns
    pub fn with_full_text_columns(
        name: impl Into<String>,
        batch: RecordBatch,
        columns: &[String],
    ) -> Result<Arc<Self>, DataError> {
        let name = name.into();
        if batch.num_rows() > u32::MAX as usize {
            return Err(DataError::Schema(format!(
                "Table '{}' has too many rows ({})",
                name,
                batch.num_rows()
            )));
        }

        let full_text = FullTextIndex::build(&batch, columns)?;
        info!(
            table = %name,
            rows = batch.num_rows(),
            terms = full_text.term_count(),
            "table loaded"
        );

        Ok(Arc::new(Self {
            name,
            batch,
            full_text,
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn full_text(&self) -> &FullTextIndex {
        &self.full_text
    }

    /// Every record id of the table
    pub fn all_ids(&self) -> RecordSet {
        let mut ids = RecordSet::new();
        let rows = self.batch.num_rows() as u32;
        if rows > 0 {
            ids.insert_range(1..=rows);
        }
        ids
    }

    /// A fresh unfiltered query
    pub fn query(self: &Arc<Self>) -> MemoryQuery {
        MemoryQuery::new(self.clone())
    }

    /// Supplier producing a fresh unfiltered query on every call
    pub fn supplier(self: &Arc<Self>) -> QuerySupplier {
        let table = self.clone();
        Arc::new(move || Box::new(table.query()) as Box<dyn Query>)
    }

    /// Entity builder materializing [`Record`]s from this table
    pub fn entity_builder(self: &Arc<Self>) -> Arc<dyn EntityBuilder<Record>> {
        let table = self.clone();
        Arc::new(move |id: RecordId| {
            table.record(id).unwrap_or_else(|| Record {
                id,
                values: IndexMap::new(),
            })
        })
    }

    /// Materialize a record, or `None` if the id is not stored
    pub fn record(&self, id: RecordId) -> Option<Record> {
        let row = self.row(id)?;
        let schema = self.batch.schema();
        let values = schema
            .fields()
            .iter()
            .zip(self.batch.columns())
            .map(|(field, column)| (field.name().clone(), value_at(column, row)))
            .collect();
        Some(Record { id, values })
    }

    pub(crate) fn column(&self, field: &str) -> Result<&ArrayRef, QueryError> {
        self.batch
            .column_by_name(field)
            .ok_or_else(|| QueryError::UnknownField(field.to_string()))
    }

    pub(crate) fn row(&self, id: RecordId) -> Option<usize> {
        let row = (id as usize).checked_sub(1)?;
        (row < self.batch.num_rows()).then_some(row)
    }
}

impl TableIndex for MemoryTable {
    fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    fn value(&self, field: &str, id: RecordId) -> Result<Value, QueryError> {
        let column = self.column(field)?;
        Ok(match self.row(id) {
            Some(row) => value_at(column, row),
            None => Value::Null,
        })
    }

    fn record_count(&self) -> usize {
        self.batch.num_rows()
    }
}

/// Read one cell as a [`Value`]; timestamps and dates become milliseconds
pub fn value_at(array: &ArrayRef, row: usize) -> Value {
    if array.is_null(row) {
        return Value::Null;
    }

    match array.data_type() {
        DataType::Boolean => Value::Boolean(array.as_boolean().value(row)),
        DataType::Int8 => Value::Integer(array.as_primitive::<Int8Type>().value(row) as i64),
        DataType::Int16 => Value::Integer(array.as_primitive::<Int16Type>().value(row) as i64),
        DataType::Int32 => Value::Integer(array.as_primitive::<Int32Type>().value(row) as i64),
        DataType::Int64 => Value::Integer(array.as_primitive::<Int64Type>().value(row)),
        DataType::UInt8 => Value::Integer(array.as_primitive::<UInt8Type>().value(row) as i64),
        DataType::UInt16 => Value::Integer(array.as_primitive::<UInt16Type>().value(row) as i64),
        DataType::UInt32 => Value::Integer(array.as_primitive::<UInt32Type>().value(row) as i64),
        DataType::UInt64 => Value::Integer(array.as_primitive::<UInt64Type>().value(row) as i64),
        DataType::Float32 => Value::Float(array.as_primitive::<Float32Type>().value(row) as f64),
        DataType::Float64 => Value::Float(array.as_primitive::<Float64Type>().value(row)),
        DataType::Utf8 => Value::Text(array.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => Value::Text(array.as_string::<i64>().value(row).to_string()),
        DataType::Timestamp(unit, _) => {
            let millis = match unit {
                TimeUnit::Second => array.as_primitive::<TimestampSecondType>().value(row) * 1000,
                TimeUnit::Millisecond => array.as_primitive::<TimestampMillisecondType>().value(row),
                TimeUnit::Microsecond => {
                    array.as_primitive::<TimestampMicrosecondType>().value(row) / 1000
                }
                TimeUnit::Nanosecond => {
                    array.as_primitive::<TimestampNanosecondType>().value(row) / 1_000_000
                }
            };
            Value::Timestamp(millis)
        }
        DataType::Date32 => {
            Value::Timestamp(array.as_primitive::<Date32Type>().value(row) as i64 * MILLIS_PER_DAY)
        }
        DataType::Date64 => Value::Timestamp(array.as_primitive::<Date64Type>().value(row)),
        _ => array_value_to_string(array, row)
            .map(Value::Text)
            .unwrap_or(Value::Null),
    }
}

/// Whether numeric filters can be evaluated on the column
pub(crate) fn is_numeric_column(data_type: &DataType) -> bool {
    data_type.is_numeric()
        || matches!(
            data_type,
            DataType::Timestamp(_, _) | DataType::Date32 | DataType::Date64
        )
}

/// Whether text filters can be evaluated on the column
pub(crate) fn is_text_column(data_type: &DataType) -> bool {
    matches!(data_type, DataType::Utf8 | DataType::LargeUtf8)
}
