use std::path::PathBuf;
use std::sync::Arc;

use arrow::array::{
    ArrayRef, BooleanArray, Date64Array, Float64Array, Int32Array, Int64Array, StringArray,
    TimestampMillisecondArray,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord};
use tracing::{debug, warn};

use super::TableSource;
use crate::config::TableConfig;
use crate::table::MemoryTable;
use crate::DataError;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Delimited text file loaded completely into memory
pub struct CsvSource {
    name: String,
    config: TableConfig,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::from_config(TableConfig::for_path(path))
    }

    pub fn from_config(config: TableConfig) -> Self {
        Self {
            name: config.table_name(),
            config,
        }
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    /// Read the whole file into one batch, inferring column types from the
    /// first `sample_size` rows unless overridden
    pub fn read_batch(config: &TableConfig) -> Result<RecordBatch, DataError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(config.has_header)
            .delimiter(config.delimiter_byte()?)
            .from_path(&config.path)?;

        let headers: Option<Vec<String>> = if config.has_header {
            Some(reader.headers()?.iter().map(|h| h.trim().to_string()).collect())
        } else {
            None
        };
        let rows = reader.records().collect::<Result<Vec<StringRecord>, _>>()?;

        let names = match headers {
            Some(headers) => headers,
            None => {
                let width = rows.first().map(|r| r.len()).unwrap_or(0);
                (1..=width).map(|i| format!("column_{}", i)).collect()
            }
        };

        let mut fields = Vec::with_capacity(names.len());
        let mut columns: Vec<ArrayRef> = Vec::with_capacity(names.len());
        for (idx, name) in names.iter().enumerate() {
            let cells: Vec<Option<&str>> = rows
                .iter()
                .map(|row| row.get(idx).filter(|v| !config.null_config.is_null(v)))
                .collect();
            let data_type = config
                .column_type(name)
                .unwrap_or_else(|| detect_column_type(&cells[..cells.len().min(config.sample_size)]));

            let (array, rejected) = build_column(&data_type, &cells);
            if rejected > 0 {
                warn!(column = %name, ?data_type, rejected, "unparseable values loaded as null");
            }
            debug!(column = %name, ?data_type, "column loaded");
            fields.push(Field::new(name, data_type, true));
            columns.push(array);
        }

        let options = RecordBatchOptions::new().with_row_count(Some(rows.len()));
        Ok(RecordBatch::try_new_with_options(
            Arc::new(Schema::new(fields)),
            columns,
            &options,
        )?)
    }

    fn check_configured_fields(&self, batch: &RecordBatch) -> Result<(), DataError> {
        let configured = [
            &self.config.time_field,
            &self.config.latitude_field,
            &self.config.longitude_field,
        ];
        for field in configured.into_iter().flatten() {
            if batch.column_by_name(field).is_none() {
                return Err(DataError::Schema(format!(
                    "Configured field '{}' is not a column of '{}'",
                    field, self.name
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TableSource for CsvSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load(&self) -> Result<Arc<MemoryTable>, DataError> {
        let config = self.config.clone();
        let batch = tokio::task::spawn_blocking(move || Self::read_batch(&config)).await??;
        self.check_configured_fields(&batch)?;

        let name = self.name.clone();
        let full_text_columns = self.config.full_text_columns.clone();
        tokio::task::spawn_blocking(move || match full_text_columns {
            Some(columns) => MemoryTable::with_full_text_columns(name, batch, &columns),
            None => MemoryTable::new(name, batch),
        })
        .await?
    }
}

/// Narrowest type every non-null sample parses as
fn detect_column_type(samples: &[Option<&str>]) -> DataType {
    let mut values = samples.iter().flatten().map(|v| v.trim()).peekable();
    if values.peek().is_none() {
        return DataType::Utf8;
    }
    let values: Vec<&str> = values.collect();

    if values.iter().all(|v| parse_bool(v).is_some()) {
        DataType::Boolean
    } else if values.iter().all(|v| v.parse::<i64>().is_ok()) {
        DataType::Int64
    } else if values.iter().all(|v| v.parse::<f64>().is_ok()) {
        DataType::Float64
    } else if values.iter().all(|v| parse_timestamp(v).is_some()) {
        DataType::Timestamp(arrow::datatypes::TimeUnit::Millisecond, None)
    } else {
        DataType::Utf8
    }
}

/// Build an array of `data_type`, returning it with the number of cells that
/// failed to parse
fn build_column(data_type: &DataType, cells: &[Option<&str>]) -> (ArrayRef, usize) {
    match data_type {
        DataType::Boolean => {
            let (values, rejected) = parse_cells(cells, parse_bool);
            (Arc::new(BooleanArray::from(values)), rejected)
        }
        DataType::Int32 => {
            let (values, rejected) = parse_cells(cells, |v| v.parse::<i32>().ok());
            (Arc::new(Int32Array::from(values)), rejected)
        }
        DataType::Int64 => {
            let (values, rejected) = parse_cells(cells, |v| v.parse::<i64>().ok());
            (Arc::new(Int64Array::from(values)), rejected)
        }
        DataType::Float64 => {
            let (values, rejected) = parse_cells(cells, |v| v.parse::<f64>().ok());
            (Arc::new(Float64Array::from(values)), rejected)
        }
        DataType::Date64 => {
            let (values, rejected) = parse_cells(cells, parse_timestamp);
            (Arc::new(Date64Array::from(values)), rejected)
        }
        DataType::Timestamp(_, _) => {
            let (values, rejected) = parse_cells(cells, parse_timestamp);
            (Arc::new(TimestampMillisecondArray::from(values)), rejected)
        }
        _ => (Arc::new(StringArray::from(cells.to_vec())), 0),
    }
}

fn parse_cells<T>(cells: &[Option<&str>], parse: impl Fn(&str) -> Option<T>) -> (Vec<Option<T>>, usize) {
    let mut rejected = 0;
    let values = cells
        .iter()
        .map(|cell| {
            let cell = (*cell)?;
            let value = parse(cell.trim());
            if value.is_none() {
                rejected += 1;
            }
            value
        })
        .collect();
    (values, rejected)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" => Some(true),
        "false" | "no" => Some(false),
        _ => None,
    }
}

/// Milliseconds since the epoch for an RFC 3339 timestamp, a naive date-time
/// (read as UTC), a date, or a raw millisecond count
pub fn parse_timestamp(value: &str) -> Option<i64> {
    if let Ok(millis) = value.parse::<i64>() {
        return Some(millis);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.timestamp_millis());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}
