//! Shared fixture: six incidents loaded into an in-memory table

use std::sync::Arc;

use arrow::array::{
    BooleanArray, Float64Array, Int32Array, Int64Array, StringArray, TimestampMillisecondArray,
};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use lens_core::FilterPipeline;
use lens_data::{MemoryTable, Record};

pub(crate) fn millis(year: i32, month: u32, day: u32, hour: u32) -> i64 {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
        .unwrap()
}

pub(crate) fn created() -> Vec<Option<i64>> {
    vec![
        Some(millis(2024, 1, 15, 10)),
        Some(millis(2024, 2, 20, 8)),
        Some(millis(2024, 4, 1, 12)),
        Some(millis(2024, 4, 2, 23)),
        Some(millis(2024, 7, 10, 6)),
        None,
    ]
}

pub(crate) fn table() -> Arc<MemoryTable> {
    let schema = Schema::new(vec![
        Field::new("name", DataType::Utf8, true),
        Field::new("kind", DataType::Utf8, true),
        Field::new("created", DataType::Timestamp(TimeUnit::Millisecond, None), true),
        Field::new("seconds", DataType::Int32, true),
        Field::new("latitude", DataType::Float64, true),
        Field::new("longitude", DataType::Float64, true),
        Field::new("severity", DataType::Int64, true),
        Field::new("verified", DataType::Boolean, true),
    ]);
    let created = created();
    let seconds: Vec<Option<i32>> = created
        .iter()
        .map(|c| c.map(|ms| (ms / 1000) as i32))
        .collect();

    let batch = RecordBatch::try_new(
        Arc::new(schema),
        vec![
            Arc::new(StringArray::from(vec![
                Some("Barn fire"),
                Some("River flood"),
                Some("Forest fire"),
                Some("Storm damage"),
                Some("Kitchen fire"),
                None,
            ])),
            Arc::new(StringArray::from(vec![
                Some("fire"),
                Some("flood"),
                Some("fire"),
                Some("storm"),
                Some("fire"),
                Some(""),
            ])),
            Arc::new(TimestampMillisecondArray::from(created)),
            Arc::new(Int32Array::from(seconds)),
            Arc::new(Float64Array::from(vec![52.52, 53.55, 48.86, 40.71, 48.14, 0.0])),
            Arc::new(Float64Array::from(vec![13.40, 9.99, 2.35, -74.01, 11.58, 0.0])),
            Arc::new(Int64Array::from(vec![3, 2, 3, 1, 2, 0])),
            Arc::new(BooleanArray::from(vec![
                Some(true),
                Some(false),
                Some(true),
                Some(false),
                Some(true),
                None,
            ])),
        ],
    )
    .unwrap();
    MemoryTable::new("incidents", batch).unwrap()
}

pub(crate) fn pipeline() -> Arc<FilterPipeline<Record>> {
    let table = table();
    Arc::new(FilterPipeline::new(table.supplier(), table.entity_builder()).unwrap())
}
