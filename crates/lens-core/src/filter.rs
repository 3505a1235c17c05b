//! Filter model applied by the pipeline stages

use arrow::datatypes::{DataType, TimeUnit};
use geo::Rect;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Numeric comparison applied to a single column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum NumericFilter {
    Equals(f64),
    /// Half-open range `[start, end)`
    Between { start: i64, end: i64 },
    GreaterOrEqual(f64),
    Less(f64),
}

impl NumericFilter {
    pub fn between(start: i64, end: i64) -> Self {
        NumericFilter::Between { start, end }
    }

    pub fn matches(&self, value: f64) -> bool {
        match *self {
            NumericFilter::Equals(v) => value == v,
            NumericFilter::Between { start, end } => value >= start as f64 && value < end as f64,
            NumericFilter::GreaterOrEqual(v) => value >= v,
            NumericFilter::Less(v) => value < v,
        }
    }
}

/// Text comparison applied to a single column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextFilter {
    /// Whole value equals, case-sensitive
    Equals(String),
    /// One of the value's terms equals, case-insensitive
    TermEquals(String),
    /// Value contains the text, case-insensitive
    Contains(String),
}

/// Filter expression combined into a derived query with `and`
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Numeric { field: String, filter: NumericFilter },
    Text { field: String, filter: TextFilter },
    Boolean { field: String, value: bool },
    /// Null, blank, `NULL` or zero
    Empty { field: String },
    /// Records whose `(longitude, latitude)` lies inside `bounds` (x = longitude)
    Within {
        latitude_field: String,
        longitude_field: String,
        bounds: Rect<f64>,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn numeric(field: impl Into<String>, filter: NumericFilter) -> Self {
        Filter::Numeric { field: field.into(), filter }
    }

    pub fn text(field: impl Into<String>, filter: TextFilter) -> Self {
        Filter::Text { field: field.into(), filter }
    }

    pub fn boolean(field: impl Into<String>, value: bool) -> Self {
        Filter::Boolean { field: field.into(), value }
    }

    pub fn within(
        latitude_field: impl Into<String>,
        longitude_field: impl Into<String>,
        bounds: Rect<f64>,
    ) -> Self {
        Filter::Within {
            latitude_field: latitude_field.into(),
            longitude_field: longitude_field.into(),
            bounds,
        }
    }

    /// Combine with another filter, flattening nested conjunctions
    pub fn and(self, other: Filter) -> Self {
        match self {
            Filter::And(mut filters) => {
                filters.push(other);
                Filter::And(filters)
            }
            filter => Filter::And(vec![filter, other]),
        }
    }

    /// Combine with another filter, flattening nested disjunctions
    pub fn or(self, other: Filter) -> Self {
        match self {
            Filter::Or(mut filters) => {
                filters.push(other);
                Filter::Or(filters)
            }
            filter => Filter::Or(vec![filter, other]),
        }
    }

    /// Names of every column referenced by this filter
    pub fn fields(&self) -> Vec<&str> {
        match self {
            Filter::Numeric { field, .. }
            | Filter::Text { field, .. }
            | Filter::Boolean { field, .. }
            | Filter::Empty { field } => vec![field.as_str()],
            Filter::Within { latitude_field, longitude_field, .. } => {
                vec![latitude_field.as_str(), longitude_field.as_str()]
            }
            Filter::And(filters) | Filter::Or(filters) => {
                filters.iter().flat_map(|f| f.fields()).collect()
            }
        }
    }
}

/// Storage granularity of a time column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampScale {
    /// 32-bit column holding seconds since the epoch
    Seconds,
    /// 64-bit column holding milliseconds since the epoch, or a date or
    /// timestamp column the table reads back as milliseconds
    Milliseconds,
}

impl TimestampScale {
    /// Decide the scale from the column's storage type
    pub fn for_column(field: &str, data_type: &DataType) -> Result<Self, PipelineError> {
        match data_type {
            DataType::Int32 => Ok(TimestampScale::Seconds),
            DataType::Int64 | DataType::Date32 | DataType::Date64 | DataType::Timestamp(_, _) => {
                Ok(TimestampScale::Milliseconds)
            }
            _ => Err(PipelineError::type_mismatch(field, "a time column")),
        }
    }

    /// Convert a stored value to milliseconds
    pub fn to_millis(&self, stored: i64) -> i64 {
        match self {
            TimestampScale::Seconds => stored * 1000,
            TimestampScale::Milliseconds => stored,
        }
    }
}

/// Time range selected on a time column, bounds in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeIntervalFilter {
    pub field_name: String,
    pub start: i64,
    pub end: i64,
}

impl TimeIntervalFilter {
    pub fn new(field_name: impl Into<String>, start: i64, end: i64) -> Self {
        Self {
            field_name: field_name.into(),
            start,
            end,
        }
    }

    /// Range for a millisecond column
    pub fn filter(&self) -> NumericFilter {
        NumericFilter::between(self.start, self.end)
    }

    /// Range for a second-granularity 32-bit column
    pub fn int_filter(&self) -> NumericFilter {
        NumericFilter::between(self.start / 1000, self.end / 1000)
    }

    pub fn filter_for(&self, scale: TimestampScale) -> NumericFilter {
        match scale {
            TimestampScale::Seconds => self.int_filter(),
            TimestampScale::Milliseconds => self.filter(),
        }
    }
}

/// Sort order requested by a table view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sorting {
    pub field: String,
    pub ascending: bool,
}

impl Sorting {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self { field: field.into(), ascending: true }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self { field: field.into(), ascending: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_scaling() {
        let filter = TimeIntervalFilter::new("created", 10_000, 25_999);
        assert_eq!(filter.filter(), NumericFilter::between(10_000, 25_999));
        assert_eq!(filter.int_filter(), NumericFilter::between(10, 25));
        assert_eq!(filter.filter_for(TimestampScale::Seconds), filter.int_filter());
    }

    #[test]
    fn test_scale_from_column_type() {
        assert_eq!(
            TimestampScale::for_column("t", &DataType::Int32).unwrap(),
            TimestampScale::Seconds
        );
        assert_eq!(
            TimestampScale::for_column("t", &DataType::Timestamp(TimeUnit::Millisecond, None)).unwrap(),
            TimestampScale::Milliseconds
        );
        assert!(matches!(
            TimestampScale::for_column("t", &DataType::Utf8),
            Err(PipelineError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_date_and_timestamp_units_read_as_millis() {
        for data_type in [
            DataType::Date32,
            DataType::Date64,
            DataType::Timestamp(TimeUnit::Second, None),
            DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
            DataType::Timestamp(TimeUnit::Nanosecond, None),
        ] {
            assert_eq!(
                TimestampScale::for_column("t", &data_type).unwrap(),
                TimestampScale::Milliseconds,
                "{:?}",
                data_type
            );
        }
        assert!(TimestampScale::for_column("t", &DataType::Int8).is_err());
        assert_eq!(TimestampScale::Seconds.to_millis(86_400), 86_400_000);
        assert_eq!(TimestampScale::Milliseconds.to_millis(86_400), 86_400);
    }

    #[test]
    fn test_between_is_half_open() {
        let filter = NumericFilter::between(1, 5);
        assert!(filter.matches(1.0));
        assert!(filter.matches(4.0));
        assert!(!filter.matches(5.0));
    }

    #[test]
    fn test_combinators_flatten() {
        let filter = Filter::boolean("a", true)
            .and(Filter::boolean("b", true))
            .and(Filter::boolean("c", false));
        match filter {
            Filter::And(parts) => assert_eq!(parts.len(), 3),
            other => panic!("unexpected filter {:?}", other),
        }
    }
}
