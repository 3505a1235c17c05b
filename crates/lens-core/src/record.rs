//! Record identifiers, record sets and cell values

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Stable identifier of a record within a table. Valid identifiers start at 1.
pub type RecordId = u32;

/// Sparse set of record identifiers produced by executing a query
pub type RecordSet = roaring::RoaringBitmap;

/// Memoized record set of a pipeline stage
#[derive(Debug, Clone, Default)]
pub enum CachedRecordSet {
    /// Not computed since the last upstream change
    #[default]
    Stale,
    /// Computed for the current derived query
    Fresh(Arc<RecordSet>),
}

impl CachedRecordSet {
    pub fn is_fresh(&self) -> bool {
        matches!(self, CachedRecordSet::Fresh(_))
    }

    pub fn get(&self) -> Option<&Arc<RecordSet>> {
        match self {
            CachedRecordSet::Fresh(set) => Some(set),
            CachedRecordSet::Stale => None,
        }
    }

    pub fn invalidate(&mut self) {
        *self = CachedRecordSet::Stale;
    }
}

/// A single cell value read from a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    /// Milliseconds since the Unix epoch
    Timestamp(i64),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether the value counts as "empty" for grouping: null, blank text,
    /// the literal `NULL`, or zero.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => {
                let s = s.trim();
                s.is_empty() || s == "NULL" || s == "0"
            }
            Value::Integer(v) | Value::Timestamp(v) => *v == 0,
            Value::Float(v) => *v == 0.0,
            Value::Boolean(_) => false,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(v) | Value::Timestamp(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Text(s) => s.trim().parse().ok(),
            Value::Null => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) | Value::Timestamp(v) => Some(*v),
            Value::Float(v) => Some(*v as i64),
            Value::Boolean(b) => Some(*b as i64),
            Value::Text(s) => s.trim().parse().ok(),
            Value::Null => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Total order used for sorting: nulls last, numbers numerically,
    /// everything else by display string.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Greater,
            (_, Value::Null) => Ordering::Less,
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                _ => a.to_string().cmp(&b.to_string()),
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(v) | Value::Timestamp(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}
