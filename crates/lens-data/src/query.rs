//! Query implementation over a [`MemoryTable`]

use std::cmp::Ordering;
use std::sync::Arc;

use geo::{coord, Intersects};
use lens_core::text::split_terms;
use lens_core::{
    Filter, NumericFilter, Query, QueryError, RecordId, RecordSet, Sorting, TableIndex, TextFilter,
    Value,
};

use crate::table::{is_numeric_column, is_text_column, value_at, MemoryTable};

/// Restriction accumulated by a query
#[derive(Debug, Clone)]
enum Condition {
    Numeric { field: String, filter: NumericFilter },
    Filter(Filter),
    FullText(String),
}

/// Conjunction of conditions evaluated against the table on execution
#[derive(Clone)]
pub struct MemoryQuery {
    table: Arc<MemoryTable>,
    conditions: Vec<Condition>,
}

impl MemoryQuery {
    pub fn new(table: Arc<MemoryTable>) -> Self {
        Self {
            table,
            conditions: Vec::new(),
        }
    }

    fn evaluate_condition(
        &self,
        condition: &Condition,
        candidates: &RecordSet,
    ) -> Result<RecordSet, QueryError> {
        match condition {
            Condition::Numeric { field, filter } => self.evaluate_numeric(field, filter, candidates),
            Condition::Filter(filter) => self.evaluate(filter, candidates),
            Condition::FullText(text) => Ok(match self.table.full_text().search(text) {
                Some(matches) => matches & candidates,
                None => candidates.clone(),
            }),
        }
    }

    /// Subset of `candidates` matching `filter`
    fn evaluate(&self, filter: &Filter, candidates: &RecordSet) -> Result<RecordSet, QueryError> {
        match filter {
            Filter::Numeric { field, filter } => self.evaluate_numeric(field, filter, candidates),
            Filter::Text { field, filter } => {
                let column = self.table.column(field)?;
                if !is_text_column(column.data_type()) {
                    return Err(type_mismatch(field, "text filters"));
                }
                self.retain(field, candidates, |value| match value.as_str() {
                    Some(text) => text_matches(filter, text),
                    None => false,
                })
            }
            Filter::Boolean { field, value: expected } => {
                let column = self.table.column(field)?;
                if column.data_type() != &arrow::datatypes::DataType::Boolean {
                    return Err(type_mismatch(field, "boolean filters"));
                }
                self.retain(field, candidates, |value| value == &Value::Boolean(*expected))
            }
            Filter::Empty { field } => self.retain(field, candidates, |value| value.is_empty()),
            Filter::Within {
                latitude_field,
                longitude_field,
                bounds,
            } => {
                let latitude = self.table.column(latitude_field)?;
                let longitude = self.table.column(longitude_field)?;
                for (field, column) in [(latitude_field, latitude), (longitude_field, longitude)] {
                    if !column.data_type().is_floating() {
                        return Err(type_mismatch(field, "geo filters"));
                    }
                }

                let mut records = RecordSet::new();
                for id in candidates {
                    let Some(row) = self.table.row(id) else { continue };
                    let (Some(lat), Some(lon)) =
                        (value_at(latitude, row).as_f64(), value_at(longitude, row).as_f64())
                    else {
                        continue;
                    };
                    if bounds.intersects(&coord! { x: lon, y: lat }) {
                        records.insert(id);
                    }
                }
                Ok(records)
            }
            Filter::And(filters) => {
                let mut records = candidates.clone();
                for filter in filters {
                    if records.is_empty() {
                        break;
                    }
                    records = self.evaluate(filter, &records)?;
                }
                Ok(records)
            }
            Filter::Or(filters) => {
                let mut records = RecordSet::new();
                for filter in filters {
                    records |= self.evaluate(filter, candidates)?;
                }
                Ok(records)
            }
        }
    }

    fn evaluate_numeric(
        &self,
        field: &str,
        filter: &NumericFilter,
        candidates: &RecordSet,
    ) -> Result<RecordSet, QueryError> {
        let column = self.table.column(field)?;
        if !is_numeric_column(column.data_type()) {
            return Err(type_mismatch(field, "numeric filters"));
        }
        self.retain(field, candidates, |value| {
            value.as_f64().map(|v| filter.matches(v)).unwrap_or(false)
        })
    }

    fn retain<F>(&self, field: &str, candidates: &RecordSet, predicate: F) -> Result<RecordSet, QueryError>
    where
        F: Fn(&Value) -> bool,
    {
        let column = self.table.column(field)?;
        let mut records = RecordSet::new();
        for id in candidates {
            if let Some(row) = self.table.row(id) {
                if predicate(&value_at(column, row)) {
                    records.insert(id);
                }
            }
        }
        Ok(records)
    }
}

impl Query for MemoryQuery {
    fn table(&self) -> Arc<dyn TableIndex> {
        self.table.clone()
    }

    fn and(&mut self, filter: &Filter) {
        self.conditions.push(Condition::Filter(filter.clone()));
    }

    fn add_numeric_filter(&mut self, field: &str, filter: NumericFilter) {
        self.conditions.push(Condition::Numeric {
            field: field.to_string(),
            filter,
        });
    }

    fn add_full_text_query(&mut self, text: &str) {
        self.conditions.push(Condition::FullText(text.to_string()));
    }

    fn execute_to_record_set(&self) -> Result<RecordSet, QueryError> {
        let mut records = self.table.all_ids();
        for condition in &self.conditions {
            if records.is_empty() {
                break;
            }
            records = self.evaluate_condition(condition, &records)?;
        }
        Ok(records)
    }

    fn execute(
        &self,
        offset: usize,
        length: usize,
        sorting: Option<&Sorting>,
    ) -> Result<Vec<RecordId>, QueryError> {
        let records = self.execute_to_record_set()?;
        let ids: Vec<RecordId> = match sorting {
            None => records.iter().skip(offset).take(length).collect(),
            Some(sorting) => {
                let column = self.table.column(&sorting.field)?;
                let mut keyed: Vec<(RecordId, Value)> = records
                    .iter()
                    .map(|id| {
                        let value = self.table.row(id).map(|row| value_at(column, row));
                        (id, value.unwrap_or(Value::Null))
                    })
                    .collect();
                keyed.sort_by(|(a_id, a), (b_id, b)| {
                    let order = match (a.is_null(), b.is_null()) {
                        (true, true) => Ordering::Equal,
                        (true, false) => Ordering::Greater,
                        (false, true) => Ordering::Less,
                        _ if sorting.ascending => a.sort_cmp(b),
                        _ => b.sort_cmp(a),
                    };
                    order.then(a_id.cmp(b_id))
                });
                keyed.into_iter().skip(offset).take(length).map(|(id, _)| id).collect()
            }
        };
        Ok(ids)
    }
}

fn text_matches(filter: &TextFilter, text: &str) -> bool {
    match filter {
        TextFilter::Equals(expected) => text == expected,
        TextFilter::TermEquals(term) => {
            let term = term.to_lowercase();
            split_terms(text).any(|t| t.to_lowercase() == term)
        }
        TextFilter::Contains(needle) => text.to_lowercase().contains(&needle.to_lowercase()),
    }
}

fn type_mismatch(field: &str, operation: &str) -> QueryError {
    QueryError::TypeMismatch {
        field: field.to_string(),
        operation: operation.to_string(),
    }
}
