//! Full-text index over the text columns of a table

use std::collections::BTreeMap;

use arrow::array::{Array, AsArray};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use lens_core::text::split_terms;
use lens_core::{RecordId, RecordSet};
use rayon::prelude::*;

use crate::DataError;

/// Lowercased term → records containing it, ordered for prefix scans
#[derive(Debug, Default)]
pub struct FullTextIndex {
    terms: BTreeMap<String, RecordSet>,
    columns: Vec<String>,
}

impl FullTextIndex {
    /// Index the given text columns; columns are tokenized in parallel
    pub fn build(batch: &RecordBatch, columns: &[String]) -> Result<Self, DataError> {
        let mut arrays = Vec::with_capacity(columns.len());
        for name in columns {
            let array = batch
                .column_by_name(name)
                .ok_or_else(|| DataError::Schema(format!("Unknown full-text column '{}'", name)))?;
            if !matches!(array.data_type(), DataType::Utf8 | DataType::LargeUtf8) {
                return Err(DataError::Schema(format!(
                    "Full-text column '{}' is not a text column",
                    name
                )));
            }
            arrays.push(array.clone());
        }

        let terms = arrays
            .par_iter()
            .map(|array| {
                let mut terms: BTreeMap<String, RecordSet> = BTreeMap::new();
                for row in 0..array.len() {
                    if array.is_null(row) {
                        continue;
                    }
                    let text = match array.data_type() {
                        DataType::LargeUtf8 => array.as_string::<i64>().value(row),
                        _ => array.as_string::<i32>().value(row),
                    };
                    let id = row as RecordId + 1;
                    for term in split_terms(text) {
                        terms.entry(term.to_lowercase()).or_default().insert(id);
                    }
                }
                terms
            })
            .reduce(BTreeMap::new, |mut merged, terms| {
                for (term, records) in terms {
                    *merged.entry(term).or_default() |= records;
                }
                merged
            });

        Ok(Self {
            terms,
            columns: columns.to_vec(),
        })
    }

    /// Records matching every term of `text` by prefix.
    ///
    /// Returns `None` when `text` contains no searchable term.
    pub fn search(&self, text: &str) -> Option<RecordSet> {
        let mut result: Option<RecordSet> = None;
        for term in split_terms(text) {
            let matches = self.prefix_matches(&term.to_lowercase());
            result = Some(match result {
                Some(records) => records & matches,
                None => matches,
            });
        }
        result
    }

    fn prefix_matches(&self, prefix: &str) -> RecordSet {
        let mut records = RecordSet::new();
        for (_, ids) in self
            .terms
            .range(prefix.to_string()..)
            .take_while(|(term, _)| term.starts_with(prefix))
        {
            records |= ids;
        }
        records
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::tests::sample_batch;

    fn index() -> FullTextIndex {
        FullTextIndex::build(&sample_batch(), &["name".to_string(), "country".to_string()]).unwrap()
    }

    fn ids(set: Option<RecordSet>) -> Vec<RecordId> {
        set.map(|s| s.iter().collect()).unwrap_or_default()
    }

    #[test]
    fn test_prefix_search_is_case_insensitive() {
        let index = index();
        assert_eq!(ids(index.search("GER")), vec![1, 2]);
        assert_eq!(ids(index.search("paris")), vec![3]);
    }

    #[test]
    fn test_all_terms_must_match() {
        let index = index();
        assert_eq!(ids(index.search("new states")), vec![5]);
        assert_eq!(ids(index.search("new germany")), Vec::<RecordId>::new());
    }

    #[test]
    fn test_no_terms_means_no_restriction() {
        assert!(index().search(" - ").is_none());
    }

    #[test]
    fn test_rejects_non_text_column() {
        let err = FullTextIndex::build(&sample_batch(), &["created".to_string()]).unwrap_err();
        assert!(matches!(err, DataError::Schema(_)));
    }
}
