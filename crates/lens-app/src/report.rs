//! Plain-text output of a filtered table

use anyhow::Result;
use arrow::array::UInt32Array;
use arrow::compute::take_record_batch;
use arrow::util::pretty::pretty_format_batches;
use lens_core::{FilterPipeline, Stage};
use lens_data::{MemoryTable, Record};
use lens_views::{GroupingEntry, PresentationContext};

/// Record count of every stage, upstream first
pub fn stage_counts(pipeline: &FilterPipeline<Record>, context: &PresentationContext) -> Result<String> {
    let mut lines = Vec::with_capacity(Stage::ALL.len());
    for stage in Stage::ALL {
        let count = pipeline.record_set(stage)?.len();
        lines.push(format!("{:>10}  {}", stage.to_string(), context.format_count(count)));
    }
    Ok(lines.join("\n"))
}

/// The given records as a table, in the given order
pub fn records(table: &MemoryTable, records: &[Record]) -> Result<String> {
    if records.is_empty() {
        return Ok("(no records)".to_string());
    }
    let rows = UInt32Array::from_iter_values(records.iter().map(|r| r.id - 1));
    let page = take_record_batch(table.batch(), &rows)?;
    Ok(pretty_format_batches(&[page])?.to_string())
}

pub fn groups(field: &str, entries: &[GroupingEntry], context: &PresentationContext) -> String {
    let width = entries.iter().map(|e| e.caption.chars().count()).max().unwrap_or(0);
    let mut lines = vec![format!("{}:", field)];
    lines.extend(entries.iter().map(|entry| {
        format!(
            "  {:<width$}  {}",
            entry.caption,
            context.format_count(entry.count),
            width = width
        )
    }));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use lens_core::Filter;

    fn entry(caption: &str, count: u64) -> GroupingEntry {
        GroupingEntry {
            caption: caption.to_string(),
            count,
            empty: false,
            filter: Filter::boolean("verified", true),
        }
    }

    #[test]
    fn test_groups_align_counts() {
        let context = PresentationContext::default();
        let text = groups("kind", &[entry("fire", 1200), entry("flood", 3)], &context);
        assert_eq!(text, "kind:\n  fire   1,200\n  flood  3");
    }
}
