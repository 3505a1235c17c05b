//! Value counts over the geo stage and the group filter built from them
//!
//! Every field of the view becomes a node: text fields can be grouped by
//! their whole value or by the words they contain, date fields by calendar
//! bucket, and everything else by value. Selected entries become group
//! filters, OR-ed within one node and AND-ed across nodes.

use std::cmp::Reverse;
use std::sync::{Arc, Weak};

use ahash::AHashMap;
use lens_core::text::split_terms;
use lens_core::{Event, Filter, FilterPipeline, NumericFilter, RecordSet, TextFilter, Value};
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::context::PresentationContext;
use crate::fields::{FieldKind, FieldSet};
use crate::subscription::Subscription;
use crate::time_graph::Interval;
use crate::ViewError;

const MAX_CAPTION_LENGTH: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupingKind {
    ByValue,
    /// Every lowercase term of a text value counts once per record
    ByWords,
    ByDate(Interval),
}

/// A field, or one way of grouping it
#[derive(Debug, Clone, PartialEq)]
pub struct GroupingNode {
    pub field: String,
    pub title: String,
    /// `None` for parents that only hold the ways of grouping their field
    pub kind: Option<GroupingKind>,
    pub children: Vec<GroupingNode>,
}

impl GroupingNode {
    fn leaf(field: &str, title: impl Into<String>, kind: GroupingKind) -> Self {
        Self {
            field: field.to_string(),
            title: title.into(),
            kind: Some(kind),
            children: Vec::new(),
        }
    }

    fn parent(field: &str, title: &str, children: Vec<GroupingNode>) -> Self {
        Self {
            field: field.to_string(),
            title: title.to_string(),
            kind: None,
            children,
        }
    }

    /// This node and all of its descendants
    pub fn walk(&self) -> Vec<&GroupingNode> {
        let mut nodes = vec![self];
        for child in &self.children {
            nodes.extend(child.walk());
        }
        nodes
    }
}

/// One group of the selected node
#[derive(Debug, Clone, PartialEq)]
pub struct GroupingEntry {
    pub caption: String,
    pub count: u64,
    /// Null, blank or zero values
    pub empty: bool,
    pub filter: Filter,
}

/// A selected entry restricting the pipeline's grouping stage
#[derive(Debug, Clone, PartialEq)]
pub struct GroupFilter {
    pub field: String,
    pub kind: GroupingKind,
    pub caption: String,
    pub filter: Filter,
}

#[derive(Default)]
struct GroupingState {
    node: Option<(String, GroupingKind)>,
    entries: Vec<GroupingEntry>,
    search_text: Option<String>,
    filters: Vec<GroupFilter>,
}

pub struct GroupingModel<E> {
    pipeline: Arc<FilterPipeline<E>>,
    context: PresentationContext,
    fields: FieldSet,
    nodes: Vec<GroupingNode>,
    state: RwLock<GroupingState>,
    data_changed: Event<()>,
    _geo_changed: Subscription,
}

impl<E: Clone + Send + Sync + 'static> GroupingModel<E> {
    pub fn new(
        pipeline: Arc<FilterPipeline<E>>,
        context: PresentationContext,
        fields: FieldSet,
    ) -> Arc<Self> {
        let nodes = build_nodes(&fields);
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let weak = weak.clone();
            let geo_changed = Subscription::listen(
                &pipeline,
                |p| &p.events().geo_data_changed,
                move |_| {
                    if let Some(model) = weak.upgrade() {
                        if let Err(err) = model.regroup() {
                            warn!(%err, "regrouping failed");
                        }
                    }
                },
            );

            Self {
                pipeline: pipeline.clone(),
                context,
                fields,
                nodes,
                state: RwLock::new(GroupingState::default()),
                data_changed: Event::new(),
                _geo_changed: geo_changed,
            }
        })
    }

    pub fn nodes(&self) -> &[GroupingNode] {
        &self.nodes
    }

    /// Leaf node grouping `field` the given way
    pub fn node(&self, field: &str, kind: GroupingKind) -> Option<&GroupingNode> {
        self.nodes
            .iter()
            .flat_map(|n| n.walk())
            .find(|n| n.field == field && n.kind == Some(kind))
    }

    /// Select a node and group the geo stage by it
    pub fn group(&self, field: &str, kind: GroupingKind) -> Result<Vec<GroupingEntry>, ViewError> {
        if self.node(field, kind).is_none() {
            return Err(ViewError::InvalidField {
                field: field.to_string(),
                reason: format!("cannot be grouped {:?}", kind),
            });
        }

        let entries = self.compute(field, kind)?;
        {
            let mut state = self.state.write();
            state.node = Some((field.to_string(), kind));
            state.entries = entries;
        }
        self.data_changed.fire(&());
        Ok(self.entries())
    }

    /// Entries of the selected node matching the search text
    pub fn entries(&self) -> Vec<GroupingEntry> {
        let state = self.state.read();
        match &state.search_text {
            Some(search) => {
                let search = search.to_lowercase();
                state
                    .entries
                    .iter()
                    .filter(|e| e.caption.to_lowercase().contains(&search))
                    .cloned()
                    .collect()
            }
            None => state.entries.clone(),
        }
    }

    pub fn set_search_text(&self, text: Option<String>) {
        self.state.write().search_text = text.filter(|t| !t.trim().is_empty());
        self.data_changed.fire(&());
    }

    pub fn selected_node(&self) -> Option<(String, GroupingKind)> {
        self.state.read().node.clone()
    }

    pub fn group_filters(&self) -> Vec<GroupFilter> {
        self.state.read().filters.clone()
    }

    /// Restrict the pipeline to an entry of the selected node
    pub fn add_filter(&self, entry: &GroupingEntry) -> Result<(), ViewError> {
        let (field, kind) = self
            .selected_node()
            .ok_or(ViewError::NotConfigured("grouping node"))?;
        let filter = GroupFilter {
            field,
            kind,
            caption: truncate_caption(&entry.caption),
            filter: entry.filter.clone(),
        };

        let mut filters = self.group_filters();
        if filters.contains(&filter) {
            return Ok(());
        }
        filters.push(filter);
        self.apply(filters)
    }

    pub fn remove_filter(&self, filter: &GroupFilter) -> Result<(), ViewError> {
        let mut filters = self.group_filters();
        filters.retain(|f| f != filter);
        self.apply(filters)
    }

    pub fn clear_filters(&self) -> Result<(), ViewError> {
        self.apply(Vec::new())
    }

    /// Fired when the entries or the search text changed
    pub fn on_data_changed(&self) -> &Event<()> {
        &self.data_changed
    }

    fn apply(&self, filters: Vec<GroupFilter>) -> Result<(), ViewError> {
        self.pipeline.set_group_filter(combine(&filters))?;
        self.state.write().filters = filters;
        Ok(())
    }

    fn regroup(&self) -> Result<(), ViewError> {
        let Some((field, kind)) = self.selected_node() else {
            return Ok(());
        };
        let entries = self.compute(&field, kind)?;
        self.state.write().entries = entries;
        self.data_changed.fire(&());
        Ok(())
    }

    fn compute(&self, field: &str, kind: GroupingKind) -> Result<Vec<GroupingEntry>, ViewError> {
        let records = self.pipeline.geo_record_set()?;
        let counts = self.count(&records, field, kind)?;

        let mut entries: Vec<GroupingEntry> = counts
            .into_values()
            .map(|(caption, count, filter)| GroupingEntry {
                empty: caption.is_none(),
                caption: caption.unwrap_or_else(|| self.context.empty_label.clone()),
                count,
                filter,
            })
            .collect();
        entries.sort_by(|a, b| {
            (Reverse(a.count), a.empty, &a.caption).cmp(&(Reverse(b.count), b.empty, &b.caption))
        });

        debug!(field, ?kind, groups = entries.len(), "grouped geo records");
        Ok(entries)
    }

    /// Count per group key; the caption is `None` for the empty group
    fn count(
        &self,
        records: &RecordSet,
        field: &str,
        kind: GroupingKind,
    ) -> Result<AHashMap<String, (Option<String>, u64, Filter)>, ViewError> {
        let table = self.pipeline.table();
        let mut counts: AHashMap<String, (Option<String>, u64, Filter)> = AHashMap::new();
        let mut add = |key: Option<String>, filter: &dyn Fn() -> Filter| {
            let slot = counts
                .entry(key.clone().unwrap_or_default())
                .or_insert_with(|| (key, 0, filter()));
            slot.1 += 1;
        };
        let empty = || Filter::Empty {
            field: field.to_string(),
        };

        for id in records.iter() {
            let value = table.value(field, id)?;
            if value.is_empty() {
                add(None, &empty);
                continue;
            }

            match kind {
                GroupingKind::ByValue => {
                    let caption = self.caption_of(&value);
                    add(Some(caption), &|| value_filter(field, &value));
                }
                GroupingKind::ByWords => {
                    let text = value.as_str().unwrap_or_default().to_lowercase();
                    let mut terms: Vec<&str> = split_terms(&text).collect();
                    terms.sort_unstable();
                    terms.dedup();
                    if terms.is_empty() {
                        add(None, &empty);
                    }
                    for term in terms {
                        add(Some(term.to_string()), &|| {
                            Filter::text(field, TextFilter::TermEquals(term.to_string()))
                        });
                    }
                }
                GroupingKind::ByDate(interval) => {
                    let bucket = value
                        .as_i64()
                        .and_then(|millis| self.context.local_time(millis))
                        .map(|local| interval.bucket_start(local));
                    let Some(start) = bucket else {
                        add(None, &empty);
                        continue;
                    };
                    let from = self.context.to_millis(start);
                    let to = interval
                        .next_start(start)
                        .map(|next| self.context.to_millis(next))
                        .unwrap_or(i64::MAX);
                    add(Some(interval.label(start)), &|| {
                        Filter::numeric(field, NumericFilter::between(from, to))
                    });
                }
            }
        }
        Ok(counts)
    }

    fn caption_of(&self, value: &Value) -> String {
        match value {
            Value::Null => self.context.empty_label.clone(),
            Value::Boolean(b) => b.to_string(),
            Value::Integer(v) => v.to_string(),
            Value::Float(v) => v.to_string(),
            Value::Text(s) => s.clone(),
            Value::Timestamp(millis) => self
                .context
                .local_time(*millis)
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| millis.to_string()),
        }
    }

    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }
}

/// Text fields by value and by words, date fields by calendar bucket,
/// other scalar fields by value
fn build_nodes(fields: &FieldSet) -> Vec<GroupingNode> {
    fields
        .iter()
        .filter_map(|field| {
            let name = field.name.as_str();
            match field.kind {
                FieldKind::Text => Some(GroupingNode::parent(
                    name,
                    &field.title,
                    vec![
                        GroupingNode::leaf(name, "By value", GroupingKind::ByValue),
                        GroupingNode::leaf(name, "By words", GroupingKind::ByWords),
                    ],
                )),
                FieldKind::DateTime => Some(GroupingNode::parent(
                    name,
                    &field.title,
                    [
                        ("Year", Interval::Year),
                        ("Quarter", Interval::Quarter),
                        ("Month", Interval::Month),
                        ("Week", Interval::Week),
                        ("Day", Interval::Day),
                    ]
                    .into_iter()
                    .map(|(title, interval)| {
                        GroupingNode::leaf(name, title, GroupingKind::ByDate(interval))
                    })
                    .collect(),
                )),
                FieldKind::Boolean | FieldKind::Integer | FieldKind::Float => Some(
                    GroupingNode::leaf(name, field.title.clone(), GroupingKind::ByValue),
                ),
                FieldKind::Other => None,
            }
        })
        .collect()
}

fn value_filter(field: &str, value: &Value) -> Filter {
    match value {
        Value::Boolean(b) => Filter::boolean(field, *b),
        Value::Text(s) => Filter::text(field, TextFilter::Equals(s.clone())),
        other => match other.as_f64() {
            Some(v) => Filter::numeric(field, NumericFilter::Equals(v)),
            None => Filter::Empty {
                field: field.to_string(),
            },
        },
    }
}

/// OR within one node, AND across nodes; `None` without filters
fn combine(filters: &[GroupFilter]) -> Option<Filter> {
    let mut nodes: Vec<((&str, GroupingKind), Vec<Filter>)> = Vec::new();
    for filter in filters {
        let key = (filter.field.as_str(), filter.kind);
        match nodes.iter_mut().find(|(k, _)| *k == key) {
            Some((_, alternatives)) => alternatives.push(filter.filter.clone()),
            None => nodes.push((key, vec![filter.filter.clone()])),
        }
    }

    nodes
        .into_iter()
        .map(|(_, mut alternatives)| match alternatives.len() {
            1 => alternatives.remove(0),
            _ => Filter::Or(alternatives),
        })
        .reduce(|acc, filter| acc.and(filter))
}

fn truncate_caption(caption: &str) -> String {
    if caption.chars().count() > MAX_CAPTION_LENGTH {
        let cut: String = caption.chars().take(MAX_CAPTION_LENGTH).collect();
        format!("{}...", cut)
    } else {
        caption.to_string()
    }
}
