//! Event timestamps per pipeline stage for a time graph

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};

use ahash::AHashMap;
use chrono::{Datelike, Days, Duration, Months, NaiveDate, NaiveDateTime, Timelike};
use lens_core::{FilterPipeline, RecordSet, Stage, TimeIntervalFilter, TimestampScale};
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::context::PresentationContext;
use crate::fields::FieldSet;
use crate::subscription::{EventSelector, Subscription};
use crate::ViewError;

/// Data series drawn by the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Series {
    /// Unfiltered base records
    Base,
    Geo,
    Grouping,
    FullText,
}

impl Series {
    pub const ALL: [Series; 4] = [Series::Base, Series::Geo, Series::Grouping, Series::FullText];

    pub fn stage(self) -> Stage {
        match self {
            Series::Base => Stage::Base,
            Series::Geo => Stage::Geo,
            Series::Grouping => Stage::Grouping,
            Series::FullText => Stage::FullText,
        }
    }

    fn data_changed<E: Clone + Send + Sync + 'static>(self) -> EventSelector<E, ()> {
        match self {
            Series::Base => |p| &p.events().base_data_changed,
            Series::Geo => |p| &p.events().geo_data_changed,
            Series::Grouping => |p| &p.events().grouping_data_changed,
            Series::FullText => |p| &p.events().final_data_changed,
        }
    }
}

impl fmt::Display for Series {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Series::Base => write!(f, "base"),
            Series::Geo => write!(f, "geo"),
            Series::Grouping => write!(f, "grouping"),
            Series::FullText => write!(f, "full-text"),
        }
    }
}

/// Calendar bucket width in the session's local time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interval {
    Minute,
    Hour,
    Day,
    /// Weeks start on Monday
    Week,
    Month,
    Quarter,
    Year,
}

impl Interval {
    /// Start of the bucket containing `local`
    pub fn bucket_start(self, local: NaiveDateTime) -> NaiveDateTime {
        let date = local.date();
        let start = match self {
            Interval::Minute => date.and_hms_opt(local.hour(), local.minute(), 0),
            Interval::Hour => date.and_hms_opt(local.hour(), 0, 0),
            Interval::Day => date.and_hms_opt(0, 0, 0),
            Interval::Week => date
                .checked_sub_days(Days::new(u64::from(date.weekday().num_days_from_monday())))
                .and_then(|d| d.and_hms_opt(0, 0, 0)),
            Interval::Month => first_of_month(date.year(), date.month()),
            Interval::Quarter => first_of_month(date.year(), (date.month() - 1) / 3 * 3 + 1),
            Interval::Year => first_of_month(date.year(), 1),
        };
        start.unwrap_or(local)
    }

    /// Start of the bucket following the one starting at `start`
    pub fn next_start(self, start: NaiveDateTime) -> Option<NaiveDateTime> {
        match self {
            Interval::Minute => start.checked_add_signed(Duration::minutes(1)),
            Interval::Hour => start.checked_add_signed(Duration::hours(1)),
            Interval::Day => start.checked_add_days(Days::new(1)),
            Interval::Week => start.checked_add_days(Days::new(7)),
            Interval::Month => start.checked_add_months(Months::new(1)),
            Interval::Quarter => start.checked_add_months(Months::new(3)),
            Interval::Year => start.checked_add_months(Months::new(12)),
        }
    }

    /// Caption of the bucket starting at `start`
    pub fn label(self, start: NaiveDateTime) -> String {
        match self {
            Interval::Minute => start.format("%Y-%m-%d %H:%M").to_string(),
            Interval::Hour => start.format("%Y-%m-%d %H:00").to_string(),
            Interval::Day => start.format("%Y-%m-%d").to_string(),
            Interval::Week => {
                let week = start.iso_week();
                format!("{}-W{:02}", week.year(), week.week())
            }
            Interval::Month => start.format("%Y-%m").to_string(),
            Interval::Quarter => format!("{} Q{}", start.year(), (start.month() - 1) / 3 + 1),
            Interval::Year => start.format("%Y").to_string(),
        }
    }
}

fn first_of_month(year: i32, month: u32) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(year, month, 1).and_then(|d| d.and_hms_opt(0, 0, 0))
}

#[derive(Default)]
struct TimeGraphState {
    query_field: Option<String>,
    series: AHashMap<Series, Vec<i64>>,
}

/// Millisecond timestamps of the records of each stage
///
/// The base series is always present; a filter series is present only while
/// the filter of its stage is set. Selecting an interval drives the
/// pipeline's time filter.
pub struct TimeGraphModel<E> {
    pipeline: Arc<FilterPipeline<E>>,
    context: PresentationContext,
    fields: FieldSet,
    state: RwLock<TimeGraphState>,
    data_changed: lens_core::Event<Series>,
    _subscriptions: Vec<Subscription>,
}

impl<E: Clone + Send + Sync + 'static> TimeGraphModel<E> {
    /// Graph the first date field of `fields`, if any
    pub fn new(
        pipeline: Arc<FilterPipeline<E>>,
        context: PresentationContext,
        fields: FieldSet,
    ) -> Result<Arc<Self>, ViewError> {
        let query_field = fields.date_fields().next().map(|f| f.name.clone());
        let model = Arc::new_cyclic(|weak: &Weak<Self>| {
            let subscriptions = Series::ALL
                .into_iter()
                .map(|series| {
                    let weak = weak.clone();
                    Subscription::listen(&pipeline, series.data_changed(), move |_| {
                        if let Some(model) = weak.upgrade() {
                            model.refresh_logged(series);
                        }
                    })
                })
                .collect();

            Self {
                pipeline: pipeline.clone(),
                context,
                fields,
                state: RwLock::new(TimeGraphState {
                    query_field,
                    series: AHashMap::new(),
                }),
                data_changed: lens_core::Event::new(),
                _subscriptions: subscriptions,
            }
        });

        model.refresh_all()?;
        Ok(model)
    }

    pub fn query_field(&self) -> Option<String> {
        self.state.read().query_field.clone()
    }

    /// Graph another column; it must hold timestamps or integers
    pub fn set_query_field(&self, name: &str) -> Result<(), ViewError> {
        let data_type = self
            .pipeline
            .table()
            .column_type(name)
            .ok_or_else(|| ViewError::UnknownField(name.to_string()))?;
        if TimestampScale::for_column(name, &data_type).is_err() {
            return Err(ViewError::InvalidField {
                field: name.to_string(),
                reason: "not a time column".to_string(),
            });
        }

        self.state.write().query_field = Some(name.to_string());
        self.refresh_all()
    }

    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    /// Timestamps of a series, `None` while the series is absent
    pub fn series(&self, series: Series) -> Option<Vec<i64>> {
        self.state.read().series.get(&series).cloned()
    }

    /// Count of events per bucket, keyed by the bucket start in milliseconds
    pub fn partition(&self, series: Series, interval: Interval) -> Vec<(i64, u64)> {
        let state = self.state.read();
        let Some(timestamps) = state.series.get(&series) else {
            return Vec::new();
        };

        let mut buckets: BTreeMap<i64, u64> = BTreeMap::new();
        for &millis in timestamps {
            let Some(local) = self.context.local_time(millis) else { continue };
            let start = self.context.to_millis(interval.bucket_start(local));
            *buckets.entry(start).or_default() += 1;
        }
        buckets.into_iter().collect()
    }

    /// Restrict the pipeline to `[start, end)` on the graphed field
    pub fn select_interval(&self, start: i64, end: i64) -> Result<(), ViewError> {
        let field = self.query_field().ok_or(ViewError::NotConfigured("time field"))?;
        self.pipeline
            .set_time_interval_filter(Some(TimeIntervalFilter::new(field, start, end)))?;
        Ok(())
    }

    pub fn clear_interval(&self) -> Result<(), ViewError> {
        self.pipeline.set_time_interval_filter(None)?;
        Ok(())
    }

    pub fn selected_interval(&self) -> Option<TimeIntervalFilter> {
        self.pipeline.time_interval_filter()
    }

    /// Fired with the series whose data was replaced or removed
    pub fn on_data_changed(&self) -> &lens_core::Event<Series> {
        &self.data_changed
    }

    fn refresh_all(&self) -> Result<(), ViewError> {
        for series in Series::ALL {
            self.refresh(series)?;
        }
        Ok(())
    }

    fn refresh_logged(&self, series: Series) {
        if let Err(err) = self.refresh(series) {
            warn!(%series, %err, "time graph refresh failed");
        }
    }

    fn refresh(&self, series: Series) -> Result<(), ViewError> {
        let active = match series {
            Series::Base => true,
            Series::Geo => self.pipeline.geo_filter().is_some(),
            Series::Grouping => self.pipeline.group_filter().is_some(),
            Series::FullText => self.pipeline.full_text_query().is_some(),
        };

        let timestamps = match self.query_field() {
            Some(field) if active => {
                let records = self.pipeline.record_set(series.stage())?;
                Some(self.timestamps(&records, &field)?)
            }
            _ => None,
        };

        {
            let mut state = self.state.write();
            match timestamps {
                Some(timestamps) => {
                    debug!(%series, events = timestamps.len(), "time series updated");
                    state.series.insert(series, timestamps);
                }
                None => {
                    state.series.remove(&series);
                }
            }
        }
        self.data_changed.fire(&series);
        Ok(())
    }

    /// Non-zero timestamps of `records` in milliseconds
    fn timestamps(&self, records: &RecordSet, field: &str) -> Result<Vec<i64>, ViewError> {
        let table = self.pipeline.table();
        let data_type = table
            .column_type(field)
            .ok_or_else(|| ViewError::UnknownField(field.to_string()))?;
        let scale = TimestampScale::for_column(field, &data_type)?;
        let mut timestamps = Vec::with_capacity(records.len() as usize);
        for id in records {
            let Some(value) = table.value(field, id)?.as_i64() else { continue };
            let millis = scale.to_millis(value);
            if millis != 0 {
                timestamps.push(millis);
            }
        }
        Ok(timestamps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, millis};
    use arrow::array::{Date32Array, TimestampSecondArray};
    use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
    use arrow::record_batch::RecordBatch;
    use lens_core::{Filter, TextFilter};
    use lens_data::MemoryTable;

    fn model() -> (Arc<FilterPipeline<lens_data::Record>>, Arc<TimeGraphModel<lens_data::Record>>) {
        let pipeline = testing::pipeline();
        let fields = FieldSet::from_schema(&pipeline.table().schema());
        let model = TimeGraphModel::new(pipeline.clone(), PresentationContext::default(), fields).unwrap();
        (pipeline, model)
    }

    #[test]
    fn test_base_series_skips_missing_timestamps() {
        let (_pipeline, model) = model();
        assert_eq!(model.query_field().as_deref(), Some("created"));
        let base = model.series(Series::Base).unwrap();
        assert_eq!(base.len(), 5);
        assert!(model.series(Series::Geo).is_none());
        assert!(model.series(Series::FullText).is_none());
    }

    #[test]
    fn test_filter_series_follow_their_filters() {
        let (pipeline, model) = model();
        pipeline
            .set_group_filter(Some(Filter::text("kind", TextFilter::Equals("fire".to_string()))))
            .unwrap();
        let created = testing::created();
        assert_eq!(
            model.series(Series::Grouping).unwrap(),
            vec![created[0].unwrap(), created[2].unwrap(), created[4].unwrap()]
        );
        assert!(model.series(Series::FullText).is_none());

        pipeline.set_group_filter(None).unwrap();
        assert!(model.series(Series::Grouping).is_none());
    }

    #[test]
    fn test_seconds_column_is_scaled() {
        let (_pipeline, model) = model();
        let by_millis = model.series(Series::Base).unwrap();
        model.set_query_field("seconds").unwrap();
        assert_eq!(model.series(Series::Base).unwrap(), by_millis);

        assert!(matches!(
            model.set_query_field("kind"),
            Err(ViewError::InvalidField { .. })
        ));
    }

    #[test]
    fn test_date_and_second_timestamp_columns_select_intervals() {
        const DAY: i64 = 86_400_000;
        let schema = Schema::new(vec![
            Field::new("day", DataType::Date32, true),
            Field::new("ts", DataType::Timestamp(TimeUnit::Second, None), true),
        ]);
        let batch = RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(Date32Array::from(vec![1, 2, 3])),
                Arc::new(TimestampSecondArray::from(vec![86_400, 172_800, 259_200])),
            ],
        )
        .unwrap();
        let table = MemoryTable::new("days", batch).unwrap();
        let pipeline = Arc::new(FilterPipeline::new(table.supplier(), table.entity_builder()).unwrap());
        let fields = FieldSet::from_schema(&pipeline.table().schema());
        let model = TimeGraphModel::new(pipeline.clone(), PresentationContext::default(), fields).unwrap();

        assert_eq!(model.query_field().as_deref(), Some("day"));
        assert_eq!(model.series(Series::Base).unwrap(), vec![DAY, 2 * DAY, 3 * DAY]);
        model.select_interval(DAY, 2 * DAY + 1).unwrap();
        let ids: Vec<u32> = pipeline.time_record_set().unwrap().iter().collect();
        assert_eq!(ids, vec![1, 2]);

        model.set_query_field("ts").unwrap();
        assert_eq!(model.series(Series::Base).unwrap(), vec![DAY, 2 * DAY, 3 * DAY]);
        model.select_interval(2 * DAY, 3 * DAY + 1).unwrap();
        let ids: Vec<u32> = pipeline.time_record_set().unwrap().iter().collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn test_partition_by_month_and_quarter() {
        let (_pipeline, model) = model();
        assert_eq!(
            model.partition(Series::Base, Interval::Month),
            vec![
                (millis(2024, 1, 1, 0), 1),
                (millis(2024, 2, 1, 0), 1),
                (millis(2024, 4, 1, 0), 2),
                (millis(2024, 7, 1, 0), 1),
            ]
        );
        assert_eq!(
            model.partition(Series::Base, Interval::Quarter),
            vec![
                (millis(2024, 1, 1, 0), 2),
                (millis(2024, 4, 1, 0), 2),
                (millis(2024, 7, 1, 0), 1),
            ]
        );
        assert!(model.partition(Series::Geo, Interval::Day).is_empty());
    }

    #[test]
    fn test_partition_uses_session_offset() {
        let pipeline = testing::pipeline();
        let context = PresentationContext {
            utc_offset_seconds: 2 * 3600,
            ..PresentationContext::default()
        };
        let fields = FieldSet::from_schema(&pipeline.table().schema());
        let model = TimeGraphModel::new(pipeline, context, fields).unwrap();

        // 2024-04-02 23:00 UTC is already April 3rd locally
        let days = model.partition(Series::Base, Interval::Day);
        assert!(days.contains(&(millis(2024, 4, 2, 22), 1)));
        assert!(days.contains(&(millis(2024, 3, 31, 22), 1)));
    }

    #[test]
    fn test_select_interval_drives_time_filter() {
        let (pipeline, model) = model();
        model
            .select_interval(millis(2024, 2, 1, 0), millis(2024, 5, 1, 0))
            .unwrap();
        let ids: Vec<u32> = pipeline.time_record_set().unwrap().iter().collect();
        assert_eq!(ids, vec![2, 3, 4]);
        assert_eq!(pipeline.record_count().get(), 3);

        model.clear_interval().unwrap();
        assert!(model.selected_interval().is_none());
        assert_eq!(pipeline.record_count().get(), 6);
    }

    #[test]
    fn test_select_interval_requires_time_field() {
        let pipeline = testing::pipeline();
        let model = TimeGraphModel::new(pipeline, PresentationContext::default(), FieldSet::default()).unwrap();
        assert_eq!(
            model.select_interval(0, 1),
            Err(ViewError::NotConfigured("time field"))
        );
    }

    #[test]
    fn test_interval_labels() {
        let start = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(Interval::Quarter.label(start), "2024 Q2");
        assert_eq!(Interval::Week.label(start), "2024-W14");
        assert_eq!(Interval::Month.label(start), "2024-04");
        assert_eq!(
            Interval::Month.next_start(start),
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_hms_opt(0, 0, 0)
        );
    }
}
