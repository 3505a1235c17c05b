//! `lens`: load a CSV table, apply the filter stages and print the result
//!
//! ```bash
//! lens incidents.csv --time-field created --from 2024-01-01 --to 2024-07-01 \
//!     --bbox -10,35,30,60 --group kind=fire --search kitchen --sort created:desc
//! ```
//!
//! `RUST_LOG` sets the log level (default: info).

use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use lens_core::FilterPipeline;
use lens_data::{CsvSource, Record, TableConfig, TableSource};
use lens_views::{
    FieldSet, GroupingKind, GroupingModel, HeaderModel, MapModel, PresentationContext, TableModel,
    TimeGraphModel,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod args;
mod report;

use args::Args;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    run(Args::parse()).await
}

async fn run(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => TableConfig::load(path)
            .with_context(|| format!("reading configuration {}", path.display()))?,
        None => TableConfig::default(),
    };
    match &args.csv {
        Some(csv) => config.path = csv.clone(),
        None if args.config.is_none() => bail!("either a CSV file or --config is required"),
        None => {}
    }

    let source = CsvSource::from_config(config.clone());
    let table = source
        .load()
        .await
        .with_context(|| format!("loading {}", config.path.display()))?;
    info!(table = source.name(), "table loaded");

    let pipeline = Arc::new(FilterPipeline::new(table.supplier(), table.entity_builder())?);
    let context = PresentationContext::default();
    let fields = FieldSet::from_schema(&table.batch().schema());

    let header = HeaderModel::new(pipeline.clone(), context.clone(), source.name());
    let time_graph = TimeGraphModel::new(pipeline.clone(), context.clone(), fields.clone())?;
    let map = MapModel::new(pipeline.clone());
    let grouping = GroupingModel::new(pipeline.clone(), context.clone(), fields.clone());
    let table_model = TableModel::new(pipeline.clone(), fields);

    if let Some((start, end)) = args.interval()? {
        if let Some(field) = args.time_field.as_ref().or(config.time_field.as_ref()) {
            time_graph.set_query_field(field)?;
        }
        time_graph.select_interval(start, end)?;
    }

    if let Some(bounds) = args.bbox {
        if let (Some(latitude), Some(longitude)) = (&config.latitude_field, &config.longitude_field) {
            map.set_location_fields(latitude, longitude)?;
        }
        map.select_area(bounds)?;
    }

    for (field, value) in &args.groups {
        let entries = grouping.group(field, GroupingKind::ByValue)?;
        let entry = entries
            .iter()
            .find(|e| if value.is_empty() { e.empty } else { !e.empty && &e.caption == value })
            .ok_or_else(|| anyhow!("no records with {}={} in the selected area", field, value))?;
        grouping.add_filter(entry)?;
    }

    if let Some(search) = &args.search {
        header.set_search_text(search)?;
    }

    println!("{}", header.view_title().get());
    println!("{}", report::stage_counts(&pipeline, &context)?);
    println!();

    let page: Vec<Record> = table_model.records(0, args.limit, args.sort.as_ref())?;
    println!("{}", report::records(&table, &page)?);

    if let Some(field) = &args.group_by {
        let entries = grouping.group(field, GroupingKind::ByValue)?;
        println!();
        println!("{}", report::groups(field, &entries, &context));
    }

    Ok(())
}
