//! Command line arguments

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use geo::{coord, Rect};
use lens_core::Sorting;

#[derive(Parser, Debug)]
#[command(name = "lens")]
#[command(about = "Filter a CSV table through the time, geo, grouping and full-text stages")]
#[command(version)]
pub struct Args {
    /// CSV file to load; overrides the path of `--config`
    pub csv: Option<PathBuf>,

    /// JSON table configuration
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Time column; defaults to the configured time field
    #[arg(long)]
    pub time_field: Option<String>,

    /// Interval start, milliseconds or a date
    #[arg(long)]
    pub from: Option<String>,

    /// Interval end (exclusive), milliseconds or a date
    #[arg(long)]
    pub to: Option<String>,

    /// Selected area
    #[arg(long, value_name = "MINLON,MINLAT,MAXLON,MAXLAT", value_parser = parse_bbox)]
    pub bbox: Option<Rect<f64>>,

    /// Keep records whose FIELD equals VALUE; repeat to combine
    #[arg(long = "group", value_name = "FIELD=VALUE", value_parser = parse_group)]
    pub groups: Vec<(String, String)>,

    /// Full-text search
    #[arg(long)]
    pub search: Option<String>,

    /// Sort the printed records
    #[arg(long, value_name = "FIELD[:desc]", value_parser = parse_sort)]
    pub sort: Option<Sorting>,

    /// Records to print
    #[arg(long, default_value = "20")]
    pub limit: usize,

    /// Print the value counts of a field
    #[arg(long, value_name = "FIELD")]
    pub group_by: Option<String>,
}

impl Args {
    /// Interval bounds; an open end uses the extreme of its side
    pub fn interval(&self) -> Result<Option<(i64, i64)>> {
        if self.from.is_none() && self.to.is_none() {
            return Ok(None);
        }
        let start = self.from.as_deref().map(parse_time).transpose()?.unwrap_or(i64::MIN);
        let end = self.to.as_deref().map(parse_time).transpose()?.unwrap_or(i64::MAX);
        if start >= end {
            bail!("--from must be before --to");
        }
        Ok(Some((start, end)))
    }
}

fn parse_time(value: &str) -> Result<i64> {
    lens_data::sources::csv_source::parse_timestamp(value)
        .ok_or_else(|| anyhow!("invalid time '{}'", value))
}

fn parse_bbox(value: &str) -> Result<Rect<f64>> {
    let parts = value
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("invalid bounding box '{}'", value))?;
    match parts.as_slice() {
        [min_lon, min_lat, max_lon, max_lat] => Ok(Rect::new(
            coord! { x: *min_lon, y: *min_lat },
            coord! { x: *max_lon, y: *max_lat },
        )),
        _ => bail!("bounding box needs four values, got {}", parts.len()),
    }
}

fn parse_group(value: &str) -> Result<(String, String)> {
    let (field, group) = value
        .split_once('=')
        .ok_or_else(|| anyhow!("expected FIELD=VALUE, got '{}'", value))?;
    if field.trim().is_empty() {
        bail!("empty field name in '{}'", value);
    }
    Ok((field.trim().to_string(), group.to_string()))
}

fn parse_sort(value: &str) -> Result<Sorting> {
    match value.rsplit_once(':') {
        Some((field, "desc")) => Ok(Sorting::descending(field)),
        Some((field, "asc")) => Ok(Sorting::ascending(field)),
        Some((_, order)) => bail!("unknown sort order '{}'", order),
        None => Ok(Sorting::ascending(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bbox() {
        let rect = parse_bbox("-10, 35,30,60").unwrap();
        assert_eq!(rect.min(), coord! { x: -10.0, y: 35.0 });
        assert_eq!(rect.max(), coord! { x: 30.0, y: 60.0 });
        assert!(parse_bbox("1,2,3").is_err());
        assert!(parse_bbox("a,b,c,d").is_err());
    }

    #[test]
    fn test_parse_group_and_sort() {
        assert_eq!(
            parse_group("kind=fire").unwrap(),
            ("kind".to_string(), "fire".to_string())
        );
        assert_eq!(parse_group("kind=").unwrap().1, "");
        assert!(parse_group("fire").is_err());

        assert_eq!(parse_sort("created:desc").unwrap(), Sorting::descending("created"));
        assert_eq!(parse_sort("created").unwrap(), Sorting::ascending("created"));
        assert!(parse_sort("created:up").is_err());
    }

    #[test]
    fn test_interval_bounds() {
        let args = Args::parse_from(["lens", "events.csv", "--from", "2024-01-01", "--to", "1704153600000"]);
        assert_eq!(args.interval().unwrap(), Some((1_704_067_200_000, 1_704_153_600_000)));

        let open = Args::parse_from(["lens", "events.csv", "--to", "1000"]);
        assert_eq!(open.interval().unwrap(), Some((i64::MIN, 1000)));

        let reversed = Args::parse_from(["lens", "events.csv", "--from", "2000", "--to", "1000"]);
        assert!(reversed.interval().is_err());
        assert_eq!(Args::parse_from(["lens", "events.csv"]).interval().unwrap(), None);
    }
}
