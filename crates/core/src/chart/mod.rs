use crate::domain::series::TimeSeries;
use anyhow::{bail, Context};
use chrono::{Duration, NaiveDateTime};
use plotters::prelude::*;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const CHART_TITLE: &str = "Estimated Price Trend — Last 48 Hours (3-hour intervals)";
pub const CHART_FILE_PREFIX: &str = "price_48hr_";

const WIDTH: u32 = 1200;
const HEIGHT: u32 = 600;

fn draw_err<E: std::fmt::Display>(e: E) -> anyhow::Error {
    anyhow::anyhow!("chart rendering failed: {e}")
}

fn label_for(origin: NaiveDateTime, hours: f64) -> String {
    let ts = origin + Duration::minutes((hours * 60.0).round() as i64);
    ts.format("%m-%d %H:%M").to_string()
}

/// Line chart of the series with a marker per point, as SVG text.
pub fn render_trend_svg(series: &TimeSeries) -> anyhow::Result<String> {
    let (Some(first), Some((lo, hi))) = (series.first(), series.price_range()) else {
        bail!("cannot chart an empty series");
    };
    let origin = first.timestamp;

    let points: Vec<(f64, f64)> = series
        .iter()
        .map(|p| {
            let hours = (p.timestamp - origin).num_minutes() as f64 / 60.0;
            (hours, p.price)
        })
        .collect();
    let x_max = points.last().map(|(x, _)| *x).unwrap_or(0.0).max(1.0);
    let pad = ((hi - lo) * 0.1).max(hi.abs() * 0.01).max(1.0);

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (WIDTH, HEIGHT)).into_drawing_area();
        root.fill(&WHITE).map_err(draw_err)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(CHART_TITLE, ("sans-serif", 24))
            .margin(20)
            .x_label_area_size(70)
            .y_label_area_size(90)
            .build_cartesian_2d(0.0..x_max, (lo - pad)..(hi + pad))
            .map_err(draw_err)?;

        chart
            .configure_mesh()
            .x_desc("Time")
            .y_desc("Estimated Price (₹)")
            .x_labels(series.len())
            .x_label_formatter(&|x| label_for(origin, *x))
            .y_label_formatter(&|y| format!("{y:.0}"))
            .light_line_style(RGBColor(225, 225, 225).stroke_width(1))
            .draw()
            .map_err(draw_err)?;

        chart
            .draw_series(LineSeries::new(points.iter().copied(), BLUE.stroke_width(2)))
            .map_err(draw_err)?;
        chart
            .draw_series(
                points
                    .iter()
                    .map(|&(x, y)| Circle::new((x, y), 4, BLUE.filled())),
            )
            .map_err(draw_err)?;

        root.present().map_err(draw_err)?;
    }
    Ok(svg)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredChart {
    pub file_name: String,
    pub path: PathBuf,
    pub url: String,
}

/// Directory of rendered charts. Every save gets its own file name, so
/// concurrent requests never overwrite each other's chart.
#[derive(Debug, Clone)]
pub struct ChartStore {
    dir: PathBuf,
    url_prefix: String,
}

impl ChartStore {
    pub fn open(dir: impl Into<PathBuf>, url_prefix: &str) -> anyhow::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create chart dir {}", dir.display()))?;
        Ok(Self {
            dir,
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn save(&self, svg: &str) -> anyhow::Result<StoredChart> {
        let file_name = format!("{CHART_FILE_PREFIX}{}.svg", Uuid::new_v4());
        let path = self.dir.join(&file_name);
        let tmp = self.dir.join(format!("{file_name}.tmp"));

        std::fs::write(&tmp, svg)
            .with_context(|| format!("failed to write chart {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("failed to move chart into {}", path.display()))?;

        Ok(StoredChart {
            url: format!("{}/{file_name}", self.url_prefix),
            file_name,
            path,
        })
    }

    /// Deletes all but the `keep` most recent charts. Returns how many were removed.
    pub fn prune(&self, keep: usize) -> anyhow::Result<usize> {
        let mut charts = Vec::new();
        for entry in std::fs::read_dir(&self.dir)
            .with_context(|| format!("failed to list chart dir {}", self.dir.display()))?
        {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !(name.starts_with(CHART_FILE_PREFIX) && name.ends_with(".svg")) {
                continue;
            }
            let modified = entry.metadata()?.modified()?;
            charts.push((modified, entry.path()));
        }

        if charts.len() <= keep {
            return Ok(0);
        }
        charts.sort_by(|a, b| b.cmp(a));

        let mut removed = 0;
        for (_, path) in charts.into_iter().skip(keep) {
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to prune chart")
                }
            }
        }
        Ok(removed)
    }
}
