//! Temperature charts for stored daily summaries.

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::{
    fmt::{self, Debug},
    fs,
    path::{Path, PathBuf},
};
use tracing::info;

use crate::{
    model::{DATE_FORMAT, DailySummary},
    store::SummaryStore,
};

/// Draws a city's summary rows somewhere.
pub trait ChartRenderer: Send + Sync + Debug {
    /// `rows` is never empty. Returns where the chart ended up.
    fn render(&self, city: &str, rows: &[DailySummary]) -> Result<PathBuf>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlotOutcome {
    /// Nothing stored for the city; no chart was drawn.
    NoRecords { city: String },
    Rendered { city: String, path: PathBuf },
}

impl fmt::Display for PlotOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlotOutcome::NoRecords { city } => f.write_str(&no_records_notice(city)),
            PlotOutcome::Rendered { city, path } => {
                write!(f, "Chart for {city}: {}", path.display())
            }
        }
    }
}

/// Printed wherever a city turns out to have no stored summaries.
pub fn no_records_notice(city: &str) -> String {
    format!("No records found for {city}.")
}

/// Query a city's rows and hand them to the renderer.
pub async fn plot_daily_summary(
    store: &SummaryStore,
    renderer: &dyn ChartRenderer,
    city: &str,
) -> Result<PlotOutcome> {
    let rows = store.query(city).await?;
    if rows.is_empty() {
        return Ok(PlotOutcome::NoRecords {
            city: city.to_string(),
        });
    }

    let path = renderer.render(city, &rows)?;
    info!(city, path = %path.display(), rows = rows.len(), "Rendered temperature chart");
    Ok(PlotOutcome::Rendered {
        city: city.to_string(),
        path,
    })
}

/// PNG line charts, one file per city.
#[derive(Debug, Clone)]
pub struct PngRenderer {
    out_dir: PathBuf,
    size: (u32, u32),
}

impl PngRenderer {
    pub fn new(out_dir: PathBuf) -> Self {
        Self {
            out_dir,
            size: (1200, 600),
        }
    }

    fn path_for(&self, city: &str) -> PathBuf {
        let stem: String = city
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '_' })
            .collect();
        self.out_dir.join(format!("{stem}.png"))
    }
}

impl ChartRenderer for PngRenderer {
    fn render(&self, city: &str, rows: &[DailySummary]) -> Result<PathBuf> {
        fs::create_dir_all(&self.out_dir).with_context(|| {
            format!("Failed to create plot directory: {}", self.out_dir.display())
        })?;
        let path = self.path_for(city);

        draw(&path, self.size, city, rows)
            .map_err(|e| anyhow!("Failed to render chart for {city}: {e}"))?;

        Ok(path)
    }
}

fn draw(
    path: &Path,
    size: (u32, u32),
    city: &str,
    rows: &[DailySummary],
) -> Result<(), Box<dyn std::error::Error>> {
    let sorted = sorted_by_date(rows);
    let axis = DateAxis::for_rows(&sorted);
    let (y_min, y_max) = temperature_range(rows);

    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("Daily Temperature Summary for {city}"),
            ("sans-serif", 28).into_font(),
        )
        .margin(15)
        .x_label_area_size(110)
        .y_label_area_size(60)
        .build_cartesian_2d(axis.start..axis.end, y_min..y_max)?;

    // Date labels are drawn below, aligned with their own grid lines.
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc("Date")
        .y_desc("Temperature (°C)")
        .x_labels(axis.labels.len())
        .x_label_formatter(&|_| String::new())
        .draw()?;

    chart.draw_series(
        axis.labels
            .iter()
            .map(|d| PathElement::new(vec![(*d, y_min), (*d, y_max)], BLACK.mix(0.15))),
    )?;

    let label_style = x_label_style();
    for date in &axis.labels {
        root.draw(&Text::new(
            date.format(DATE_FORMAT).to_string(),
            x_label_anchor(chart.backend_coord(&(*date, y_min))),
            label_style.clone(),
        ))?;
    }

    let series: [(&str, RGBColor, fn(&DailySummary) -> f64); 3] = [
        ("Average Temp (°C)", BLUE, |r| r.avg_temp),
        ("Max Temp (°C)", RED, |r| r.max_temp),
        ("Min Temp (°C)", GREEN, |r| r.min_temp),
    ];

    for (label, color, value) in series {
        chart
            .draw_series(
                LineSeries::new(
                    sorted.iter().map(|r| (r.date, value(r))),
                    color.stroke_width(2),
                )
                .point_size(4),
            )?
            .label(label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

/// Pixels between the x axis line and the start of a date label.
const X_LABEL_GAP: i32 = 8;

/// Rotated date labels anchored at their start, so the text hangs below the
/// anchor instead of straddling it as the mesh's centred bottom labels do.
fn x_label_style() -> TextStyle<'static> {
    ("sans-serif", 13)
        .into_font()
        .transform(FontTransform::Rotate90)
        .color(&BLACK)
        .pos(Pos::new(HPos::Left, VPos::Center))
}

fn x_label_anchor((x, y): (i32, i32)) -> (i32, i32) {
    (x, y + X_LABEL_GAP)
}

/// Rows in date order; rows sharing a date keep their storage order.
fn sorted_by_date(rows: &[DailySummary]) -> Vec<&DailySummary> {
    let mut sorted: Vec<&DailySummary> = rows.iter().collect();
    sorted.sort_by_key(|r| r.date);
    sorted
}

/// Calendar x axis: one day past the last date so it is never empty.
#[derive(Debug, PartialEq)]
struct DateAxis {
    start: NaiveDate,
    end: NaiveDate,
    labels: Vec<NaiveDate>,
}

impl DateAxis {
    const MAX_LABELS: usize = 12;

    /// `sorted` must be non-empty and in date order.
    fn for_rows(sorted: &[&DailySummary]) -> Self {
        let mut dates: Vec<NaiveDate> = sorted.iter().map(|r| r.date).collect();
        dates.dedup();

        let start = dates[0];
        let last = dates[dates.len() - 1];
        let end = last.succ_opt().unwrap_or(last);

        let step = dates.len().div_ceil(Self::MAX_LABELS);
        let labels = dates.into_iter().step_by(step).collect();

        Self { start, end, labels }
    }
}

/// Y axis bounds covering every series with a little headroom.
fn temperature_range(rows: &[DailySummary]) -> (f64, f64) {
    let lo = rows.iter().map(|r| r.min_temp).fold(f64::INFINITY, f64::min);
    let hi = rows.iter().map(|r| r.max_temp).fold(f64::NEG_INFINITY, f64::max);
    let pad = ((hi - lo) * 0.1).max(1.0);
    (lo - pad, hi + pad)
}
