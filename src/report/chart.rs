//! Chart emission
//!
//! The reporter describes each chart as a [`PlotRequest`] and hands it to a
//! [`ChartSink`]. [`SvgChartSink`] renders line charts with circle markers, a
//! grid and a legend, one SVG file per request.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, Result};

const LEFT_MARGIN: f64 = 80.0;
const RIGHT_MARGIN: f64 = 30.0;
const TOP_MARGIN: f64 = 50.0;
const BOTTOM_MARGIN: f64 = 60.0;
const TICK_COUNT: usize = 5;
const MARKER_RADIUS: f64 = 4.0;
const LEGEND_ROW_HEIGHT: f64 = 18.0;

/// Default series colors (matplotlib "tab10" order)
const PALETTE: [&str; 6] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b",
];

/// One labelled line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotSeries {
    /// Legend entry
    pub label: String,
    /// (x, y) points in drawing order
    pub points: Vec<(f64, f64)>,
}

impl PlotSeries {
    pub fn new(label: impl Into<String>, points: Vec<(f64, f64)>) -> Self {
        Self {
            label: label.into(),
            points,
        }
    }
}

/// Everything a sink needs to draw and persist one chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotRequest {
    /// Output file name, relative to the sink's destination
    pub artifact: String,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub series: Vec<PlotSeries>,
}

/// Renders and persists plot requests
pub trait ChartSink {
    /// Draw `request`; fails if the artifact cannot be written
    fn render(&mut self, request: &PlotRequest) -> Result<()>;
}

/// Axis scaling for the x axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisScale {
    #[default]
    Linear,
    Log10,
}

impl AxisScale {
    fn apply(self, v: f64) -> f64 {
        match self {
            Self::Linear => v,
            Self::Log10 => v.max(f64::MIN_POSITIVE).log10(),
        }
    }
}

/// Writes each request as `<output_dir>/<artifact>` in SVG format
pub struct SvgChartSink {
    output_dir: PathBuf,
    width: u32,
    height: u32,
    x_scale: AxisScale,
}

impl SvgChartSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            width: 1000,
            height: 600,
            x_scale: AxisScale::Linear,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_x_scale(mut self, scale: AxisScale) -> Self {
        self.x_scale = scale;
        self
    }

    /// Path a request will be written to
    pub fn artifact_path(&self, request: &PlotRequest) -> PathBuf {
        self.output_dir.join(&request.artifact)
    }
}

impl ChartSink for SvgChartSink {
    fn render(&mut self, request: &PlotRequest) -> Result<()> {
        let path = self.artifact_path(request);
        let svg = render_svg(request, self.width, self.height, self.x_scale);
        fs::write(&path, svg).map_err(|source| BenchError::ArtifactWrite {
            path: path.clone(),
            source,
        })?;
        log::info!("wrote chart {}", path.display());
        Ok(())
    }
}

/// Render a request to an SVG document
pub fn render_svg(request: &PlotRequest, width: u32, height: u32, x_scale: AxisScale) -> String {
    let (w, h) = (width as f64, height as f64);
    let plot_w = (w - LEFT_MARGIN - RIGHT_MARGIN).max(1.0);
    let plot_h = (h - TOP_MARGIN - BOTTOM_MARGIN).max(1.0);

    let points = request.series.iter().flat_map(|s| s.points.iter());
    let (x_min, x_max) = padded_range(points.clone().map(|&(x, _)| x_scale.apply(x)));
    let (y_min, y_max) = padded_range(points.map(|&(_, y)| y));

    let sx = |x: f64| LEFT_MARGIN + (x_scale.apply(x) - x_min) / (x_max - x_min) * plot_w;
    let sy = |y: f64| TOP_MARGIN + plot_h - (y - y_min) / (y_max - y_min) * plot_h;

    let mut svg = String::new();
    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">"
    ));
    svg.push_str(&format!(
        "<rect x=\"0\" y=\"0\" width=\"{width}\" height=\"{height}\" fill=\"#ffffff\"/>"
    ));
    svg.push_str(&format!(
        "<text x=\"{:.1}\" y=\"28\" text-anchor=\"middle\" font-family=\"sans-serif\" font-size=\"16\">{}</text>",
        LEFT_MARGIN + plot_w / 2.0,
        xml_escape(&request.title)
    ));

    // Grid and tick labels
    for i in 0..=TICK_COUNT {
        let frac = i as f64 / TICK_COUNT as f64;

        let gx = LEFT_MARGIN + frac * plot_w;
        let x_value = x_min + frac * (x_max - x_min);
        let x_label = match x_scale {
            AxisScale::Linear => format_tick(x_value),
            AxisScale::Log10 => format_tick(10f64.powf(x_value)),
        };
        svg.push_str(&format!(
            "<line x1=\"{gx:.1}\" y1=\"{TOP_MARGIN:.1}\" x2=\"{gx:.1}\" y2=\"{:.1}\" stroke=\"#dddddd\"/>",
            TOP_MARGIN + plot_h
        ));
        svg.push_str(&format!(
            "<text x=\"{gx:.1}\" y=\"{:.1}\" text-anchor=\"middle\" font-family=\"sans-serif\" font-size=\"11\">{}</text>",
            TOP_MARGIN + plot_h + 16.0,
            x_label
        ));

        let gy = TOP_MARGIN + plot_h - frac * plot_h;
        let y_value = y_min + frac * (y_max - y_min);
        svg.push_str(&format!(
            "<line x1=\"{LEFT_MARGIN:.1}\" y1=\"{gy:.1}\" x2=\"{:.1}\" y2=\"{gy:.1}\" stroke=\"#dddddd\"/>",
            LEFT_MARGIN + plot_w
        ));
        svg.push_str(&format!(
            "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"end\" font-family=\"sans-serif\" font-size=\"11\">{}</text>",
            LEFT_MARGIN - 6.0,
            gy + 4.0,
            format_tick(y_value)
        ));
    }

    svg.push_str(&format!(
        "<rect x=\"{LEFT_MARGIN:.1}\" y=\"{TOP_MARGIN:.1}\" width=\"{plot_w:.1}\" height=\"{plot_h:.1}\" fill=\"none\" stroke=\"#333333\"/>"
    ));

    // Axis titles
    svg.push_str(&format!(
        "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\" font-family=\"sans-serif\" font-size=\"13\">{}</text>",
        LEFT_MARGIN + plot_w / 2.0,
        h - 15.0,
        xml_escape(&request.x_label)
    ));
    svg.push_str(&format!(
        "<text x=\"20\" y=\"{:.1}\" text-anchor=\"middle\" font-family=\"sans-serif\" font-size=\"13\" transform=\"rotate(-90 20 {:.1})\">{}</text>",
        TOP_MARGIN + plot_h / 2.0,
        TOP_MARGIN + plot_h / 2.0,
        xml_escape(&request.y_label)
    ));

    for (idx, series) in request.series.iter().enumerate() {
        let color = PALETTE[idx % PALETTE.len()];
        let coords: Vec<String> = series
            .points
            .iter()
            .map(|&(x, y)| format!("{:.2},{:.2}", sx(x), sy(y)))
            .collect();
        svg.push_str(&format!(
            "<polyline points=\"{}\" fill=\"none\" stroke=\"{color}\" stroke-width=\"2\"/>",
            coords.join(" ")
        ));
        for &(x, y) in &series.points {
            svg.push_str(&format!(
                "<circle cx=\"{:.2}\" cy=\"{:.2}\" r=\"{MARKER_RADIUS}\" fill=\"{color}\"/>",
                sx(x),
                sy(y)
            ));
        }
    }

    // Legend, top-left inside the plot area
    let legend_x = LEFT_MARGIN + 12.0;
    for (idx, series) in request.series.iter().enumerate() {
        let color = PALETTE[idx % PALETTE.len()];
        let ly = TOP_MARGIN + 16.0 + idx as f64 * LEGEND_ROW_HEIGHT;
        svg.push_str(&format!(
            "<line x1=\"{legend_x:.1}\" y1=\"{ly:.1}\" x2=\"{:.1}\" y2=\"{ly:.1}\" stroke=\"{color}\" stroke-width=\"2\"/>",
            legend_x + 24.0
        ));
        svg.push_str(&format!(
            "<text x=\"{:.1}\" y=\"{:.1}\" font-family=\"sans-serif\" font-size=\"12\">{}</text>",
            legend_x + 30.0,
            ly + 4.0,
            xml_escape(&series.label)
        ));
    }

    svg.push_str("</svg>");
    svg
}

/// Min/max of finite values, widened so the range is never empty
fn padded_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (min, max) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if !min.is_finite() || !max.is_finite() {
        return (0.0, 1.0);
    }
    if (max - min).abs() < f64::EPSILON {
        let pad = if min.abs() > 0.0 { min.abs() * 0.1 } else { 1.0 };
        return (min - pad, max + pad);
    }
    let pad = (max - min) * 0.05;
    (min - pad, max + pad)
}

fn format_tick(v: f64) -> String {
    let a = v.abs();
    if a == 0.0 {
        "0".to_string()
    } else if a >= 10_000.0 || a < 0.01 {
        format!("{:.1e}", v)
    } else if a >= 100.0 {
        format!("{:.0}", v)
    } else {
        format!("{:.2}", v)
    }
}

fn xml_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
