//! Chart renderer: column series -> marks -> pixels.
//!
//! The renderer validates a [`ChartRequest`] against a [`Table`], extracts
//! the series, and draws one of the four closed chart kinds onto a fresh
//! [`DrawingSurface`]. The mark/spec split exists so the sandbox plot
//! bindings can feed the same drawing path without a table or request.

use std::ops::Range;

use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::types::RangedCoordf64;
use plotters::prelude::*;

use crate::domain::{ChartKind, ChartRequest, PipelineError, RenderedImage, Table, chart_filename};
use crate::render::surface::{CANVAS_HEIGHT, CANVAS_WIDTH, DrawingSurface};

/// ヒストグラムは固定 20 bin
pub const HISTOGRAM_BINS: usize = 20;

/// x 軸の値列。数値列は値そのまま、それ以外は行順の位置 + ラベル。
#[derive(Debug, Clone)]
pub enum AxisValues {
    Numeric(Vec<f64>),
    Categorical(Vec<String>),
}

impl AxisValues {
    fn positions(&self) -> Vec<f64> {
        match self {
            AxisValues::Numeric(values) => values.clone(),
            AxisValues::Categorical(labels) => (0..labels.len()).map(|i| i as f64).collect(),
        }
    }

    fn labels(&self) -> Option<&[String]> {
        match self {
            AxisValues::Numeric(_) => None,
            AxisValues::Categorical(labels) => Some(labels),
        }
    }
}

/// One drawable series.
#[derive(Debug, Clone)]
pub enum Mark {
    Line { xs: AxisValues, ys: Vec<f64> },
    Bars { labels: Vec<String>, heights: Vec<f64> },
    Scatter { xs: AxisValues, ys: Vec<f64> },
    Histogram { values: Vec<f64>, bins: usize },
}

/// Everything one render call draws: title, axis labels, marks.
///
/// This is the explicit per-call drawing context. There is no global
/// figure anywhere, so a failed render cannot contaminate the next one.
#[derive(Debug, Clone, Default)]
pub struct ChartSpec {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub marks: Vec<Mark>,
}

/// Column-based chart renderer (the generate_chart path).
#[derive(Debug, Clone)]
pub struct ChartRenderer {
    width: u32,
    height: u32,
}

impl Default for ChartRenderer {
    fn default() -> Self {
        Self {
            width: CANVAS_WIDTH,
            height: CANVAS_HEIGHT,
        }
    }
}

impl ChartRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// キャンバスサイズ差し替え（比率は呼び出し側の責任）
    pub fn with_size(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Validate the request against the table, then draw.
    ///
    /// Column validation runs first (both columns are part of the request
    /// contract, histogram included); the chart kind check follows. Neither
    /// failure ever creates a drawing surface.
    pub fn render(
        &self,
        table: &Table,
        request: &ChartRequest,
    ) -> Result<RenderedImage, PipelineError> {
        for column in [&request.x_column, &request.y_column] {
            if !table.has_column(column) {
                return Err(PipelineError::UnknownColumn {
                    column: column.clone(),
                    available: table.columns().to_vec(),
                });
            }
        }

        let kind = ChartKind::parse(&request.chart_type)
            .ok_or_else(|| PipelineError::UnsupportedChartType(request.chart_type.clone()))?;

        let ys = numeric_series(table, &request.y_column)?;
        let mark = match kind {
            ChartKind::Line => Mark::Line {
                xs: axis_values(table, &request.x_column)?,
                ys,
            },
            ChartKind::Bar => Mark::Bars {
                labels: text_series(table, &request.x_column),
                heights: ys,
            },
            ChartKind::Scatter => Mark::Scatter {
                xs: axis_values(table, &request.x_column)?,
                ys,
            },
            // x 列は検証のみで、描画には使わない（意図された挙動）
            ChartKind::Histogram => Mark::Histogram {
                values: ys,
                bins: HISTOGRAM_BINS,
            },
        };

        // ヒストグラムの描画内容は y 列だけで決まる。x 列名を軸ラベルに
        // 使うとそこだけ画像が変わってしまうので、値軸を y 列名にする。
        let (x_label, y_label) = match kind {
            ChartKind::Histogram => (request.y_column.clone(), "count".to_string()),
            _ => (request.x_column.clone(), request.y_column.clone()),
        };
        let spec = ChartSpec {
            title: request.title.clone(),
            x_label,
            y_label,
            marks: vec![mark],
        };
        let bytes = render_spec(&spec, self.width, self.height)?;
        Ok(RenderedImage::png(
            chart_filename(kind, &request.x_column, &request.y_column),
            bytes,
        ))
    }
}

/// y 系列は数値必須。数値でないセルはリクエストエラー。
fn numeric_series(table: &Table, column: &str) -> Result<Vec<f64>, PipelineError> {
    let values = table
        .column_values(column)
        .ok_or_else(|| PipelineError::UnknownColumn {
            column: column.to_string(),
            available: table.columns().to_vec(),
        })?;
    values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            v.trim().parse::<f64>().map_err(|_| {
                PipelineError::Render(format!(
                    "column '{column}' has non-numeric value '{v}' at row {}",
                    i + 1
                ))
            })
        })
        .collect()
}

fn text_series(table: &Table, column: &str) -> Vec<String> {
    table
        .column_values(column)
        .map(|values| values.into_iter().map(str::to_string).collect())
        .unwrap_or_default()
}

/// x 軸: 数値列は値、それ以外は行順位置 + ラベル。
fn axis_values(table: &Table, column: &str) -> Result<AxisValues, PipelineError> {
    let numeric = table
        .column_type(column)
        .map(|t| t.is_numeric())
        .unwrap_or(false);
    if numeric {
        Ok(AxisValues::Numeric(numeric_series(table, column)?))
    } else {
        Ok(AxisValues::Categorical(text_series(table, column)))
    }
}

/// Draw a spec onto a fresh surface and encode it.
pub fn render_spec(spec: &ChartSpec, width: u32, height: u32) -> Result<Vec<u8>, PipelineError> {
    let frame = compute_frame(spec);
    let mut surface = DrawingSurface::new(width, height)?;

    {
        let root = surface.drawing_area();
        root.fill(&WHITE).map_err(render_err)?;

        // フォントサイズはキャンバスに比例させる（300dpi の既定サイズで
        // タイトル 64px / ラベル 32px 相当）。
        let title_px = scaled(height, 0.036);
        let desc_px = scaled(height, 0.024);
        let label_px = scaled(height, 0.018);

        let mut builder = ChartBuilder::on(&root);
        builder
            .caption(
                &spec.title,
                FontDesc::new(FontFamily::SansSerif, title_px, FontStyle::Bold),
            )
            .margin((height / 60).max(4))
            .x_label_area_size((height as f64 * 0.085) as u32)
            .y_label_area_size((width as f64 * 0.055) as u32);
        let mut chart = builder
            .build_cartesian_2d(frame.x_range.clone(), frame.y_range.clone())
            .map_err(render_err)?;

        let tick_labels = frame.x_ticks.clone();
        let formatter = move |v: &f64| format_tick(*v, tick_labels.as_deref());

        let mut mesh = chart.configure_mesh();
        mesh.x_desc(spec.x_label.as_str())
            .y_desc(spec.y_label.as_str())
            .axis_desc_style(FontDesc::new(FontFamily::SansSerif, desc_px, FontStyle::Normal))
            .label_style(FontDesc::new(FontFamily::SansSerif, label_px, FontStyle::Normal))
            .bold_line_style(BLACK.mix(0.15).stroke_width(1))
            .light_line_style(BLACK.mix(0.05).stroke_width(1))
            .x_label_formatter(&formatter);
        if let Some(labels) = &frame.x_ticks {
            mesh.x_labels(labels.len().min(12));
        }
        mesh.draw().map_err(render_err)?;

        for (i, mark) in spec.marks.iter().enumerate() {
            draw_mark(&mut chart, mark, PALETTE[i % PALETTE.len()])?;
        }
    }

    surface.into_png()
}

/// matplotlib 既定に合わせた系列色
const PALETTE: [RGBColor; 5] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
];

type Chart2d<'a, 'b> = ChartContext<'a, BitMapBackend<'b>, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

fn draw_mark(chart: &mut Chart2d<'_, '_>, mark: &Mark, color: RGBColor) -> Result<(), PipelineError> {
    match mark {
        Mark::Line { xs, ys } => {
            let points: Vec<(f64, f64)> = xs.positions().into_iter().zip(ys.iter().copied()).collect();
            let stroke = (chart.plotting_area().dim_in_pixel().1 / 300).max(2);
            chart
                .draw_series(LineSeries::new(points.clone(), color.stroke_width(stroke)))
                .map_err(render_err)?;
            // 折れ線は各点にマーカーを重ねる
            let radius = (stroke * 3) as i32;
            chart
                .draw_series(points.into_iter().map(|p| Circle::new(p, radius, color.filled())))
                .map_err(render_err)?;
        }
        // bar のラベルは軸 formatter が描くので、ここでは高さだけを使う
        Mark::Bars { labels: _, heights } => {
            chart
                .draw_series(heights.iter().enumerate().map(|(i, &h)| {
                    let x = i as f64;
                    Rectangle::new([(x - 0.4, 0.0), (x + 0.4, h)], color.filled())
                }))
                .map_err(render_err)?;
        }
        Mark::Scatter { xs, ys } => {
            let radius = (chart.plotting_area().dim_in_pixel().1 / 100).max(3) as i32;
            chart
                .draw_series(
                    xs.positions()
                        .into_iter()
                        .zip(ys.iter().copied())
                        .map(|p| Circle::new(p, radius, color.mix(0.6).filled())),
                )
                .map_err(render_err)?;
        }
        Mark::Histogram { values, bins } => {
            let stroke = (chart.plotting_area().dim_in_pixel().1 / 400).max(1);
            for (start, end, count) in histogram_bins(values, *bins) {
                let rect = [(start, 0.0), (end, count as f64)];
                chart
                    .plotting_area()
                    .draw(&Rectangle::new(rect, color.filled()))
                    .map_err(render_err)?;
                // edge を黒で縁取る
                chart
                    .plotting_area()
                    .draw(&Rectangle::new(rect, BLACK.stroke_width(stroke)))
                    .map_err(render_err)?;
            }
        }
    }
    Ok(())
}

/// Fixed-width bins over [min, max]; the top edge is inclusive.
pub(crate) fn histogram_bins(values: &[f64], bins: usize) -> Vec<(f64, f64, usize)> {
    if values.is_empty() {
        return Vec::new();
    }
    let bins = bins.max(1);
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let (min, width) = if max > min {
        (min, (max - min) / bins as f64)
    } else {
        // 全値が同一: 値を中心に幅 1 の bin を並べる
        (min - 0.5, 1.0 / bins as f64)
    };

    let mut counts = vec![0usize; bins];
    for &v in values {
        let idx = (((v - min) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }
    counts
        .into_iter()
        .enumerate()
        .map(|(i, c)| (min + i as f64 * width, min + (i + 1) as f64 * width, c))
        .collect()
}

struct Frame {
    x_range: Range<f64>,
    y_range: Range<f64>,
    x_ticks: Option<Vec<String>>,
}

/// Axis ranges and tick labels across all marks, with 5% padding.
fn compute_frame(spec: &ChartSpec) -> Frame {
    let mut x_min = f64::INFINITY;
    let mut x_max = f64::NEG_INFINITY;
    let mut y_min = f64::INFINITY;
    let mut y_max = f64::NEG_INFINITY;
    let mut x_ticks: Option<Vec<String>> = None;

    fn cover(
        xs: &[f64],
        ys: &[f64],
        x_min: &mut f64,
        x_max: &mut f64,
        y_min: &mut f64,
        y_max: &mut f64,
    ) {
        for &x in xs {
            *x_min = x_min.min(x);
            *x_max = x_max.max(x);
        }
        for &y in ys {
            *y_min = y_min.min(y);
            *y_max = y_max.max(y);
        }
    }

    for mark in &spec.marks {
        match mark {
            Mark::Line { xs, ys } | Mark::Scatter { xs, ys } => {
                cover(&xs.positions(), ys, &mut x_min, &mut x_max, &mut y_min, &mut y_max);
                if x_ticks.is_none() {
                    x_ticks = xs.labels().map(|l| l.to_vec());
                }
            }
            Mark::Bars { labels, heights } => {
                let positions: Vec<f64> = (0..heights.len()).map(|i| i as f64).collect();
                cover(&positions, heights, &mut x_min, &mut x_max, &mut y_min, &mut y_max);
                y_min = y_min.min(0.0);
                y_max = y_max.max(0.0);
                if x_ticks.is_none() {
                    x_ticks = Some(labels.clone());
                }
            }
            Mark::Histogram { values, bins } => {
                for (start, end, count) in histogram_bins(values, *bins) {
                    cover(&[start, end], &[count as f64], &mut x_min, &mut x_max, &mut y_min, &mut y_max);
                }
                y_min = y_min.min(0.0);
            }
        }
    }

    // 空のマーク（0 行テーブルなど）は既定の枠で空チャートを描く
    if !(x_min.is_finite() && x_max.is_finite()) {
        x_min = 0.0;
        x_max = 1.0;
    }
    if !(y_min.is_finite() && y_max.is_finite()) {
        y_min = 0.0;
        y_max = 1.0;
    }

    Frame {
        x_range: pad_range(x_min, x_max),
        y_range: pad_range(y_min, y_max),
        x_ticks,
    }
}

fn pad_range(min: f64, max: f64) -> Range<f64> {
    let span = max - min;
    let pad = if span > 0.0 { span * 0.05 } else { 0.5 };
    (min - pad)..(max + pad)
}

fn scaled(height: u32, factor: f64) -> f64 {
    (height as f64 * factor).max(8.0)
}

/// Categorical axes label integer positions with the source cell text;
/// everything else gets plain number formatting.
fn format_tick(v: f64, labels: Option<&[String]>) -> String {
    match labels {
        Some(labels) => {
            let idx = v.round();
            if (v - idx).abs() < 0.01 && idx >= 0.0 && (idx as usize) < labels.len() {
                labels[idx as usize].clone()
            } else {
                String::new()
            }
        }
        None => format_number(v),
    }
}

fn format_number(v: f64) -> String {
    if v == v.trunc() && v.abs() < 1e12 {
        format!("{}", v as i64)
    } else {
        let s = format!("{v:.3}");
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

fn render_err<E: std::fmt::Display>(e: E) -> PipelineError {
    PipelineError::Render(e.to_string())
}
