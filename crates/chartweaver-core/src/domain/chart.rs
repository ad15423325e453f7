//! Chart model: the closed chart enumeration, render requests, and the
//! rendered-image handoff type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name suffix that marks an artifact as tabular input.
/// 大文字小文字は区別する（".CSV" は対象外）。
pub const CSV_SUFFIX: &str = ".csv";

/// Fixed artifact name for sandbox output; every custom render
/// re-versions this one name instead of accumulating new names.
pub const CUSTOM_CHART_FILENAME: &str = "custom_chart.png";

pub const PNG_MIME: &str = "image/png";

/// The closed set of chart kinds the renderer knows how to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Line,
    Bar,
    Scatter,
    Histogram,
}

impl ChartKind {
    /// Parse the wire-level chart_type string. Anything outside the closed
    /// enumeration is the caller's UnsupportedChartType error.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "line" => Some(ChartKind::Line),
            "bar" => Some(ChartKind::Bar),
            "scatter" => Some(ChartKind::Scatter),
            "histogram" => Some(ChartKind::Histogram),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Line => "line",
            ChartKind::Bar => "bar",
            ChartKind::Scatter => "scatter",
            ChartKind::Histogram => "histogram",
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One column-based chart request, as received from the orchestration layer.
///
/// `chart_type` stays a raw string here: validating it against [`ChartKind`]
/// is the renderer's job so that an unknown kind surfaces as a structured
/// error instead of a deserialization fault.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartRequest {
    pub chart_type: String,
    pub x_column: String,
    pub y_column: String,
    #[serde(default = "default_title")]
    pub title: String,
}

fn default_title() -> String {
    "Chart".to_string()
}

/// 出力ファイル名はチャート種別と両列名から決定的に導出する。
/// 同一リクエストの繰り返しは同じ名前への再バージョンになる。
pub fn chart_filename(kind: ChartKind, x_column: &str, y_column: &str) -> String {
    format!("chart_{}_{}_{}.png", kind.as_str(), x_column, y_column)
}

/// Encoded image plus its derived artifact name.
///
/// Produced by the renderer or the sandbox, persisted by the façade, and
/// dropped after handoff; the core never retains image bytes.
#[derive(Debug, Clone)]
pub struct RenderedImage {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
}

impl RenderedImage {
    pub fn png(filename: String, bytes: Vec<u8>) -> Self {
        Self {
            filename,
            bytes,
            mime_type: PNG_MIME,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::line("line", ChartKind::Line)]
    #[case::bar("bar", ChartKind::Bar)]
    #[case::scatter("scatter", ChartKind::Scatter)]
    #[case::histogram("histogram", ChartKind::Histogram)]
    fn known_kinds_parse(#[case] input: &str, #[case] expected: ChartKind) {
        assert_eq!(ChartKind::parse(input), Some(expected));
        assert_eq!(expected.as_str(), input);
    }

    #[rstest]
    #[case::pie("pie")]
    #[case::empty("")]
    #[case::case_sensitive("Line")]
    fn unknown_kinds_do_not_parse(#[case] input: &str) {
        assert_eq!(ChartKind::parse(input), None);
    }

    #[test]
    fn filename_is_derived_from_kind_and_columns() {
        assert_eq!(
            chart_filename(ChartKind::Line, "date", "amount"),
            "chart_line_date_amount.png"
        );
    }

    #[test]
    fn request_title_defaults_when_omitted() {
        let req: ChartRequest = serde_json::from_value(serde_json::json!({
            "chart_type": "bar",
            "x_column": "date",
            "y_column": "amount",
        }))
        .unwrap();
        assert_eq!(req.title, "Chart");
    }
}
