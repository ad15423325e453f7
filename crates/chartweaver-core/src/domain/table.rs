//! Table model: the in-memory form of one parsed CSV document.
//!
//! This module is I/O-agnostic: it does not know about artifact stores or
//! the csv crate. It only defines the shape the rest of the pipeline reads
//! (columns, typed labels, cell text) and the derived views the analyze
//! operation reports (preview, summary statistics).

use std::collections::BTreeMap;

use serde::Serialize;

/// Inferred type label for one column.
///
/// The label set is deliberately small: it is reported to the end user as a
/// string and drives exactly one decision downstream (numeric columns get
/// summary statistics and numeric axis positions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Float,
    Boolean,
    Date,
    Text,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Boolean => "boolean",
            ColumnType::Date => "date",
            ColumnType::Text => "text",
        }
    }

    /// Integer と Float のみが統計・数値軸の対象
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }
}

/// Summary statistics for one numeric column (the familiar describe() keys).
///
/// `std` is the sample standard deviation (n-1 denominator); it is `None`
/// when only one value exists, serialized as JSON null.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnSummary {
    pub count: usize,
    pub mean: f64,
    pub std: Option<f64>,
    pub min: f64,
    #[serde(rename = "25%")]
    pub q1: f64,
    #[serde(rename = "50%")]
    pub median: f64,
    #[serde(rename = "75%")]
    pub q3: f64,
    pub max: f64,
}

/// One parsed CSV document.
///
/// Cells are kept as text; numeric interpretation happens on demand
/// (statistics, chart series). Row width always equals the header width;
/// the loader pads/truncates lenient rows before construction.
#[derive(Debug, Clone)]
pub struct Table {
    columns: Vec<String>,
    types: Vec<ColumnType>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Construct a table. Panics in debug builds if a row width disagrees
    /// with the header width; the loader upholds this invariant.
    pub fn new(columns: Vec<String>, types: Vec<ColumnType>, rows: Vec<Vec<String>>) -> Self {
        debug_assert_eq!(columns.len(), types.len());
        debug_assert!(rows.iter().all(|r| r.len() == columns.len()));
        Self {
            columns,
            types,
            rows,
        }
    }

    /// Column names, header order preserved.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Data row count (header excluded).
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Inferred type of the named column.
    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.column_index(name).map(|i| self.types[i])
    }

    /// (name, type) pairs in header order.
    pub fn column_types(&self) -> impl Iterator<Item = (&str, ColumnType)> {
        self.columns
            .iter()
            .map(|c| c.as_str())
            .zip(self.types.iter().copied())
    }

    /// Cell text of one column, row order preserved.
    pub fn column_values(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r[idx].as_str()).collect())
    }

    /// First `n` rows as JSON objects (column name -> cell text).
    pub fn preview(&self, n: usize) -> Vec<serde_json::Value> {
        self.rows
            .iter()
            .take(n)
            .map(|row| {
                let mut obj = serde_json::Map::new();
                for (name, cell) in self.columns.iter().zip(row.iter()) {
                    obj.insert(name.clone(), serde_json::Value::String(cell.clone()));
                }
                serde_json::Value::Object(obj)
            })
            .collect()
    }

    /// Summary statistics for every numeric column.
    ///
    /// Empty tables yield an empty map; empty cells are skipped and reduce
    /// the per-column count.
    pub fn describe(&self) -> BTreeMap<String, ColumnSummary> {
        let mut out = BTreeMap::new();
        if self.rows.is_empty() {
            return out;
        }
        for (idx, name) in self.columns.iter().enumerate() {
            if !self.types[idx].is_numeric() {
                continue;
            }
            let values: Vec<f64> = self
                .rows
                .iter()
                .filter_map(|r| {
                    let cell = r[idx].trim();
                    if cell.is_empty() {
                        None
                    } else {
                        cell.parse::<f64>().ok()
                    }
                })
                .collect();
            if let Some(summary) = summarize(&values) {
                out.insert(name.clone(), summary);
            }
        }
        out
    }
}

/// describe() 相当の統計量を計算（空列は None）
fn summarize(values: &[f64]) -> Option<ColumnSummary> {
    if values.is_empty() {
        return None;
    }
    let n = values.len();
    let mean = values.iter().sum::<f64>() / n as f64;

    // 標本標準偏差（n-1）。n=1 のときは未定義なので None。
    let std = if n > 1 {
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        Some(var.sqrt())
    } else {
        None
    };

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    Some(ColumnSummary {
        count: n,
        mean,
        std,
        min: sorted[0],
        q1: quantile(&sorted, 0.25),
        median: quantile(&sorted, 0.5),
        q3: quantile(&sorted, 0.75),
        max: sorted[n - 1],
    })
}

/// Linear-interpolation quantile over a sorted slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let pos = q * (n - 1) as f64;
    let lower = pos.floor() as usize;
    let frac = pos - lower as f64;
    if lower + 1 >= n {
        sorted[n - 1]
    } else {
        sorted[lower] + frac * (sorted[lower + 1] - sorted[lower])
    }
}
