//! Tabular loader: raw CSV bytes -> [`Table`].
//!
//! Pure function over bytes. The csv reader runs in flexible mode, so rows
//! that are shorter or longer than the header are padded/truncated instead
//! of rejected (lenient CSV-parsing convention). What does fail the parse:
//! invalid UTF-8, a missing header row, duplicate column names, and reader
//! faults inside a record.

use csv::{ReaderBuilder, Trim};

use crate::domain::{ColumnType, PipelineError, Table};

/// CSV -> Table 変換器
///
/// # 設定
/// - delimiter: 区切り文字（デフォルト `,`）
/// - trim: セル前後の空白を除去するか（デフォルト true）
#[derive(Debug, Clone)]
pub struct TableLoader {
    delimiter: u8,
    trim: bool,
}

impl Default for TableLoader {
    fn default() -> Self {
        Self {
            delimiter: b',',
            trim: true,
        }
    }
}

impl TableLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a custom delimiter.
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set whether to trim whitespace around cells.
    pub fn with_trim(mut self, trim: bool) -> Self {
        self.trim = trim;
        self
    }

    /// Parse one CSV document. The first row is the header.
    pub fn parse(&self, bytes: &[u8]) -> Result<Table, PipelineError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| PipelineError::Parse(format!("not valid UTF-8: {e}")))?;

        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .trim(if self.trim { Trim::All } else { Trim::None })
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers = reader
            .headers()
            .map_err(|e| PipelineError::Parse(format!("failed to read CSV header: {e}")))?;
        let columns: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
        if columns.is_empty() || columns.iter().all(|c| c.is_empty()) {
            return Err(PipelineError::Parse("CSV document has no header row".to_string()));
        }
        for (i, name) in columns.iter().enumerate() {
            if columns[..i].contains(name) {
                return Err(PipelineError::Parse(format!("duplicate column name: '{name}'")));
            }
        }

        let width = columns.len();
        let mut rows: Vec<Vec<String>> = Vec::new();
        for (idx, result) in reader.records().enumerate() {
            let record = result
                .map_err(|e| PipelineError::Parse(format!("failed to parse row {}: {e}", idx + 1)))?;
            let mut row: Vec<String> = record.iter().take(width).map(|c| c.to_string()).collect();
            // 足りない分は空セルで埋める（flexible mode）
            row.resize(width, String::new());
            rows.push(row);
        }

        let types = (0..width)
            .map(|col| infer_column_type(rows.iter().map(|r| r[col].as_str())))
            .collect();

        Ok(Table::new(columns, types, rows))
    }
}

/// Infer a column's type from its non-empty cells (all-or-nothing: one cell
/// outside the candidate type demotes the whole column).
fn infer_column_type<'a>(cells: impl Iterator<Item = &'a str>) -> ColumnType {
    let values: Vec<&str> = cells.map(str::trim).filter(|c| !c.is_empty()).collect();
    if values.is_empty() {
        return ColumnType::Text;
    }
    if values.iter().all(|v| v.parse::<i64>().is_ok()) {
        return ColumnType::Integer;
    }
    if values.iter().all(|v| v.parse::<f64>().is_ok()) {
        return ColumnType::Float;
    }
    if values.iter().all(|v| v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("false")) {
        return ColumnType::Boolean;
    }
    if values.iter().all(|v| is_date_like(v)) {
        return ColumnType::Date;
    }
    ColumnType::Text
}

fn is_date_like(value: &str) -> bool {
    chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
        || chrono::NaiveDate::parse_from_str(value, "%Y/%m/%d").is_ok()
        || chrono::DateTime::parse_from_rfc3339(value).is_ok()
}
