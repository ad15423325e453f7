//! Domain model (IDs, table, chart, errors).
//!
//! モジュール構成:
//! - **ids**: ULID ベースの型付き ID（SessionId, RequestId）
//! - **table**: parsed CSV の in-memory 表現と統計
//! - **chart**: チャート種別・リクエスト・出力イメージ
//! - **errors**: パイプライン全体のエラー分類

pub mod chart;
pub mod errors;
pub mod ids;
pub mod table;

pub use chart::{
    CSV_SUFFIX, CUSTOM_CHART_FILENAME, ChartKind, ChartRequest, PNG_MIME, RenderedImage,
    chart_filename,
};
pub use errors::PipelineError;
pub use ids::{RequestId, SessionId};
pub use table::{ColumnSummary, ColumnType, Table};
