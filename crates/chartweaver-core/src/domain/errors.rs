//! Errors - エラー型と分類
//!
//! パイプラインの失敗は全てここの型に集約されます。
//! tools 層がこれを status=error の応答に変換するため、
//! どの variant も人間が読めるメッセージを持ちます。

use thiserror::Error;

use crate::ports::StoreError;

/// PipelineError はパイプライン操作の失敗分類
///
/// # 分類
/// - NoCsvFound: セッションに CSV artifact が存在しない
/// - Parse: CSV のデコード・構造解析の失敗
/// - UnknownColumn: 要求された列がテーブルに無い
/// - UnsupportedChartType: 閉じた列挙に無いチャート種別
/// - Render: 描画バックエンドの失敗（リクエスト形状以外の原因）
/// - ScriptFailure: カスタムスクリプトの失敗（構文・実行時・タイムアウト）
/// - Store: artifact store の list/load/save の失敗
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no CSV file found. Upload a CSV file first.")]
    NoCsvFound,

    #[error("CSV parsing failed: {0}")]
    Parse(String),

    #[error("column '{column}' does not exist. Available columns: {available:?}")]
    UnknownColumn {
        column: String,
        available: Vec<String>,
    },

    #[error("unsupported chart type: {0}")]
    UnsupportedChartType(String),

    #[error("chart rendering failed: {0}")]
    Render(String),

    #[error("custom script failed: {0}")]
    ScriptFailure(String),

    #[error("artifact store error: {0}")]
    Store(#[from] StoreError),
}
