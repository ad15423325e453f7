//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてパイプラインを実装します。
//!
//! # 主要コンポーネント
//! - **PipelineBuilder**: パイプラインの構築とワイヤリング
//! - **ChartPipeline**: analyze / generate_chart / run_custom_render の表面

pub mod builder;
pub mod pipeline;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, PipelineBuilder};
pub use self::pipeline::{AnalyzeReport, ChartPipeline, ColumnTypeInfo, SavedChart};
