//! Render - チャート描画
//!
//! - **surface**: per-call の描画バッファと PNG エンコード
//! - **chart**: リクエスト検証・系列抽出・4 種チャートの描画

pub mod chart;
pub mod surface;

pub use chart::{AxisValues, ChartRenderer, ChartSpec, HISTOGRAM_BINS, Mark, render_spec};
pub use surface::{CANVAS_HEIGHT, CANVAS_WIDTH, DrawingSurface};
