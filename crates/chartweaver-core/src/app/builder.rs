//! PipelineBuilder - パイプラインの構築とワイヤリング
//!
//! # 設計
//! - Builder パターンでノブを集約
//! - build() 時に検証（Fail-fast: 不正な設定は起動時に落とす）

use std::sync::Arc;
use std::time::Duration;

use crate::app::pipeline::ChartPipeline;
use crate::ports::ArtifactStore;
use crate::render::surface::{CANVAS_HEIGHT, CANVAS_WIDTH};
use crate::render::ChartRenderer;
use crate::sandbox::ScriptSandbox;
use crate::tabular::TableLoader;

/// BuildError はパイプライン構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("canvas size must be non-zero, got {0}x{1}")]
    InvalidCanvasSize(u32, u32),

    #[error("preview rows must be at least 1")]
    InvalidPreviewRows,

    #[error("script timeout must be non-zero")]
    InvalidScriptTimeout,
}

/// PipelineBuilder は ChartPipeline を構築
///
/// # 使用例
/// ```ignore
/// let pipeline = PipelineBuilder::new(store)
///     .script_timeout(Duration::from_secs(10))
///     .build()?;
/// ```
pub struct PipelineBuilder<S> {
    store: Arc<S>,
    canvas: (u32, u32),
    preview_rows: usize,
    script_timeout: Duration,
    delimiter: u8,
}

impl<S: ArtifactStore> PipelineBuilder<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            canvas: (CANVAS_WIDTH, CANVAS_HEIGHT),
            preview_rows: 5,
            script_timeout: Duration::from_secs(5),
            delimiter: b',',
        }
    }

    /// キャンバスサイズ（デフォルト 3000x1800 = 10:6 @ 300dpi）
    pub fn canvas_size(mut self, width: u32, height: u32) -> Self {
        self.canvas = (width, height);
        self
    }

    /// analyze の preview 行数（デフォルト 5）
    pub fn preview_rows(mut self, rows: usize) -> Self {
        self.preview_rows = rows;
        self
    }

    /// カスタムスクリプトの実行時間上限（デフォルト 5 秒）
    pub fn script_timeout(mut self, timeout: Duration) -> Self {
        self.script_timeout = timeout;
        self
    }

    /// CSV の区切り文字（デフォルト `,`）
    pub fn csv_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// 検証して ChartPipeline を構築
    pub fn build(self) -> Result<ChartPipeline<S>, BuildError> {
        let (width, height) = self.canvas;
        if width == 0 || height == 0 {
            return Err(BuildError::InvalidCanvasSize(width, height));
        }
        if self.preview_rows == 0 {
            return Err(BuildError::InvalidPreviewRows);
        }
        if self.script_timeout.is_zero() {
            return Err(BuildError::InvalidScriptTimeout);
        }

        Ok(ChartPipeline::assemble(
            self.store,
            TableLoader::new().with_delimiter(self.delimiter),
            ChartRenderer::with_size(width, height),
            ScriptSandbox::new()
                .with_timeout(self.script_timeout)
                .with_size(width, height),
            self.preview_rows,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::InMemoryArtifactStore;

    fn store() -> Arc<InMemoryArtifactStore> {
        Arc::new(InMemoryArtifactStore::new())
    }

    #[test]
    fn build_with_defaults_succeeds() {
        assert!(PipelineBuilder::new(store()).build().is_ok());
    }

    #[test]
    fn zero_canvas_is_rejected() {
        let err = PipelineBuilder::new(store())
            .canvas_size(0, 600)
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::InvalidCanvasSize(0, 600)));
    }

    #[test]
    fn zero_preview_rows_is_rejected() {
        let err = PipelineBuilder::new(store())
            .preview_rows(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::InvalidPreviewRows));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = PipelineBuilder::new(store())
            .script_timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::InvalidScriptTimeout));
    }
}
