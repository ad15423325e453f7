//! ChartPipeline - パイプラインの表面
//!
//! 3 つの操作（analyze / generate_chart / run_custom_render）を提供します。
//! どの操作も「最新の CSV artifact」の解決から始まります:
//! store の listing を `.csv` suffix でフィルタし、最後の 1 件を取る。
//! 該当なしは NoCsvFound。
//!
//! # フロー
//! 1. ArtifactStore::list() → `.csv` の最後の名前
//! 2. ArtifactStore::load() → bytes
//! 3. TableLoader / ChartRenderer / ScriptSandbox へ dispatch
//! 4. 生成した画像を ArtifactStore::save() で永続化

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::domain::{
    CSV_SUFFIX, ChartRequest, ColumnSummary, PipelineError, RenderedImage, SessionId,
};
use crate::ports::{ArtifactStore, StoredArtifact};
use crate::render::ChartRenderer;
use crate::sandbox::ScriptSandbox;
use crate::tabular::TableLoader;

/// analyze の結果: テーブルの要約
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeReport {
    pub filename: String,
    pub rows: usize,
    pub columns: Vec<String>,
    /// 列順を保つため、map ではなく (name, type) の列で返す
    pub data_types: Vec<ColumnTypeInfo>,
    pub preview: Vec<serde_json::Value>,
    pub summary: BTreeMap<String, ColumnSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnTypeInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub dtype: String,
}

/// チャート保存の結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedChart {
    pub filename: String,
    pub version: u64,
}

/// ChartPipeline は store とローダ・レンダラ・サンドボックスを束ねる
///
/// 実体は [`crate::app::PipelineBuilder`] で構築します。
pub struct ChartPipeline<S> {
    store: Arc<S>,
    loader: TableLoader,
    renderer: ChartRenderer,
    sandbox: ScriptSandbox,
    preview_rows: usize,
}

impl<S> std::fmt::Debug for ChartPipeline<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChartPipeline")
            .field("preview_rows", &self.preview_rows)
            .finish_non_exhaustive()
    }
}

impl<S: ArtifactStore> ChartPipeline<S> {
    pub(crate) fn assemble(
        store: Arc<S>,
        loader: TableLoader,
        renderer: ChartRenderer,
        sandbox: ScriptSandbox,
        preview_rows: usize,
    ) -> Self {
        Self {
            store,
            loader,
            renderer,
            sandbox,
            preview_rows,
        }
    }

    /// 最新の CSV を解析して要約を返す
    pub async fn analyze(&self, session: &SessionId) -> Result<AnalyzeReport, PipelineError> {
        let (filename, artifact) = self.latest_csv(session).await?;
        let table = self.loader.parse(&artifact.bytes)?;
        info!(%session, %filename, rows = table.row_count(), "analyzed CSV artifact");

        Ok(AnalyzeReport {
            filename,
            rows: table.row_count(),
            columns: table.columns().to_vec(),
            data_types: table
                .column_types()
                .map(|(name, dtype)| ColumnTypeInfo {
                    name: name.to_string(),
                    dtype: dtype.as_str().to_string(),
                })
                .collect(),
            preview: table.preview(self.preview_rows),
            summary: table.describe(),
        })
    }

    /// 最新の CSV から列ベースのチャートを生成して保存する
    pub async fn generate_chart(
        &self,
        session: &SessionId,
        request: &ChartRequest,
    ) -> Result<SavedChart, PipelineError> {
        let (filename, artifact) = self.latest_csv(session).await?;
        let table = self.loader.parse(&artifact.bytes)?;
        debug!(%session, source = %filename, chart_type = %request.chart_type, "rendering chart");

        let image = self.renderer.render(&table, request)?;
        let saved = self.persist(session, image).await?;
        info!(%session, filename = %saved.filename, version = saved.version, "chart saved");
        Ok(saved)
    }

    /// 最新の CSV の生テキストをサンドボックスに渡し、結果を保存する
    pub async fn run_custom_render(
        &self,
        session: &SessionId,
        script: &str,
    ) -> Result<SavedChart, PipelineError> {
        let (filename, artifact) = self.latest_csv(session).await?;
        let csv_text = String::from_utf8(artifact.bytes)
            .map_err(|e| PipelineError::Parse(format!("not valid UTF-8: {e}")))?;
        debug!(%session, source = %filename, "running custom render script");

        let image = self.sandbox.run(&csv_text, script).await?;
        let saved = self.persist(session, image).await?;
        info!(%session, filename = %saved.filename, version = saved.version, "custom chart saved");
        Ok(saved)
    }

    /// listing 順で最後の `.csv` を最新として扱う（suffix は case-sensitive）
    async fn latest_csv(
        &self,
        session: &SessionId,
    ) -> Result<(String, StoredArtifact), PipelineError> {
        let names = self.store.list(session).await?;
        let name = names
            .into_iter()
            .filter(|n| n.ends_with(CSV_SUFFIX))
            .next_back()
            .ok_or(PipelineError::NoCsvFound)?;
        let artifact = self.store.load(session, &name).await?;
        Ok((name, artifact))
    }

    async fn persist(
        &self,
        session: &SessionId,
        image: RenderedImage,
    ) -> Result<SavedChart, PipelineError> {
        let version = self
            .store
            .save(session, &image.filename, image.bytes, image.mime_type)
            .await?;
        Ok(SavedChart {
            filename: image.filename,
            version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    use crate::app::PipelineBuilder;
    use crate::impls::InMemoryArtifactStore;

    const SALES_CSV: &[u8] = b"date,amount\n2024-01-01,100\n2024-01-02,150\n2024-01-03,120\n";

    fn session() -> SessionId {
        SessionId::from_ulid(Ulid::new())
    }

    async fn seeded() -> (Arc<InMemoryArtifactStore>, ChartPipeline<InMemoryArtifactStore>, SessionId) {
        let store = Arc::new(InMemoryArtifactStore::new());
        let s = session();
        store
            .save(&s, "sales.csv", SALES_CSV.to_vec(), "text/csv")
            .await
            .unwrap();
        let pipeline = PipelineBuilder::new(store.clone())
            .canvas_size(500, 300)
            .build()
            .unwrap();
        (store, pipeline, s)
    }

    fn line_request() -> ChartRequest {
        ChartRequest {
            chart_type: "line".to_string(),
            x_column: "date".to_string(),
            y_column: "amount".to_string(),
            title: "Sales".to_string(),
        }
    }

    #[tokio::test]
    async fn analyze_without_csv_is_no_csv_found() {
        let store = Arc::new(InMemoryArtifactStore::new());
        let pipeline = PipelineBuilder::new(store).build().unwrap();
        let err = pipeline.analyze(&session()).await.unwrap_err();
        assert!(matches!(err, PipelineError::NoCsvFound));
    }

    #[tokio::test]
    async fn non_csv_artifacts_are_ignored() {
        let store = Arc::new(InMemoryArtifactStore::new());
        let s = session();
        store
            .save(&s, "notes.txt", b"hello".to_vec(), "text/plain")
            .await
            .unwrap();
        // suffix は case-sensitive: ".CSV" は対象外
        store
            .save(&s, "DATA.CSV", SALES_CSV.to_vec(), "text/csv")
            .await
            .unwrap();
        let pipeline = PipelineBuilder::new(store).build().unwrap();
        let err = pipeline.analyze(&s).await.unwrap_err();
        assert!(matches!(err, PipelineError::NoCsvFound));
    }

    #[tokio::test]
    async fn analyze_reports_the_table_shape() {
        let (_store, pipeline, s) = seeded().await;
        let report = pipeline.analyze(&s).await.unwrap();

        assert_eq!(report.filename, "sales.csv");
        assert_eq!(report.rows, 3);
        assert_eq!(report.columns, vec!["date", "amount"]);
        assert_eq!(report.data_types.len(), 2);
        assert_eq!(report.data_types[0].name, "date");
        assert_eq!(report.data_types[0].dtype, "date");
        assert_eq!(report.data_types[1].dtype, "integer");
        assert_eq!(report.preview.len(), 3); // 5 行上限、データは 3 行
        assert_eq!(report.summary["amount"].count, 3);
    }

    #[tokio::test]
    async fn analyze_uses_the_most_recent_csv() {
        let (store, pipeline, s) = seeded().await;
        store
            .save(&s, "newer.csv", b"a,b\n1,2\n".to_vec(), "text/csv")
            .await
            .unwrap();
        let report = pipeline.analyze(&s).await.unwrap();
        assert_eq!(report.filename, "newer.csv");
        assert_eq!(report.rows, 1);
    }

    #[tokio::test]
    async fn generate_chart_persists_and_reversions() {
        let (store, pipeline, s) = seeded().await;

        let first = pipeline.generate_chart(&s, &line_request()).await.unwrap();
        assert_eq!(first.filename, "chart_line_date_amount.png");
        assert_eq!(first.version, 1);

        // 同一リクエストの繰り返しは同じ名前の次バージョン
        let second = pipeline.generate_chart(&s, &line_request()).await.unwrap();
        assert_eq!(second.filename, "chart_line_date_amount.png");
        assert_eq!(second.version, 2);

        let stored = store.load(&s, "chart_line_date_amount.png").await.unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.mime_type, "image/png");
        assert!(stored.bytes.starts_with(b"\x89PNG\r\n\x1a\n"));
    }

    #[tokio::test]
    async fn failed_requests_persist_nothing() {
        let (store, pipeline, s) = seeded().await;

        let mut bad_kind = line_request();
        bad_kind.chart_type = "pie".to_string();
        let err = pipeline.generate_chart(&s, &bad_kind).await.unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedChartType(_)));

        let mut bad_column = line_request();
        bad_column.y_column = "price".to_string();
        let err = pipeline.generate_chart(&s, &bad_column).await.unwrap_err();
        assert!(matches!(err, PipelineError::UnknownColumn { .. }));

        // store には CSV しか無いまま
        assert_eq!(store.list(&s).await.unwrap(), vec!["sales.csv"]);
    }

    #[tokio::test]
    async fn failure_then_success_in_one_pipeline() {
        let (_store, pipeline, s) = seeded().await;

        let mut bad = line_request();
        bad.y_column = "date".to_string(); // 数値でない y
        assert!(pipeline.generate_chart(&s, &bad).await.is_err());

        let ok = pipeline.generate_chart(&s, &line_request()).await.unwrap();
        assert_eq!(ok.version, 1);
    }

    #[tokio::test]
    async fn custom_render_uses_the_fixed_filename() {
        let (store, pipeline, s) = seeded().await;
        let script = r#"
            let t = parse_csv(csv_text);
            plot.bar(t.strings("date"), t.numbers("amount"));
        "#;

        let first = pipeline.run_custom_render(&s, script).await.unwrap();
        assert_eq!(first.filename, "custom_chart.png");
        assert_eq!(first.version, 1);

        let second = pipeline.run_custom_render(&s, script).await.unwrap();
        assert_eq!(second.version, 2);

        let stored = store.load(&s, "custom_chart.png").await.unwrap();
        assert!(stored.bytes.starts_with(b"\x89PNG\r\n\x1a\n"));
    }

    #[tokio::test]
    async fn custom_render_script_failure_persists_nothing() {
        let (store, pipeline, s) = seeded().await;
        let err = pipeline
            .run_custom_render(&s, r#"throw "nope";"#)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ScriptFailure(_)));
        assert_eq!(store.list(&s).await.unwrap(), vec!["sales.csv"]);
    }
}
