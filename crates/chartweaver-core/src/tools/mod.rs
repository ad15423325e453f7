//! Tools - orchestration 層（LLM agent ランタイム）に公開する tool surface
//!
//! パイプラインの 3 操作を、JSON Schema 付きの function tool として
//! 公開します。tools 層はエラーを外に投げません: 下層のどんな失敗も
//! `status: "error"` + メッセージの構造化応答に変換されます。
//!
//! # 二層構造
//! - **ChartTool**: 1 ツール = name / description / parameters_schema / execute
//! - **ToolRegistry**: name -> tool の登録と dispatch（二重登録はエラー）

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::warn;

use crate::app::ChartPipeline;
use crate::domain::{ChartRequest, PipelineError, SessionId};
use crate::ports::ArtifactStore;

/// Tool の実行結果: status success/error のタグ付き応答
///
/// success は操作のペイロードを flatten して運ぶ
/// （`{"status":"success","filename":...,"version":...}` の形）。
#[derive(Debug, Clone, Serialize)]
pub struct ToolReply {
    pub status: ToolStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub data: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Success,
    Error,
}

impl ToolReply {
    /// success 応答（メッセージなし）
    pub fn success(payload: impl Serialize) -> Self {
        Self::build_success(None, payload)
    }

    /// success 応答（人間向けメッセージ付き）
    pub fn success_with_message(message: impl Into<String>, payload: impl Serialize) -> Self {
        Self::build_success(Some(message.into()), payload)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Error,
            message: Some(message.into()),
            data: serde_json::Map::new(),
        }
    }

    fn build_success(message: Option<String>, payload: impl Serialize) -> Self {
        let data = match serde_json::to_value(payload) {
            Ok(Value::Object(map)) => map,
            Ok(Value::Null) => serde_json::Map::new(),
            Ok(other) => {
                let mut map = serde_json::Map::new();
                map.insert("result".to_string(), other);
                map
            }
            Err(e) => return Self::error(format!("failed to serialize tool result: {e}")),
        };
        Self {
            status: ToolStatus::Success,
            message,
            data,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ToolStatus::Success
    }
}

impl From<PipelineError> for ToolReply {
    fn from(error: PipelineError) -> Self {
        ToolReply::error(error.to_string())
    }
}

/// One callable tool: JSON Schema in, tagged reply out.
#[async_trait]
pub trait ChartTool: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// JSON Schema of the arguments object.
    fn parameters_schema(&self) -> Value;

    /// Execute with plain JSON arguments. Never returns an error: every
    /// fault becomes a `status: "error"` reply.
    async fn execute(&self, session: &SessionId, args: Value) -> ToolReply;
}

/// Serializable tool listing for the orchestration layer.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// RegistryError は ToolRegistry の操作エラー
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("tool '{0}' is already registered")]
    AlreadyRegistered(String),
}

/// ToolRegistry は tool を登録・dispatch
///
/// # 内部実装
/// - HashMap<String, Arc<dyn ChartTool>> で管理
/// - 登録順を別に保持（definitions() の出力を安定させる）
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ChartTool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register a tool. Duplicate names are a wiring bug, reported loudly.
    pub fn register(&mut self, tool: Arc<dyn ChartTool>) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered(name));
        }
        self.order.push(name.clone());
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ChartTool>> {
        self.tools.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tool definitions in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect()
    }

    /// Dispatch by name. Unknown names come back as error replies, not
    /// faults; the orchestration layer shows them to the user as-is.
    pub async fn dispatch(&self, session: &SessionId, name: &str, args: Value) -> ToolReply {
        match self.get(name) {
            Some(tool) => tool.execute(session, args).await,
            None => {
                warn!(%session, tool = name, "unknown tool requested");
                ToolReply::error(format!(
                    "unknown tool '{}'. Available tools: {:?}",
                    name, self.order
                ))
            }
        }
    }
}

// ========================================
// 標準の 3 ツール
// ========================================

/// analyze_csv: 最新 CSV の構造と統計を要約
pub struct AnalyzeCsvTool<S> {
    pipeline: Arc<ChartPipeline<S>>,
}

impl<S> AnalyzeCsvTool<S> {
    pub fn new(pipeline: Arc<ChartPipeline<S>>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl<S: ArtifactStore + 'static> ChartTool for AnalyzeCsvTool<S> {
    fn name(&self) -> &'static str {
        "analyze_csv"
    }

    fn description(&self) -> &'static str {
        "Analyze the structure and contents of the uploaded CSV file"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, session: &SessionId, _args: Value) -> ToolReply {
        match self.pipeline.analyze(session).await {
            Ok(report) => ToolReply::success(report),
            Err(e) => e.into(),
        }
    }
}

/// generate_chart: 列ベースのチャート生成
pub struct GenerateChartTool<S> {
    pipeline: Arc<ChartPipeline<S>>,
}

impl<S> GenerateChartTool<S> {
    pub fn new(pipeline: Arc<ChartPipeline<S>>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl<S: ArtifactStore + 'static> ChartTool for GenerateChartTool<S> {
    fn name(&self) -> &'static str {
        "generate_chart"
    }

    fn description(&self) -> &'static str {
        "Generate a chart from the uploaded CSV file with the given parameters"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "chart_type": {
                    "type": "string",
                    "enum": ["line", "bar", "scatter", "histogram"],
                    "description": "The kind of chart to draw"
                },
                "x_column": {
                    "type": "string",
                    "description": "Column for the x axis"
                },
                "y_column": {
                    "type": "string",
                    "description": "Column for the y axis"
                },
                "title": {
                    "type": "string",
                    "description": "Chart title (defaults to 'Chart')"
                }
            },
            "required": ["chart_type", "x_column", "y_column"]
        })
    }

    async fn execute(&self, session: &SessionId, args: Value) -> ToolReply {
        let request: ChartRequest = match serde_json::from_value(args) {
            Ok(request) => request,
            Err(e) => return ToolReply::error(format!("invalid arguments: {e}")),
        };
        match self.pipeline.generate_chart(session, &request).await {
            Ok(saved) => ToolReply::success_with_message(
                format!("generated {} chart", request.chart_type),
                saved,
            ),
            Err(e) => e.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RenderScriptArgs {
    script: String,
}

/// render_script: サンドボックスでのカスタム描画
pub struct RenderScriptTool<S> {
    pipeline: Arc<ChartPipeline<S>>,
}

impl<S> RenderScriptTool<S> {
    pub fn new(pipeline: Arc<ChartPipeline<S>>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl<S: ArtifactStore + 'static> ChartTool for RenderScriptTool<S> {
    fn name(&self) -> &'static str {
        "render_script"
    }

    fn description(&self) -> &'static str {
        "Run a custom plotting script against the uploaded CSV file. \
         The script sees `csv_text`, `parse_csv(text)` and a `plot` handle \
         (title/x_label/y_label/line/bar/scatter/histogram)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "script": {
                    "type": "string",
                    "description": "The plotting script to execute"
                }
            },
            "required": ["script"]
        })
    }

    async fn execute(&self, session: &SessionId, args: Value) -> ToolReply {
        let args: RenderScriptArgs = match serde_json::from_value(args) {
            Ok(args) => args,
            Err(e) => return ToolReply::error(format!("invalid arguments: {e}")),
        };
        match self.pipeline.run_custom_render(session, &args.script).await {
            Ok(saved) => ToolReply::success_with_message("custom chart generated", saved),
            Err(e) => e.into(),
        }
    }
}

/// 標準の 3 ツールを登録済みの registry を作る
pub fn standard_registry<S: ArtifactStore + 'static>(
    pipeline: Arc<ChartPipeline<S>>,
) -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(AnalyzeCsvTool::new(pipeline.clone())))?;
    registry.register(Arc::new(GenerateChartTool::new(pipeline.clone())))?;
    registry.register(Arc::new(RenderScriptTool::new(pipeline)))?;
    Ok(registry)
}
