//! Custom render sandbox: caller-supplied scripts, executed under limits.
//!
//! The script runs in an embedded rhai engine that exposes exactly three
//! things: the raw CSV text, a table constructor, and a plotting handle.
//! Nothing else is registered: no filesystem, network, or process API is
//! reachable from a script, and `import` is disabled by an empty module
//! resolver. A wall-clock deadline (via the engine progress hook) and an
//! operation cap bound execution; both surface as `ScriptFailure`.
//!
//! The plot handle accumulates marks on a per-run [`ChartSpec`]; whatever
//! was drawn when the script finishes is rendered and encoded. Each run
//! starts from a blank spec, so a failed script leaves nothing behind.
//!
//! # スクリプト例
//! ```ignore
//! let t = parse_csv(csv_text);
//! plot.title("Sales");
//! plot.line(t.strings("date"), t.numbers("amount"));
//! ```

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rhai::module_resolvers::StaticModuleResolver;
use rhai::{Array, Dynamic, Engine, EvalAltResult, Position, Scope};

use crate::domain::{CUSTOM_CHART_FILENAME, PipelineError, RenderedImage, Table};
use crate::render::surface::{CANVAS_HEIGHT, CANVAS_WIDTH};
use crate::render::{AxisValues, ChartSpec, HISTOGRAM_BINS, Mark, render_spec};
use crate::tabular::TableLoader;

/// Script execution limits and canvas size.
#[derive(Debug, Clone)]
pub struct ScriptSandbox {
    timeout: Duration,
    max_operations: u64,
    width: u32,
    height: u32,
}

impl Default for ScriptSandbox {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_operations: 10_000_000,
            width: CANVAS_WIDTH,
            height: CANVAS_HEIGHT,
        }
    }
}

impl ScriptSandbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_operations(mut self, max_operations: u64) -> Self {
        self.max_operations = max_operations;
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Run one script against one CSV document.
    ///
    /// Evaluation is CPU-bound, so it runs on the blocking pool; the async
    /// caller only waits for the join.
    pub async fn run(&self, csv_text: &str, script: &str) -> Result<RenderedImage, PipelineError> {
        let csv_text = csv_text.to_string();
        let script = script.to_string();
        let sandbox = self.clone();

        let joined =
            tokio::task::spawn_blocking(move || sandbox.run_blocking(&csv_text, &script)).await;
        match joined {
            Ok(result) => result,
            Err(e) => Err(PipelineError::ScriptFailure(format!(
                "script task aborted: {e}"
            ))),
        }
    }

    fn run_blocking(&self, csv_text: &str, script: &str) -> Result<RenderedImage, PipelineError> {
        let spec = Arc::new(Mutex::new(ChartSpec::default()));
        let engine = self.build_engine();

        let mut scope = Scope::new();
        scope.push("csv_text", csv_text.to_string());
        scope.push("plot", PlotHandle(spec.clone()));

        engine
            .run_with_scope(&mut scope, script)
            .map_err(|e| PipelineError::ScriptFailure(script_error_message(&e, self.timeout)))?;

        let spec = spec.lock().unwrap().clone();
        let bytes = render_spec(&spec, self.width, self.height)?;
        Ok(RenderedImage::png(CUSTOM_CHART_FILENAME.to_string(), bytes))
    }

    fn build_engine(&self) -> Engine {
        let mut engine = Engine::new();

        // リソース上限。超過は ScriptFailure になる。
        engine.set_max_operations(self.max_operations);
        engine.set_max_call_levels(64);
        engine.set_max_expr_depths(64, 64);
        engine.set_max_string_size(1_000_000);
        engine.set_max_array_size(100_000);
        engine.set_max_map_size(10_000);

        // import を無効化（ファイルシステムに触れる経路を残さない）
        engine.set_module_resolver(StaticModuleResolver::new());

        // wall-clock deadline は progress hook で強制する
        let deadline = Instant::now() + self.timeout;
        engine.on_progress(move |_| {
            if Instant::now() >= deadline {
                Some(Dynamic::from("time limit exceeded"))
            } else {
                None
            }
        });

        engine.register_type_with_name::<ScriptTable>("Table");
        engine.register_type_with_name::<PlotHandle>("Plot");

        engine.register_fn("parse_csv", |text: &str| -> ScriptResult<ScriptTable> {
            let table = TableLoader::new()
                .parse(text.as_bytes())
                .map_err(|e| runtime_error(e.to_string()))?;
            Ok(ScriptTable(Arc::new(table)))
        });

        engine.register_fn("columns", |t: &mut ScriptTable| -> Array {
            t.0.columns().iter().map(|c| Dynamic::from(c.clone())).collect()
        });
        engine.register_fn("rows", |t: &mut ScriptTable| -> i64 { t.0.row_count() as i64 });
        engine.register_fn(
            "numbers",
            |t: &mut ScriptTable, name: &str| -> ScriptResult<Array> {
                let values = t
                    .0
                    .column_values(name)
                    .ok_or_else(|| runtime_error(format!("unknown column: '{name}'")))?;
                values
                    .iter()
                    .enumerate()
                    .map(|(i, v)| {
                        v.trim().parse::<f64>().map(Dynamic::from).map_err(|_| {
                            runtime_error(format!(
                                "column '{name}' has non-numeric value '{v}' at row {}",
                                i + 1
                            ))
                        })
                    })
                    .collect()
            },
        );
        engine.register_fn(
            "strings",
            |t: &mut ScriptTable, name: &str| -> ScriptResult<Array> {
                let values = t
                    .0
                    .column_values(name)
                    .ok_or_else(|| runtime_error(format!("unknown column: '{name}'")))?;
                Ok(values.iter().map(|v| Dynamic::from(v.to_string())).collect())
            },
        );

        engine.register_fn("title", |p: &mut PlotHandle, title: &str| {
            p.0.lock().unwrap().title = title.to_string();
        });
        engine.register_fn("x_label", |p: &mut PlotHandle, label: &str| {
            p.0.lock().unwrap().x_label = label.to_string();
        });
        engine.register_fn("y_label", |p: &mut PlotHandle, label: &str| {
            p.0.lock().unwrap().y_label = label.to_string();
        });
        engine.register_fn(
            "line",
            |p: &mut PlotHandle, xs: Array, ys: Array| -> ScriptResult<()> {
                let mark = Mark::Line {
                    xs: to_axis_values(xs),
                    ys: to_f64_vec(ys, "ys")?,
                };
                p.0.lock().unwrap().marks.push(mark);
                Ok(())
            },
        );
        engine.register_fn(
            "bar",
            |p: &mut PlotHandle, labels: Array, heights: Array| -> ScriptResult<()> {
                let mark = Mark::Bars {
                    labels: labels.into_iter().map(|d| d.to_string()).collect(),
                    heights: to_f64_vec(heights, "heights")?,
                };
                p.0.lock().unwrap().marks.push(mark);
                Ok(())
            },
        );
        engine.register_fn(
            "scatter",
            |p: &mut PlotHandle, xs: Array, ys: Array| -> ScriptResult<()> {
                let mark = Mark::Scatter {
                    xs: to_axis_values(xs),
                    ys: to_f64_vec(ys, "ys")?,
                };
                p.0.lock().unwrap().marks.push(mark);
                Ok(())
            },
        );
        engine.register_fn(
            "histogram",
            |p: &mut PlotHandle, values: Array, bins: i64| -> ScriptResult<()> {
                let mark = Mark::Histogram {
                    values: to_f64_vec(values, "values")?,
                    bins: bins.clamp(1, 1_000) as usize,
                };
                p.0.lock().unwrap().marks.push(mark);
                Ok(())
            },
        );
        engine.register_fn(
            "histogram",
            |p: &mut PlotHandle, values: Array| -> ScriptResult<()> {
                let mark = Mark::Histogram {
                    values: to_f64_vec(values, "values")?,
                    bins: HISTOGRAM_BINS,
                };
                p.0.lock().unwrap().marks.push(mark);
                Ok(())
            },
        );

        engine
    }
}

type ScriptResult<T> = Result<T, Box<EvalAltResult>>;

/// Table binding: cheap to clone (rhai clones values freely).
#[derive(Clone)]
struct ScriptTable(Arc<Table>);

/// Plot binding: shares the per-run spec with the host.
#[derive(Clone)]
struct PlotHandle(Arc<Mutex<ChartSpec>>);

fn runtime_error(message: String) -> Box<EvalAltResult> {
    Box::new(EvalAltResult::ErrorRuntime(
        Dynamic::from(message),
        Position::NONE,
    ))
}

fn to_f64_vec(values: Array, what: &str) -> ScriptResult<Vec<f64>> {
    values
        .into_iter()
        .map(|d| {
            d.clone()
                .try_cast::<f64>()
                .or_else(|| d.try_cast::<i64>().map(|i| i as f64))
                .ok_or_else(|| runtime_error(format!("{what} must contain only numbers")))
        })
        .collect()
}

/// 数値だけの配列は数値軸、それ以外はラベル軸になる。
fn to_axis_values(values: Array) -> AxisValues {
    let mut numeric = Vec::with_capacity(values.len());
    for d in &values {
        let v = d
            .clone()
            .try_cast::<f64>()
            .or_else(|| d.clone().try_cast::<i64>().map(|i| i as f64));
        match v {
            Some(v) => numeric.push(v),
            None => {
                let labels = values.iter().map(|d| d.to_string()).collect();
                return AxisValues::Categorical(labels);
            }
        }
    }
    AxisValues::Numeric(numeric)
}

fn script_error_message(error: &EvalAltResult, timeout: Duration) -> String {
    match error {
        EvalAltResult::ErrorTerminated(_, _) => {
            format!("script exceeded the {} ms time limit", timeout.as_millis())
        }
        EvalAltResult::ErrorTooManyOperations(_) => {
            "script exceeded the operation limit".to_string()
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";
    const SALES_CSV: &str = "date,amount\n2024-01-01,100\n2024-01-02,150\n2024-01-03,120\n";

    fn sandbox() -> ScriptSandbox {
        ScriptSandbox::new().with_size(500, 300)
    }

    #[tokio::test]
    async fn drawing_script_produces_a_png() {
        let script = r#"
            let t = parse_csv(csv_text);
            plot.title("Custom");
            plot.x_label("date");
            plot.y_label("amount");
            plot.line(t.strings("date"), t.numbers("amount"));
        "#;
        let image = sandbox().run(SALES_CSV, script).await.unwrap();
        assert_eq!(image.filename, "custom_chart.png");
        assert!(image.bytes.starts_with(PNG_MAGIC));
    }

    #[tokio::test]
    async fn table_bindings_expose_shape() {
        let script = r#"
            let t = parse_csv(csv_text);
            if t.rows() != 3 { throw "wrong row count"; }
            if t.columns().len() != 2 { throw "wrong column count"; }
            plot.histogram(t.numbers("amount"), 5);
        "#;
        let image = sandbox().run(SALES_CSV, script).await.unwrap();
        assert!(image.bytes.starts_with(PNG_MAGIC));
    }

    #[tokio::test]
    async fn empty_script_captures_an_empty_chart() {
        let image = sandbox().run(SALES_CSV, "").await.unwrap();
        assert!(image.bytes.starts_with(PNG_MAGIC));
    }

    #[tokio::test]
    async fn script_errors_become_script_failure() {
        let err = sandbox()
            .run(SALES_CSV, "no_such_function();")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ScriptFailure(_)));
    }

    #[tokio::test]
    async fn thrown_errors_become_script_failure() {
        let err = sandbox()
            .run(SALES_CSV, r#"throw "boom";"#)
            .await
            .unwrap_err();
        match err {
            PipelineError::ScriptFailure(msg) => assert!(msg.contains("boom")),
            other => panic!("expected ScriptFailure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_column_in_script_is_reported() {
        let err = sandbox()
            .run(SALES_CSV, r#"parse_csv(csv_text).numbers("price");"#)
            .await
            .unwrap_err();
        match err {
            PipelineError::ScriptFailure(msg) => assert!(msg.contains("price")),
            other => panic!("expected ScriptFailure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn infinite_loops_hit_the_deadline() {
        let start = std::time::Instant::now();
        let err = sandbox()
            .with_timeout(Duration::from_millis(100))
            .with_max_operations(u64::MAX)
            .run(SALES_CSV, "loop { }")
            .await
            .unwrap_err();
        match err {
            PipelineError::ScriptFailure(msg) => assert!(msg.contains("time limit")),
            other => panic!("expected ScriptFailure, got {other:?}"),
        }
        // deadline 後すぐに戻ること（hang しない）
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn operation_cap_is_enforced() {
        let err = sandbox()
            .with_max_operations(1_000)
            .run(SALES_CSV, "let x = 0; loop { x += 1; }")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ScriptFailure(_)));
    }

    #[tokio::test]
    async fn imports_are_disabled() {
        let err = sandbox()
            .run(SALES_CSV, r#"import "os" as os;"#)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ScriptFailure(_)));
    }

    #[tokio::test]
    async fn each_run_starts_from_a_blank_spec() {
        let s = sandbox();
        // 1 回目: マークを積んで失敗
        let err = s
            .run(SALES_CSV, r#"
                let t = parse_csv(csv_text);
                plot.line(t.strings("date"), t.numbers("amount"));
                throw "late failure";
            "#)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ScriptFailure(_)));

        // 2 回目: 空スクリプトの出力は「何も描かれていない」surface
        let blank_after_failure = s.run(SALES_CSV, "").await.unwrap();
        let blank = s.run(SALES_CSV, "").await.unwrap();
        assert_eq!(blank_after_failure.bytes, blank.bytes);
    }
}
