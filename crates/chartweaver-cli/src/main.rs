//! Demo wiring: in-memory store + pipeline + tools.
//!
//! 本番ではこの役割は agent ランタイム（orchestration 層）が担う。
//! ここでは CSV の投入から 3 ツールの呼び出しまでを一通り流す。

use std::sync::Arc;

use serde_json::json;
use tracing_subscriber::EnvFilter;

use chartweaver_core::app::PipelineBuilder;
use chartweaver_core::impls::InMemoryArtifactStore;
use chartweaver_core::ports::{ArtifactStore, IdGenerator, SystemClock, UlidGenerator};
use chartweaver_core::tools::standard_registry;

const SAMPLE_CSV: &str = "\
date,amount
2024-01-01,100
2024-01-02,150
2024-01-03,120
";

const SAMPLE_SCRIPT: &str = r#"
let t = parse_csv(csv_text);
plot.title("Sales (custom)");
plot.x_label("date");
plot.y_label("amount");
plot.bar(t.strings("date"), t.numbers("amount"));
"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // (A) store と pipeline を用意
    let store = Arc::new(InMemoryArtifactStore::new());
    let pipeline = Arc::new(PipelineBuilder::new(store.clone()).build()?);

    // (B) 3 ツールを登録した registry（orchestration 層へ渡す表面）
    let registry = standard_registry(pipeline)?;
    tracing::info!(tools = registry.len(), "tool registry ready");
    println!("registered tools:");
    for def in registry.definitions() {
        println!("  - {}: {}", def.name, def.description);
    }

    // (C) セッションを作り、CSV を artifact として投入
    //     （本番ではアップロードを agent ランタイムが保存する）
    let id_gen = UlidGenerator::new(SystemClock);
    let session = id_gen.generate_session_id();
    let version = store
        .save(&session, "sales.csv", SAMPLE_CSV.as_bytes().to_vec(), "text/csv")
        .await?;
    println!("\nuploaded sales.csv (version {version}) to {session}");

    // (D) analyze → generate_chart → render_script
    let reply = registry.dispatch(&session, "analyze_csv", json!({})).await;
    println!("\nanalyze_csv:\n{}", serde_json::to_string_pretty(&reply)?);

    let reply = registry
        .dispatch(
            &session,
            "generate_chart",
            json!({
                "chart_type": "line",
                "x_column": "date",
                "y_column": "amount",
                "title": "Sales"
            }),
        )
        .await;
    println!("\ngenerate_chart:\n{}", serde_json::to_string_pretty(&reply)?);

    let reply = registry
        .dispatch(&session, "render_script", json!({ "script": SAMPLE_SCRIPT }))
        .await;
    println!("\nrender_script:\n{}", serde_json::to_string_pretty(&reply)?);

    // (E) 最終的な artifact 一覧
    println!("\nartifacts in session:");
    for name in store.list(&session).await? {
        let artifact = store.load(&session, &name).await?;
        println!(
            "  - {} v{} ({}, {} bytes)",
            artifact.name,
            artifact.version,
            artifact.mime_type,
            artifact.bytes.len()
        );
    }

    Ok(())
}
