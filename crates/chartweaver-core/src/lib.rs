//! chartweaver-core
//!
//! CSV artifact から chart image を生成するパイプラインのコア。
//! LLM agent ランタイム（orchestration 層）はこのクレートの tools 表面を
//! function tool として呼び出します。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, table, chart, errors）
//! - **ports**: 抽象化レイヤー（ArtifactStore, Clock, IdGenerator）
//! - **impls**: 実装（InMemoryArtifactStore など開発用）
//! - **tabular**: CSV bytes → Table のローダ
//! - **render**: per-call の drawing surface と 4 種チャートの描画
//! - **sandbox**: カスタム描画スクリプトの制限付き実行
//! - **app**: パイプラインの表面（analyze / generate_chart / run_custom_render）
//! - **tools**: orchestration 層に公開する tool surface

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod render;
pub mod sandbox;
pub mod tabular;
pub mod tools;
