//! Impls - ports の実装（開発・テスト用）
//!
//! 本番向けの外部ストア実装はこのクレートの外で port を実装します。

pub mod inmem_artifact_store;

pub use inmem_artifact_store::InMemoryArtifactStore;
