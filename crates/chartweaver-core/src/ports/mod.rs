//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 各 trait は外部システム（artifact store, 時刻, ID 生成）への
//! インターフェースを提供し、実装の詳細を隠蔽します。
//!
//! # 設計原則
//! - ArtifactStore が "最新の CSV" の唯一の判定根拠（source of truth）
//! - 本番ストアは外部コラボレータ。このクレートは開発/テスト用の
//!   InMemory 実装（impls）だけを持つ

pub mod artifact_store;
pub mod clock;
pub mod id_generator;

// 主要な trait を再エクスポート
pub use self::artifact_store::{ArtifactStore, StoreError, StoredArtifact};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
