//! ArtifactStore port - Blob ストレージ（session スコープの versioned store）
//!
//! ArtifactStore はアップロードされた CSV と生成されたチャート画像を
//! 保存します。名前ごとにバージョンが単調増加し、削除はしません。
//!
//! # 設計原則
//! - session を namespace として受け取る（マルチセッション対応）
//! - list は「最初に保存された順」で名前を返す（"最新の CSV" の判定根拠）
//! - save は新しいバージョン番号を返す（初回は 1）
//! - 実装差し替えの seam（開発/テストは InMemory、本番は外部ストア）

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::SessionId;

/// StoreError は store 操作の失敗
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("artifact not found: {0}")]
    NotFound(String),

    #[error("store operation failed: {0}")]
    Backend(String),
}

/// One loaded artifact: the latest version of a name.
#[derive(Debug, Clone)]
pub struct StoredArtifact {
    pub name: String,
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub version: u64,
    pub created_at: DateTime<Utc>,
}

/// ArtifactStore は session ごとの named versioned blob を管理
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// List artifact names in first-save order. Re-saving an existing name
    /// re-versions it in place and does not move it in the listing.
    async fn list(&self, session: &SessionId) -> Result<Vec<String>, StoreError>;

    /// Load the latest version of a name.
    async fn load(&self, session: &SessionId, name: &str) -> Result<StoredArtifact, StoreError>;

    /// Save a new version under a name and return the assigned version
    /// number (1 for the first save of a name).
    async fn save(
        &self,
        session: &SessionId,
        name: &str,
        bytes: Vec<u8>,
        mime_type: &str,
    ) -> Result<u64, StoreError>;
}
