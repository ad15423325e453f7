//! InMemoryArtifactStore - 開発・テスト用の artifact store
//!
//! # 実装詳細
//! - HashMap<SessionId, SessionState> で session ごとに分離
//! - 名前ごとにバージョン列を保持（ascending、初回は 1）
//! - tokio::sync::Mutex で排他制御（保持したまま await しない）
//!
//! # 使用例
//! ```ignore
//! let store = InMemoryArtifactStore::new();
//! let v1 = store.save(&session, "sales.csv", bytes, "text/csv").await?;
//! let names = store.list(&session).await?;
//! let latest = store.load(&session, "sales.csv").await?;
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::SessionId;
use crate::ports::{ArtifactStore, Clock, StoreError, StoredArtifact, SystemClock};

/// One saved version of one name.
#[derive(Debug, Clone)]
struct VersionRecord {
    bytes: Vec<u8>,
    mime_type: String,
    version: u64,
    created_at: DateTime<Utc>,
}

/// Per-session state: insertion order + version lists.
#[derive(Debug, Default)]
struct SessionState {
    /// Names in first-save order (the listing contract).
    order: Vec<String>,

    /// name -> versions, ascending. 最後の要素が最新。
    artifacts: HashMap<String, Vec<VersionRecord>>,
}

/// InMemoryArtifactStore は開発・テスト用の versioned blob store
///
/// 本番の外部ストアと同じ port を実装するため、パイプライン側は
/// どちらが刺さっているか区別しません。
pub struct InMemoryArtifactStore<C = SystemClock> {
    sessions: Mutex<HashMap<SessionId, SessionState>>,
    clock: C,
}

impl InMemoryArtifactStore<SystemClock> {
    /// 新しい InMemoryArtifactStore を作成（実時間の clock）
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for InMemoryArtifactStore<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> InMemoryArtifactStore<C> {
    /// Clock を差し替えて作成（テストで created_at を固定できる）
    pub fn with_clock(clock: C) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            clock,
        }
    }
}

#[async_trait]
impl<C: Clock> ArtifactStore for InMemoryArtifactStore<C> {
    async fn list(&self, session: &SessionId) -> Result<Vec<String>, StoreError> {
        let sessions = self.sessions.lock().await;
        Ok(sessions
            .get(session)
            .map(|s| s.order.clone())
            .unwrap_or_default())
    }

    async fn load(&self, session: &SessionId, name: &str) -> Result<StoredArtifact, StoreError> {
        let sessions = self.sessions.lock().await;
        let record = sessions
            .get(session)
            .and_then(|s| s.artifacts.get(name))
            .and_then(|versions| versions.last())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;

        Ok(StoredArtifact {
            name: name.to_string(),
            bytes: record.bytes.clone(),
            mime_type: record.mime_type.clone(),
            version: record.version,
            created_at: record.created_at,
        })
    }

    async fn save(
        &self,
        session: &SessionId,
        name: &str,
        bytes: Vec<u8>,
        mime_type: &str,
    ) -> Result<u64, StoreError> {
        let created_at = self.clock.now();
        let mut sessions = self.sessions.lock().await;
        let state = sessions.entry(*session).or_default();

        let versions = state.artifacts.entry(name.to_string()).or_default();
        if versions.is_empty() {
            // 初回保存のみ listing に現れる（再保存は位置を変えない）
            state.order.push(name.to_string());
        }
        let version = versions.last().map(|r| r.version + 1).unwrap_or(1);
        versions.push(VersionRecord {
            bytes,
            mime_type: mime_type.to_string(),
            version,
            created_at,
        });
        Ok(version)
    }
}
