use crate::domain::value_objects::offline::ClientId;
use serde::Serialize;

/// UI 層が購読する同期ライフサイクルイベント。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SyncEvent {
    SyncStart { count: usize },
    SyncDone { count: usize },
    /// client_id はキューの読み出し自体に失敗した場合 None
    SyncError {
        error: String,
        client_id: Option<ClientId>,
    },
    QueueCountChanged { count: usize },
}

impl SyncEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SyncEvent::SyncStart { .. } => "sync-start",
            SyncEvent::SyncDone { .. } => "sync-done",
            SyncEvent::SyncError { .. } => "sync-error",
            SyncEvent::QueueCountChanged { .. } => "queue-count-changed",
        }
    }
}
