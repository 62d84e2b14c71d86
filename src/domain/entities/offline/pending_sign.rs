use super::RemoteDocument;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingSignSource {
    Fresh,
    Cached,
}

/// 署名待ち納品書の一覧。ストアに届かない場合は最後に取得したキャッシュを返す。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingSignSnapshot {
    pub source: PendingSignSource,
    pub documents: Vec<RemoteDocument>,
    pub fetched_at: Option<DateTime<Utc>>,
}
