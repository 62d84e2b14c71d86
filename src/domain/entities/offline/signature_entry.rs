use crate::domain::value_objects::offline::{SignatureEntryId, SignatureImage, SignatureTarget};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignatureQueueEntry {
    pub entry_id: SignatureEntryId,
    pub target: SignatureTarget,
    pub image: SignatureImage,
    pub created_at: DateTime<Utc>,
    /// 失敗の総数
    pub attempts: u32,
    /// そのうち親ドキュメントが見つからなかった回数
    #[serde(default)]
    pub parent_missing_attempts: u32,
}

impl SignatureQueueEntry {
    pub fn new(target: SignatureTarget, image: SignatureImage, created_at: DateTime<Utc>) -> Self {
        Self {
            entry_id: SignatureEntryId::generate(),
            target,
            image,
            created_at,
            attempts: 0,
            parent_missing_attempts: 0,
        }
    }
}
