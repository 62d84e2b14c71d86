use crate::domain::entities::offline::SyncEvent;
use tokio::sync::broadcast;

/// 同期ライフサイクルイベントの配信口。購読者がいなくても送信側は失敗しない。
#[derive(Clone)]
pub struct SyncEventBus {
    sender: broadcast::Sender<SyncEvent>,
}

impl SyncEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: SyncEvent) {
        tracing::debug!(
            target: "offline::sync",
            event = event.name(),
            receivers = self.sender.receiver_count(),
            "emitting sync event"
        );
        // 購読者ゼロは正常系
        let _ = self.sender.send(event);
    }
}

impl Default for SyncEventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
