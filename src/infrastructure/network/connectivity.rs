use crate::application::ports::connectivity::ConnectivityMonitor;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;

/// ネットワーク状態のハンドル。ホスト側（OS のネットワーク通知など）が
/// `set_online` を呼び、同期サービスは `subscribe` した受信側で遷移を監視する。
#[derive(Clone)]
pub struct WatchConnectivity {
    sender: Arc<watch::Sender<bool>>,
}

impl WatchConnectivity {
    pub fn new(initially_online: bool) -> Self {
        let (sender, _receiver) = watch::channel(initially_online);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.sender.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
    }

    pub fn current(&self) -> bool {
        *self.sender.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl ConnectivityMonitor for WatchConnectivity {
    async fn is_online(&self) -> bool {
        self.current()
    }
}
