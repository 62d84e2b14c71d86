use serde::Serialize;
use std::sync::{LazyLock, Mutex, PoisonError};

/// 1 回の同期パスで観測した値。
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncPassSample {
    pub completed: bool,
    pub uploaded: u32,
    /// パス終了時点で残っている納品書
    pub pending_after: u32,
    pub signatures_attached: u32,
    pub signatures_dropped: u32,
    pub failed_client_id: Option<String>,
    pub duration_ms: u64,
}

/// プロセス起動からの累計と直近のパス。
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncMetricsSnapshot {
    pub total_passes: u64,
    pub total_failure: u64,
    pub consecutive_failure: u64,
    pub total_uploaded: u64,
    pub total_signatures_attached: u64,
    pub total_signatures_dropped: u64,
    pub last_pass: Option<SyncPassSample>,
}

impl SyncMetricsSnapshot {
    fn absorb(&mut self, sample: SyncPassSample) {
        self.total_passes += 1;
        if sample.completed {
            self.consecutive_failure = 0;
        } else {
            self.total_failure += 1;
            self.consecutive_failure += 1;
        }
        self.total_uploaded += u64::from(sample.uploaded);
        self.total_signatures_attached += u64::from(sample.signatures_attached);
        self.total_signatures_dropped += u64::from(sample.signatures_dropped);
        self.last_pass = Some(sample);
    }
}

struct SyncPassRecorder {
    state: Mutex<SyncMetricsSnapshot>,
}

impl SyncPassRecorder {
    fn new() -> Self {
        Self {
            state: Mutex::new(SyncMetricsSnapshot::default()),
        }
    }

    fn record(&self, sample: SyncPassSample) -> SyncMetricsSnapshot {
        // 集計途中で panic しても値は壊れないのでそのまま使う
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.absorb(sample);
        state.clone()
    }

    fn snapshot(&self) -> SyncMetricsSnapshot {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

static SYNC_PASS_METRICS: LazyLock<SyncPassRecorder> = LazyLock::new(SyncPassRecorder::new);

pub fn record_pass(sample: SyncPassSample) -> SyncMetricsSnapshot {
    SYNC_PASS_METRICS.record(sample)
}

pub fn snapshot() -> SyncMetricsSnapshot {
    SYNC_PASS_METRICS.snapshot()
}
