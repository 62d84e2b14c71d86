use super::offline_queue_service::OfflineQueueService;
use super::reconciliation::RecordReconciler;
use super::signature_service::{ReplayReport, SignatureAttachmentService};
use super::sync_events::SyncEventBus;
use crate::application::ports::connectivity::ConnectivityMonitor;
use crate::domain::entities::offline::SyncEvent;
use crate::domain::value_objects::offline::ClientId;
use crate::infrastructure::offline::metrics::{self, SyncPassSample};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SyncStatus {
    pub is_syncing: bool,
    pub pending_records: u32,
    pub pending_signatures: u32,
    pub last_sync: Option<i64>,
    pub sync_errors: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPassReport {
    /// パス開始時点の未アップロード件数
    pub pending_at_start: usize,
    pub uploaded: usize,
    pub failed_client_id: Option<ClientId>,
    pub error: Option<String>,
    pub signatures: ReplayReport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// 別のパスが実行中だった
    SkippedInFlight,
    Offline,
    Completed(SyncPassReport),
    Aborted(SyncPassReport),
}

impl SyncOutcome {
    pub fn report(&self) -> Option<&SyncPassReport> {
        match self {
            SyncOutcome::Completed(report) | SyncOutcome::Aborted(report) => Some(report),
            _ => None,
        }
    }
}

/// 同期パスの単一実行を保証し、ライフサイクルイベントを発行する。
pub struct SyncService {
    queue: Arc<OfflineQueueService>,
    reconciler: Arc<RecordReconciler>,
    signatures: Arc<SignatureAttachmentService>,
    connectivity: Arc<dyn ConnectivityMonitor>,
    events: SyncEventBus,
    gate: Arc<Mutex<()>>,
    status: Arc<RwLock<SyncStatus>>,
}

impl SyncService {
    pub fn new(
        queue: Arc<OfflineQueueService>,
        reconciler: Arc<RecordReconciler>,
        signatures: Arc<SignatureAttachmentService>,
        connectivity: Arc<dyn ConnectivityMonitor>,
        events: SyncEventBus,
    ) -> Self {
        Self {
            queue,
            reconciler,
            signatures,
            connectivity,
            events,
            gate: Arc::new(Mutex::new(())),
            status: Arc::new(RwLock::new(SyncStatus {
                is_syncing: false,
                pending_records: 0,
                pending_signatures: 0,
                last_sync: None,
                sync_errors: 0,
            })),
        }
    }

    pub async fn trigger_sync(&self) -> SyncOutcome {
        self.run_pass("manual").await
    }

    async fn run_pass(&self, trigger: &'static str) -> SyncOutcome {
        // 実行中のパスがあれば待たずに戻る
        let Ok(_guard) = self.gate.try_lock() else {
            tracing::debug!(target: "offline::sync", trigger, "sync already in flight");
            return SyncOutcome::SkippedInFlight;
        };

        if !self.connectivity.is_online().await {
            tracing::debug!(target: "offline::sync", trigger, "offline, sync deferred");
            return SyncOutcome::Offline;
        }

        let started = Instant::now();
        self.status.write().await.is_syncing = true;

        let mut report = SyncPassReport::default();
        let completed = self.upload_pending(&mut report).await;

        // 成否に関わらず server 宛ての署名を流す
        if self.connectivity.is_online().await {
            report.signatures = self.signatures.replay_server_targeted().await;
        }

        self.finish_pass(trigger, completed, &report, started).await;

        if completed {
            SyncOutcome::Completed(report)
        } else {
            SyncOutcome::Aborted(report)
        }
    }

    /// 挿入順に突き合わせる。途中で失敗したら以降のレコードには触れない。
    async fn upload_pending(&self, report: &mut SyncPassReport) -> bool {
        let records = match self.queue.list_pending().await {
            Ok(records) => records,
            Err(err) => {
                tracing::error!(
                    target: "offline::sync",
                    error = %err,
                    "failed to load pending delivery notes"
                );
                report.error = Some(err.to_string());
                self.events.emit(SyncEvent::SyncError {
                    error: err.to_string(),
                    client_id: None,
                });
                return false;
            }
        };

        report.pending_at_start = records.len();
        self.events.emit(SyncEvent::SyncStart {
            count: records.len(),
        });
        tracing::info!(
            target: "offline::sync",
            pending = records.len(),
            "sync pass started"
        );

        for record in &records {
            match self.reconciler.reconcile(record).await {
                Ok(outcome) => {
                    tracing::debug!(
                        target: "offline::sync",
                        client_id = %outcome.client_id,
                        server_id = %outcome.server_id,
                        path = ?outcome.path,
                        "delivery note reconciled"
                    );
                    report.uploaded += 1;
                }
                Err(err) => {
                    tracing::warn!(
                        target: "offline::sync",
                        client_id = %err.client_id(),
                        error = %err,
                        "sync pass aborted"
                    );
                    report.failed_client_id = Some(err.client_id().clone());
                    report.error = Some(err.to_string());
                    self.events.emit(SyncEvent::SyncError {
                        error: err.to_string(),
                        client_id: Some(err.client_id().clone()),
                    });
                    return false;
                }
            }
        }

        self.events.emit(SyncEvent::SyncDone {
            count: report.uploaded,
        });
        tracing::info!(
            target: "offline::sync",
            uploaded = report.uploaded,
            "sync pass finished"
        );
        true
    }

    async fn finish_pass(
        &self,
        trigger: &'static str,
        completed: bool,
        report: &SyncPassReport,
        started: Instant,
    ) {
        let pending_records = self.queue.pending_count().await.unwrap_or_else(|err| {
            tracing::warn!(
                target: "offline::sync",
                error = %err,
                "failed to count pending delivery notes"
            );
            0
        });
        let pending_signatures = self.signatures.pending_count().await;

        {
            let mut status = self.status.write().await;
            status.is_syncing = false;
            status.last_sync = Some(chrono::Utc::now().timestamp());
            status.pending_records = pending_records as u32;
            status.pending_signatures = pending_signatures as u32;
            if !completed {
                status.sync_errors = status.sync_errors.saturating_add(1);
            }
        }

        metrics::record_pass(SyncPassSample {
            completed,
            uploaded: report.uploaded as u32,
            pending_after: pending_records as u32,
            signatures_attached: report.signatures.attached as u32,
            signatures_dropped: report.signatures.dropped as u32,
            failed_client_id: report
                .failed_client_id
                .as_ref()
                .map(|id| id.as_str().to_string()),
            duration_ms: started.elapsed().as_millis() as u64,
        });
        tracing::debug!(target: "offline::sync", trigger, completed, "sync pass recorded");
    }

    /// offline→online に変わるたびに同期パスを起動する。
    pub fn watch_connectivity(&self, mut rx: watch::Receiver<bool>) -> JoinHandle<()> {
        let service = self.clone();
        let mut online = *rx.borrow_and_update();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let now_online = *rx.borrow_and_update();
                let reconnected = !online && now_online;
                online = now_online;

                if !reconnected {
                    continue;
                }

                tracing::info!(target: "offline::sync", "connectivity restored, triggering sync");
                let service = service.clone();
                tokio::spawn(async move {
                    let outcome = service.run_pass("reconnect").await;
                    tracing::debug!(
                        target: "offline::sync",
                        outcome = ?outcome,
                        "reconnect sync finished"
                    );
                });
            }
        })
    }

    pub async fn status(&self) -> SyncStatus {
        let mut status = self.status.read().await.clone();
        if !status.is_syncing {
            if let Ok(count) = self.queue.pending_count().await {
                status.pending_records = count as u32;
            }
            status.pending_signatures = self.signatures.pending_count().await as u32;
        }
        status
    }
}

impl Clone for SyncService {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            reconciler: self.reconciler.clone(),
            signatures: self.signatures.clone(),
            connectivity: self.connectivity.clone(),
            events: self.events.clone(),
            gate: self.gate.clone(),
            status: self.status.clone(),
        }
    }
}
