pub mod offline_queue_service;
pub mod pending_signature_service;
pub mod reconciliation;
pub mod signature_service;
pub mod sync_events;
pub mod sync_service;

pub use offline_queue_service::OfflineQueueService;
pub use pending_signature_service::PendingSignatureService;
pub use reconciliation::{ReconcileError, ReconcileOutcome, ReconcilePath, RecordReconciler};
pub use signature_service::{
    AttachError, AttachedSignature, ReplayReport, SignatureAttachmentService,
    SignatureAttachmentSettings,
};
pub use sync_events::SyncEventBus;
pub use sync_service::{SyncOutcome, SyncPassReport, SyncService, SyncStatus};
