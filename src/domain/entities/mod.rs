pub mod offline;

pub use offline::{
    DeliveryRecord, DeliveryRecordDraft, PendingSignSnapshot, PendingSignSource, RemoteDocument,
    SignatureQueueEntry, SyncEvent,
};
