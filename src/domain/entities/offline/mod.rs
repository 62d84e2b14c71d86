pub mod delivery_record;
pub mod pending_sign;
pub mod remote_document;
pub mod signature_entry;
pub mod sync_event;

pub use delivery_record::{DeliveryRecord, DeliveryRecordDraft};
pub use pending_sign::{PendingSignSnapshot, PendingSignSource};
pub use remote_document::RemoteDocument;
pub use signature_entry::SignatureQueueEntry;
pub use sync_event::SyncEvent;
