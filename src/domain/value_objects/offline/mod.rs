pub mod client_id;
pub mod record_payload;
pub mod server_id;
pub mod signature_entry_id;
pub mod signature_image;
pub mod signature_status;
pub mod signature_target;

pub use client_id::ClientId;
pub use record_payload::RecordPayload;
pub use server_id::ServerId;
pub use signature_entry_id::SignatureEntryId;
pub use signature_image::SignatureImage;
pub use signature_status::SignatureStatus;
pub use signature_target::SignatureTarget;
