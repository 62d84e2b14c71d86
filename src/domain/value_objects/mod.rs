pub mod offline;

pub use offline::{
    ClientId, RecordPayload, ServerId, SignatureEntryId, SignatureImage, SignatureStatus,
    SignatureTarget,
};
