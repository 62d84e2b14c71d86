pub mod connectivity;
pub mod document_store;
pub mod offline_store;

pub use connectivity::ConnectivityMonitor;
pub use document_store::{
    is_server_timestamp, server_timestamp, BlobRef, BlobStore, DocumentFields, DocumentStore,
    StoreError,
};
pub use offline_store::{OfflinePersistence, SignatureFailureCounts};
