pub mod memory_store;

pub use memory_store::{InMemoryRemoteStore, StoreOp, StoredBlob};
