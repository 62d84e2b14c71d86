mod mappers;
pub mod metrics;
mod rows;
pub mod sqlite_store;

pub use metrics::{SyncMetricsSnapshot, SyncPassSample};
pub use sqlite_store::SqliteOfflinePersistence;
