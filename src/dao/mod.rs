/// Persisted record definitions.
pub mod models;
/// Persistence of the anchor and counter records.
pub mod state_store;
/// Storage abstraction layer for persistence operations.
pub mod storage;
