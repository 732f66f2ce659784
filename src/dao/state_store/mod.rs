pub mod json_file;
#[cfg(test)]
pub mod memory;

use futures::future::BoxFuture;

use crate::dao::{
    models::{AnchorRecord, CounterRecord},
    storage::StorageResult,
};

pub use json_file::JsonFileStore;

/// Abstraction over the persistence of the two independent bot records.
///
/// Each save is a whole-record overwrite; a missing record loads as its default.
pub trait StateStore: Send + Sync {
    /// Load the anchor record.
    fn load_anchor(&self) -> BoxFuture<'static, StorageResult<AnchorRecord>>;
    /// Overwrite the anchor record.
    fn save_anchor(&self, record: AnchorRecord) -> BoxFuture<'static, StorageResult<()>>;
    /// Load the counter record.
    fn load_counter(&self) -> BoxFuture<'static, StorageResult<CounterRecord>>;
    /// Overwrite the counter record.
    fn save_counter(&self, record: CounterRecord) -> BoxFuture<'static, StorageResult<()>>;
}
