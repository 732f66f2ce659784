//! In-memory [`StateStore`] used by the service tests.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use futures::future::BoxFuture;

use crate::dao::{
    models::{AnchorRecord, CounterRecord},
    storage::{StorageError, StorageResult},
};

use super::StateStore;

#[derive(Default)]
struct Inner {
    anchor: Mutex<AnchorRecord>,
    counter: Mutex<CounterRecord>,
    anchor_writes: Mutex<usize>,
    counter_writes: Mutex<Vec<u64>>,
    fail_writes: AtomicBool,
}

/// Shared handle to the in-memory records; clones observe the same data.
#[derive(Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<Inner>,
}

impl MemoryStateStore {
    /// Store pre-seeded with both records.
    pub fn with_records(anchor: AnchorRecord, counter: CounterRecord) -> Self {
        let store = Self::default();
        *store.inner.anchor.lock().unwrap() = anchor;
        *store.inner.counter.lock().unwrap() = counter;
        store
    }

    /// Current anchor record.
    pub fn anchor(&self) -> AnchorRecord {
        *self.inner.anchor.lock().unwrap()
    }

    /// Current counter record.
    pub fn counter(&self) -> CounterRecord {
        *self.inner.counter.lock().unwrap()
    }

    /// Number of successful anchor writes.
    pub fn anchor_writes(&self) -> usize {
        *self.inner.anchor_writes.lock().unwrap()
    }

    /// Every counter value written, in order.
    pub fn counter_writes(&self) -> Vec<u64> {
        self.inner.counter_writes.lock().unwrap().clone()
    }

    /// Make every subsequent write fail.
    pub fn fail_writes(&self) {
        self.inner.fail_writes.store(true, Ordering::SeqCst);
    }

    fn check_writable(&self) -> StorageResult<()> {
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable(
                "writes disabled".into(),
                std::io::Error::other("read-only"),
            ));
        }
        Ok(())
    }
}

impl StateStore for MemoryStateStore {
    fn load_anchor(&self) -> BoxFuture<'static, StorageResult<AnchorRecord>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.anchor()) })
    }

    fn save_anchor(&self, record: AnchorRecord) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.check_writable()?;
            *store.inner.anchor.lock().unwrap() = record;
            *store.inner.anchor_writes.lock().unwrap() += 1;
            Ok(())
        })
    }

    fn load_counter(&self) -> BoxFuture<'static, StorageResult<CounterRecord>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.counter()) })
    }

    fn save_counter(&self, record: CounterRecord) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.check_writable()?;
            *store.inner.counter.lock().unwrap() = record;
            store
                .inner
                .counter_writes
                .lock()
                .unwrap()
                .push(record.last_accepted_number);
            Ok(())
        })
    }
}
