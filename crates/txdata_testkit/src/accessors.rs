//! Instrumented accessors.
//!
//! These record, fail or panic on every write so tests can observe what a
//! commit handed to the accessor boundary and on which thread.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use txdata_core::{Accessor, AccessorError, AccessorResult, WriteBatch};

/// Records every batch it receives.
#[derive(Debug, Default)]
pub struct RecordingAccessor {
    batches: Mutex<Vec<WriteBatch>>,
    threads: Mutex<Vec<Option<String>>>,
}

impl RecordingAccessor {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every batch received so far, oldest first.
    pub fn batches(&self) -> Vec<WriteBatch> {
        self.batches.lock().clone()
    }

    /// Returns the most recent batch.
    pub fn last(&self) -> Option<WriteBatch> {
        self.batches.lock().last().cloned()
    }

    /// Returns the number of `write` calls.
    pub fn calls(&self) -> usize {
        self.batches.lock().len()
    }

    /// Returns the name of the thread each write ran on.
    pub fn threads(&self) -> Vec<Option<String>> {
        self.threads.lock().clone()
    }

    /// Renders the recorded batches as JSON, for readable assertion output.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&*self.batches.lock()).unwrap_or(serde_json::Value::Null)
    }

    /// Forgets everything recorded.
    pub fn clear(&self) {
        self.batches.lock().clear();
        self.threads.lock().clear();
    }
}

impl Accessor for RecordingAccessor {
    fn write(&self, batch: WriteBatch) -> AccessorResult<()> {
        self.threads
            .lock()
            .push(thread::current().name().map(str::to_owned));
        self.batches.lock().push(batch);
        Ok(())
    }
}

/// Rejects every batch with a fixed error.
#[derive(Debug)]
pub struct FailingAccessor {
    error: AccessorError,
    calls: AtomicUsize,
}

impl FailingAccessor {
    /// Creates an accessor that always returns `error`.
    pub fn new(error: AccessorError) -> Self {
        Self {
            error,
            calls: AtomicUsize::new(0),
        }
    }

    /// Returns the number of `write` calls.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for FailingAccessor {
    fn default() -> Self {
        Self::new(AccessorError::unavailable("disk on fire"))
    }
}

impl Accessor for FailingAccessor {
    fn write(&self, _batch: WriteBatch) -> AccessorResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }
}

/// Panics on every batch.
#[derive(Debug, Default)]
pub struct PanickingAccessor {
    calls: AtomicUsize,
}

impl PanickingAccessor {
    /// Creates a new panicking accessor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of `write` calls.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Accessor for PanickingAccessor {
    fn write(&self, batch: WriteBatch) -> AccessorResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        panic!("accessor exploded on a batch of {} writes", batch.len());
    }
}
