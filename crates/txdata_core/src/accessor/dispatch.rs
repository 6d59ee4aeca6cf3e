//! Hands committed write batches to accessors.

use crate::accessor::{Accessor, WriteBatch};
use crate::config::DispatchMode;
use crate::error::AccessorError;
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Sender, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, warn};

enum Job {
    Write(Arc<dyn Accessor>, WriteBatch),
    Flush(SyncSender<()>),
}

/// Delivers batches inline or through a worker thread.
pub(crate) enum Dispatcher {
    Inline,
    Background(Worker),
}

pub(crate) struct Worker {
    sender: Mutex<Option<Sender<Job>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    pub(crate) fn new(mode: DispatchMode) -> Self {
        match mode {
            DispatchMode::Inline => Self::Inline,
            DispatchMode::Background => match Worker::spawn() {
                Ok(worker) => Self::Background(worker),
                Err(err) => {
                    warn!(error = %err, "could not start dispatch worker, writing inline");
                    Self::Inline
                }
            },
        }
    }

    /// Schedules a batch. Inline delivery has finished when this returns.
    pub(crate) fn dispatch(&self, accessor: Arc<dyn Accessor>, batch: WriteBatch) {
        match self {
            Self::Inline => deliver(accessor.as_ref(), batch),
            Self::Background(worker) => {
                let rejected = match worker.sender.lock().as_ref() {
                    Some(sender) => sender.send(Job::Write(accessor, batch)).err(),
                    None => None,
                };
                if let Some(mpsc::SendError(Job::Write(accessor, batch))) = rejected {
                    warn!("dispatch worker is gone, writing inline");
                    deliver(accessor.as_ref(), batch);
                }
            }
        }
    }

    /// Blocks until every batch scheduled so far was delivered.
    pub(crate) fn flush(&self) {
        if let Self::Background(worker) = self {
            let (ack, done) = mpsc::sync_channel(1);
            let sent = worker
                .sender
                .lock()
                .as_ref()
                .is_some_and(|sender| sender.send(Job::Flush(ack)).is_ok());
            if sent {
                let _ = done.recv();
            }
        }
    }
}

impl Worker {
    fn spawn() -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::channel::<Job>();
        let handle = thread::Builder::new()
            .name("txdata-dispatch".to_string())
            .spawn(move || {
                for job in receiver {
                    match job {
                        Job::Write(accessor, batch) => deliver(accessor.as_ref(), batch),
                        Job::Flush(ack) => {
                            let _ = ack.send(());
                        }
                    }
                }
                debug!("dispatch worker stopped");
            })?;
        Ok(Self {
            sender: Mutex::new(Some(sender)),
            handle: Mutex::new(Some(handle)),
        })
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain the queue and exit.
        self.sender.lock().take();
        if let Some(handle) = self.handle.lock().take() {
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                error!("dispatch worker panicked");
            }
        }
    }
}

/// Calls the accessor, logging and swallowing any failure.
pub(crate) fn deliver(accessor: &dyn Accessor, batch: WriteBatch) {
    let (inserts, deletes, patches) = (batch.inserts.len(), batch.deletes.len(), batch.patches.len());
    match panic::catch_unwind(AssertUnwindSafe(|| accessor.write(batch))) {
        Ok(Ok(())) => debug!(inserts, deletes, patches, "write batch delivered"),
        Ok(Err(AccessorError::Closed)) => {
            warn!(inserts, deletes, patches, "accessor is closed, write batch dropped");
        }
        Ok(Err(err)) => {
            error!(error = %err, inserts, deletes, patches, "accessor write failed after commit");
        }
        Err(_) => error!(inserts, deletes, patches, "accessor panicked during write"),
    }
}
