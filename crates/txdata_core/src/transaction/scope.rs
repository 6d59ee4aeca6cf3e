//! The thread's active transaction and scope guards.

use crate::error::{TxError, TxResult};
use crate::store::StoreInner;
use crate::transaction::manager::Transaction;
use crate::transaction::state::When;
use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::error;

thread_local! {
    static CURRENT: RefCell<Option<Transaction>> = const { RefCell::new(None) };
}

/// Runs `f` with the thread's active transaction, if any.
///
/// `f` must not re-enter this function; callees receive the transaction
/// as an argument instead.
pub(crate) fn with_current<R>(f: impl FnOnce(Option<&mut Transaction>) -> R) -> R {
    CURRENT.with(|slot| f(slot.borrow_mut().as_mut()))
}

/// Read-only variant of [`with_current`].
pub(crate) fn read_current<R>(f: impl FnOnce(Option<&Transaction>) -> R) -> R {
    CURRENT.with(|slot| f(slot.borrow().as_ref()))
}

/// Returns true if a transaction is active on this thread.
#[must_use]
pub fn is_inside() -> bool {
    read_current(|tx| tx.is_some())
}

/// Returns the active nesting depth, or 0 outside a transaction.
#[must_use]
pub fn depth() -> usize {
    read_current(|tx| tx.map_or(0, Transaction::depth))
}

/// Marks the innermost active scope as failed.
///
/// Its logs are discarded when the scope ends, not now.
///
/// # Errors
///
/// Returns [`TxError::NotInTransaction`] outside a transaction.
pub fn rollback() -> TxResult<()> {
    with_current(|tx| {
        let tx = tx.ok_or(TxError::NotInTransaction)?;
        tx.fail();
        Ok(())
    })
}

fn listen(task: Box<dyn FnOnce()>, when: When) -> TxResult<()> {
    with_current(|tx| {
        let tx = tx.ok_or(TxError::NotInTransaction)?;
        tx.add_listener(task, when);
        Ok(())
    })
}

/// Runs `task` after the outermost transaction commits.
///
/// # Errors
///
/// Returns [`TxError::NotInTransaction`] outside a transaction.
pub fn on_succeeded(task: impl FnOnce() + 'static) -> TxResult<()> {
    listen(Box::new(task), When::Succeeded)
}

/// Runs `task` after the outermost transaction fails.
///
/// Registered inside a nested scope that fails, the task runs whatever the
/// outermost outcome turns out to be.
///
/// # Errors
///
/// Returns [`TxError::NotInTransaction`] outside a transaction.
pub fn on_failed(task: impl FnOnce() + 'static) -> TxResult<()> {
    listen(Box::new(task), When::Failed)
}

/// Runs `task` after the outermost transaction ends, whatever the outcome.
///
/// # Errors
///
/// Returns [`TxError::NotInTransaction`] outside a transaction.
pub fn on_finished(task: impl FnOnce() + 'static) -> TxResult<()> {
    listen(Box::new(task), When::Finished)
}

/// Opens a transaction scope bound to `store`.
pub(crate) fn begin(store: &Arc<StoreInner>, nested: bool) -> TxResult<Scope> {
    let depth = CURRENT.with(|slot| {
        let mut slot = slot.borrow_mut();
        match slot.as_mut() {
            None => {
                *slot = Some(Transaction::new(Arc::clone(store)));
                Ok(1)
            }
            Some(tx) if !tx.belongs_to(store) => Err(TxError::ForeignStore),
            Some(_) if !nested => Err(TxError::AlreadyInTransaction),
            Some(tx) => {
                tx.save(store.config().max_nesting)?;
                Ok(tx.depth())
            }
        }
    })?;

    Ok(Scope {
        depth,
        done: false,
        _thread: PhantomData,
    })
}

/// Guard for one transaction scope.
///
/// Ending the scope (explicitly with [`Scope::end`] or by dropping it)
/// closes the innermost level: a nested scope merges into or is discarded
/// from its parent, the outermost scope commits or discards and then runs
/// listeners. A scope dropped while its thread panics is marked failed
/// first.
///
/// Scopes must end innermost first and cannot leave their thread.
#[must_use = "the scope ends when dropped"]
pub struct Scope {
    depth: usize,
    done: bool,
    _thread: PhantomData<*const ()>,
}

impl Scope {
    /// Returns this scope's nesting depth.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Marks this scope failed.
    ///
    /// # Panics
    ///
    /// Panics if an inner scope is still open.
    pub fn fail(&self) {
        with_current(|tx| {
            let depth = tx.as_ref().map_or(0, |tx| tx.depth());
            assert_eq!(
                depth, self.depth,
                "transaction scope at depth {} failed while the active depth is {}",
                self.depth, depth
            );
            if let Some(tx) = tx {
                tx.fail();
            }
        });
    }

    /// Returns true if this scope is marked failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        read_current(|tx| tx.is_some_and(Transaction::is_failed))
    }

    /// Ends the scope.
    ///
    /// # Panics
    ///
    /// Panics if an inner scope is still open.
    pub fn end(mut self) {
        self.close();
    }

    fn close(&mut self) {
        self.done = true;
        let unwinding = std::thread::panicking();
        let finished = CURRENT.with(|slot| {
            let mut slot = slot.borrow_mut();
            let depth = slot.as_ref().map_or(0, Transaction::depth);
            if depth != self.depth {
                if unwinding {
                    error!(expected = self.depth, actual = depth, "transaction scope ended out of order");
                    // Inner scopes are still open: give up the whole
                    // transaction so the thread can begin again.
                    return if depth > self.depth {
                        slot.take().map(Transaction::abandon)
                    } else {
                        None
                    };
                }
                // Closed again by `Drop` while this panic unwinds.
                self.done = false;
                panic!(
                    "transaction scope at depth {} ended while the active depth is {}",
                    self.depth, depth
                );
            }
            if unwinding {
                if let Some(tx) = slot.as_mut() {
                    tx.fail();
                }
            }
            if depth > 1 {
                if let Some(tx) = slot.as_mut() {
                    tx.restore();
                }
                None
            } else {
                slot.take()
            }
        });

        // The slot is free again, so commit dispatch and listeners may open
        // new transactions.
        if let Some(tx) = finished {
            tx.finish();
        }
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        if !self.done {
            self.close();
        }
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope").field("depth", &self.depth).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use std::cell::Cell;
    use std::panic::{self, AssertUnwindSafe};
    use std::rc::Rc;

    #[test]
    #[should_panic(expected = "failed while the active depth is 2")]
    fn failing_an_outer_scope_panics() {
        let store = Store::default();
        let outer = store.begin(false).unwrap();
        let _inner = store.begin(true).unwrap();
        outer.fail();
    }

    #[test]
    fn failing_the_innermost_scope() {
        let store = Store::default();
        let outer = store.begin(false).unwrap();
        let inner = store.begin(true).unwrap();
        inner.fail();
        assert!(inner.is_failed());
        inner.end();
        assert!(!outer.is_failed());
        outer.end();
    }

    #[test]
    fn out_of_order_end_does_not_poison_the_thread() {
        let store = Store::default();
        let failed = Rc::new(Cell::new(false));
        let outer = store.begin(false).unwrap();
        let flag = Rc::clone(&failed);
        on_failed(move || flag.set(true)).unwrap();
        let inner = store.begin(true).unwrap();

        let result = panic::catch_unwind(AssertUnwindSafe(move || {
            let _inner = inner;
            outer.end();
        }));

        assert!(result.is_err());
        assert!(!is_inside());
        assert!(failed.get());
        let scope = store.begin(false).unwrap();
        assert_eq!(scope.depth(), 1);
        scope.end();
    }
}
