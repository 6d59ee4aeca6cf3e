//! Store configuration and optional-write switches.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};

/// Number of savepoint slots a transaction carries.
pub const SAVEPOINT_CAPACITY: usize = 8;

static GLOBAL_OPTIONAL: AtomicBool = AtomicBool::new(false);

thread_local! {
    static LOCAL_OPTIONAL: Cell<bool> = const { Cell::new(false) };
}

/// Allows field mutation outside a transaction on every thread.
pub fn set_global_optional(value: bool) {
    GLOBAL_OPTIONAL.store(value, Ordering::SeqCst);
}

/// Allows field mutation outside a transaction on the current thread.
pub fn set_local_optional(value: bool) {
    LOCAL_OPTIONAL.with(|flag| flag.set(value));
}

/// Returns true if writes outside a transaction are permitted here.
#[must_use]
pub fn is_optional() -> bool {
    GLOBAL_OPTIONAL.load(Ordering::SeqCst) || LOCAL_OPTIONAL.with(Cell::get)
}

/// Where commit hands write batches to accessors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DispatchMode {
    /// Accessors are called on the committing thread before `end` returns.
    #[default]
    Inline,
    /// Accessors are called on a dedicated worker thread; commit returns
    /// once the batches are queued.
    Background,
}

/// Configuration for a [`Store`](crate::Store).
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum transaction depth, including the outermost scope.
    pub max_nesting: usize,

    /// Accessor dispatch mode.
    pub dispatch: DispatchMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_nesting: SAVEPOINT_CAPACITY,
            dispatch: DispatchMode::Inline,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum nesting depth, clamped to `1..=SAVEPOINT_CAPACITY`.
    #[must_use]
    pub const fn max_nesting(mut self, depth: usize) -> Self {
        self.max_nesting = if depth == 0 {
            1
        } else if depth > SAVEPOINT_CAPACITY {
            SAVEPOINT_CAPACITY
        } else {
            depth
        };
        self
    }

    /// Sets the dispatch mode.
    #[must_use]
    pub const fn dispatch(mut self, mode: DispatchMode) -> Self {
        self.dispatch = mode;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.max_nesting, SAVEPOINT_CAPACITY);
        assert_eq!(config.dispatch, DispatchMode::Inline);
    }

    #[test]
    fn builder_clamps_nesting() {
        assert_eq!(Config::new().max_nesting(3).max_nesting, 3);
        assert_eq!(Config::new().max_nesting(0).max_nesting, 1);
        assert_eq!(Config::new().max_nesting(64).max_nesting, SAVEPOINT_CAPACITY);
        let config = Config::new().dispatch(DispatchMode::Background);
        assert_eq!(config.dispatch, DispatchMode::Background);
    }

    #[test]
    fn local_optional_is_per_thread() {
        set_local_optional(true);
        assert!(is_optional());
        let other = std::thread::spawn(is_optional).join().unwrap();
        set_local_optional(false);
        // The global switch may be toggled by other tests in this binary.
        assert_eq!(other, GLOBAL_OPTIONAL.load(Ordering::SeqCst));
    }
}
