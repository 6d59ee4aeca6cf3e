//! Stress helpers for txdata.
//!
//! These drive many threads through nested transactions on one store to
//! check that per-thread transactions stay isolated under load.

use crate::fixtures::{Role, Team, TestStore};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;
use txdata_core::{Config, DispatchMode, TxError};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total transactions run.
    pub total_ops: usize,
    /// Committed transactions.
    pub committed: usize,
    /// Rolled back transactions.
    pub rolled_back: usize,
    /// Total duration.
    pub duration: Duration,
    /// Transactions per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(committed: usize, rolled_back: usize, duration: Duration) -> Self {
        let total = committed + rolled_back;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            committed,
            rolled_back,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Transactions: {}", self.total_ops);
        println!("Committed: {}", self.committed);
        println!("Rolled back: {}", self.rolled_back);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} tx/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of concurrent threads.
    pub threads: usize,
    /// Outermost transactions per thread.
    pub transactions: usize,
    /// Nested scopes opened inside each transaction.
    pub nesting: usize,
    /// Accessor dispatch mode.
    pub dispatch: DispatchMode,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            transactions: 200,
            nesting: 4,
            dispatch: DispatchMode::Inline,
        }
    }
}

/// What a stress run left behind, for verification.
pub struct StressOutcome {
    /// Timing and counts.
    pub result: StressTestResult,
    /// The store the run used.
    pub store: TestStore,
    /// One team per thread.
    pub teams: Vec<Team>,
    /// The committed score each team should hold.
    pub expected: Vec<i64>,
}

/// Runs nested transactions on one team per thread.
///
/// Every transaction increments its team's `total` score once per nested
/// scope. Every third transaction is rolled back and every odd nested scope
/// fails, so the expected score can be computed from the counts alone.
pub fn stress_nested_transactions(config: &StressConfig) -> StressOutcome {
    let store = TestStore::with_config(Config::new().dispatch(config.dispatch));
    let teams: Vec<Team> = (0..config.threads)
        .map(|i| store.persisted_team(i as i64, &format!("team-{i}")))
        .collect();
    let committed = Arc::new(AtomicUsize::new(0));
    let rolled_back = Arc::new(AtomicUsize::new(0));
    let expected: Vec<Arc<AtomicI64>> = teams.iter().map(|_| Arc::new(AtomicI64::new(0))).collect();

    let start = Instant::now();
    thread::scope(|s| {
        for (team, expected) in teams.iter().zip(&expected) {
            let store = &store.store;
            let committed = Arc::clone(&committed);
            let rolled_back = Arc::clone(&rolled_back);
            let expected = Arc::clone(expected);
            let nesting = config.nesting.min(store.config().max_nesting - 1);
            let transactions = config.transactions;

            s.spawn(move || {
                for round in 0..transactions {
                    let mut gained = 0;
                    let result: Result<(), TxError> = store.run(|| {
                        for level in 0..nesting {
                            let inner: Result<(), TxError> = store.run_nested(|| {
                                let scores = team.scores();
                                let total = scores.get("total").and_then(|i| i.as_i64()).unwrap_or(0);
                                scores.put("total", total + 1)?;
                                team.members().push(Role::new("temp", 1).0)?;
                                if level % 2 == 1 {
                                    return Err(TxError::invalid_schema("odd level"));
                                }
                                Ok(())
                            });
                            if inner.is_ok() {
                                gained += 1;
                            }
                        }
                        if round % 3 == 2 {
                            return Err(TxError::invalid_schema("every third round"));
                        }
                        Ok(())
                    });

                    match result {
                        Ok(()) => {
                            expected.fetch_add(gained, Ordering::SeqCst);
                            committed.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(_) => {
                            rolled_back.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                }
            });
        }
    });
    store.flush();

    let result = StressTestResult::new(
        committed.load(Ordering::SeqCst),
        rolled_back.load(Ordering::SeqCst),
        start.elapsed(),
    );
    debug!(
        committed = result.committed,
        rolled_back = result.rolled_back,
        elapsed = ?result.duration,
        "stress run finished"
    );
    StressOutcome {
        result,
        store,
        teams,
        expected: expected.iter().map(|e| e.load(Ordering::SeqCst)).collect(),
    }
}
