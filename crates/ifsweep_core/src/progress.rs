//! Shared sweep progress and cancellation

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Progress tracker for a running sweep.
///
/// Cheap to clone; every clone shares the same counters, so the front-end
/// can poll it while workers update it.
#[derive(Debug, Clone)]
pub struct SweepProgress {
    /// Combinations whose pipeline finished
    completed: Arc<AtomicU64>,
    /// Combinations whose pipeline failed at some stage
    failed: Arc<AtomicU64>,
    /// Combinations the producer will emit, saturated at `u64::MAX`
    total: Arc<AtomicU64>,
    /// Cancellation flag
    cancelled: Arc<AtomicBool>,
}

impl SweepProgress {
    #[must_use]
    pub fn new(total: u64) -> Self {
        Self {
            completed: Arc::new(AtomicU64::new(0)),
            failed: Arc::new(AtomicU64::new(0)),
            total: Arc::new(AtomicU64::new(total)),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Combinations processed either way
    #[must_use]
    pub fn processed(&self) -> u64 {
        self.completed().saturating_add(self.failed())
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Reset the counters for a new sweep
    pub fn reset(&self, total: u64) {
        self.completed.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
        self.total.store(total, Ordering::Relaxed);
        self.cancelled.store(false, Ordering::Relaxed);
    }

    /// Ask the producer to stop emitting work. Combinations already queued
    /// are still processed.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

impl Default for SweepProgress {
    fn default() -> Self {
        Self::new(0)
    }
}
