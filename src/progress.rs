//! Cooperative progress reporting and cancellation for index builds.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Caller-supplied token polled by long-running operations.
///
/// Builds poll `is_active` between chunks and between rows within a
/// chunk, and report completed rows through `add_progress`.
pub trait ProgressToken: Send + Sync {
    /// Whether the operation should keep running.
    fn is_active(&self) -> bool;

    /// Record `n` completed units of work.
    fn add_progress(&self, n: u64);
}

/// Default progress token.
///
/// Counts completed work, supports manual cancellation, and can stop an
/// operation automatically once an optional limit is reached.
#[derive(Debug, Default)]
pub struct BuildProgress {
    completed: AtomicU64,
    limit: Option<u64>,
    cancelled: AtomicBool,
}

impl BuildProgress {
    /// Create a token with no limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a token that goes inactive after `limit` units of work.
    pub fn with_limit(limit: u64) -> Self {
        Self {
            completed: AtomicU64::new(0),
            limit: Some(limit),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Cancel the operation at the next poll point.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Units of work completed so far.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }
}

impl ProgressToken for BuildProgress {
    fn is_active(&self) -> bool {
        if self.cancelled.load(Ordering::Relaxed) {
            return false;
        }
        match self.limit {
            Some(limit) => self.completed.load(Ordering::Relaxed) < limit,
            None => true,
        }
    }

    fn add_progress(&self, n: u64) {
        self.completed.fetch_add(n, Ordering::Relaxed);
    }
}
