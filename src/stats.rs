//! Shared counters observed by the worker pool and the termination controller.
//!
//! Mirrors the `Arc<AtomicUsize>` pattern the crawl orchestrator uses for its
//! `total_pages` counter, generalized to the handful of counters this port
//! needs. `SeqCst` throughout: the termination proof depends on in-flight
//! increments strictly preceding the corresponding work and decrements
//! strictly following it, and the counter traffic is negligible next to
//! network I/O, so the strongest ordering costs nothing observable.
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Stats {
    /// Entries popped but not yet resolved (success, terminal-fail, or re-enqueued).
    in_flight: AtomicI64,
    /// Total fetch attempts made (every C5 invocation, regardless of outcome).
    attempts: AtomicU64,
    /// Terminal successes recorded by the writer.
    ok: AtomicU64,
    /// Terminal failures recorded by the writer.
    fail: AtomicU64,
}

pub type SharedStats = Arc<Stats>;

impl Stats {
    #[must_use]
    pub fn new() -> SharedStats {
        Arc::new(Self::default())
    }

    pub fn in_flight_add(&self, delta: i64) {
        self.in_flight.fetch_add(delta, Ordering::SeqCst);
    }

    #[must_use]
    pub fn in_flight(&self) -> i64 {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Returns the new total after incrementing.
    pub fn record_attempt(&self) -> u64 {
        self.attempts.fetch_add(1, Ordering::SeqCst) + 1
    }

    #[must_use]
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn record_ok(&self, n: u64) {
        self.ok.fetch_add(n, Ordering::SeqCst);
    }

    pub fn record_fail(&self, n: u64) {
        self.fail.fetch_add(n, Ordering::SeqCst);
    }

    #[must_use]
    pub fn ok(&self) -> u64 {
        self.ok.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn fail(&self) -> u64 {
        self.fail.load(Ordering::SeqCst)
    }
}
