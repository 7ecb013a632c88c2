//! Statistics tracking for the resolver.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::resolver::Origin;

/// Atomic counters of answered queries, keyed by where the answer came from.
#[derive(Default)]
pub struct Stats {
    overridden: AtomicU64,
    blocked: AtomicU64,
    cached: AtomicU64,
    forwarded: AtomicU64,
    unanswered: AtomicU64,
    /// Cumulative response time in microseconds for averaging.
    total_response_time_us: AtomicU64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, origin: Origin, response_time: Duration) {
        let counter = match origin {
            Origin::Override => &self.overridden,
            Origin::Blocked => &self.blocked,
            Origin::Cached => &self.cached,
            Origin::Upstream => &self.forwarded,
            Origin::Unanswered => &self.unanswered,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        let micros = u64::try_from(response_time.as_micros()).unwrap_or(u64::MAX);
        self.total_response_time_us
            .fetch_add(micros, Ordering::Relaxed);
    }

    pub fn snapshot_and_reset(&self) -> StatsSnapshot {
        let overridden = self.overridden.swap(0, Ordering::Relaxed);
        let blocked = self.blocked.swap(0, Ordering::Relaxed);
        let cached = self.cached.swap(0, Ordering::Relaxed);
        let forwarded = self.forwarded.swap(0, Ordering::Relaxed);
        let unanswered = self.unanswered.swap(0, Ordering::Relaxed);
        let total_us = self.total_response_time_us.swap(0, Ordering::Relaxed);

        let requests = overridden + blocked + cached + forwarded + unanswered;
        let avg_response_ms = if requests > 0 {
            (total_us as f64 / requests as f64) / 1000.0
        } else {
            0.0
        };

        StatsSnapshot {
            requests,
            overridden,
            blocked,
            cached,
            forwarded,
            unanswered,
            avg_response_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub requests: u64,
    pub overridden: u64,
    pub blocked: u64,
    pub cached: u64,
    pub forwarded: u64,
    pub unanswered: u64,
    pub avg_response_ms: f64,
}
