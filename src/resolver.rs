//! DNS query resolution logic.
//!
//! Every question passes through the same chain, stopping at the first
//! source that answers:
//! 1. Host overrides from the configuration
//! 2. The current block set (sinkhole answer)
//! 3. The record cache
//! 4. The upstream, whose non-empty answers are merged into the cache
//!
//! Transports handle the actual I/O, the resolver handles decisions.

use rustc_hash::FxHashMap;
use std::sync::Arc;
use tokio::time::Instant;

use crate::cache::RecordCache;
use crate::filter::{BlockSetHolder, normalize_domain, sinkhole};
use crate::record::RecordType;
use crate::stats::{Stats, StatsSnapshot};
use crate::upstream::Upstream;

/// Where an answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Override,
    Blocked,
    Cached,
    Upstream,
    /// Upstream gave nothing usable; the answer is empty and was not cached.
    Unanswered,
}

impl Origin {
    pub fn as_str(self) -> &'static str {
        match self {
            Origin::Override => "OVERRIDE",
            Origin::Blocked => "BLOCKED",
            Origin::Cached => "CACHED",
            Origin::Upstream => "FORWARDED",
            Origin::Unanswered => "UNANSWERED",
        }
    }
}

/// Values answering one question, tagged with their origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub values: Vec<String>,
    pub origin: Origin,
}

impl Answer {
    fn new(values: Vec<String>, origin: Origin) -> Self {
        Self { values, origin }
    }
}

/// Resolver handles DNS query processing decisions.
///
/// Shared by all transports; every method takes `&self` and is safe to call
/// from many tasks at once.
pub struct Resolver {
    overrides: FxHashMap<String, String>,
    blocked: Arc<BlockSetHolder>,
    cache: Arc<RecordCache>,
    upstream: Arc<dyn Upstream>,
    stats: Stats,
}

impl Resolver {
    /// Create a resolver. Override keys are expected in canonical form, as
    /// produced by [`Config::normalized`](crate::config::Config::normalized).
    pub fn new(
        overrides: impl IntoIterator<Item = (String, String)>,
        blocked: Arc<BlockSetHolder>,
        cache: Arc<RecordCache>,
        upstream: Arc<dyn Upstream>,
    ) -> Self {
        Self {
            overrides: overrides.into_iter().collect(),
            blocked,
            cache,
            upstream,
            stats: Stats::new(),
        }
    }

    /// Resolve one question and return its values, possibly empty.
    pub async fn resolve(&self, domain: &str, rtype: RecordType, deadline: Instant) -> Vec<String> {
        self.answer(domain, rtype, deadline).await.values
    }

    /// Resolve one question, reporting where the answer came from.
    ///
    /// `domain` may carry the wire-format trailing dot.
    pub async fn answer(&self, domain: &str, rtype: RecordType, deadline: Instant) -> Answer {
        let start = Instant::now();
        let domain = normalize_domain(domain);
        let answer = self.lookup(&domain, rtype, deadline).await;
        self.stats.record(answer.origin, start.elapsed());
        answer
    }

    async fn lookup(&self, domain: &str, rtype: RecordType, deadline: Instant) -> Answer {
        // Type-agnostic: the address answers every record type.
        if let Some(addr) = self.overrides.get(domain) {
            return Answer::new(vec![addr.clone()], Origin::Override);
        }

        if self.blocked.contains(domain) {
            return Answer::new(sinkhole(rtype), Origin::Blocked);
        }

        if let Some(values) = self.cache.lookup(domain, rtype) {
            return Answer::new(values, Origin::Cached);
        }

        let values = self.upstream.query(domain, rtype, deadline).await;
        if values.is_empty() {
            return Answer::new(values, Origin::Unanswered);
        }
        self.cache.merge(domain, rtype, values.clone(), Instant::now());
        Answer::new(values, Origin::Upstream)
    }

    pub fn stats_snapshot_and_reset(&self) -> StatsSnapshot {
        self.stats.snapshot_and_reset()
    }

    /// Returns the number of domains in the current block set.
    pub fn blocked_count(&self) -> usize {
        self.blocked.len()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}
