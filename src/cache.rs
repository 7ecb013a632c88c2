//! Resolved-record cache with TTL-based expiration.

use rustc_hash::FxHashMap;
use std::sync::RwLock;
use std::time::Duration;
use tokio::time::Instant;

use crate::record::{Record, RecordType};

/// TTL-based record cache keyed by canonical domain.
///
/// Each domain owns one [`Record`] whose type slots are filled independently.
/// The expiry is set when the record is first created and is not extended by
/// later merges of other types.
pub struct RecordCache {
    entries: RwLock<FxHashMap<String, Record>>,
    ttl: Duration,
}

impl RecordCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(FxHashMap::default()),
            ttl,
        }
    }

    /// Look up cached values for `domain` and `rtype` at the current time.
    pub fn lookup(&self, domain: &str, rtype: RecordType) -> Option<Vec<String>> {
        self.lookup_at(domain, rtype, Instant::now())
    }

    /// Look up cached values as of `now`.
    ///
    /// A hit needs an unexpired record with a filled slot for `rtype`. An
    /// expired record is removed before returning the miss.
    pub fn lookup_at(&self, domain: &str, rtype: RecordType, now: Instant) -> Option<Vec<String>> {
        {
            let Ok(entries) = self.entries.read() else {
                return None;
            };
            match entries.get(domain) {
                None => return None,
                Some(record) if !record.is_expired(now) => {
                    return record.has(rtype).then(|| record.values(rtype));
                }
                Some(_) => {}
            }
        }

        let Ok(mut entries) = self.entries.write() else {
            return None;
        };
        // Re-check: a concurrent merge may have replaced the stale record.
        if entries.get(domain).is_some_and(|r| r.is_expired(now)) {
            entries.remove(domain);
        }
        None
    }

    /// Store `values` in the `rtype` slot of `domain`'s record.
    ///
    /// Creates the record (expiring at `now + ttl`) when it is missing or
    /// expired. An unexpired record keeps its other slots and its original
    /// expiry. Empty `values` are never stored; `None` is returned and the
    /// cache is left untouched.
    pub fn merge(
        &self,
        domain: &str,
        rtype: RecordType,
        values: Vec<String>,
        now: Instant,
    ) -> Option<Record> {
        if values.is_empty() {
            return None;
        }

        let Ok(mut entries) = self.entries.write() else {
            return None;
        };

        let live = entries.get(domain).is_some_and(|r| !r.is_expired(now));
        if !live {
            entries.insert(domain.to_string(), Record::new(now + self.ttl));
        }
        let record = entries.get_mut(domain)?;
        record.set(rtype, values);
        Some(record.clone())
    }

    /// Remove every record that has expired as of `now`.
    ///
    /// Returns the number of records removed.
    pub fn sweep(&self, now: Instant) -> usize {
        let Ok(mut entries) = self.entries.write() else {
            return 0;
        };
        let before = entries.len();
        entries.retain(|_, record| !record.is_expired(now));
        before - entries.len()
    }

    pub fn contains(&self, domain: &str) -> bool {
        self.entries
            .read()
            .map(|e| e.contains_key(domain))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
