//! Block set of ad/tracking domains and its shared holder.
//!
//! A [`BlockSet`] is built in full by the compiler and then published through
//! a [`BlockSetHolder`]; it is never mutated after publication.

use rustc_hash::FxHashSet;
use std::sync::{Arc, RwLock};

/// A set of blocked domains with exact-match lookup.
#[derive(Debug, Default, Clone)]
pub struct BlockSet {
    domains: FxHashSet<Box<str>>,
}

impl BlockSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, domain: impl Into<Box<str>>) -> bool {
        self.domains.insert(domain.into())
    }

    pub fn remove(&mut self, domain: &str) -> bool {
        self.domains.remove(domain)
    }

    /// Check if a canonical domain is blocked.
    ///
    /// Matching is exact: blocking `example.com` does not block
    /// `ads.example.com`.
    pub fn contains(&self, domain: &str) -> bool {
        self.domains.contains(domain)
    }

    pub fn extend(&mut self, other: BlockSet) {
        self.domains.extend(other.domains);
    }

    /// Returns the number of domains in the set.
    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

impl<S: Into<Box<str>>> FromIterator<S> for BlockSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            domains: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// The currently published block set.
///
/// Readers clone the inner `Arc` under a shared lock and query it without
/// holding the lock. Publishing takes the exclusive lock only for the pointer
/// swap, so readers see either the whole old set or the whole new one.
#[derive(Debug, Default)]
pub struct BlockSetHolder {
    current: RwLock<Arc<BlockSet>>,
}

impl BlockSetHolder {
    pub fn new(initial: BlockSet) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    /// Snapshot of the published set.
    pub fn current(&self) -> Arc<BlockSet> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn contains(&self, domain: &str) -> bool {
        self.current().contains(domain)
    }

    /// Replace the published set, returning the previous one.
    pub fn publish(&self, set: BlockSet) -> Arc<BlockSet> {
        let next = Arc::new(set);
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::replace(&mut *guard, next)
    }

    pub fn len(&self) -> usize {
        self.current().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
