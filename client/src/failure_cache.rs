//! Bounded set of task ids that reported a compile failure.

use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

pub const DEFAULT_CAPACITY: usize = 16;

/// Fixed-capacity set with first-in-first-out eviction.
///
/// Lookups do not refresh an entry, and re-inserting a member keeps its
/// original position.
#[derive(Debug)]
pub struct FailureCache {
    capacity: usize,
    inner: Mutex<Entries>,
}

#[derive(Debug, Default)]
struct Entries {
    order: VecDeque<String>,
    members: HashSet<String>,
}

impl FailureCache {
    /// A zero capacity is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(Entries::default()),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Insert `id`, returning the member evicted to make room, if any.
    pub fn insert(&self, id: impl Into<String>) -> Option<String> {
        let id = id.into();
        let mut entries = self.entries();
        if entries.members.contains(&id) {
            return None;
        }

        let evicted = if entries.order.len() >= self.capacity {
            let oldest = entries.order.pop_front();
            if let Some(oldest) = &oldest {
                entries.members.remove(oldest);
            }
            oldest
        } else {
            None
        };

        entries.members.insert(id.clone());
        entries.order.push_back(id);
        evicted
    }

    pub fn extend<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for id in ids {
            if let Some(evicted) = self.insert(id) {
                tracing::trace!(%evicted, "Evicted failed task");
            }
        }
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.entries().members.contains(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> MutexGuard<'_, Entries> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for FailureCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
