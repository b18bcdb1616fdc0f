//! Ordered, deduplicated, delayable task queue
//!
//! Items are dispatched in descending priority; equal priorities keep
//! insertion order. A push whose dedupe key is already queued is a no-op, and
//! an item is never handed out before its `not_before` time.

use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

/// Something that can live in a [`TaskQueue`]
pub trait QueueItem {
    /// Key that must be unique within the queue at any instant
    fn dedupe_key(&self) -> &str;

    /// Higher is dispatched sooner
    fn priority(&self) -> i64;

    fn not_before(&self) -> Option<DateTime<Utc>>;

    /// Tenant the item belongs to, for org-scoped size introspection
    fn org_id(&self) -> Option<&str> {
        None
    }
}

/// Priority queue with dedupe, `not_before` delays and per-org counts
#[derive(Debug)]
pub struct TaskQueue<T> {
    entries: BTreeMap<(Reverse<i64>, u64), T>,
    keys: HashSet<String>,
    org_counts: HashMap<String, usize>,
    next_seq: u64,
}

impl<T> Default for TaskQueue<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            keys: HashSet::new(),
            org_counts: HashMap::new(),
            next_seq: 0,
        }
    }
}

impl<T: QueueItem> TaskQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an item; returns false (and drops it) on a dedupe collision
    pub fn push(&mut self, item: T) -> bool {
        if self.keys.contains(item.dedupe_key()) {
            return false;
        }

        self.keys.insert(item.dedupe_key().to_string());
        if let Some(org) = item.org_id() {
            *self.org_counts.entry(org.to_string()).or_insert(0) += 1;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert((Reverse(item.priority()), seq), item);
        true
    }

    /// Removes and returns the highest-priority item that is ready at `now`
    pub fn pop_ready(&mut self, now: DateTime<Utc>) -> Option<T> {
        let slot = self
            .entries
            .iter()
            .find(|(_, item)| item.not_before().map_or(true, |nb| nb <= now))
            .map(|(slot, _)| *slot)?;

        let item = self.entries.remove(&slot)?;
        self.forget(&item);
        Some(item)
    }

    /// Earliest `not_before` among queued items, if any item is delayed
    pub fn next_not_before(&self) -> Option<DateTime<Utc>> {
        self.entries
            .values()
            .filter_map(|item| item.not_before())
            .min()
    }

    fn forget(&mut self, item: &T) {
        self.keys.remove(item.dedupe_key());
        if let Some(org) = item.org_id() {
            if let Some(count) = self.org_counts.get_mut(org) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    self.org_counts.remove(org);
                }
            }
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of queued items, optionally restricted to one org
    pub fn size(&self, org_id: Option<&str>) -> usize {
        match org_id {
            Some(org) => self.org_counts.get(org).copied().unwrap_or(0),
            None => self.entries.len(),
        }
    }

    /// Queued items in dispatch order (ignoring `not_before`)
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.values()
    }
}

/// A [`TaskQueue`] shared between threads behind a single mutex
#[derive(Debug)]
pub struct SharedTaskQueue<T> {
    inner: Arc<Mutex<TaskQueue<T>>>,
}

impl<T> Clone for SharedTaskQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: QueueItem> Default for SharedTaskQueue<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(TaskQueue::new())),
        }
    }
}

impl<T: QueueItem> SharedTaskQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut TaskQueue<T>) -> R) -> R {
        let mut queue = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut queue)
    }

    pub fn push(&self, item: T) -> bool {
        self.with(|q| q.push(item))
    }

    pub fn pop_ready(&self, now: DateTime<Utc>) -> Option<T> {
        self.with(|q| q.pop_ready(now))
    }

    pub fn next_not_before(&self) -> Option<DateTime<Utc>> {
        self.with(|q| q.next_not_before())
    }

    pub fn len(&self) -> usize {
        self.with(|q| q.len())
    }

    pub fn is_empty(&self) -> bool {
        self.with(|q| q.is_empty())
    }

    pub fn size(&self, org_id: Option<&str>) -> usize {
        self.with(|q| q.size(org_id))
    }
}
