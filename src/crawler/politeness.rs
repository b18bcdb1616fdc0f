//! Per-host politeness and the worker's bounded "seen" set

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Tracks the last fetch per host and spaces fetches to the same host
///
/// `reserve` claims the next free slot for a host and returns how long the
/// caller must sleep before fetching, so concurrent loops never share a slot.
#[derive(Debug)]
pub struct HostPacer {
    delay: Duration,
    slots: Mutex<HostSlots>,
}

/// Host count that triggers the first sweep of expired slots
const PRUNE_MIN: usize = 1024;

#[derive(Debug, Clone, Copy)]
struct Slot {
    at: Instant,
    spacing: Duration,
}

impl Slot {
    /// A slot whose spacing has elapsed paces nothing
    fn expired(&self, now: Instant) -> bool {
        self.at + self.spacing <= now
    }
}

#[derive(Debug)]
struct HostSlots {
    by_host: HashMap<String, Slot>,
    prune_at: usize,
}

impl HostSlots {
    /// Drops expired slots once the map reaches `prune_at`, then doubles the
    /// threshold over what is left so the sweep stays amortized
    fn prune(&mut self, now: Instant) {
        if self.by_host.len() < self.prune_at {
            return;
        }
        self.by_host.retain(|_, slot| !slot.expired(now));
        self.prune_at = (self.by_host.len() * 2).max(PRUNE_MIN);
    }
}

impl HostPacer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            slots: Mutex::new(HostSlots {
                by_host: HashMap::new(),
                prune_at: PRUNE_MIN,
            }),
        }
    }

    /// Hosts whose spacing may still delay a fetch
    pub fn tracked_hosts(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .by_host
            .len()
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Claims the next fetch slot for `host` and returns the wait until it
    ///
    /// `wait = max(0, last_fetch + delay - now)`, where `delay` is the larger
    /// of the configured per-host delay and `min_delay` (a robots.txt
    /// crawl delay, for example).
    pub fn reserve(&self, host: &str, min_delay: Option<Duration>) -> Duration {
        self.reserve_at(host, min_delay, Instant::now())
    }

    pub fn reserve_at(&self, host: &str, min_delay: Option<Duration>, now: Instant) -> Duration {
        let delay = min_delay.map_or(self.delay, |d| d.max(self.delay));
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.prune(now);

        let (at, spacing) = match slots.by_host.get(host) {
            Some(last) => ((last.at + delay).max(now), delay.max(last.spacing)),
            None => (now, delay),
        };
        slots.by_host.insert(host.to_string(), Slot { at, spacing });
        at - now
    }

    /// Records a finished fetch attempt, successful or not
    pub fn record(&self, host: &str) {
        self.record_at(host, Instant::now());
    }

    pub fn record_at(&self, host: &str, now: Instant) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let spacing = self.delay;
        let slot = slots
            .by_host
            .entry(host.to_string())
            .or_insert(Slot { at: now, spacing });
        slot.at = slot.at.max(now);
    }
}

/// Set of dedupe keys with FIFO eviction once `capacity` is reached
#[derive(Debug)]
pub struct SeenSet {
    capacity: usize,
    order: VecDeque<String>,
    members: HashSet<String>,
}

impl SeenSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            members: HashSet::new(),
        }
    }

    /// Inserts `key`; returns false if it was already present
    pub fn insert(&mut self, key: &str) -> bool {
        if self.members.contains(key) {
            return false;
        }

        while self.order.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.members.remove(&oldest);
                }
                None => break,
            }
        }

        self.order.push_back(key.to_string());
        self.members.insert(key.to_string());
        true
    }

    pub fn contains(&self, key: &str) -> bool {
        self.members.contains(key)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
