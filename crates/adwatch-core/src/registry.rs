use std::collections::HashSet;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Concurrently-safe ordered set of target URLs.
///
/// Insertion order is iteration order. Adding a URL that is already
/// registered is a no-op, so callers never have to check membership first.
/// A target added while a scheduling cycle is in progress becomes visible
/// no later than the next tick.
pub struct TargetRegistry {
    inner: RwLock<Inner>,
    /// Live count, readable on the tick hot path without taking the lock.
    len: AtomicUsize,
}

struct Inner {
    targets: Vec<String>,
    seen: HashSet<String>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                targets: Vec::new(),
                seen: HashSet::new(),
            }),
            len: AtomicUsize::new(0),
        }
    }

    /// Insert a target if absent. Returns true when it was newly added.
    pub fn add(&self, url: &str) -> bool {
        let mut inner = self.inner.write().unwrap();
        if !inner.seen.insert(url.to_string()) {
            return false;
        }
        inner.targets.push(url.to_string());
        self.len.store(inner.targets.len(), Ordering::Release);
        true
    }

    /// Current number of registered targets.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The target at `index` in insertion order.
    pub fn get(&self, index: usize) -> Option<String> {
        self.inner.read().unwrap().targets.get(index).cloned()
    }
}

impl Default for TargetRegistry {
    fn default() -> Self {
        Self::new()
    }
}
