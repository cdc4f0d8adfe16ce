use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// TTL-gated visit cache.
///
/// Answers whether a target is due for another fetch. The TTL should reflect
/// the upstream cache lifetime, not the desired poll cadence: re-fetching a
/// page the upstream still serves from its own cache risks reading stale
/// content and firing a spurious "reverted" change event.
///
/// Eligibility is one-shot: a check that returns true removes the entry, and
/// the target stays eligible until [`VisitCache::set`] re-arms it after the
/// next fetch.
pub struct VisitCache {
    entries: RwLock<HashMap<String, Instant>>,
    ttl: Duration,
}

impl VisitCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Record a fresh fetch: the target goes cold for one TTL.
    /// Overwrites any existing entry.
    pub fn set(&self, url: &str) {
        let expires_at = Instant::now() + self.ttl;
        self.entries.write().unwrap().insert(url.to_string(), expires_at);
    }

    /// True when the target may be fetched now. Consumes the entry on grant.
    pub fn eligible(&self, url: &str) -> bool {
        {
            let entries = self.entries.read().unwrap();
            match entries.get(url) {
                None => return true,
                Some(expires_at) if Instant::now() < *expires_at => return false,
                Some(_) => {}
            }
        }
        self.entries.write().unwrap().remove(url);
        true
    }
}
