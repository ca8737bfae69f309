//! Process-local TTL cache for resolved permission sets.
//!
//! One entry per user id, aged against an injected [`Clock`] so tests can
//! move time without sleeping. An entry at or past the TTL is treated as
//! absent; nothing sweeps stale entries, they linger until the next insert
//! for that user overwrites them or the process restarts. Writes are
//! idempotent overwrites, so two concurrent cold resolutions for the same
//! user may both insert — last write wins and both results are identical.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::debug;

/// Default entry lifetime: 5 minutes.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Time source for cache aging. Injected so the composition root owns it.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall-clock time via `Instant::now`.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant { Instant::now() }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    permissions: HashSet<String>,
    computed_at: Instant,
}

/// TTL-bounded memoization of effective permission sets, keyed by user id.
pub struct PermissionCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl PermissionCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { entries: RwLock::new(HashMap::new()), ttl, clock }
    }

    /// Cache with the default 5-minute TTL on the system clock.
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_TTL, Arc::new(SystemClock))
    }

    pub fn ttl(&self) -> Duration { self.ttl }

    /// Fresh entry for the user, or `None` when absent or aged out.
    pub fn get(&self, user_id: &str) -> Option<HashSet<String>> {
        let map = self.entries.read();
        let entry = map.get(user_id)?;
        if self.clock.now().duration_since(entry.computed_at) < self.ttl {
            Some(entry.permissions.clone())
        } else {
            None
        }
    }

    /// Store a fully resolved set. Only complete resolutions are ever
    /// inserted; a cancelled resolution never reaches this point.
    pub fn insert(&self, user_id: &str, permissions: HashSet<String>) {
        let entry = CacheEntry { permissions, computed_at: self.clock.now() };
        self.entries.write().insert(user_id.to_string(), entry);
    }

    /// Drop the entry for one user. No-op when absent.
    pub fn invalidate(&self, user_id: &str) {
        if self.entries.write().remove(user_id).is_some() {
            debug!(target: "warden::cache", "invalidate user={}", user_id);
        }
    }

    /// Drop every entry. Used after structural changes whose blast radius
    /// is not tracked per user.
    pub fn invalidate_all(&self) {
        let mut map = self.entries.write();
        let n = map.len();
        map.clear();
        debug!(target: "warden::cache", "invalidate_all dropped={}", n);
    }

    /// Number of entries currently held, stale ones included.
    pub fn len(&self) -> usize { self.entries.read().len() }

    pub fn is_empty(&self) -> bool { self.entries.read().is_empty() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Manually advanced clock for TTL tests.
    struct ManualClock {
        start: Instant,
        offset: Mutex<Duration>,
    }

    impl ManualClock {
        fn new() -> Self {
            Self { start: Instant::now(), offset: Mutex::new(Duration::ZERO) }
        }

        fn advance(&self, by: Duration) {
            *self.offset.lock() += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant { self.start + *self.offset.lock() }
    }

    fn set(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn hit_within_ttl_miss_after() {
        let clock = Arc::new(ManualClock::new());
        let cache = PermissionCache::new(Duration::from_secs(300), clock.clone());
        cache.insert("u1", set(&["users:read"]));

        clock.advance(Duration::from_secs(299));
        assert_eq!(cache.get("u1"), Some(set(&["users:read"])));

        clock.advance(Duration::from_secs(2));
        assert_eq!(cache.get("u1"), None);
        // entry lingers even though it is logically absent
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn invalidate_is_idempotent() {
        let cache = PermissionCache::with_defaults();
        cache.insert("u1", set(&["a:b"]));
        cache.invalidate("u1");
        cache.invalidate("u1");
        assert!(cache.get("u1").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn invalidate_all_clears_every_entry() {
        let cache = PermissionCache::with_defaults();
        cache.insert("u1", set(&["a:b"]));
        cache.insert("u2", set(&["c:d"]));
        cache.invalidate_all();
        assert!(cache.get("u1").is_none());
        assert!(cache.get("u2").is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn insert_overwrites_previous_entry() {
        let cache = PermissionCache::with_defaults();
        cache.insert("u1", set(&["a:b"]));
        cache.insert("u1", set(&["c:d"]));
        assert_eq!(cache.get("u1"), Some(set(&["c:d"])));
        assert_eq!(cache.len(), 1);
    }
}
