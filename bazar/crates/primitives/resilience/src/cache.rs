use crate::clock::{Clock, SystemClock};
use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Concurrent keyed cache where every entry lives for a fixed TTL.
///
/// Writes are last-write-wins. Expired entries are evicted lazily on read.
#[derive(Debug)]
pub struct TtlCache<K: Eq + Hash, V> {
    entries: DashMap<K, Entry<V>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { entries: DashMap::new(), ttl, clock }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Some(entry.value.clone());
            }
        }
        self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        None
    }

    /// Inserts or replaces the entry and returns its expiry.
    pub fn set(&self, key: K, value: V) -> Instant {
        let expires_at = self.clock.now() + self.ttl;
        self.entries.insert(key, Entry { value, expires_at });
        expires_at
    }

    pub fn expires_at(&self, key: &K) -> Option<Instant> {
        self.entries.get(key).map(|entry| entry.expires_at)
    }

    pub fn invalidate(&self, key: &K) {
        self.entries.remove(key);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn cache(ttl: Duration) -> (TtlCache<&'static str, u32>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (TtlCache::with_clock(ttl, clock.clone()), clock)
    }

    #[test]
    fn entry_is_served_until_ttl_elapses() {
        let (cache, clock) = cache(Duration::from_secs(300));
        cache.set("gateway", 7);

        clock.advance(Duration::from_secs(299));
        assert_eq!(cache.get(&"gateway"), Some(7));

        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get(&"gateway"), None);
        assert!(cache.expires_at(&"gateway").is_none(), "expired entry should be evicted on read");
    }

    #[test]
    fn set_refreshes_expiry() {
        let (cache, clock) = cache(Duration::from_secs(10));
        cache.set("k", 1);
        clock.advance(Duration::from_secs(8));
        cache.set("k", 2);
        clock.advance(Duration::from_secs(8));
        assert_eq!(cache.get(&"k"), Some(2));
    }

    #[test]
    fn invalidate_drops_entry() {
        let (cache, _clock) = cache(Duration::from_secs(10));
        cache.set("k", 1);
        cache.invalidate(&"k");
        assert_eq!(cache.get(&"k"), None);
    }
}
