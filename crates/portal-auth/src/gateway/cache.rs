//! In-process TTL cache backing the identity gateways.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

use crate::clock::{Clock, duration_ms};

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at_ms: i64,
}

/// Key/value cache with a fixed TTL.
///
/// Entries are never evicted on read: an expired entry is still returned by
/// [`get_any`](Self::get_any) so callers can serve stale data when the
/// upstream is down. Writes replace the entry for a key wholesale.
#[derive(Debug)]
pub struct TtlCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> TtlCache<V> {
    /// Creates an empty cache.
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            clock,
        }
    }

    /// Returns the value for `key` if it was stored less than one TTL ago.
    pub fn get_fresh(&self, key: &str) -> Option<V> {
        let entry = self.entries.get(key)?;
        let age = self.clock.now_ms() - entry.stored_at_ms;
        (age < duration_ms(self.ttl)).then(|| entry.value.clone())
    }

    /// Returns the value for `key` regardless of its age.
    pub fn get_any(&self, key: &str) -> Option<V> {
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Stores `value` under `key`, resetting its age.
    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.entries.insert(
            key.into(),
            CacheEntry {
                value,
                stored_at_ms: self.clock.now_ms(),
            },
        );
    }

    /// Number of entries, fresh or stale.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn test_fresh_then_stale() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = TtlCache::new(Duration::from_secs(60), clock.clone());
        cache.insert("us:biometric:HS-1", 1);

        assert_eq!(cache.get_fresh("us:biometric:HS-1"), Some(1));

        clock.advance(Duration::from_secs(60));
        assert_eq!(cache.get_fresh("us:biometric:HS-1"), None);
        assert_eq!(cache.get_any("us:biometric:HS-1"), Some(1));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_insert_resets_age() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = TtlCache::new(Duration::from_secs(60), clock.clone());
        cache.insert("k", "old");

        clock.advance(Duration::from_secs(90));
        cache.insert("k", "new");
        assert_eq!(cache.get_fresh("k"), Some("new"));
    }
}
