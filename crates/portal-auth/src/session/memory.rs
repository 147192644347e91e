//! In-process session backend for single-instance deployments and tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::AuthResult;
use crate::clock::{Clock, duration_ms};
use crate::session::SessionBackend;

/// Writes between two sweeps of expired entries.
const SWEEP_INTERVAL: u64 = 64;

#[derive(Debug, Clone)]
struct StoredValue {
    data: Vec<u8>,
    expires_at_ms: i64,
}

/// `DashMap`-backed session backend with clock-driven TTL.
///
/// Expired entries are dropped when read, and swept from the whole map every
/// [`SWEEP_INTERVAL`] writes.
#[derive(Debug)]
pub struct MemorySessionBackend {
    entries: DashMap<String, StoredValue>,
    writes: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl MemorySessionBackend {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            writes: AtomicU64::new(0),
            clock,
        }
    }

    /// Number of stored entries, including expired ones not yet observed.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every expired entry and returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_ms();
        let before = self.entries.len();
        self.entries.retain(|_, stored| now <= stored.expires_at_ms);
        let purged = before.saturating_sub(self.entries.len());
        if purged > 0 {
            tracing::debug!(purged, "Expired sessions swept");
        }
        purged
    }
}

#[async_trait]
impl SessionBackend for MemorySessionBackend {
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> AuthResult<()> {
        let expires_at_ms = self.clock.now_ms() + duration_ms(ttl);
        self.entries.insert(
            key.to_string(),
            StoredValue {
                data: value,
                expires_at_ms,
            },
        );
        if (self.writes.fetch_add(1, Ordering::Relaxed) + 1) % SWEEP_INTERVAL == 0 {
            self.purge_expired();
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> AuthResult<Option<Vec<u8>>> {
        let now = self.clock.now_ms();
        let Some(entry) = self.entries.get(key) else {
            return Ok(None);
        };
        if now > entry.expires_at_ms {
            drop(entry);
            self.entries.remove(key);
            return Ok(None);
        }
        Ok(Some(entry.data.clone()))
    }

    async fn delete(&self, key: &str) -> AuthResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn ping(&self) -> AuthResult<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
