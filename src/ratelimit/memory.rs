//! In-process counter store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use super::store::CounterBackend;
use crate::error::Result;

#[derive(Debug, Clone, Copy)]
struct Entry {
    count: u64,
    /// `None` when the time-to-live is too large to represent as an instant.
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Counter store held in a concurrent map.
///
/// Only counts requests seen by this process, so it suits tests and single-instance
/// deployments. The map shard lock held by `entry` makes expiry check, increment and
/// first-touch expiry one critical section per key.
#[derive(Debug, Default)]
pub struct InMemoryCounterStore {
    counters: DashMap<String, Entry>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of counters currently held, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Time left before `key` expires, or `None` if it is absent or already expired.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let entry = self.counters.get(key)?;
        let now = Instant::now();
        if entry.is_expired(now) {
            return None;
        }
        entry.expires_at.map(|at| at.saturating_duration_since(now))
    }

    /// Drop expired counters. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.counters.len();
        self.counters.retain(|_, entry| !entry.is_expired(now));
        let removed = before.saturating_sub(self.counters.len());
        if removed > 0 {
            debug!(removed = removed, "Purged expired counters");
        }
        removed
    }

    /// Purge expired counters every `every` until the store is dropped.
    pub fn spawn_purger(store: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let store = Arc::downgrade(store);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match store.upgrade() {
                    Some(store) => {
                        store.purge_expired();
                    }
                    None => break,
                }
            }
        })
    }
}

#[async_trait]
impl CounterBackend for InMemoryCounterStore {
    async fn increment(&self, key: &str, ttl_secs: u64) -> Result<u64> {
        let now = Instant::now();
        let mut entry = self.counters.entry(key.to_string()).or_insert(Entry {
            count: 0,
            expires_at: Some(now),
        });

        // An expired counter behaves as if the key were absent.
        if entry.is_expired(now) {
            entry.count = 0;
        }

        entry.count += 1;
        if entry.count == 1 {
            entry.expires_at = now.checked_add(Duration::from_secs(ttl_secs));
        }

        Ok(entry.count)
    }
}
