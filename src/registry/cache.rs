//! Time-bounded cache for the community index.
//!
//! Snapshots are immutable: a refresh builds a new [`CommunityIndex`] and
//! swaps the `Arc`, so a reader holding an old snapshot never sees it change.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::types::CommunityIndex;

/// Source of the current time.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> Instant;
}

/// The monotonic system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug)]
struct CachedIndex {
    index: Arc<CommunityIndex>,
    fetched_at: Instant,
}

/// Holds at most one index snapshot and the time it was fetched.
#[derive(Debug)]
pub struct IndexCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entry: RwLock<Option<CachedIndex>>,
}

impl IndexCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entry: RwLock::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The snapshot, if one exists and is younger than the TTL.
    pub async fn fresh(&self) -> Option<Arc<CommunityIndex>> {
        let now = self.clock.now();
        self.entry
            .read()
            .await
            .as_ref()
            .filter(|cached| now.saturating_duration_since(cached.fetched_at) < self.ttl)
            .map(|cached| Arc::clone(&cached.index))
    }

    /// The snapshot regardless of age.
    pub async fn any(&self) -> Option<Arc<CommunityIndex>> {
        self.entry
            .read()
            .await
            .as_ref()
            .map(|cached| Arc::clone(&cached.index))
    }

    /// Replace the snapshot and restart the TTL window.
    pub async fn store(&self, index: CommunityIndex) -> Arc<CommunityIndex> {
        let index = Arc::new(index);
        *self.entry.write().await = Some(CachedIndex {
            index: Arc::clone(&index),
            fetched_at: self.clock.now(),
        });
        index
    }

    /// Time since the snapshot was fetched.
    pub async fn age(&self) -> Option<Duration> {
        let now = self.clock.now();
        self.entry
            .read()
            .await
            .as_ref()
            .map(|cached| now.saturating_duration_since(cached.fetched_at))
    }
}
