//! Short-lived memoization of resolved resource chains
//!
//! Entries are keyed by block id and expire after a fixed TTL. Writes to
//! components or ores do not invalidate dependent blocks, so a chain may be
//! stale for at most one TTL window. Expired entries are dropped when looked
//! up and whenever a miss stores a fresh chain.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::calculator::ResourceChain;
use crate::error::Result;
use crate::models::BlockId;

pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug)]
struct CachedChain {
    chain: ResourceChain,
    expires_at: Instant,
}

/// Per-engine cache; not shared between engine instances
#[derive(Debug)]
pub struct ResolutionCache {
    ttl: Duration,
    entries: Mutex<HashMap<BlockId, CachedChain>>,
}

impl Default for ResolutionCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl ResolutionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<BlockId, CachedChain>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cached chain for `block_id`, or the result of `compute`.
    ///
    /// The lock is not held while computing. Failures are returned as-is and
    /// never cached.
    pub fn get_or_compute<F>(&self, block_id: BlockId, compute: F) -> Result<ResourceChain>
    where
        F: FnOnce() -> Result<ResourceChain>,
    {
        self.get_or_compute_at(block_id, Instant::now(), compute)
    }

    pub(crate) fn get_or_compute_at<F>(
        &self,
        block_id: BlockId,
        now: Instant,
        compute: F,
    ) -> Result<ResourceChain>
    where
        F: FnOnce() -> Result<ResourceChain>,
    {
        if let Some(chain) = self.get_at(&block_id, now) {
            debug!(block = %block_id, "resource chain cache hit");
            return Ok(chain);
        }

        let chain = compute()?;
        let mut entries = self.entries();
        let evicted = evict_expired(&mut entries, now);
        if evicted > 0 {
            debug!(evicted, "dropped expired resource chains");
        }
        entries.insert(
            block_id,
            CachedChain {
                chain: chain.clone(),
                expires_at: now + self.ttl,
            },
        );
        Ok(chain)
    }

    pub fn get(&self, block_id: &BlockId) -> Option<ResourceChain> {
        self.get_at(block_id, Instant::now())
    }

    fn get_at(&self, block_id: &BlockId, now: Instant) -> Option<ResourceChain> {
        let mut entries = self.entries();
        match entries.get(block_id) {
            Some(entry) if now < entry.expires_at => Some(entry.chain.clone()),
            Some(_) => {
                entries.remove(block_id);
                None
            }
            None => None,
        }
    }

    /// Drop one block's entry; returns whether there was one
    pub fn invalidate(&self, block_id: &BlockId) -> bool {
        self.entries().remove(block_id).is_some()
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    /// Evict every expired entry; returns how many were dropped
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    fn purge_expired_at(&self, now: Instant) -> usize {
        evict_expired(&mut self.entries(), now)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn evict_expired(entries: &mut HashMap<BlockId, CachedChain>, now: Instant) -> usize {
    let before = entries.len();
    entries.retain(|_, entry| now < entry.expires_at);
    before - entries.len()
}
