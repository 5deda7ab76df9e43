//! Snapshot cache with a fixed TTL
//!
//! The slot holds at most one serialized snapshot. Readers clone the `Arc`
//! under a short std mutex and copy the bytes after releasing it, so the
//! lock is never held across I/O and a reader sees either the previous or
//! the new entry, never a mix.
//!
//! Refreshes are serialized by an async gate. A request that finds the
//! entry stale waits for the gate, then checks freshness again: if another
//! request refreshed in the meantime it is served from that result, so a
//! burst of misses costs one upstream round.
//!
//! A failed refresh leaves the slot untouched. Once populated, the slot is
//! only ever replaced by a newer entry.

use crate::aggregator::Aggregator;
use crate::context::RequestContext;
use crate::error::Result;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

struct CacheEntry {
    bytes: Vec<u8>,
    captured_at: Instant,
}

/// Bytes handed to one caller, plus freshness information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedSnapshot {
    /// Private copy of the cached bytes
    pub bytes: Vec<u8>,
    /// Time since the snapshot was captured
    pub age: Duration,
    /// Time left before the snapshot goes stale
    pub fresh_for: Duration,
    /// `false` when this call performed the refresh
    pub from_cache: bool,
}

pub struct SnapshotCache {
    aggregator: Aggregator,
    ttl: Duration,
    slot: Mutex<Option<Arc<CacheEntry>>>,
    refresh_gate: tokio::sync::Mutex<()>,
}

impl SnapshotCache {
    pub fn new(aggregator: Aggregator, ttl: Duration) -> Self {
        Self {
            aggregator,
            ttl,
            slot: Mutex::new(None),
            refresh_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// `true` once a refresh has succeeded
    pub fn is_populated(&self) -> bool {
        self.current().is_some()
    }

    fn current(&self) -> Option<Arc<CacheEntry>> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn fresh_entry(&self) -> Option<Arc<CacheEntry>> {
        self.current()
            .filter(|entry| entry.captured_at.elapsed() < self.ttl)
    }

    fn serve(&self, entry: &CacheEntry, from_cache: bool) -> CachedSnapshot {
        let age = entry.captured_at.elapsed();
        CachedSnapshot {
            bytes: entry.bytes.clone(),
            age,
            fresh_for: self.ttl.saturating_sub(age),
            from_cache,
        }
    }

    /// Returns the cached snapshot while fresh, otherwise refreshes it
    ///
    /// Refresh errors are returned to this caller only; the next call past
    /// the TTL tries again.
    pub async fn get_or_refresh(&self, ctx: &RequestContext) -> Result<CachedSnapshot> {
        if let Some(entry) = self.fresh_entry() {
            return Ok(self.serve(&entry, true));
        }

        let _gate = ctx.run(async { Ok(self.refresh_gate.lock().await) }).await?;

        if let Some(entry) = self.fresh_entry() {
            debug!("Snapshot refreshed by a concurrent request");
            return Ok(self.serve(&entry, true));
        }

        info!(
            budget_ms = ctx.remaining().as_millis() as u64,
            "Snapshot missing or stale, refreshing from Spotify"
        );
        let bytes = match self.aggregator.serialized_snapshot(ctx).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(stale_kept = self.is_populated(), "Snapshot refresh failed: {}", e);
                return Err(e);
            }
        };

        let entry = Arc::new(CacheEntry {
            bytes,
            captured_at: Instant::now(),
        });
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(entry.clone());
        info!(bytes = entry.bytes.len(), "Snapshot cached");

        Ok(self.serve(&entry, false))
    }
}
