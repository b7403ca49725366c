//! Key-ordered timeline event store.
//!
//! The engine treats storage as pluggable behind one trait: an append/query
//! interface over `ProjectedTimelineEvent` records with retention policies
//! and range queries. The in-memory implementation is the reference;
//! persistent backends implement the same contract.

use std::collections::BTreeMap;
use std::sync::RwLock;

use agenc_core::{AgencResult, ProjectedTimelineEvent, StorageError, TimelineEventKind};

// ============================================================================
// RETENTION
// ============================================================================

/// Retention limits applied on demand.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetentionPolicy {
    /// Drop events older than this, relative to the supplied `now_ms`.
    pub ttl_ms: Option<i64>,
    /// Keep at most this many events per task/dispute entity (newest win).
    pub max_events_per_entity: Option<usize>,
    /// Keep at most this many events overall (newest win).
    pub max_events_total: Option<usize>,
}

/// Outcome of one append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Inserted,
    /// Same `(slot, signature, event type)` already stored.
    Duplicate,
}

// ============================================================================
// STORE TRAIT
// ============================================================================

/// Storage key: slot-major ordering, then signature, then event type.
pub type StoreKey = (u64, String, TimelineEventKind);

/// Key-ordered append/query interface over projected timeline events.
pub trait TimelineStore: Send + Sync {
    /// Append one event; duplicates are detected, not re-inserted.
    fn append(&self, event: ProjectedTimelineEvent) -> AgencResult<AppendOutcome>;

    /// All events with `from_slot <= slot <= to_slot`, in key order.
    fn query_slot_range(&self, from_slot: u64, to_slot: u64)
        -> AgencResult<Vec<ProjectedTimelineEvent>>;

    /// All events with `from_ms <= timestamp_ms <= to_ms`, in key order.
    fn query_time_range(&self, from_ms: i64, to_ms: i64)
        -> AgencResult<Vec<ProjectedTimelineEvent>>;

    /// All events owned by the given task/dispute entity, in key order.
    fn query_entity(&self, entity_pda: &str) -> AgencResult<Vec<ProjectedTimelineEvent>>;

    /// Total stored events.
    fn len(&self) -> AgencResult<usize>;

    fn is_empty(&self) -> AgencResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Apply retention limits; returns the number of evicted events.
    fn apply_retention(&self, policy: &RetentionPolicy, now_ms: i64) -> AgencResult<usize>;
}

// ============================================================================
// IN-MEMORY IMPLEMENTATION
// ============================================================================

/// BTreeMap-backed reference store.
#[derive(Debug, Default)]
pub struct InMemoryTimelineStore {
    events: RwLock<BTreeMap<StoreKey, ProjectedTimelineEvent>>,
}

impl InMemoryTimelineStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TimelineStore for InMemoryTimelineStore {
    fn append(&self, event: ProjectedTimelineEvent) -> AgencResult<AppendOutcome> {
        let mut events = self.events.write().map_err(|_| StorageError::LockPoisoned)?;
        let key = event.dedup_key();
        if events.contains_key(&key) {
            return Ok(AppendOutcome::Duplicate);
        }
        events.insert(key, event);
        Ok(AppendOutcome::Inserted)
    }

    fn query_slot_range(
        &self,
        from_slot: u64,
        to_slot: u64,
    ) -> AgencResult<Vec<ProjectedTimelineEvent>> {
        let events = self.events.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(events
            .values()
            .filter(|e| e.slot >= from_slot && e.slot <= to_slot)
            .cloned()
            .collect())
    }

    fn query_time_range(&self, from_ms: i64, to_ms: i64) -> AgencResult<Vec<ProjectedTimelineEvent>> {
        let events = self.events.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(events
            .values()
            .filter(|e| e.timestamp_ms >= from_ms && e.timestamp_ms <= to_ms)
            .cloned()
            .collect())
    }

    fn query_entity(&self, entity_pda: &str) -> AgencResult<Vec<ProjectedTimelineEvent>> {
        let events = self.events.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(events
            .values()
            .filter(|e| e.payload.entity_pda() == entity_pda)
            .cloned()
            .collect())
    }

    fn len(&self) -> AgencResult<usize> {
        let events = self.events.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(events.len())
    }

    fn apply_retention(&self, policy: &RetentionPolicy, now_ms: i64) -> AgencResult<usize> {
        let mut events = self.events.write().map_err(|_| StorageError::LockPoisoned)?;
        let before = events.len();

        if let Some(ttl_ms) = policy.ttl_ms {
            let cutoff = now_ms - ttl_ms;
            events.retain(|_, e| e.timestamp_ms >= cutoff);
        }

        if let Some(max_per_entity) = policy.max_events_per_entity {
            let mut keep_counts: BTreeMap<String, usize> = BTreeMap::new();
            let mut evict: Vec<StoreKey> = Vec::new();
            // Newest first: iterate keys in reverse slot order.
            for (key, event) in events.iter().rev() {
                let count = keep_counts
                    .entry(event.payload.entity_pda().clone())
                    .or_insert(0);
                *count += 1;
                if *count > max_per_entity {
                    evict.push(key.clone());
                }
            }
            for key in evict {
                events.remove(&key);
            }
        }

        if let Some(max_total) = policy.max_events_total {
            while events.len() > max_total {
                // Oldest key is first in slot-major order.
                let oldest = events.keys().next().cloned();
                match oldest {
                    Some(key) => {
                        events.remove(&key);
                    }
                    None => break,
                }
            }
        }

        Ok(before - events.len())
    }
}

// =============================================================================
// TESTS
// =============================================================================
