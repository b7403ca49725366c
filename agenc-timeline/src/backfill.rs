//! Resumable backfill from an external event source.
//!
//! The engine persists the last-processed cursor after every page, so a
//! crash between pages resumes exactly where it left off and never
//! reprocesses past events. Duplicate events (same slot, signature, event
//! type) are detected and counted but not re-inserted, so an interrupted
//! run converges to the same stored record set as an uninterrupted one.

use std::sync::RwLock;

use agenc_core::{AgencResult, RawEventRecord, StorageError};
use agenc_trace::{project, ProjectionOptions};

use crate::store::{AppendOutcome, TimelineStore};

// ============================================================================
// COLLABORATOR TRAITS
// ============================================================================

/// One page of raw events from the external source.
#[derive(Debug, Clone)]
pub struct EventPage {
    pub events: Vec<RawEventRecord>,
    pub next_cursor: Option<String>,
    pub done: bool,
}

/// External event-page source (network RPC in production).
///
/// Retries, if any, belong to the implementation; the backfill engine
/// expects a consistent snapshot per call.
pub trait EventPageSource {
    fn fetch_page(
        &mut self,
        cursor: Option<&str>,
        to_slot: u64,
        page_size: usize,
    ) -> AgencResult<EventPage>;
}

/// Durable cursor persistence.
pub trait CursorStore: Send + Sync {
    fn load(&self) -> AgencResult<Option<String>>;
    fn save(&self, cursor: &str) -> AgencResult<()>;
}

/// In-memory cursor store for tests and single-process runs.
#[derive(Debug, Default)]
pub struct InMemoryCursorStore {
    cursor: RwLock<Option<String>>,
}

impl InMemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CursorStore for InMemoryCursorStore {
    fn load(&self) -> AgencResult<Option<String>> {
        Ok(self
            .cursor
            .read()
            .map_err(|_| StorageError::LockPoisoned)?
            .clone())
    }

    fn save(&self, cursor: &str) -> AgencResult<()> {
        *self.cursor.write().map_err(|_| StorageError::LockPoisoned)? = Some(cursor.to_string());
        Ok(())
    }
}

// ============================================================================
// BACKFILL ENGINE
// ============================================================================

/// Counters for one backfill run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillStats {
    pub pages: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub unknown_events: usize,
}

/// Drives pages from a source through projection into the store.
pub struct BackfillEngine<'a, S: TimelineStore, C: CursorStore> {
    store: &'a S,
    cursors: &'a C,
    projection: ProjectionOptions,
}

impl<'a, S: TimelineStore, C: CursorStore> BackfillEngine<'a, S, C> {
    pub fn new(store: &'a S, cursors: &'a C, projection: ProjectionOptions) -> Self {
        Self {
            store,
            cursors,
            projection,
        }
    }

    /// Process pages up to `to_slot`, resuming from the persisted cursor.
    ///
    /// `max_pages` bounds one invocation (`None` runs to completion);
    /// partial runs leave a cursor behind and are resumed by calling `run`
    /// again.
    pub fn run(
        &self,
        source: &mut dyn EventPageSource,
        to_slot: u64,
        page_size: usize,
        max_pages: Option<usize>,
    ) -> AgencResult<BackfillStats> {
        let mut stats = BackfillStats::default();
        let mut cursor = self.cursors.load()?;

        loop {
            if let Some(limit) = max_pages {
                if stats.pages >= limit {
                    break;
                }
            }
            let page = source.fetch_page(cursor.as_deref(), to_slot, page_size)?;
            stats.pages += 1;

            let result = project(&page.events, &self.projection);
            stats.unknown_events += result.telemetry.unknown_events;
            for event in result.events {
                match self.store.append(event)? {
                    AppendOutcome::Inserted => stats.inserted += 1,
                    AppendOutcome::Duplicate => stats.duplicates += 1,
                }
            }

            if let Some(next) = &page.next_cursor {
                self.cursors.save(next)?;
            }
            cursor = page.next_cursor;
            if page.done {
                break;
            }
        }

        Ok(stats)
    }
}

// =============================================================================
// TESTS
// =============================================================================
