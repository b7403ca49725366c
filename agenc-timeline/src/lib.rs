//! AgenC Timeline - Event Storage Collaborator and Backfill
//!
//! The key-ordered [`store`] holds projected timeline events behind one
//! pluggable trait with retention policies; [`backfill`] drives raw event
//! pages from an external source through projection into the store,
//! resumable by persisted cursor.

pub mod backfill;
pub mod store;

pub use backfill::{
    BackfillEngine, BackfillStats, CursorStore, EventPage, EventPageSource, InMemoryCursorStore,
};
pub use store::{
    AppendOutcome, InMemoryTimelineStore, RetentionPolicy, StoreKey, TimelineStore,
};
