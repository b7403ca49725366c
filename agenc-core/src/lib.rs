//! AgenC Core - Replay Data Model
//!
//! Pure data structures and deterministic primitives with no behavior
//! beyond validation. All other crates depend on this. The replay, mutation
//! and evidence pipelines are built entirely from the types defined here:
//! same inputs, byte-identical hashes, on every host.

pub mod anomaly;
pub mod canonical;
pub mod error;
pub mod event;
pub mod rng;
pub mod sink;
pub mod state;

pub use anomaly::{Anomaly, AnomalyCode, AnomalySeverity};
pub use canonical::{
    canonical_json, compute_content_hash, derive_short_id, hash_canonical,
    hash_to_unit_interval, sha256_hex, stable_stringify, ContentHash,
};
pub use error::{AgencError, AgencResult, ParseError, StorageError, ValidationError};
pub use event::{
    DisputeOutcome, DisputePda, EventPayload, ProjectedTimelineEvent, Pubkey, RawEventRecord,
    TaskPda, TimelineEventKind, TraceContext, TrajectoryEvent, TrajectoryTrace,
    PROJECTION_HASH_EXCLUDED_FIELDS, PROJECTION_HASH_INCLUDED_FIELDS, TRACE_SCHEMA_VERSION,
};
pub use rng::SeededRng;
pub use sink::{AlertDispatcher, MetricsSink, NoopMetricsSink};
pub use state::{
    AppliedTransition, ComparisonStatus, DisputePhase, DisputeState, ReplayComparisonReport,
    ReplayResult, ReplaySideSummary, ReplaySummary, TaskPhase, TaskState, VerdictRecord,
};
