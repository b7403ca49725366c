//! Lifecycle event model for the AgenC coordination protocol.
//!
//! Every consequential task/dispute lifecycle event is represented as a
//! tagged variant of [`EventPayload`] — a closed set. Unknown event names
//! are rejected at the projection boundary rather than passed through
//! untyped.
//!
//! Events are created once and never mutated. Traces are built
//! incrementally then frozen; re-serialization of a trace is byte-stable
//! (canonical key ordering via [`crate::canonical::stable_stringify`]).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canonical::{sha256_hex, stable_stringify};
use crate::error::{AgencResult, ParseError};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Base58-encoded account public key, as emitted by the on-chain program.
pub type Pubkey = String;

/// Program-derived address of a task account.
pub type TaskPda = Pubkey;

/// Program-derived address of a dispute account.
pub type DisputePda = Pubkey;

/// Current trace schema version. Readers must reject anything else.
pub const TRACE_SCHEMA_VERSION: u32 = 1;

// ============================================================================
// EVENT KINDS
// ============================================================================

/// Canonical lifecycle event kind.
///
/// Task lifecycle: `discovered → claimed → {verifier_verdict}* →
/// {completed | failed | cancelled}`.
/// Dispute lifecycle: `dispute_initiated → {dispute_voted}* →
/// {dispute_resolved | dispute_expired | dispute_cancelled}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineEventKind {
    Discovered,
    Claimed,
    VerifierVerdict,
    Completed,
    Failed,
    Cancelled,
    DisputeInitiated,
    DisputeVoted,
    DisputeResolved,
    DisputeExpired,
    DisputeCancelled,
}

impl TimelineEventKind {
    /// Stable snake_case name, used in correlation keys and hash input.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovered => "discovered",
            Self::Claimed => "claimed",
            Self::VerifierVerdict => "verifier_verdict",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::DisputeInitiated => "dispute_initiated",
            Self::DisputeVoted => "dispute_voted",
            Self::DisputeResolved => "dispute_resolved",
            Self::DisputeExpired => "dispute_expired",
            Self::DisputeCancelled => "dispute_cancelled",
        }
    }

    /// Whether this kind belongs to the dispute lifecycle.
    pub fn is_dispute(&self) -> bool {
        matches!(
            self,
            Self::DisputeInitiated
                | Self::DisputeVoted
                | Self::DisputeResolved
                | Self::DisputeExpired
                | Self::DisputeCancelled
        )
    }
}

impl std::fmt::Display for TimelineEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a dispute was resolved.
///
/// `NoVoteDefault` means no votes were cast and the dispute defaulted to
/// rejection — arbiter apathy, not active rejection. Consumers may treat
/// the two differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeOutcome {
    Rejected,
    Approved,
    NoVoteDefault,
}

impl DisputeOutcome {
    /// Decode the on-chain outcome code (0/1/2). Unknown codes fall back
    /// to `Rejected`, keeping the projector total.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => Self::Approved,
            2 => Self::NoVoteDefault,
            _ => Self::Rejected,
        }
    }
}

// ============================================================================
// EVENT PAYLOADS (closed set)
// ============================================================================

/// Semantic payload of a lifecycle event.
///
/// Payload fields carry only semantic content — wall-clock timestamps live
/// on the event envelope and are excluded from every hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    TaskCreated {
        task_pda: TaskPda,
        creator: Pubkey,
        required_capabilities: u64,
        reward_amount: u64,
        task_type: u8,
        max_workers: u8,
    },
    TaskClaimed {
        task_pda: TaskPda,
        worker: Pubkey,
        current_workers: u8,
        max_workers: u8,
    },
    VerifierVerdict {
        task_pda: TaskPda,
        verifier: Pubkey,
        approved: bool,
        proof_hash: String,
    },
    TaskCompleted {
        task_pda: TaskPda,
        worker: Pubkey,
        proof_hash: String,
        reward_paid: u64,
    },
    TaskFailed {
        task_pda: TaskPda,
        worker: Pubkey,
        reason_code: u8,
    },
    TaskCancelled {
        task_pda: TaskPda,
        creator: Pubkey,
        refund_amount: u64,
    },
    DisputeInitiated {
        dispute_pda: DisputePda,
        task_pda: TaskPda,
        initiator: Pubkey,
        defendant: Pubkey,
        resolution_type: u8,
        voting_deadline: i64,
    },
    DisputeVoteCast {
        dispute_pda: DisputePda,
        voter: Pubkey,
        approved: bool,
        votes_for: u64,
        votes_against: u64,
    },
    DisputeResolved {
        dispute_pda: DisputePda,
        outcome: DisputeOutcome,
        votes_for: u64,
        votes_against: u64,
    },
    DisputeExpired {
        dispute_pda: DisputePda,
        task_pda: TaskPda,
        refund_amount: u64,
        creator_amount: u64,
        worker_amount: u64,
    },
    DisputeCancelled {
        dispute_pda: DisputePda,
        task_pda: TaskPda,
        initiator: Pubkey,
    },
}

impl EventPayload {
    /// The canonical kind for this payload.
    pub fn kind(&self) -> TimelineEventKind {
        match self {
            Self::TaskCreated { .. } => TimelineEventKind::Discovered,
            Self::TaskClaimed { .. } => TimelineEventKind::Claimed,
            Self::VerifierVerdict { .. } => TimelineEventKind::VerifierVerdict,
            Self::TaskCompleted { .. } => TimelineEventKind::Completed,
            Self::TaskFailed { .. } => TimelineEventKind::Failed,
            Self::TaskCancelled { .. } => TimelineEventKind::Cancelled,
            Self::DisputeInitiated { .. } => TimelineEventKind::DisputeInitiated,
            Self::DisputeVoteCast { .. } => TimelineEventKind::DisputeVoted,
            Self::DisputeResolved { .. } => TimelineEventKind::DisputeResolved,
            Self::DisputeExpired { .. } => TimelineEventKind::DisputeExpired,
            Self::DisputeCancelled { .. } => TimelineEventKind::DisputeCancelled,
        }
    }

    /// The task this event belongs to, if any.
    pub fn task_pda(&self) -> Option<&TaskPda> {
        match self {
            Self::TaskCreated { task_pda, .. }
            | Self::TaskClaimed { task_pda, .. }
            | Self::VerifierVerdict { task_pda, .. }
            | Self::TaskCompleted { task_pda, .. }
            | Self::TaskFailed { task_pda, .. }
            | Self::TaskCancelled { task_pda, .. }
            | Self::DisputeInitiated { task_pda, .. }
            | Self::DisputeExpired { task_pda, .. }
            | Self::DisputeCancelled { task_pda, .. } => Some(task_pda),
            Self::DisputeVoteCast { .. } | Self::DisputeResolved { .. } => None,
        }
    }

    /// The dispute this event belongs to, if any.
    pub fn dispute_pda(&self) -> Option<&DisputePda> {
        match self {
            Self::DisputeInitiated { dispute_pda, .. }
            | Self::DisputeVoteCast { dispute_pda, .. }
            | Self::DisputeResolved { dispute_pda, .. }
            | Self::DisputeExpired { dispute_pda, .. }
            | Self::DisputeCancelled { dispute_pda, .. } => Some(dispute_pda),
            _ => None,
        }
    }

    /// The entity this event folds into during replay: the dispute PDA for
    /// dispute-lifecycle events, the task PDA otherwise.
    pub fn entity_pda(&self) -> &Pubkey {
        match self {
            Self::TaskCreated { task_pda, .. }
            | Self::TaskClaimed { task_pda, .. }
            | Self::VerifierVerdict { task_pda, .. }
            | Self::TaskCompleted { task_pda, .. }
            | Self::TaskFailed { task_pda, .. }
            | Self::TaskCancelled { task_pda, .. } => task_pda,
            Self::DisputeInitiated { dispute_pda, .. }
            | Self::DisputeVoteCast { dispute_pda, .. }
            | Self::DisputeResolved { dispute_pda, .. }
            | Self::DisputeExpired { dispute_pda, .. }
            | Self::DisputeCancelled { dispute_pda, .. } => dispute_pda,
        }
    }

    /// Canonical JSON form of the semantic payload (key-sorted).
    pub fn canonical_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

// ============================================================================
// TRAJECTORY EVENTS & TRACES
// ============================================================================

/// One recorded lifecycle event within a trace.
///
/// `seq` is strictly increasing within a trace; uniqueness and monotonicity
/// are invariants enforced by [`TrajectoryTrace::validate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryEvent {
    pub seq: u64,
    pub timestamp_ms: i64,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl TrajectoryEvent {
    pub fn kind(&self) -> TimelineEventKind {
        self.payload.kind()
    }
}

/// An ordered, immutable sequence of lifecycle events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryTrace {
    pub schema_version: u32,
    pub trace_id: String,
    pub seed: u64,
    pub events: Vec<TrajectoryEvent>,
}

impl TrajectoryTrace {
    /// Validate schema version and sequence invariants.
    ///
    /// # Errors
    ///
    /// `ParseError::UnknownSchemaVersion` for any version other than
    /// [`TRACE_SCHEMA_VERSION`]; `ParseError::DuplicateSequence` /
    /// `ParseError::NonMonotonicSequence` for seq violations.
    pub fn validate(&self) -> AgencResult<()> {
        if self.schema_version != TRACE_SCHEMA_VERSION {
            return Err(ParseError::UnknownSchemaVersion {
                found: self.schema_version,
                supported: TRACE_SCHEMA_VERSION,
            }
            .into());
        }
        for (i, window) in self.events.windows(2).enumerate() {
            let (prev, next) = (&window[0], &window[1]);
            if next.seq == prev.seq {
                return Err(ParseError::DuplicateSequence {
                    trace_id: self.trace_id.clone(),
                    seq: next.seq,
                }
                .into());
            }
            if next.seq < prev.seq {
                return Err(ParseError::NonMonotonicSequence {
                    trace_id: self.trace_id.clone(),
                    index: i + 1,
                    seq: next.seq,
                    prev: prev.seq,
                }
                .into());
            }
        }
        Ok(())
    }

    /// Return a canonical copy: events sorted by `seq`.
    ///
    /// Replay of a canonicalized trace produces the same deterministic hash
    /// as replay of the original (canonicalization-invariance).
    pub fn canonicalize(&self) -> TrajectoryTrace {
        let mut out = self.clone();
        out.events.sort_by_key(|e| e.seq);
        out
    }

    /// Byte-stable serialization of the full trace.
    pub fn to_canonical_json(&self) -> String {
        let v = serde_json::to_value(self).unwrap_or(Value::Null);
        stable_stringify(&v)
    }
}

// ============================================================================
// RAW & PROJECTED EVENTS
// ============================================================================

/// W3C-style trace context supplied with a raw event, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceContext {
    pub trace_id: String,
    #[serde(default)]
    pub parent_span_id: Option<String>,
}

/// A raw lifecycle event record as fetched from the event source.
///
/// The `event` value is the untyped on-chain payload; the projector coerces
/// it into a typed [`EventPayload`] with explicit fallback rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEventRecord {
    pub event_name: String,
    pub slot: u64,
    pub signature: String,
    #[serde(default)]
    pub timestamp_ms: Option<i64>,
    #[serde(default)]
    pub trace_context: Option<TraceContext>,
    pub event: Value,
}

/// Serialized field names of [`ProjectedTimelineEvent`] that are excluded
/// from `projection_hash`.
///
/// Every field of the struct must appear in exactly one of this list or
/// [`PROJECTION_HASH_INCLUDED_FIELDS`]; adding a field to the event schema
/// requires an explicit decision here, enforced by a unit test.
pub const PROJECTION_HASH_EXCLUDED_FIELDS: &[&str] = &[
    "seq",
    "timestamp_ms",
    "trace_id",
    "span_id",
    "parent_span_id",
    "sampled",
    "projection_hash",
];

/// Serialized field names of [`ProjectedTimelineEvent`] that participate in
/// `projection_hash`.
pub const PROJECTION_HASH_INCLUDED_FIELDS: &[&str] = &[
    "slot",
    "signature",
    "source_event_name",
    "source_event_type",
    "source_event_sequence",
    "task_pda",
    "dispute_pda",
    "payload",
];

/// Canonicalized view of a raw on-chain event.
///
/// Ordering key: `(slot, signature, seq, source_event_type)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedTimelineEvent {
    pub seq: u64,
    pub slot: u64,
    pub signature: String,
    pub source_event_name: String,
    pub source_event_type: TimelineEventKind,
    pub source_event_sequence: u64,
    pub task_pda: Option<TaskPda>,
    pub dispute_pda: Option<DisputePda>,
    pub timestamp_ms: i64,
    pub payload: EventPayload,
    pub trace_id: Option<String>,
    pub span_id: Option<String>,
    pub parent_span_id: Option<String>,
    pub sampled: bool,
    pub projection_hash: String,
}

impl ProjectedTimelineEvent {
    /// Canonical ordering key.
    pub fn ordering_key(&self) -> (u64, String, u64, &'static str) {
        (
            self.slot,
            self.signature.clone(),
            self.seq,
            self.source_event_type.as_str(),
        )
    }

    /// Duplicate-detection key used by the timeline store and backfill.
    pub fn dedup_key(&self) -> (u64, String, TimelineEventKind) {
        (self.slot, self.signature.clone(), self.source_event_type)
    }

    /// Deterministic digest of the event's semantic content.
    ///
    /// Computed over the canonical serialization of every field in
    /// [`PROJECTION_HASH_INCLUDED_FIELDS`]; volatile fields (timestamps,
    /// trace identifiers, sampling decisions) are excluded so the same
    /// semantic event always hashes identically.
    pub fn compute_projection_hash(&self) -> String {
        let mut v = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Value::Object(ref mut map) = v {
            for field in PROJECTION_HASH_EXCLUDED_FIELDS {
                map.remove(*field);
            }
        }
        sha256_hex(stable_stringify(&v).as_bytes())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn created(task: &str, seq: u64) -> TrajectoryEvent {
        TrajectoryEvent {
            seq,
            timestamp_ms: 1_000 + seq as i64,
            payload: EventPayload::TaskCreated {
                task_pda: task.to_string(),
                creator: "creator-1".to_string(),
                required_capabilities: 3,
                reward_amount: 500_000_000,
                task_type: 1,
                max_workers: 1,
            },
        }
    }

    fn trace(events: Vec<TrajectoryEvent>) -> TrajectoryTrace {
        TrajectoryTrace {
            schema_version: TRACE_SCHEMA_VERSION,
            trace_id: "trace-test".to_string(),
            seed: 42,
            events,
        }
    }

    #[test]
    fn test_payload_kind_and_entity() {
        let e = created("task-1", 0);
        assert_eq!(e.kind(), TimelineEventKind::Discovered);
        assert_eq!(e.payload.entity_pda(), "task-1");
        assert_eq!(e.payload.dispute_pda(), None);
    }

    #[test]
    fn test_dispute_event_entity_is_dispute_pda() {
        let payload = EventPayload::DisputeInitiated {
            dispute_pda: "dispute-1".to_string(),
            task_pda: "task-1".to_string(),
            initiator: "a".to_string(),
            defendant: "b".to_string(),
            resolution_type: 0,
            voting_deadline: 99,
        };
        assert_eq!(payload.entity_pda(), "dispute-1");
        assert_eq!(payload.task_pda().map(String::as_str), Some("task-1"));
    }

    #[test]
    fn test_trace_validate_rejects_unknown_schema() {
        let mut t = trace(vec![created("task-1", 0)]);
        t.schema_version = 7;
        let err = t.validate().unwrap_err();
        assert!(matches!(
            err,
            crate::AgencError::Parse(ParseError::UnknownSchemaVersion { found: 7, .. })
        ));
    }

    #[test]
    fn test_trace_validate_rejects_duplicate_seq() {
        let t = trace(vec![created("task-1", 3), created("task-2", 3)]);
        assert!(matches!(
            t.validate().unwrap_err(),
            crate::AgencError::Parse(ParseError::DuplicateSequence { seq: 3, .. })
        ));
    }

    #[test]
    fn test_trace_validate_rejects_non_monotonic() {
        let t = trace(vec![created("task-1", 5), created("task-2", 2)]);
        assert!(matches!(
            t.validate().unwrap_err(),
            crate::AgencError::Parse(ParseError::NonMonotonicSequence { seq: 2, prev: 5, .. })
        ));
    }

    #[test]
    fn test_canonicalize_sorts_by_seq() {
        let t = trace(vec![created("task-b", 9), created("task-a", 1)]);
        let c = t.canonicalize();
        assert_eq!(c.events[0].seq, 1);
        assert_eq!(c.events[1].seq, 9);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_trace_serialization_round_trip() {
        let t = trace(vec![created("task-1", 0)]);
        let json = t.to_canonical_json();
        let back: TrajectoryTrace = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
        assert_eq!(back.to_canonical_json(), json);
    }

    #[test]
    fn test_payload_serde_tag_is_snake_case() {
        let e = created("task-1", 0);
        let v = serde_json::to_value(&e.payload).unwrap();
        assert_eq!(v["kind"], "task_created");
    }

    #[test]
    fn test_projection_hash_field_classification_is_total() {
        // Every serialized field must be classified as included or excluded.
        let event = sample_projected();
        let v = serde_json::to_value(&event).unwrap();
        let obj = v.as_object().unwrap();
        for key in obj.keys() {
            let classified = PROJECTION_HASH_EXCLUDED_FIELDS.contains(&key.as_str())
                || PROJECTION_HASH_INCLUDED_FIELDS.contains(&key.as_str());
            assert!(classified, "unclassified field in projection hash: {key}");
        }
        assert_eq!(
            obj.len(),
            PROJECTION_HASH_EXCLUDED_FIELDS.len() + PROJECTION_HASH_INCLUDED_FIELDS.len()
        );
    }

    fn sample_projected() -> ProjectedTimelineEvent {
        ProjectedTimelineEvent {
            seq: 0,
            slot: 10,
            signature: "sig-1".to_string(),
            source_event_name: "TaskCreated".to_string(),
            source_event_type: TimelineEventKind::Discovered,
            source_event_sequence: 0,
            task_pda: Some("task-1".to_string()),
            dispute_pda: None,
            timestamp_ms: 1_234,
            payload: created("task-1", 0).payload,
            trace_id: Some("t".to_string()),
            span_id: Some("s".to_string()),
            parent_span_id: None,
            sampled: true,
            projection_hash: String::new(),
        }
    }

    #[test]
    fn test_projection_hash_ignores_volatile_fields() {
        let a = sample_projected();
        let mut b = a.clone();
        b.timestamp_ms = 9_999_999;
        b.trace_id = Some("other".to_string());
        b.span_id = None;
        b.sampled = false;
        b.seq = 77;
        assert_eq!(a.compute_projection_hash(), b.compute_projection_hash());
    }

    #[test]
    fn test_projection_hash_tracks_semantic_fields() {
        let a = sample_projected();
        let mut b = a.clone();
        b.slot = 11;
        assert_ne!(a.compute_projection_hash(), b.compute_projection_hash());
    }
}
