//! Event Projector: raw lifecycle payloads to canonical timeline events.
//!
//! The projector is a total, pure function. Malformed payload fields are
//! coerced with explicit fallback rules (unknown numeric encodings default
//! to zero) rather than thrown; unknown event names are skipped and
//! counted. Trace/span identifiers and the sampling decision are derived
//! deterministically, so the same input always projects to byte-identical
//! output.

use serde_json::Value;

use agenc_core::{
    derive_short_id, hash_to_unit_interval, DisputeOutcome, EventPayload, ProjectedTimelineEvent,
    RawEventRecord, TimelineEventKind, TrajectoryEvent, TrajectoryTrace, TRACE_SCHEMA_VERSION,
};

/// Namespace prefixing every derived trace identifier.
const TRACE_NAMESPACE: &str = "agenc.trace";
/// Namespace prefixing every derived span identifier.
const SPAN_NAMESPACE: &str = "agenc.span";

// ============================================================================
// OPTIONS & RESULT
// ============================================================================

/// Projection options.
#[derive(Debug, Clone)]
pub struct ProjectionOptions {
    /// Explicit trace id. When absent, each event derives its own from
    /// `(namespace, slot, signature, event_name, event_sequence)`.
    pub trace_id: Option<String>,
    /// Seed mixed into the sampling decision and the synthesized trace.
    pub seed: u64,
    /// Deterministic sampling rate in `[0, 1]`. 1.0 samples everything.
    pub sample_rate: f64,
}

impl Default for ProjectionOptions {
    fn default() -> Self {
        Self {
            trace_id: None,
            seed: 0,
            sample_rate: 1.0,
        }
    }
}

/// Counters describing what projection did.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProjectionTelemetry {
    pub projected: usize,
    pub unknown_events: usize,
    pub coerced_fields: usize,
    pub sampled_out: usize,
}

/// Output of one projection pass.
#[derive(Debug, Clone)]
pub struct ProjectionResult {
    pub events: Vec<ProjectedTimelineEvent>,
    /// The projected events re-expressed as a replayable trace.
    pub trace: TrajectoryTrace,
    pub telemetry: ProjectionTelemetry,
}

// ============================================================================
// PROJECTION
// ============================================================================

/// Project raw event records into canonical timeline events.
///
/// `seq` is assigned monotonically in input order over the events that
/// parse; unknown event names are skipped and counted in telemetry.
pub fn project(records: &[RawEventRecord], options: &ProjectionOptions) -> ProjectionResult {
    let mut telemetry = ProjectionTelemetry::default();
    let mut events = Vec::with_capacity(records.len());
    let mut trace_events = Vec::with_capacity(records.len());
    // Sequence of the event within its (slot, signature) group.
    let mut group_seq: Vec<((u64, String), u64)> = Vec::new();
    let mut seq: u64 = 0;

    for record in records {
        let Some(payload) = parse_payload(record, &mut telemetry.coerced_fields) else {
            telemetry.unknown_events += 1;
            continue;
        };

        let group_key = (record.slot, record.signature.clone());
        let source_event_sequence = match group_seq.iter_mut().find(|(k, _)| *k == group_key) {
            Some((_, n)) => {
                *n += 1;
                *n
            }
            None => {
                group_seq.push((group_key, 0));
                0
            }
        };

        let slot_str = record.slot.to_string();
        let seq_str = source_event_sequence.to_string();
        let trace_id = record
            .trace_context
            .as_ref()
            .map(|ctx| ctx.trace_id.clone())
            .or_else(|| options.trace_id.clone())
            .unwrap_or_else(|| {
                derive_short_id(
                    TRACE_NAMESPACE,
                    &[&slot_str, &record.signature, &record.event_name, &seq_str],
                )
            });
        let span_id = derive_short_id(
            SPAN_NAMESPACE,
            &[
                &trace_id,
                &record.event_name,
                &slot_str,
                &record.signature,
                &seq_str,
            ],
        );
        let parent_span_id = record
            .trace_context
            .as_ref()
            .and_then(|ctx| ctx.parent_span_id.clone());

        // Deterministic sampling: hash of the span seed mapped into [0,1),
        // compared against the rate. Never a random coin flip.
        let span_seed = format!("{}|{}", options.seed, span_id);
        let sampled = hash_to_unit_interval(&span_seed) < options.sample_rate;
        if !sampled {
            telemetry.sampled_out += 1;
        }

        let timestamp_ms = record.timestamp_ms.unwrap_or(0);
        let mut projected = ProjectedTimelineEvent {
            seq,
            slot: record.slot,
            signature: record.signature.clone(),
            source_event_name: record.event_name.clone(),
            source_event_type: payload.kind(),
            source_event_sequence,
            task_pda: payload.task_pda().cloned(),
            dispute_pda: payload.dispute_pda().cloned(),
            timestamp_ms,
            payload: payload.clone(),
            trace_id: Some(trace_id),
            span_id: Some(span_id),
            parent_span_id,
            sampled,
            projection_hash: String::new(),
        };
        projected.projection_hash = projected.compute_projection_hash();

        trace_events.push(TrajectoryEvent {
            seq,
            timestamp_ms,
            payload,
        });
        events.push(projected);
        seq += 1;
    }

    telemetry.projected = events.len();

    let trace_id = options.trace_id.clone().unwrap_or_else(|| {
        let parts: Vec<String> = events
            .iter()
            .map(|e| format!("{}:{}:{}", e.slot, e.signature, e.source_event_sequence))
            .collect();
        let refs: Vec<&str> = parts.iter().map(String::as_str).collect();
        derive_short_id(TRACE_NAMESPACE, &refs)
    });

    ProjectionResult {
        events,
        trace: TrajectoryTrace {
            schema_version: TRACE_SCHEMA_VERSION,
            trace_id,
            seed: options.seed,
            events: trace_events,
        },
        telemetry,
    }
}

// ============================================================================
// PAYLOAD COERCION
// ============================================================================

/// Parse the untyped payload for a known event name. Returns `None` for
/// unknown names; known names always parse, with field-level fallbacks.
fn parse_payload(record: &RawEventRecord, coerced: &mut usize) -> Option<EventPayload> {
    let v = &record.event;
    let payload = match record.event_name.as_str() {
        "TaskCreated" => EventPayload::TaskCreated {
            task_pda: str_field(v, &["task_pda", "task_id"], coerced),
            creator: str_field(v, &["creator"], coerced),
            required_capabilities: u64_field(v, "required_capabilities", coerced),
            reward_amount: u64_field(v, "reward_amount", coerced),
            task_type: u64_field(v, "task_type", coerced) as u8,
            max_workers: max_workers_field(v, coerced),
        },
        "TaskClaimed" => EventPayload::TaskClaimed {
            task_pda: str_field(v, &["task_pda", "task_id"], coerced),
            worker: str_field(v, &["worker"], coerced),
            current_workers: u64_field(v, "current_workers", coerced) as u8,
            max_workers: max_workers_field(v, coerced),
        },
        "VerifierVerdict" => EventPayload::VerifierVerdict {
            task_pda: str_field(v, &["task_pda", "task_id"], coerced),
            verifier: str_field(v, &["verifier"], coerced),
            approved: bool_field(v, "approved", coerced),
            proof_hash: str_field(v, &["proof_hash"], coerced),
        },
        "TaskCompleted" => EventPayload::TaskCompleted {
            task_pda: str_field(v, &["task_pda", "task_id"], coerced),
            worker: str_field(v, &["worker"], coerced),
            proof_hash: str_field(v, &["proof_hash"], coerced),
            reward_paid: u64_field(v, "reward_paid", coerced),
        },
        "TaskFailed" => EventPayload::TaskFailed {
            task_pda: str_field(v, &["task_pda", "task_id"], coerced),
            worker: str_field(v, &["worker"], coerced),
            reason_code: u64_field(v, "reason_code", coerced) as u8,
        },
        "TaskCancelled" => EventPayload::TaskCancelled {
            task_pda: str_field(v, &["task_pda", "task_id"], coerced),
            creator: str_field(v, &["creator"], coerced),
            refund_amount: u64_field(v, "refund_amount", coerced),
        },
        "DisputeInitiated" => EventPayload::DisputeInitiated {
            dispute_pda: str_field(v, &["dispute_pda", "dispute_id"], coerced),
            task_pda: str_field(v, &["task_pda", "task_id"], coerced),
            initiator: str_field(v, &["initiator"], coerced),
            defendant: str_field(v, &["defendant"], coerced),
            resolution_type: u64_field(v, "resolution_type", coerced) as u8,
            voting_deadline: i64_field(v, "voting_deadline", coerced),
        },
        "DisputeVoteCast" => EventPayload::DisputeVoteCast {
            dispute_pda: str_field(v, &["dispute_pda", "dispute_id"], coerced),
            voter: str_field(v, &["voter"], coerced),
            approved: bool_field(v, "approved", coerced),
            votes_for: u64_field(v, "votes_for", coerced),
            votes_against: u64_field(v, "votes_against", coerced),
        },
        "DisputeResolved" => EventPayload::DisputeResolved {
            dispute_pda: str_field(v, &["dispute_pda", "dispute_id"], coerced),
            outcome: DisputeOutcome::from_code(u64_field(v, "outcome", coerced) as u8),
            votes_for: u64_field(v, "votes_for", coerced),
            votes_against: u64_field(v, "votes_against", coerced),
        },
        "DisputeExpired" => EventPayload::DisputeExpired {
            dispute_pda: str_field(v, &["dispute_pda", "dispute_id"], coerced),
            task_pda: str_field(v, &["task_pda", "task_id"], coerced),
            refund_amount: u64_field(v, "refund_amount", coerced),
            creator_amount: u64_field(v, "creator_amount", coerced),
            worker_amount: u64_field(v, "worker_amount", coerced),
        },
        "DisputeCancelled" => EventPayload::DisputeCancelled {
            dispute_pda: str_field(v, &["dispute_pda", "dispute_id"], coerced),
            task_pda: str_field(v, &["task_pda", "task"], coerced),
            initiator: str_field(v, &["initiator"], coerced),
        },
        _ => return None,
    };
    Some(payload)
}

fn str_field(v: &Value, names: &[&str], coerced: &mut usize) -> String {
    for name in names {
        match v.get(name) {
            Some(Value::String(s)) => return s.clone(),
            // Non-string scalars are stringified rather than dropped.
            Some(Value::Number(n)) => {
                *coerced += 1;
                return n.to_string();
            }
            _ => {}
        }
    }
    *coerced += 1;
    String::new()
}

fn u64_field(v: &Value, name: &str, coerced: &mut usize) -> u64 {
    match v.get(name) {
        Some(Value::Number(n)) => n.as_u64().unwrap_or_else(|| {
            *coerced += 1;
            0
        }),
        // Decimal-string encodings (u64 overflows JS numbers upstream).
        Some(Value::String(s)) => s.parse().unwrap_or_else(|_| {
            *coerced += 1;
            0
        }),
        _ => {
            *coerced += 1;
            0
        }
    }
}

fn i64_field(v: &Value, name: &str, coerced: &mut usize) -> i64 {
    match v.get(name) {
        Some(Value::Number(n)) => n.as_i64().unwrap_or_else(|| {
            *coerced += 1;
            0
        }),
        Some(Value::String(s)) => s.parse().unwrap_or_else(|_| {
            *coerced += 1;
            0
        }),
        _ => {
            *coerced += 1;
            0
        }
    }
}

fn bool_field(v: &Value, name: &str, coerced: &mut usize) -> bool {
    match v.get(name) {
        Some(Value::Bool(b)) => *b,
        _ => {
            *coerced += 1;
            false
        }
    }
}

/// `max_workers` defaults to 1, not 0: a task always admits at least one
/// worker, and a zero default would reject every claim during replay.
fn max_workers_field(v: &Value, coerced: &mut usize) -> u8 {
    match v.get("max_workers") {
        Some(Value::Number(n)) => n.as_u64().map(|n| n as u8).unwrap_or_else(|| {
            *coerced += 1;
            1
        }),
        _ => {
            *coerced += 1;
            1
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
