//! AgenC Test Utilities
//!
//! Centralized test infrastructure for the AgenC replay workspace:
//! - Fixture traces and raw event records for common lifecycles
//! - Recording observability collaborators
//! - Proptest generators for payloads and valid traces

// Re-export core types for convenience in downstream test modules.
pub use agenc_core::{
    Anomaly, AnomalyCode, EventPayload, RawEventRecord, TrajectoryEvent, TrajectoryTrace,
    TRACE_SCHEMA_VERSION,
};

use std::sync::Mutex;

use agenc_core::{AlertDispatcher, DisputeOutcome, MetricsSink};
use proptest::prelude::*;
use serde_json::json;

// ============================================================================
// FIXTURE TRACES
// ============================================================================

/// Full happy-path task lifecycle: created, claimed, verdict, completed.
pub fn sample_task_trace(task_pda: &str) -> TrajectoryTrace {
    TrajectoryTrace {
        schema_version: TRACE_SCHEMA_VERSION,
        trace_id: format!("trace-{task_pda}"),
        seed: 42,
        events: vec![
            TrajectoryEvent {
                seq: 0,
                timestamp_ms: 1_000,
                payload: EventPayload::TaskCreated {
                    task_pda: task_pda.to_string(),
                    creator: "alice".to_string(),
                    required_capabilities: 3,
                    reward_amount: 500_000_000,
                    task_type: 1,
                    max_workers: 1,
                },
            },
            TrajectoryEvent {
                seq: 1,
                timestamp_ms: 2_000,
                payload: EventPayload::TaskClaimed {
                    task_pda: task_pda.to_string(),
                    worker: "bob".to_string(),
                    current_workers: 1,
                    max_workers: 1,
                },
            },
            TrajectoryEvent {
                seq: 2,
                timestamp_ms: 3_000,
                payload: EventPayload::VerifierVerdict {
                    task_pda: task_pda.to_string(),
                    verifier: "vera".to_string(),
                    approved: true,
                    proof_hash: "proof-1".to_string(),
                },
            },
            TrajectoryEvent {
                seq: 3,
                timestamp_ms: 4_000,
                payload: EventPayload::TaskCompleted {
                    task_pda: task_pda.to_string(),
                    worker: "bob".to_string(),
                    proof_hash: "proof-1".to_string(),
                    reward_paid: 495_000_000,
                },
            },
        ],
    }
}

/// Full dispute lifecycle: initiated, one vote, resolved approved.
pub fn sample_dispute_trace(dispute_pda: &str, task_pda: &str) -> TrajectoryTrace {
    TrajectoryTrace {
        schema_version: TRACE_SCHEMA_VERSION,
        trace_id: format!("trace-{dispute_pda}"),
        seed: 42,
        events: vec![
            TrajectoryEvent {
                seq: 0,
                timestamp_ms: 1_000,
                payload: EventPayload::DisputeInitiated {
                    dispute_pda: dispute_pda.to_string(),
                    task_pda: task_pda.to_string(),
                    initiator: "alice".to_string(),
                    defendant: "bob".to_string(),
                    resolution_type: 0,
                    voting_deadline: 100_000,
                },
            },
            TrajectoryEvent {
                seq: 1,
                timestamp_ms: 2_000,
                payload: EventPayload::DisputeVoteCast {
                    dispute_pda: dispute_pda.to_string(),
                    voter: "v1".to_string(),
                    approved: true,
                    votes_for: 3,
                    votes_against: 0,
                },
            },
            TrajectoryEvent {
                seq: 2,
                timestamp_ms: 3_000,
                payload: EventPayload::DisputeResolved {
                    dispute_pda: dispute_pda.to_string(),
                    outcome: DisputeOutcome::Approved,
                    votes_for: 3,
                    votes_against: 0,
                },
            },
        ],
    }
}

/// Raw on-chain records for the happy-path task lifecycle, one slot apart.
pub fn sample_raw_records(task_pda: &str) -> Vec<RawEventRecord> {
    vec![
        RawEventRecord {
            event_name: "TaskCreated".to_string(),
            slot: 1,
            signature: "sig-1".to_string(),
            timestamp_ms: Some(1_000),
            trace_context: None,
            event: json!({
                "task_pda": task_pda,
                "creator": "alice",
                "required_capabilities": 3,
                "reward_amount": 500_000_000u64,
                "task_type": 1,
                "max_workers": 1,
            }),
        },
        RawEventRecord {
            event_name: "TaskClaimed".to_string(),
            slot: 2,
            signature: "sig-2".to_string(),
            timestamp_ms: Some(2_000),
            trace_context: None,
            event: json!({
                "task_pda": task_pda,
                "worker": "bob",
                "current_workers": 1,
                "max_workers": 1,
            }),
        },
        RawEventRecord {
            event_name: "TaskCompleted".to_string(),
            slot: 3,
            signature: "sig-3".to_string(),
            timestamp_ms: Some(3_000),
            trace_context: None,
            event: json!({
                "task_pda": task_pda,
                "worker": "bob",
                "proof_hash": "proof-1",
                "reward_paid": 495_000_000u64,
            }),
        },
    ]
}

// ============================================================================
// RECORDING COLLABORATORS
// ============================================================================

/// Metrics sink that records every call for assertion.
#[derive(Debug, Default)]
pub struct RecordingMetricsSink {
    counters: Mutex<Vec<(String, u64)>>,
    histograms: Mutex<Vec<(String, f64)>>,
}

impl RecordingMetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total across all increments of a named counter.
    pub fn counter_total(&self, name: &str) -> u64 {
        self.counters
            .lock()
            .map(|c| c.iter().filter(|(n, _)| n == name).map(|(_, v)| v).sum())
            .unwrap_or(0)
    }

    /// All recorded observations of a named histogram.
    pub fn histogram_values(&self, name: &str) -> Vec<f64> {
        self.histograms
            .lock()
            .map(|h| {
                h.iter()
                    .filter(|(n, _)| n == name)
                    .map(|(_, v)| *v)
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl MetricsSink for RecordingMetricsSink {
    fn incr_counter(&self, name: &str, value: u64) {
        if let Ok(mut counters) = self.counters.lock() {
            counters.push((name.to_string(), value));
        }
    }

    fn observe_histogram(&self, name: &str, value: f64) {
        if let Ok(mut histograms) = self.histograms.lock() {
            histograms.push((name.to_string(), value));
        }
    }
}

/// Alert dispatcher that records every dispatched anomaly.
#[derive(Debug, Default)]
pub struct RecordingAlertDispatcher {
    anomalies: Mutex<Vec<Anomaly>>,
}

impl RecordingAlertDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatched(&self) -> Vec<Anomaly> {
        self.anomalies.lock().map(|a| a.clone()).unwrap_or_default()
    }
}

impl AlertDispatcher for RecordingAlertDispatcher {
    fn dispatch(&self, anomaly: &Anomaly) {
        if let Ok(mut anomalies) = self.anomalies.lock() {
            anomalies.push(anomaly.clone());
        }
    }
}

// ============================================================================
// PROPTEST STRATEGIES
// ============================================================================

/// Strategy for base58-looking account keys.
pub fn pubkey_strategy() -> impl Strategy<Value = String> {
    "[1-9A-HJ-NP-Za-km-z]{8,12}"
}

/// Strategy for reward amounts spanning all reward tiers (lamports).
pub fn reward_strategy() -> impl Strategy<Value = u64> {
    prop_oneof![
        0u64..100_000_000,                  // low tier
        100_000_000u64..1_000_000_000,      // medium tier
        1_000_000_000u64..50_000_000_000,   // high tier
    ]
}

/// Strategy for a valid happy-path task trace with generated identities.
///
/// Always replayable without anomalies: created, claimed, zero or more
/// verdicts, then completed.
pub fn task_trace_strategy() -> impl Strategy<Value = TrajectoryTrace> {
    (
        pubkey_strategy(),
        pubkey_strategy(),
        pubkey_strategy(),
        reward_strategy(),
        proptest::collection::vec(proptest::bool::ANY, 0..4),
    )
        .prop_map(|(task, creator, worker, reward, verdicts)| {
            let mut events = vec![
                TrajectoryEvent {
                    seq: 0,
                    timestamp_ms: 1_000,
                    payload: EventPayload::TaskCreated {
                        task_pda: task.clone(),
                        creator,
                        required_capabilities: 1,
                        reward_amount: reward,
                        task_type: 1,
                        max_workers: 1,
                    },
                },
                TrajectoryEvent {
                    seq: 1,
                    timestamp_ms: 2_000,
                    payload: EventPayload::TaskClaimed {
                        task_pda: task.clone(),
                        worker: worker.clone(),
                        current_workers: 1,
                        max_workers: 1,
                    },
                },
            ];
            for (i, approved) in verdicts.into_iter().enumerate() {
                events.push(TrajectoryEvent {
                    seq: 2 + i as u64,
                    timestamp_ms: 3_000 + i as i64,
                    payload: EventPayload::VerifierVerdict {
                        task_pda: task.clone(),
                        verifier: format!("verifier-{i}"),
                        approved,
                        proof_hash: format!("proof-{i}"),
                    },
                });
            }
            let next_seq = events.len() as u64;
            events.push(TrajectoryEvent {
                seq: next_seq,
                timestamp_ms: 9_000,
                payload: EventPayload::TaskCompleted {
                    task_pda: task.clone(),
                    worker,
                    proof_hash: "proof-final".to_string(),
                    reward_paid: reward.saturating_sub(reward / 100),
                },
            });
            TrajectoryTrace {
                schema_version: TRACE_SCHEMA_VERSION,
                trace_id: format!("trace-{task}"),
                seed: 42,
                events,
            }
        })
}

// =============================================================================
// TESTS
// =============================================================================
