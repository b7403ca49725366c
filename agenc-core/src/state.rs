//! Replayed task and dispute state.
//!
//! Pure data: the fold logic that builds these from a trace lives in
//! `agenc-replay`. Hash-relevant fields carry only semantic content; the
//! deterministic replay hash is computed over applied transitions, never
//! over these structs directly.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::anomaly::Anomaly;
use crate::event::{DisputeOutcome, DisputePda, Pubkey, TaskPda, TimelineEventKind};

// ============================================================================
// TASK STATE
// ============================================================================

/// Task lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPhase {
    Discovered,
    Claimed,
    Completed,
    Failed,
    Cancelled,
}

impl TaskPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// A verifier's verdict on a task, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictRecord {
    pub verifier: Pubkey,
    pub approved: bool,
    pub proof_hash: String,
}

/// Final replayed state of one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskState {
    pub task_pda: TaskPda,
    pub phase: TaskPhase,
    pub creator: Pubkey,
    pub workers: Vec<Pubkey>,
    pub current_workers: u8,
    pub max_workers: u8,
    pub reward_amount: u64,
    pub reward_paid: u64,
    pub verdicts: Vec<VerdictRecord>,
    /// Number of transitions applied to this task.
    pub applied_transitions: u64,
}

// ============================================================================
// DISPUTE STATE
// ============================================================================

/// Dispute lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputePhase {
    Initiated,
    Resolved,
    Expired,
    Cancelled,
}

impl DisputePhase {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Initiated)
    }
}

/// Final replayed state of one dispute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisputeState {
    pub dispute_pda: DisputePda,
    pub task_pda: TaskPda,
    pub phase: DisputePhase,
    pub initiator: Pubkey,
    pub defendant: Pubkey,
    pub voters: Vec<Pubkey>,
    pub votes_for: u64,
    pub votes_against: u64,
    pub outcome: Option<DisputeOutcome>,
    pub applied_transitions: u64,
}

// ============================================================================
// REPLAY RESULT
// ============================================================================

/// One applied state transition, the unit the deterministic hash is
/// computed over. Excludes timestamps and volatile trace identifiers by
/// construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedTransition {
    pub kind: TimelineEventKind,
    pub entity_pda: Pubkey,
    /// Canonical semantic payload of the applied event.
    pub payload: Value,
}

/// Aggregate statistics for one replay pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ReplaySummary {
    pub events_total: usize,
    pub transitions_applied: usize,
    pub transitions_rejected: usize,
    pub task_count: usize,
    pub dispute_count: usize,
}

/// Deterministic reconstruction of final state from a trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayResult {
    pub tasks: BTreeMap<TaskPda, TaskState>,
    pub disputes: BTreeMap<DisputePda, DisputeState>,
    /// The ordered transitions that were applied, the hash input.
    pub transitions: Vec<AppliedTransition>,
    /// Hash over the ordered sequence of applied transitions.
    pub deterministic_hash: String,
    pub summary: ReplaySummary,
    /// Transitions the state machine rejected, recorded not thrown.
    pub anomalies: Vec<Anomaly>,
}

// ============================================================================
// COMPARISON REPORT
// ============================================================================

/// Overall comparison verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonStatus {
    Clean,
    Mismatched,
}

/// One side of a comparison, condensed for the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplaySideSummary {
    pub deterministic_hash: String,
    pub summary: ReplaySummary,
}

/// Machine-checkable comparison outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayComparisonReport {
    pub status: ComparisonStatus,
    pub anomalies: Vec<Anomaly>,
    pub mismatch_count: usize,
    pub task_ids: Vec<TaskPda>,
    pub dispute_ids: Vec<DisputePda>,
    pub local_replay: ReplaySideSummary,
    pub projected_replay: ReplaySideSummary,
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_phase_terminality() {
        assert!(!TaskPhase::Discovered.is_terminal());
        assert!(!TaskPhase::Claimed.is_terminal());
        assert!(TaskPhase::Completed.is_terminal());
        assert!(TaskPhase::Failed.is_terminal());
        assert!(TaskPhase::Cancelled.is_terminal());
    }

    #[test]
    fn test_dispute_phase_terminality() {
        assert!(!DisputePhase::Initiated.is_terminal());
        assert!(DisputePhase::Resolved.is_terminal());
        assert!(DisputePhase::Expired.is_terminal());
        assert!(DisputePhase::Cancelled.is_terminal());
    }

    #[test]
    fn test_comparison_status_serde() {
        assert_eq!(
            serde_json::to_value(ComparisonStatus::Clean).unwrap(),
            serde_json::json!("clean")
        );
        assert_eq!(
            serde_json::to_value(ComparisonStatus::Mismatched).unwrap(),
            serde_json::json!("mismatched")
        );
    }
}
