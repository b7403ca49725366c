//! Replay engine: deterministic reconstruction of final state from a trace.
//!
//! Events fold into per-entity state machines in `seq` order. Invalid
//! transitions are recorded as anomalies, not thrown, unless the caller
//! requests strict mode. The deterministic hash is computed over the
//! ordered list of applied transitions — `(kind, entity, semantic payload)`
//! tuples — so two traces with identical semantic content but different
//! wall-clock timing hash identically.

use std::collections::BTreeMap;

use serde_json::json;
use sha2::{Digest, Sha256};

use agenc_core::{
    stable_stringify, AgencResult, Anomaly, AnomalyCode, AppliedTransition, DisputePhase,
    DisputeState, EventPayload, ReplayResult, ReplaySummary, TaskPhase, TaskState,
    TrajectoryTrace, ValidationError, VerdictRecord,
};

/// How the engine reacts to invalid transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplayMode {
    /// Record invalid transitions as anomalies and continue.
    #[default]
    Lenient,
    /// Fail on the first invalid transition.
    Strict,
}

/// Replay a trace into final task/dispute state plus a state hash.
///
/// # Errors
///
/// A malformed trace (duplicate `seq`, non-monotonic ordering, unknown
/// schema version) fails fast with a `ParseError` before replay begins.
/// In strict mode the first invalid transition raises a
/// `ValidationError::InvalidTransition`.
pub fn replay(trace: &TrajectoryTrace, mode: ReplayMode) -> AgencResult<ReplayResult> {
    trace.validate()?;

    let mut tasks: BTreeMap<String, TaskState> = BTreeMap::new();
    let mut disputes: BTreeMap<String, DisputeState> = BTreeMap::new();
    let mut transitions: Vec<AppliedTransition> = Vec::new();
    let mut anomalies: Vec<Anomaly> = Vec::new();
    let mut hasher = Sha256::new();

    for event in &trace.events {
        let entity = event.payload.entity_pda().clone();
        let applied = if event.kind().is_dispute() {
            apply_dispute_event(&mut disputes, &event.payload)
        } else {
            apply_task_event(&mut tasks, &event.payload)
        };

        match applied {
            Ok(()) => {
                let transition = AppliedTransition {
                    kind: event.kind(),
                    entity_pda: entity,
                    payload: event.payload.canonical_value(),
                };
                hasher.update(stable_stringify(&json!({
                    "kind": transition.kind.as_str(),
                    "entity": transition.entity_pda,
                    "payload": transition.payload,
                })));
                hasher.update([b'\n']);
                transitions.push(transition);
            }
            Err(reason) => {
                if mode == ReplayMode::Strict {
                    return Err(ValidationError::InvalidTransition {
                        entity_pda: entity,
                        kind: event.kind().as_str().to_string(),
                        seq: event.seq,
                        reason,
                    }
                    .into());
                }
                anomalies.push(Anomaly::error(
                    AnomalyCode::TransitionInvalid,
                    format!("{} rejected for {entity}: {reason}", event.kind()),
                    json!({
                        "entity_pda": entity,
                        "kind": event.kind().as_str(),
                        "seq": event.seq,
                        "reason": reason,
                    }),
                ));
            }
        }
    }

    let summary = ReplaySummary {
        events_total: trace.events.len(),
        transitions_applied: transitions.len(),
        transitions_rejected: anomalies.len(),
        task_count: tasks.len(),
        dispute_count: disputes.len(),
    };

    Ok(ReplayResult {
        tasks,
        disputes,
        transitions,
        deterministic_hash: hex::encode(hasher.finalize()),
        summary,
        anomalies,
    })
}

// ============================================================================
// TASK STATE MACHINE
// ============================================================================

/// `discovered → claimed → {verifier_verdict}* → {completed | failed}`,
/// with `cancelled` reachable from any non-terminal phase.
fn apply_task_event(
    tasks: &mut BTreeMap<String, TaskState>,
    payload: &EventPayload,
) -> Result<(), String> {
    match payload {
        EventPayload::TaskCreated {
            task_pda,
            creator,
            reward_amount,
            max_workers,
            ..
        } => {
            if tasks.contains_key(task_pda) {
                return Err("task already discovered".to_string());
            }
            tasks.insert(
                task_pda.clone(),
                TaskState {
                    task_pda: task_pda.clone(),
                    phase: TaskPhase::Discovered,
                    creator: creator.clone(),
                    workers: Vec::new(),
                    current_workers: 0,
                    max_workers: *max_workers,
                    reward_amount: *reward_amount,
                    reward_paid: 0,
                    verdicts: Vec::new(),
                    applied_transitions: 1,
                },
            );
            Ok(())
        }
        EventPayload::TaskClaimed { task_pda, worker, .. } => {
            let task = known_task(tasks, task_pda)?;
            if task.phase.is_terminal() {
                return Err(format!("claim on terminal task ({:?})", task.phase));
            }
            if task.current_workers >= task.max_workers {
                return Err(format!(
                    "worker slots exhausted ({}/{})",
                    task.current_workers, task.max_workers
                ));
            }
            if task.workers.contains(worker) {
                return Err("worker already claimed this task".to_string());
            }
            task.workers.push(worker.clone());
            task.current_workers += 1;
            task.phase = TaskPhase::Claimed;
            task.applied_transitions += 1;
            Ok(())
        }
        EventPayload::VerifierVerdict {
            task_pda,
            verifier,
            approved,
            proof_hash,
        } => {
            let task = known_task(tasks, task_pda)?;
            if task.phase != TaskPhase::Claimed {
                return Err(format!("verdict on unclaimed task ({:?})", task.phase));
            }
            task.verdicts.push(VerdictRecord {
                verifier: verifier.clone(),
                approved: *approved,
                proof_hash: proof_hash.clone(),
            });
            task.applied_transitions += 1;
            Ok(())
        }
        EventPayload::TaskCompleted {
            task_pda,
            reward_paid,
            ..
        } => {
            let task = known_task(tasks, task_pda)?;
            if task.phase != TaskPhase::Claimed {
                return Err(format!("completion on unclaimed task ({:?})", task.phase));
            }
            task.phase = TaskPhase::Completed;
            task.reward_paid = *reward_paid;
            task.applied_transitions += 1;
            Ok(())
        }
        EventPayload::TaskFailed { task_pda, .. } => {
            let task = known_task(tasks, task_pda)?;
            if task.phase != TaskPhase::Claimed {
                return Err(format!("failure on unclaimed task ({:?})", task.phase));
            }
            task.phase = TaskPhase::Failed;
            task.applied_transitions += 1;
            Ok(())
        }
        EventPayload::TaskCancelled { task_pda, .. } => {
            let task = known_task(tasks, task_pda)?;
            if task.phase.is_terminal() {
                return Err(format!("cancel on terminal task ({:?})", task.phase));
            }
            task.phase = TaskPhase::Cancelled;
            task.applied_transitions += 1;
            Ok(())
        }
        // Dispute payloads are routed to apply_dispute_event.
        _ => Err("dispute event routed to task state machine".to_string()),
    }
}

fn known_task<'a>(
    tasks: &'a mut BTreeMap<String, TaskState>,
    task_pda: &str,
) -> Result<&'a mut TaskState, String> {
    tasks
        .get_mut(task_pda)
        .ok_or_else(|| "unknown task".to_string())
}

// ============================================================================
// DISPUTE STATE MACHINE
// ============================================================================

/// `initiated → {voted}* → {resolved | expired}`, with `cancelled`
/// reachable while still initiated.
fn apply_dispute_event(
    disputes: &mut BTreeMap<String, DisputeState>,
    payload: &EventPayload,
) -> Result<(), String> {
    match payload {
        EventPayload::DisputeInitiated {
            dispute_pda,
            task_pda,
            initiator,
            defendant,
            ..
        } => {
            if disputes.contains_key(dispute_pda) {
                return Err("dispute already initiated".to_string());
            }
            disputes.insert(
                dispute_pda.clone(),
                DisputeState {
                    dispute_pda: dispute_pda.clone(),
                    task_pda: task_pda.clone(),
                    phase: DisputePhase::Initiated,
                    initiator: initiator.clone(),
                    defendant: defendant.clone(),
                    voters: Vec::new(),
                    votes_for: 0,
                    votes_against: 0,
                    outcome: None,
                    applied_transitions: 1,
                },
            );
            Ok(())
        }
        EventPayload::DisputeVoteCast {
            dispute_pda,
            voter,
            votes_for,
            votes_against,
            ..
        } => {
            let dispute = known_dispute(disputes, dispute_pda)?;
            if dispute.phase != DisputePhase::Initiated {
                return Err(format!("vote on settled dispute ({:?})", dispute.phase));
            }
            if dispute.voters.contains(voter) {
                return Err("voter already voted".to_string());
            }
            dispute.voters.push(voter.clone());
            // Events carry running tallies from the chain.
            dispute.votes_for = *votes_for;
            dispute.votes_against = *votes_against;
            dispute.applied_transitions += 1;
            Ok(())
        }
        EventPayload::DisputeResolved {
            dispute_pda,
            outcome,
            votes_for,
            votes_against,
        } => {
            let dispute = known_dispute(disputes, dispute_pda)?;
            if dispute.phase != DisputePhase::Initiated {
                return Err(format!("resolution on settled dispute ({:?})", dispute.phase));
            }
            dispute.phase = DisputePhase::Resolved;
            dispute.outcome = Some(*outcome);
            dispute.votes_for = *votes_for;
            dispute.votes_against = *votes_against;
            dispute.applied_transitions += 1;
            Ok(())
        }
        EventPayload::DisputeExpired { dispute_pda, .. } => {
            let dispute = known_dispute(disputes, dispute_pda)?;
            if dispute.phase != DisputePhase::Initiated {
                return Err(format!("expiry on settled dispute ({:?})", dispute.phase));
            }
            dispute.phase = DisputePhase::Expired;
            dispute.applied_transitions += 1;
            Ok(())
        }
        EventPayload::DisputeCancelled { dispute_pda, .. } => {
            let dispute = known_dispute(disputes, dispute_pda)?;
            if dispute.phase != DisputePhase::Initiated {
                return Err(format!("cancel on settled dispute ({:?})", dispute.phase));
            }
            dispute.phase = DisputePhase::Cancelled;
            dispute.applied_transitions += 1;
            Ok(())
        }
        _ => Err("task event routed to dispute state machine".to_string()),
    }
}

fn known_dispute<'a>(
    disputes: &'a mut BTreeMap<String, DisputeState>,
    dispute_pda: &str,
) -> Result<&'a mut DisputeState, String> {
    disputes
        .get_mut(dispute_pda)
        .ok_or_else(|| "unknown dispute".to_string())
}

// =============================================================================
// TESTS
// =============================================================================
