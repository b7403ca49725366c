//! Seeded mutation operators over trajectory traces.
//!
//! Every operator is a pure function of `(trace, rng)`: identical seeds
//! produce identical mutants on every host. Operators that find nothing to
//! mutate return `None` rather than a no-op clone, so the runner never
//! scores a mutant identical to its baseline.

use agenc_core::{EventPayload, SeededRng, TimelineEventKind, TrajectoryTrace};
use serde::{Deserialize, Serialize};

// ============================================================================
// OPERATOR CONTRACT
// ============================================================================

/// Which regression axis an operator probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorCategory {
    /// Flips meaning while keeping the trace well-formed.
    Semantic,
    /// Reshapes event ordering or presence.
    Structural,
    /// Corrupts the trace in ways a robust pipeline must survive.
    Chaos,
}

impl OperatorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Semantic => "semantic",
            Self::Structural => "structural",
            Self::Chaos => "chaos",
        }
    }
}

impl std::fmt::Display for OperatorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs handed to an operator for one application.
#[derive(Debug, Clone, Copy)]
pub struct MutationContext<'a> {
    pub scenario_id: &'a str,
    pub trace: &'a TrajectoryTrace,
}

/// A successfully produced mutant.
#[derive(Debug, Clone)]
pub struct MutationOutcome {
    pub trace: TrajectoryTrace,
    /// Human-readable note on what changed, recorded in the artifact.
    pub description: String,
}

/// One mutation operator, keyed by a stable string id.
pub trait MutationOperator: Send + Sync {
    /// Stable id; registry order and derived-rng labels depend on it.
    fn id(&self) -> &'static str;

    fn category(&self) -> OperatorCategory;

    /// Produce a mutant, or `None` when the trace offers nothing to mutate.
    fn apply(&self, ctx: &MutationContext<'_>, rng: &mut SeededRng) -> Option<MutationOutcome>;
}

// ============================================================================
// SEMANTIC OPERATORS
// ============================================================================

/// Flips one verdict or dispute vote from approved to rejected (or back).
pub struct FlipVerdict;

impl MutationOperator for FlipVerdict {
    fn id(&self) -> &'static str {
        "flip_verdict"
    }

    fn category(&self) -> OperatorCategory {
        OperatorCategory::Semantic
    }

    fn apply(&self, ctx: &MutationContext<'_>, rng: &mut SeededRng) -> Option<MutationOutcome> {
        let candidates: Vec<usize> = ctx
            .trace
            .events
            .iter()
            .enumerate()
            .filter(|(_, e)| {
                matches!(
                    e.payload,
                    EventPayload::VerifierVerdict { .. } | EventPayload::DisputeVoteCast { .. }
                )
            })
            .map(|(i, _)| i)
            .collect();
        if candidates.is_empty() {
            return None;
        }
        let index = candidates[rng.next_index(candidates.len())];
        let mut trace = ctx.trace.clone();
        let seq = trace.events[index].seq;
        match &mut trace.events[index].payload {
            EventPayload::VerifierVerdict { approved, .. }
            | EventPayload::DisputeVoteCast { approved, .. } => *approved = !*approved,
            _ => return None,
        }
        Some(MutationOutcome {
            trace,
            description: format!("flipped verdict at seq {seq}"),
        })
    }
}

/// Scales one reward amount by a random non-unit factor.
pub struct PerturbReward;

impl MutationOperator for PerturbReward {
    fn id(&self) -> &'static str {
        "perturb_reward"
    }

    fn category(&self) -> OperatorCategory {
        OperatorCategory::Semantic
    }

    fn apply(&self, ctx: &MutationContext<'_>, rng: &mut SeededRng) -> Option<MutationOutcome> {
        let candidates: Vec<usize> = ctx
            .trace
            .events
            .iter()
            .enumerate()
            .filter(|(_, e)| {
                matches!(
                    e.payload,
                    EventPayload::TaskCreated { .. } | EventPayload::TaskCompleted { .. }
                )
            })
            .map(|(i, _)| i)
            .collect();
        if candidates.is_empty() {
            return None;
        }
        let index = candidates[rng.next_index(candidates.len())];
        // Factor in {2x, 3x, ..., 9x}; never 1x, so the mutant always differs.
        let factor = 2 + rng.next_bounded(8);
        let mut trace = ctx.trace.clone();
        let seq = trace.events[index].seq;
        match &mut trace.events[index].payload {
            EventPayload::TaskCreated { reward_amount, .. } => {
                *reward_amount = reward_amount.saturating_mul(factor);
            }
            EventPayload::TaskCompleted { reward_paid, .. } => {
                *reward_paid = reward_paid.saturating_mul(factor);
            }
            _ => return None,
        }
        Some(MutationOutcome {
            trace,
            description: format!("scaled reward at seq {seq} by {factor}x"),
        })
    }
}

// ============================================================================
// STRUCTURAL OPERATORS
// ============================================================================

/// Removes one non-initial event.
///
/// The first event of an entity is never dropped directly: removing a
/// `discovered`/`dispute_initiated` creates an orphaned-lifecycle trace,
/// which is the territory of chaos operators.
pub struct DropEvent;

impl MutationOperator for DropEvent {
    fn id(&self) -> &'static str {
        "drop_event"
    }

    fn category(&self) -> OperatorCategory {
        OperatorCategory::Structural
    }

    fn apply(&self, ctx: &MutationContext<'_>, rng: &mut SeededRng) -> Option<MutationOutcome> {
        let candidates: Vec<usize> = ctx
            .trace
            .events
            .iter()
            .enumerate()
            .filter(|(_, e)| {
                !matches!(
                    e.kind(),
                    TimelineEventKind::Discovered | TimelineEventKind::DisputeInitiated
                )
            })
            .map(|(i, _)| i)
            .collect();
        if candidates.is_empty() {
            return None;
        }
        let index = candidates[rng.next_index(candidates.len())];
        let mut trace = ctx.trace.clone();
        let removed = trace.events.remove(index);
        Some(MutationOutcome {
            trace,
            description: format!("dropped {} at seq {}", removed.kind(), removed.seq),
        })
    }
}

/// Appends a copy of one event with a fresh sequence number.
pub struct DuplicateEvent;

impl MutationOperator for DuplicateEvent {
    fn id(&self) -> &'static str {
        "duplicate_event"
    }

    fn category(&self) -> OperatorCategory {
        OperatorCategory::Structural
    }

    fn apply(&self, ctx: &MutationContext<'_>, rng: &mut SeededRng) -> Option<MutationOutcome> {
        if ctx.trace.events.is_empty() {
            return None;
        }
        let index = rng.next_index(ctx.trace.events.len());
        let mut trace = ctx.trace.clone();
        let mut dup = trace.events[index].clone();
        let source_seq = dup.seq;
        let last_seq = trace.events.last().map(|e| e.seq).unwrap_or(0);
        dup.seq = last_seq + 1;
        trace.events.push(dup);
        Some(MutationOutcome {
            trace,
            description: format!("duplicated seq {source_seq} as seq {}", last_seq + 1),
        })
    }
}

/// Swaps the payloads of two adjacent events, keeping sequence numbers.
///
/// The trace stays seq-valid but the lifecycle order is perturbed, e.g. a
/// claim observed before its task creation.
pub struct SwapAdjacentEvents;

impl MutationOperator for SwapAdjacentEvents {
    fn id(&self) -> &'static str {
        "swap_adjacent_events"
    }

    fn category(&self) -> OperatorCategory {
        OperatorCategory::Structural
    }

    fn apply(&self, ctx: &MutationContext<'_>, rng: &mut SeededRng) -> Option<MutationOutcome> {
        if ctx.trace.events.len() < 2 {
            return None;
        }
        let index = rng.next_index(ctx.trace.events.len() - 1);
        let mut trace = ctx.trace.clone();
        let (left, right) = (trace.events[index].seq, trace.events[index + 1].seq);
        let payload = trace.events[index].payload.clone();
        trace.events[index].payload = trace.events[index + 1].payload.clone();
        trace.events[index + 1].payload = payload;
        Some(MutationOutcome {
            trace,
            description: format!("swapped payloads at seq {left} and seq {right}"),
        })
    }
}

// ============================================================================
// CHAOS OPERATORS
// ============================================================================

/// Truncates the trace at a random point, leaving at least one event.
pub struct TruncateTrace;

impl MutationOperator for TruncateTrace {
    fn id(&self) -> &'static str {
        "truncate_trace"
    }

    fn category(&self) -> OperatorCategory {
        OperatorCategory::Chaos
    }

    fn apply(&self, ctx: &MutationContext<'_>, rng: &mut SeededRng) -> Option<MutationOutcome> {
        if ctx.trace.events.len() < 2 {
            return None;
        }
        let keep = 1 + rng.next_index(ctx.trace.events.len() - 1);
        let mut trace = ctx.trace.clone();
        let dropped = trace.events.len() - keep;
        trace.events.truncate(keep);
        Some(MutationOutcome {
            trace,
            description: format!("truncated to {keep} events ({dropped} dropped)"),
        })
    }
}

/// Replaces numeric payload fields of one event with arbitrary values.
pub struct CorruptPayload;

impl MutationOperator for CorruptPayload {
    fn id(&self) -> &'static str {
        "corrupt_payload"
    }

    fn category(&self) -> OperatorCategory {
        OperatorCategory::Chaos
    }

    fn apply(&self, ctx: &MutationContext<'_>, rng: &mut SeededRng) -> Option<MutationOutcome> {
        if ctx.trace.events.is_empty() {
            return None;
        }
        let index = rng.next_index(ctx.trace.events.len());
        let mut trace = ctx.trace.clone();
        let seq = trace.events[index].seq;
        match &mut trace.events[index].payload {
            EventPayload::TaskCreated {
                reward_amount,
                required_capabilities,
                ..
            } => {
                *reward_amount = rng.next_u64();
                *required_capabilities = rng.next_u64();
            }
            EventPayload::TaskClaimed {
                current_workers,
                max_workers,
                ..
            } => {
                *current_workers = rng.next_bounded(256) as u8;
                *max_workers = rng.next_bounded(256) as u8;
            }
            EventPayload::VerifierVerdict { proof_hash, .. }
            | EventPayload::TaskCompleted { proof_hash, .. } => {
                *proof_hash = format!("{:016x}", rng.next_u64());
            }
            EventPayload::TaskFailed { reason_code, .. } => {
                *reason_code = rng.next_bounded(256) as u8;
            }
            EventPayload::TaskCancelled { refund_amount, .. } => {
                *refund_amount = rng.next_u64();
            }
            EventPayload::DisputeInitiated {
                voting_deadline,
                resolution_type,
                ..
            } => {
                *voting_deadline = rng.next_u64() as i64;
                *resolution_type = rng.next_bounded(256) as u8;
            }
            EventPayload::DisputeVoteCast {
                votes_for,
                votes_against,
                ..
            }
            | EventPayload::DisputeResolved {
                votes_for,
                votes_against,
                ..
            } => {
                *votes_for = rng.next_u64();
                *votes_against = rng.next_u64();
            }
            EventPayload::DisputeExpired {
                refund_amount,
                creator_amount,
                worker_amount,
                ..
            } => {
                *refund_amount = rng.next_u64();
                *creator_amount = rng.next_u64();
                *worker_amount = rng.next_u64();
            }
            EventPayload::DisputeCancelled { .. } => {
                // No numeric fields; corrupt the envelope timestamp instead.
                trace.events[index].timestamp_ms = rng.next_u64() as i64;
            }
        }
        Some(MutationOutcome {
            trace,
            description: format!("corrupted payload at seq {seq}"),
        })
    }
}

/// Renumbers one event's seq backwards, breaking trace monotonicity.
pub struct ScrambleSequence;

impl MutationOperator for ScrambleSequence {
    fn id(&self) -> &'static str {
        "scramble_sequence"
    }

    fn category(&self) -> OperatorCategory {
        OperatorCategory::Chaos
    }

    fn apply(&self, ctx: &MutationContext<'_>, rng: &mut SeededRng) -> Option<MutationOutcome> {
        if ctx.trace.events.len() < 2 {
            return None;
        }
        // Pick a non-first event and collide it with its predecessor.
        let index = 1 + rng.next_index(ctx.trace.events.len() - 1);
        let mut trace = ctx.trace.clone();
        let prev = trace.events[index - 1].seq;
        let old = trace.events[index].seq;
        trace.events[index].seq = prev;
        Some(MutationOutcome {
            trace,
            description: format!("rewound seq {old} to duplicate seq {prev}"),
        })
    }
}

/// The full builtin operator set, in registration order.
pub fn builtin_operators() -> Vec<Box<dyn MutationOperator>> {
    vec![
        Box::new(FlipVerdict),
        Box::new(PerturbReward),
        Box::new(DropEvent),
        Box::new(DuplicateEvent),
        Box::new(SwapAdjacentEvents),
        Box::new(TruncateTrace),
        Box::new(CorruptPayload),
        Box::new(ScrambleSequence),
    ]
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use agenc_test_utils::{sample_dispute_trace, sample_task_trace};

    fn ctx(trace: &TrajectoryTrace) -> MutationContext<'_> {
        MutationContext {
            scenario_id: "scenario-1",
            trace,
        }
    }

    #[test]
    fn test_builtin_ids_are_unique() {
        let ops = builtin_operators();
        let mut ids: Vec<&str> = ops.iter().map(|o| o.id()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), ops.len());
    }

    #[test]
    fn test_operators_are_seed_deterministic() {
        let trace = sample_task_trace("task-1");
        for op in builtin_operators() {
            let mut a = SeededRng::derived(7, &["scenario-1", op.id()]);
            let mut b = SeededRng::derived(7, &["scenario-1", op.id()]);
            let out_a = op.apply(&ctx(&trace), &mut a);
            let out_b = op.apply(&ctx(&trace), &mut b);
            match (out_a, out_b) {
                (Some(x), Some(y)) => {
                    assert_eq!(x.trace, y.trace, "operator {} not deterministic", op.id());
                }
                (None, None) => {}
                _ => panic!("operator {} nondeterministic applicability", op.id()),
            }
        }
    }

    #[test]
    fn test_mutants_differ_from_source() {
        let trace = sample_task_trace("task-1");
        for op in builtin_operators() {
            let mut rng = SeededRng::derived(42, &["scenario-1", op.id()]);
            if let Some(out) = op.apply(&ctx(&trace), &mut rng) {
                assert_ne!(out.trace, trace, "operator {} produced a no-op", op.id());
            }
        }
    }

    #[test]
    fn test_flip_verdict_requires_verdict_event() {
        let mut trace = sample_task_trace("task-1");
        trace
            .events
            .retain(|e| !matches!(e.payload, EventPayload::VerifierVerdict { .. }));
        let mut rng = SeededRng::seeded(1);
        assert!(FlipVerdict.apply(&ctx(&trace), &mut rng).is_none());
    }

    #[test]
    fn test_flip_verdict_flips_dispute_votes_too() {
        let trace = sample_dispute_trace("dispute-1", "task-1");
        let mut rng = SeededRng::seeded(3);
        let out = FlipVerdict.apply(&ctx(&trace), &mut rng).unwrap();
        assert_ne!(out.trace, trace);
    }

    #[test]
    fn test_drop_event_never_drops_initial_events() {
        let trace = sample_task_trace("task-1");
        for seed in 0..32u64 {
            let mut rng = SeededRng::seeded(seed + 1);
            let out = DropEvent.apply(&ctx(&trace), &mut rng).unwrap();
            let kinds: Vec<_> = out.trace.events.iter().map(|e| e.kind()).collect();
            assert!(kinds.contains(&TimelineEventKind::Discovered));
        }
    }

    #[test]
    fn test_duplicate_event_keeps_trace_valid() {
        let trace = sample_task_trace("task-1");
        let mut rng = SeededRng::seeded(9);
        let out = DuplicateEvent.apply(&ctx(&trace), &mut rng).unwrap();
        assert_eq!(out.trace.events.len(), trace.events.len() + 1);
        assert!(out.trace.validate().is_ok());
    }

    #[test]
    fn test_swap_keeps_seq_order() {
        let trace = sample_task_trace("task-1");
        let mut rng = SeededRng::seeded(11);
        let out = SwapAdjacentEvents.apply(&ctx(&trace), &mut rng).unwrap();
        assert!(out.trace.validate().is_ok());
        assert_ne!(out.trace, trace);
    }

    #[test]
    fn test_truncate_leaves_at_least_one_event() {
        let trace = sample_task_trace("task-1");
        for seed in 1..32u64 {
            let mut rng = SeededRng::seeded(seed);
            let out = TruncateTrace.apply(&ctx(&trace), &mut rng).unwrap();
            assert!(!out.trace.events.is_empty());
            assert!(out.trace.events.len() < trace.events.len());
        }
    }

    #[test]
    fn test_scramble_sequence_breaks_validation() {
        let trace = sample_task_trace("task-1");
        let mut rng = SeededRng::seeded(17);
        let out = ScrambleSequence.apply(&ctx(&trace), &mut rng).unwrap();
        assert!(out.trace.validate().is_err());
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_mutants_stay_seq_sorted_or_invalid(seed in 1u64..10_000) {
                // Operators either keep the trace valid or break it in a way
                // validate() reports; they never silently corrupt ordering.
                let trace = sample_task_trace("task-1");
                for op in builtin_operators() {
                    let mut rng = SeededRng::derived(seed, &["scenario-p", op.id()]);
                    if let Some(out) = op.apply(&ctx(&trace), &mut rng) {
                        if out.trace.validate().is_ok() {
                            let seqs: Vec<u64> =
                                out.trace.events.iter().map(|e| e.seq).collect();
                            let mut sorted = seqs.clone();
                            sorted.sort_unstable();
                            prop_assert_eq!(seqs, sorted);
                        }
                    }
                }
            }

            #[test]
            fn prop_same_seed_same_mutant(seed in any::<u64>()) {
                let trace = sample_task_trace("task-1");
                for op in builtin_operators() {
                    let mut a = SeededRng::derived(seed, &["scenario-p", op.id()]);
                    let mut b = SeededRng::derived(seed, &["scenario-p", op.id()]);
                    let out_a = op.apply(&ctx(&trace), &mut a).map(|o| o.trace);
                    let out_b = op.apply(&ctx(&trace), &mut b).map(|o| o.trace);
                    prop_assert_eq!(out_a, out_b);
                }
            }
        }
    }

    #[test]
    fn test_operators_reject_empty_trace() {
        let empty = TrajectoryTrace {
            schema_version: agenc_core::TRACE_SCHEMA_VERSION,
            trace_id: "trace-empty".to_string(),
            seed: 0,
            events: Vec::new(),
        };
        for op in builtin_operators() {
            let mut rng = SeededRng::seeded(1);
            assert!(op.apply(&ctx(&empty), &mut rng).is_none(), "{}", op.id());
        }
    }
}
