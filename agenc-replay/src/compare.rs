//! Comparison service: cross-check a projected event stream against a
//! locally recorded trace.
//!
//! Both sides replay independently through the engine; events are then
//! paired per entity by sequence-within-entity and diffed. Anomaly order
//! is deterministic: entities in PDA order, events in arrival order,
//! replay-side rejections after pairing anomalies, the top-level hash
//! check last. Running `compare` twice on identical inputs yields an
//! identical report.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use thiserror::Error;

use agenc_core::{
    hash_canonical, AgencError, AlertDispatcher, Anomaly, AnomalyCode, ComparisonStatus,
    EventPayload, MetricsSink, NoopMetricsSink, ProjectedTimelineEvent, ReplayComparisonReport,
    ReplayResult, ReplaySideSummary, TimelineEventKind, TrajectoryEvent, TrajectoryTrace,
    TRACE_SCHEMA_VERSION,
};

use crate::engine::{replay, ReplayMode};

// ============================================================================
// OPTIONS & ERRORS
// ============================================================================

/// Whether anomalies fail the call or resolve into a mismatched report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strictness {
    /// Any anomaly fails the call with a typed error carrying the report.
    Strict,
    /// The call always resolves; divergence is `status: mismatched`.
    #[default]
    Lenient,
}

/// Comparison options.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComparisonOptions {
    pub strictness: Strictness,
}

/// Strict-mode comparison failure. Carries the full machine-readable
/// report so callers can branch on anomaly codes.
#[derive(Debug, Clone, Error)]
pub enum ComparisonError {
    #[error("Comparison found {} anomalies across {} tasks and {} disputes",
        .report.anomalies.len(), .report.task_ids.len(), .report.dispute_ids.len())]
    Mismatched { report: Box<ReplayComparisonReport> },

    #[error(transparent)]
    Replay(#[from] AgencError),
}

// ============================================================================
// SERVICE
// ============================================================================

/// Comparison service with injected observability collaborators.
pub struct ComparisonService {
    metrics: Arc<dyn MetricsSink>,
    alerts: Option<Arc<dyn AlertDispatcher>>,
}

impl Default for ComparisonService {
    fn default() -> Self {
        Self::new()
    }
}

impl ComparisonService {
    pub fn new() -> Self {
        Self {
            metrics: Arc::new(NoopMetricsSink),
            alerts: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_alerts(mut self, alerts: Arc<dyn AlertDispatcher>) -> Self {
        self.alerts = Some(alerts);
        self
    }

    /// Compare a projected event stream against a locally recorded trace.
    ///
    /// # Errors
    ///
    /// Trace parse failures always raise. In strict mode any anomaly
    /// raises [`ComparisonError::Mismatched`] with the full report.
    pub fn compare(
        &self,
        projected: &[ProjectedTimelineEvent],
        local: &TrajectoryTrace,
        options: &ComparisonOptions,
    ) -> Result<ReplayComparisonReport, ComparisonError> {
        let started = Instant::now();

        let projected_trace = synthesize_trace(projected, local.seed);
        let local_replay = replay(local, ReplayMode::Lenient)?;
        let projected_replay = replay(&projected_trace, ReplayMode::Lenient)?;

        let mut anomalies = Vec::new();
        pair_and_diff(projected, local, &mut anomalies);
        collect_side_anomalies(&projected_replay, "projected", &mut anomalies);
        collect_side_anomalies(&local_replay, "local", &mut anomalies);

        if local_replay.deterministic_hash != projected_replay.deterministic_hash {
            anomalies.push(Anomaly::error(
                AnomalyCode::HashMismatch,
                "deterministic replay hashes diverge",
                json!({
                    "scope": "deterministic_hash",
                    "local": local_replay.deterministic_hash,
                    "projected": projected_replay.deterministic_hash,
                }),
            ));
        }

        let status = if anomalies.is_empty() {
            ComparisonStatus::Clean
        } else {
            ComparisonStatus::Mismatched
        };

        let report = ReplayComparisonReport {
            status,
            mismatch_count: anomalies.len(),
            task_ids: union_keys(local_replay.tasks.keys(), projected_replay.tasks.keys()),
            dispute_ids: union_keys(
                local_replay.disputes.keys(),
                projected_replay.disputes.keys(),
            ),
            local_replay: ReplaySideSummary {
                deterministic_hash: local_replay.deterministic_hash.clone(),
                summary: local_replay.summary.clone(),
            },
            projected_replay: ReplaySideSummary {
                deterministic_hash: projected_replay.deterministic_hash.clone(),
                summary: projected_replay.summary.clone(),
            },
            anomalies,
        };

        self.emit(&report, started);

        match (options.strictness, report.status) {
            (Strictness::Strict, ComparisonStatus::Mismatched) => {
                Err(ComparisonError::Mismatched {
                    report: Box::new(report),
                })
            }
            _ => Ok(report),
        }
    }

    fn emit(&self, report: &ReplayComparisonReport, started: Instant) {
        self.metrics.incr_counter("comparison.total", 1);
        if report.status == ComparisonStatus::Mismatched {
            self.metrics.incr_counter("comparison.mismatches", 1);
        }
        let mut per_code: BTreeMap<&'static str, u64> = BTreeMap::new();
        for anomaly in &report.anomalies {
            *per_code.entry(anomaly.code.as_str()).or_insert(0) += 1;
        }
        for (code, count) in per_code {
            self.metrics
                .incr_counter(&format!("comparison.anomaly.{code}"), count);
        }
        self.metrics.observe_histogram(
            "comparison.latency_ms",
            started.elapsed().as_secs_f64() * 1_000.0,
        );
        if let Some(alerts) = &self.alerts {
            for anomaly in &report.anomalies {
                alerts.dispatch(anomaly);
            }
        }
    }
}

// ============================================================================
// PAIRING
// ============================================================================

/// Group events by owning entity, preserving arrival order.
fn by_entity<'a, I>(events: I) -> BTreeMap<String, Vec<(TimelineEventKind, &'a EventPayload)>>
where
    I: Iterator<Item = &'a EventPayload>,
{
    let mut map: BTreeMap<String, Vec<(TimelineEventKind, &'a EventPayload)>> = BTreeMap::new();
    for payload in events {
        map.entry(payload.entity_pda().clone())
            .or_default()
            .push((payload.kind(), payload));
    }
    map
}

fn pair_and_diff(
    projected: &[ProjectedTimelineEvent],
    local: &TrajectoryTrace,
    anomalies: &mut Vec<Anomaly>,
) {
    let projected_by_entity = by_entity(projected.iter().map(|e| &e.payload));
    let local_by_entity = by_entity(local.events.iter().map(|e| &e.payload));

    let entities: BTreeSet<&String> = projected_by_entity
        .keys()
        .chain(local_by_entity.keys())
        .collect();

    for entity in entities {
        let empty = Vec::new();
        let p_events = projected_by_entity.get(entity).unwrap_or(&empty);
        let l_events = local_by_entity.get(entity).unwrap_or(&empty);

        for index in 0..p_events.len().max(l_events.len()) {
            match (p_events.get(index), l_events.get(index)) {
                (Some((p_kind, p_payload)), Some((l_kind, l_payload))) => {
                    if p_kind != l_kind {
                        anomalies.push(Anomaly::error(
                            AnomalyCode::TypeMismatch,
                            format!(
                                "event {index} for {entity}: projected {p_kind}, local {l_kind}"
                            ),
                            json!({
                                "entity_pda": entity,
                                "index": index,
                                "projected_kind": p_kind.as_str(),
                                "local_kind": l_kind.as_str(),
                            }),
                        ));
                    }
                    let p_hash = hash_canonical(p_payload).unwrap_or_default();
                    let l_hash = hash_canonical(l_payload).unwrap_or_default();
                    if p_hash != l_hash {
                        anomalies.push(Anomaly::error(
                            AnomalyCode::HashMismatch,
                            format!("event {index} for {entity}: payload hashes differ"),
                            json!({
                                "entity_pda": entity,
                                "index": index,
                                "projected_hash": p_hash,
                                "local_hash": l_hash,
                            }),
                        ));
                    }
                }
                (Some((p_kind, _)), None) => {
                    anomalies.push(Anomaly::error(
                        AnomalyCode::MissingEvent,
                        format!("event {index} ({p_kind}) for {entity} missing from local trace"),
                        json!({
                            "entity_pda": entity,
                            "index": index,
                            "kind": p_kind.as_str(),
                            "side": "projected_only",
                        }),
                    ));
                }
                (None, Some((l_kind, _))) => {
                    anomalies.push(Anomaly::warning(
                        AnomalyCode::ExtraEvent,
                        format!(
                            "event {index} ({l_kind}) for {entity} absent from projected stream"
                        ),
                        json!({
                            "entity_pda": entity,
                            "index": index,
                            "kind": l_kind.as_str(),
                            "side": "local_only",
                        }),
                    ));
                }
                (None, None) => unreachable!("index bounded by max of both lengths"),
            }
        }
    }
}

fn collect_side_anomalies(result: &ReplayResult, side: &str, anomalies: &mut Vec<Anomaly>) {
    for anomaly in &result.anomalies {
        let mut tagged = anomaly.clone();
        if let serde_json::Value::Object(ref mut map) = tagged.context {
            map.insert("side".to_string(), json!(side));
        }
        anomalies.push(tagged);
    }
}

fn union_keys<'a, A, B>(a: A, b: B) -> Vec<String>
where
    A: Iterator<Item = &'a String>,
    B: Iterator<Item = &'a String>,
{
    let set: BTreeSet<&String> = a.chain(b).collect();
    set.into_iter().cloned().collect()
}

/// Re-express projected events as a replayable trace.
fn synthesize_trace(projected: &[ProjectedTimelineEvent], seed: u64) -> TrajectoryTrace {
    TrajectoryTrace {
        schema_version: TRACE_SCHEMA_VERSION,
        trace_id: "projected".to_string(),
        seed,
        events: projected
            .iter()
            .enumerate()
            .map(|(i, e)| TrajectoryEvent {
                seq: i as u64,
                timestamp_ms: e.timestamp_ms,
                payload: e.payload.clone(),
            })
            .collect(),
    }
}

// =============================================================================
// TESTS
// =============================================================================
