//! Benchmark runner: candidate selection, execution, and rollups.
//!
//! The runner is deliberately ignorant of how a candidate is scored; the
//! [`ScenarioExecutor`] collaborator owns that. The builtin replay executor
//! reports no wall-clock timing, keeping artifacts byte-stable for
//! identical inputs; executors that measure real time trade that away.

use std::collections::BTreeMap;

use agenc_core::{EventPayload, TrajectoryTrace};
use agenc_replay::{replay, ReplayMode};

use crate::artifact::{
    AggregateRollup, MetricDeltas, MetricSet, MutationArtifact, OperatorRollup, RunRecord,
    ScenarioRollup, MUTATION_ARTIFACT_SCHEMA_VERSION,
};
use crate::engine::{MutationCandidate, MutationEngine, SelectionOptions};
use crate::operators::OperatorCategory;

/// Scenario id prefix that marks a chaos scenario for gate accounting.
pub const CHAOS_SCENARIO_PREFIX: &str = "chaos-";

// ============================================================================
// SCENARIOS & EXECUTION
// ============================================================================

/// One benchmark scenario: a named baseline trace to mutate and score.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub id: String,
    pub trace: TrajectoryTrace,
}

impl Scenario {
    pub fn new(id: impl Into<String>, trace: TrajectoryTrace) -> Self {
        Self {
            id: id.into(),
            trace,
        }
    }

    pub fn is_chaos(&self) -> bool {
        self.id.starts_with(CHAOS_SCENARIO_PREFIX)
    }
}

/// Scored outcome of executing one mutant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutionOutcome {
    pub passed: bool,
    /// Fraction of lifecycle transitions that applied cleanly, in `[0, 1]`.
    pub conformance: f64,
    pub cost_units: f64,
    /// Reward paid under the mutant minus reward paid under the baseline.
    pub reward_delta: f64,
    pub elapsed_ms: u64,
}

/// Executes one mutant against the system under test.
pub trait ScenarioExecutor {
    fn execute(&self, scenario: &Scenario, candidate: &MutationCandidate) -> ExecutionOutcome;
}

impl<F> ScenarioExecutor for F
where
    F: Fn(&Scenario, &MutationCandidate) -> ExecutionOutcome,
{
    fn execute(&self, scenario: &Scenario, candidate: &MutationCandidate) -> ExecutionOutcome {
        self(scenario, candidate)
    }
}

/// Builtin executor: replays the mutant through the lifecycle state
/// machines and scores conformance from the transition counts.
///
/// A mutant passes when it still validates and replays without invalid
/// transitions, meaning the mutation stayed within lifecycle rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplayScenarioExecutor;

impl ReplayScenarioExecutor {
    fn reward_paid(trace: &TrajectoryTrace) -> u64 {
        trace
            .events
            .iter()
            .map(|e| match e.payload {
                EventPayload::TaskCompleted { reward_paid, .. } => reward_paid,
                _ => 0,
            })
            .sum()
    }
}

impl ScenarioExecutor for ReplayScenarioExecutor {
    fn execute(&self, scenario: &Scenario, candidate: &MutationCandidate) -> ExecutionOutcome {
        let cost_units = candidate.trace.events.len() as f64;
        let result = match replay(&candidate.trace, ReplayMode::Lenient) {
            Ok(result) => result,
            Err(_) => {
                return ExecutionOutcome {
                    passed: false,
                    conformance: 0.0,
                    cost_units,
                    reward_delta: 0.0,
                    elapsed_ms: 0,
                }
            }
        };
        let total = result.summary.transitions_applied + result.summary.transitions_rejected;
        let conformance = if total == 0 {
            1.0
        } else {
            result.summary.transitions_applied as f64 / total as f64
        };
        let reward_delta = Self::reward_paid(&candidate.trace) as f64
            - Self::reward_paid(&scenario.trace) as f64;
        ExecutionOutcome {
            passed: result.summary.transitions_rejected == 0,
            conformance,
            cost_units,
            reward_delta,
            elapsed_ms: 0,
        }
    }
}

// ============================================================================
// RUNNER
// ============================================================================

/// Runner options; the selection seed is the artifact seed.
#[derive(Debug, Clone, Default)]
pub struct RunnerOptions {
    pub selection: SelectionOptions,
    /// Runs exceeding this budget are recorded as timed-out failures.
    pub timeout_ms: Option<u64>,
}

/// Drives every scenario through selection and execution into an artifact.
pub struct MutationRunner<'a> {
    engine: &'a MutationEngine,
}

impl<'a> MutationRunner<'a> {
    pub fn new(engine: &'a MutationEngine) -> Self {
        Self { engine }
    }

    /// Run the full benchmark.
    ///
    /// When `baseline` is given, every rollup carries
    /// `deltas_from_baseline = current - baseline` for scopes present in
    /// both artifacts.
    pub fn run(
        &self,
        scenarios: &[Scenario],
        executor: &dyn ScenarioExecutor,
        baseline: Option<&MutationArtifact>,
        options: &RunnerOptions,
    ) -> MutationArtifact {
        let mut runs = Vec::new();
        for scenario in scenarios {
            let candidates =
                self.engine
                    .select_candidates(&scenario.id, &scenario.trace, &options.selection);
            for candidate in candidates {
                let outcome = executor.execute(scenario, &candidate);
                let timed_out = options
                    .timeout_ms
                    .is_some_and(|budget| outcome.elapsed_ms > budget);
                runs.push(RunRecord {
                    run_id: RunRecord::derive_run_id(
                        options.selection.seed,
                        &candidate.scenario_id,
                        &candidate.operator_id,
                    ),
                    scenario_id: candidate.scenario_id,
                    operator_id: candidate.operator_id,
                    category: candidate.category,
                    passed: outcome.passed && !timed_out,
                    timed_out,
                    conformance: outcome.conformance,
                    cost_units: outcome.cost_units,
                    reward_delta: outcome.reward_delta,
                    elapsed_ms: outcome.elapsed_ms,
                    description: candidate.description,
                });
            }
        }

        let scenarios_rollup = rollup_scenarios(&runs, baseline);
        let operators_rollup = rollup_operators(&runs, baseline);
        let aggregate = rollup_aggregate(&runs, baseline);

        MutationArtifact {
            schema_version: MUTATION_ARTIFACT_SCHEMA_VERSION,
            seed: options.selection.seed,
            runs,
            scenarios: scenarios_rollup,
            operators: operators_rollup,
            aggregate,
        }
    }
}

// ============================================================================
// ROLLUPS
// ============================================================================

fn metrics_for(runs: &[&RunRecord]) -> MetricSet {
    if runs.is_empty() {
        return MetricSet::default();
    }
    let total = runs.len() as f64;
    let passed = runs.iter().filter(|r| r.passed).count() as f64;
    let conformance = runs.iter().map(|r| r.conformance).sum::<f64>() / total;
    let cost: f64 = runs.iter().map(|r| r.cost_units).sum();
    let reward: f64 = runs.iter().map(|r| r.reward_delta).sum();
    MetricSet {
        pass_rate: passed / total,
        conformance_score: conformance,
        cost_normalized_utility: if cost > 0.0 { reward / cost } else { 0.0 },
    }
}

fn is_chaos_run(run: &RunRecord) -> bool {
    run.category == OperatorCategory::Chaos || run.scenario_id.starts_with(CHAOS_SCENARIO_PREFIX)
}

fn rollup_scenarios(
    runs: &[RunRecord],
    baseline: Option<&MutationArtifact>,
) -> Vec<ScenarioRollup> {
    let mut by_scenario: BTreeMap<&str, Vec<&RunRecord>> = BTreeMap::new();
    for run in runs {
        by_scenario.entry(&run.scenario_id).or_default().push(run);
    }
    by_scenario
        .into_iter()
        .map(|(scenario_id, group)| {
            let metrics = metrics_for(&group);
            let first_category = group[0].category;
            let category = group
                .iter()
                .all(|r| r.category == first_category)
                .then_some(first_category);
            let deltas_from_baseline = baseline
                .and_then(|b| b.scenario(scenario_id))
                .map(|b| MetricDeltas::between(&metrics, &b.metrics));
            ScenarioRollup {
                scenario_id: scenario_id.to_string(),
                category,
                runs: group.len(),
                passed_runs: group.iter().filter(|r| r.passed).count(),
                metrics,
                deltas_from_baseline,
            }
        })
        .collect()
}

fn rollup_operators(
    runs: &[RunRecord],
    baseline: Option<&MutationArtifact>,
) -> Vec<OperatorRollup> {
    let mut by_operator: BTreeMap<&str, Vec<&RunRecord>> = BTreeMap::new();
    for run in runs {
        by_operator.entry(&run.operator_id).or_default().push(run);
    }
    by_operator
        .into_iter()
        .map(|(operator_id, group)| {
            let metrics = metrics_for(&group);
            let deltas_from_baseline = baseline
                .and_then(|b| b.operator(operator_id))
                .map(|b| MetricDeltas::between(&metrics, &b.metrics));
            OperatorRollup {
                operator_id: operator_id.to_string(),
                category: group[0].category,
                runs: group.len(),
                passed_runs: group.iter().filter(|r| r.passed).count(),
                metrics,
                deltas_from_baseline,
            }
        })
        .collect()
}

fn rollup_aggregate(runs: &[RunRecord], baseline: Option<&MutationArtifact>) -> AggregateRollup {
    let all: Vec<&RunRecord> = runs.iter().collect();
    let metrics = metrics_for(&all);
    let chaos_runs = runs.iter().filter(|r| is_chaos_run(r)).count();
    let chaos_failed_runs = runs.iter().filter(|r| is_chaos_run(r) && !r.passed).count();
    AggregateRollup {
        runs: runs.len(),
        passed_runs: runs.iter().filter(|r| r.passed).count(),
        metrics,
        chaos_runs,
        chaos_failed_runs,
        chaos_fail_rate: if chaos_runs == 0 {
            0.0
        } else {
            chaos_failed_runs as f64 / chaos_runs as f64
        },
        deltas_from_baseline: baseline
            .map(|b| MetricDeltas::between(&metrics, &b.aggregate.metrics)),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use agenc_test_utils::sample_task_trace;

    fn scenarios() -> Vec<Scenario> {
        vec![
            Scenario::new("scenario-a", sample_task_trace("task-a")),
            Scenario::new("chaos-storm", sample_task_trace("task-b")),
        ]
    }

    fn options(seed: u64) -> RunnerOptions {
        RunnerOptions {
            selection: SelectionOptions {
                seed,
                ..SelectionOptions::default()
            },
            timeout_ms: None,
        }
    }

    #[test]
    fn test_run_produces_byte_identical_artifacts() {
        let engine = MutationEngine::with_builtin_operators();
        let runner = MutationRunner::new(&engine);
        let a = runner.run(&scenarios(), &ReplayScenarioExecutor, None, &options(42));
        let b = runner.run(&scenarios(), &ReplayScenarioExecutor, None, &options(42));
        assert_eq!(a.to_json_pretty().unwrap(), b.to_json_pretty().unwrap());
    }

    #[test]
    fn test_rollup_counts_are_consistent() {
        let engine = MutationEngine::with_builtin_operators();
        let runner = MutationRunner::new(&engine);
        let artifact = runner.run(&scenarios(), &ReplayScenarioExecutor, None, &options(1));
        assert!(!artifact.runs.is_empty());
        let scenario_total: usize = artifact.scenarios.iter().map(|s| s.runs).sum();
        let operator_total: usize = artifact.operators.iter().map(|o| o.runs).sum();
        assert_eq!(scenario_total, artifact.runs.len());
        assert_eq!(operator_total, artifact.runs.len());
        assert_eq!(artifact.aggregate.runs, artifact.runs.len());
    }

    #[test]
    fn test_chaos_runs_counted_by_prefix_and_category() {
        let engine = MutationEngine::with_builtin_operators();
        let runner = MutationRunner::new(&engine);
        let artifact = runner.run(&scenarios(), &ReplayScenarioExecutor, None, &options(1));
        // Every run of chaos-storm counts, plus chaos-category runs elsewhere.
        let expected = artifact
            .runs
            .iter()
            .filter(|r| {
                r.scenario_id.starts_with(CHAOS_SCENARIO_PREFIX)
                    || r.category == OperatorCategory::Chaos
            })
            .count();
        assert_eq!(artifact.aggregate.chaos_runs, expected);
        assert!(artifact.aggregate.chaos_runs > 0);
    }

    #[test]
    fn test_deltas_present_with_baseline() {
        let engine = MutationEngine::with_builtin_operators();
        let runner = MutationRunner::new(&engine);
        let baseline = runner.run(&scenarios(), &ReplayScenarioExecutor, None, &options(42));
        let current = runner.run(
            &scenarios(),
            &ReplayScenarioExecutor,
            Some(&baseline),
            &options(42),
        );
        assert!(current.aggregate.deltas_from_baseline.is_some());
        for scenario in &current.scenarios {
            assert!(scenario.deltas_from_baseline.is_some());
        }
        // Identical inputs mean zero deltas.
        let deltas = current.aggregate.deltas_from_baseline.unwrap();
        assert!(deltas.pass_rate.abs() < 1e-12);
        assert!(deltas.conformance_score.abs() < 1e-12);
    }

    #[test]
    fn test_timeout_marks_run_failed() {
        let engine = MutationEngine::with_builtin_operators();
        let runner = MutationRunner::new(&engine);
        let slow = |_: &Scenario, candidate: &MutationCandidate| ExecutionOutcome {
            passed: true,
            conformance: 1.0,
            cost_units: candidate.trace.events.len() as f64,
            reward_delta: 0.0,
            elapsed_ms: 5_000,
        };
        let artifact = runner.run(
            &scenarios(),
            &slow,
            None,
            &RunnerOptions {
                selection: SelectionOptions {
                    seed: 1,
                    ..SelectionOptions::default()
                },
                timeout_ms: Some(1_000),
            },
        );
        assert!(artifact.runs.iter().all(|r| r.timed_out && !r.passed));
        assert_eq!(artifact.aggregate.passed_runs, 0);
    }

    #[test]
    fn test_replay_executor_scores_lifecycle_breakage() {
        let engine = MutationEngine::with_builtin_operators();
        let runner = MutationRunner::new(&engine);
        let artifact = runner.run(&scenarios(), &ReplayScenarioExecutor, None, &options(7));
        // swap_adjacent_events perturbs lifecycle order, which the replay
        // executor must score as a failure with reduced conformance.
        let swap = artifact
            .runs
            .iter()
            .find(|r| r.operator_id == "swap_adjacent_events")
            .unwrap();
        assert!(!swap.passed);
        assert!(swap.conformance < 1.0);
    }
}
