//! Schema-versioned mutation benchmark artifacts.
//!
//! An artifact is a pure function of its inputs: run ids are content-derived
//! and no wall-clock field participates, so identical `(seed, scenarios,
//! registry, executor)` inputs serialize to byte-identical JSON.

use agenc_core::{derive_short_id, AgencResult, ParseError};
use serde::{Deserialize, Serialize};

use crate::operators::OperatorCategory;

/// Current artifact schema version. Readers must reject anything else.
pub const MUTATION_ARTIFACT_SCHEMA_VERSION: u32 = 1;

/// Namespace for content-derived run ids.
const RUN_ID_NAMESPACE: &str = "agenc.run";

// ============================================================================
// METRICS
// ============================================================================

/// Scored metrics for one rollup scope.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct MetricSet {
    /// Fraction of runs that passed.
    pub pass_rate: f64,
    /// Mean conformance across runs (1.0 = no violations).
    pub conformance_score: f64,
    /// Total reward delta per unit of cost; 0.0 when no cost was spent.
    pub cost_normalized_utility: f64,
}

/// Per-metric deltas against a baseline artifact (`current - baseline`).
///
/// Negative values are regressions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct MetricDeltas {
    pub pass_rate: f64,
    pub conformance_score: f64,
    pub cost_normalized_utility: f64,
}

impl MetricDeltas {
    pub fn between(current: &MetricSet, baseline: &MetricSet) -> Self {
        Self {
            pass_rate: current.pass_rate - baseline.pass_rate,
            conformance_score: current.conformance_score - baseline.conformance_score,
            cost_normalized_utility: current.cost_normalized_utility
                - baseline.cost_normalized_utility,
        }
    }
}

// ============================================================================
// RECORDS & ROLLUPS
// ============================================================================

/// One executed mutant run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Content-derived id over `(seed, scenario, operator)`.
    pub run_id: String,
    pub scenario_id: String,
    pub operator_id: String,
    pub category: OperatorCategory,
    pub passed: bool,
    /// Execution exceeded the configured budget; always counted as failed.
    pub timed_out: bool,
    pub conformance: f64,
    pub cost_units: f64,
    pub reward_delta: f64,
    pub elapsed_ms: u64,
    pub description: String,
}

impl RunRecord {
    pub fn derive_run_id(seed: u64, scenario_id: &str, operator_id: &str) -> String {
        derive_short_id(
            RUN_ID_NAMESPACE,
            &[&seed.to_string(), scenario_id, operator_id],
        )
    }
}

/// Rollup of all runs for one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRollup {
    pub scenario_id: String,
    /// Set when every run for the scenario shares one category; chaos
    /// scenarios are identified this way by the gate.
    pub category: Option<OperatorCategory>,
    pub runs: usize,
    pub passed_runs: usize,
    pub metrics: MetricSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deltas_from_baseline: Option<MetricDeltas>,
}

/// Rollup of all runs for one operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorRollup {
    pub operator_id: String,
    pub category: OperatorCategory,
    pub runs: usize,
    pub passed_runs: usize,
    pub metrics: MetricSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deltas_from_baseline: Option<MetricDeltas>,
}

/// Whole-artifact rollup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AggregateRollup {
    pub runs: usize,
    pub passed_runs: usize,
    pub metrics: MetricSet,
    pub chaos_runs: usize,
    pub chaos_failed_runs: usize,
    /// `chaos_failed_runs / chaos_runs`; 0.0 when no chaos runs exist.
    pub chaos_fail_rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deltas_from_baseline: Option<MetricDeltas>,
}

// ============================================================================
// ARTIFACT
// ============================================================================

/// The complete output of one mutation benchmark run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationArtifact {
    pub schema_version: u32,
    pub seed: u64,
    pub runs: Vec<RunRecord>,
    pub scenarios: Vec<ScenarioRollup>,
    pub operators: Vec<OperatorRollup>,
    pub aggregate: AggregateRollup,
}

impl MutationArtifact {
    /// Parse an artifact from JSON, rejecting unknown schema versions.
    ///
    /// # Errors
    ///
    /// `ParseError::MalformedRecord` for invalid JSON;
    /// `ParseError::UnknownSchemaVersion` for any version other than
    /// [`MUTATION_ARTIFACT_SCHEMA_VERSION`].
    pub fn parse(json: &str) -> AgencResult<Self> {
        let artifact: Self = serde_json::from_str(json).map_err(|e| ParseError::MalformedRecord {
            reason: format!("mutation artifact: {e}"),
        })?;
        if artifact.schema_version != MUTATION_ARTIFACT_SCHEMA_VERSION {
            return Err(ParseError::UnknownSchemaVersion {
                found: artifact.schema_version,
                supported: MUTATION_ARTIFACT_SCHEMA_VERSION,
            }
            .into());
        }
        Ok(artifact)
    }

    /// Pretty JSON serialization (key order is canonical).
    pub fn to_json_pretty(&self) -> AgencResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            ParseError::Serialization {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Find a scenario rollup by id.
    pub fn scenario(&self, scenario_id: &str) -> Option<&ScenarioRollup> {
        self.scenarios.iter().find(|s| s.scenario_id == scenario_id)
    }

    /// Find an operator rollup by id.
    pub fn operator(&self, operator_id: &str) -> Option<&OperatorRollup> {
        self.operators.iter().find(|o| o.operator_id == operator_id)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_artifact() -> MutationArtifact {
        let metrics = MetricSet {
            pass_rate: 0.5,
            conformance_score: 0.9,
            cost_normalized_utility: 1.25,
        };
        MutationArtifact {
            schema_version: MUTATION_ARTIFACT_SCHEMA_VERSION,
            seed: 42,
            runs: vec![RunRecord {
                run_id: RunRecord::derive_run_id(42, "scenario-1", "flip_verdict"),
                scenario_id: "scenario-1".to_string(),
                operator_id: "flip_verdict".to_string(),
                category: OperatorCategory::Semantic,
                passed: true,
                timed_out: false,
                conformance: 0.9,
                cost_units: 4.0,
                reward_delta: 5.0,
                elapsed_ms: 12,
                description: "flipped verdict at seq 2".to_string(),
            }],
            scenarios: vec![ScenarioRollup {
                scenario_id: "scenario-1".to_string(),
                category: None,
                runs: 1,
                passed_runs: 1,
                metrics,
                deltas_from_baseline: None,
            }],
            operators: vec![OperatorRollup {
                operator_id: "flip_verdict".to_string(),
                category: OperatorCategory::Semantic,
                runs: 1,
                passed_runs: 1,
                metrics,
                deltas_from_baseline: None,
            }],
            aggregate: AggregateRollup {
                runs: 1,
                passed_runs: 1,
                metrics,
                ..AggregateRollup::default()
            },
        }
    }

    #[test]
    fn test_round_trip() {
        let artifact = sample_artifact();
        let json = artifact.to_json_pretty().unwrap();
        let back = MutationArtifact::parse(&json).unwrap();
        assert_eq!(back, artifact);
    }

    #[test]
    fn test_unknown_schema_version_rejected() {
        let mut artifact = sample_artifact();
        artifact.schema_version = 2;
        let json = artifact.to_json_pretty().unwrap();
        let err = MutationArtifact::parse(&json).unwrap_err();
        assert!(matches!(
            err,
            agenc_core::AgencError::Parse(ParseError::UnknownSchemaVersion { found: 2, .. })
        ));
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(MutationArtifact::parse("{not json").is_err());
    }

    #[test]
    fn test_run_id_is_content_derived() {
        let a = RunRecord::derive_run_id(42, "scenario-1", "flip_verdict");
        let b = RunRecord::derive_run_id(42, "scenario-1", "flip_verdict");
        let c = RunRecord::derive_run_id(43, "scenario-1", "flip_verdict");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn test_metric_deltas_are_current_minus_baseline() {
        let current = MetricSet {
            pass_rate: 0.3,
            conformance_score: 0.8,
            cost_normalized_utility: 1.0,
        };
        let baseline = MetricSet {
            pass_rate: 0.9,
            conformance_score: 0.7,
            cost_normalized_utility: 1.5,
        };
        let deltas = MetricDeltas::between(&current, &baseline);
        assert!((deltas.pass_rate - (-0.6)).abs() < 1e-9);
        assert!((deltas.conformance_score - 0.1).abs() < 1e-9);
        assert!((deltas.cost_normalized_utility - (-0.5)).abs() < 1e-9);
    }
}
