//! Regression gate over mutation artifacts.
//!
//! Thresholds are non-negative maximum allowed drops: a scope violates when
//! its delta falls below `-max(0, threshold)`. Evaluation is total — it
//! collects every violation instead of stopping at the first, so one gate
//! run reports the full regression surface.

use std::collections::BTreeMap;

use agenc_core::{AgencResult, ValidationError};
use serde::{Deserialize, Serialize};

use crate::artifact::MutationArtifact;
use crate::operators::OperatorCategory;

// ============================================================================
// THRESHOLDS & POLICY
// ============================================================================

/// Gate thresholds. Each is the maximum allowed drop for its scope.
///
/// The default budget is zero everywhere: any regression fails the gate
/// until a threshold is explicitly relaxed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct GateThresholds {
    pub max_aggregate_pass_rate_drop: f64,
    pub max_aggregate_conformance_drop: f64,
    pub max_aggregate_cost_utility_drop: f64,
    pub max_scenario_pass_rate_drop: f64,
    pub max_operator_pass_rate_drop: f64,
    /// Chaos scenarios have a hard failure budget; the default of 0.0 means
    /// a single failed chaos run fails the gate.
    pub max_chaos_scenario_fail_rate: f64,
}

impl GateThresholds {
    /// Reject negative thresholds before evaluation runs.
    ///
    /// # Errors
    ///
    /// `ValidationError::InvalidValue` naming the offending field.
    pub fn validate(&self) -> AgencResult<()> {
        let fields = [
            ("max_aggregate_pass_rate_drop", self.max_aggregate_pass_rate_drop),
            ("max_aggregate_conformance_drop", self.max_aggregate_conformance_drop),
            ("max_aggregate_cost_utility_drop", self.max_aggregate_cost_utility_drop),
            ("max_scenario_pass_rate_drop", self.max_scenario_pass_rate_drop),
            ("max_operator_pass_rate_drop", self.max_operator_pass_rate_drop),
            ("max_chaos_scenario_fail_rate", self.max_chaos_scenario_fail_rate),
        ];
        for (field, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(ValidationError::InvalidValue {
                    field: field.to_string(),
                    value: value.to_string(),
                    reason: "threshold must be a non-negative finite number".to_string(),
                }
                .into());
            }
        }
        Ok(())
    }
}

/// Per-scope threshold overrides, most specific wins:
/// exact id, then category default, then the global threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GatePolicyManifest {
    #[serde(default)]
    pub scenario_overrides: BTreeMap<String, f64>,
    #[serde(default)]
    pub operator_overrides: BTreeMap<String, f64>,
    #[serde(default)]
    pub category_defaults: BTreeMap<OperatorCategory, f64>,
}

impl GatePolicyManifest {
    /// Reject negative overrides before evaluation runs.
    ///
    /// # Errors
    ///
    /// `ValidationError::InvalidValue` naming the offending entry.
    pub fn validate(&self) -> AgencResult<()> {
        let entries = self
            .scenario_overrides
            .iter()
            .map(|(k, v)| (format!("scenario_overrides.{k}"), *v))
            .chain(
                self.operator_overrides
                    .iter()
                    .map(|(k, v)| (format!("operator_overrides.{k}"), *v)),
            )
            .chain(
                self.category_defaults
                    .iter()
                    .map(|(k, v)| (format!("category_defaults.{k}"), *v)),
            );
        for (field, value) in entries {
            if !value.is_finite() || value < 0.0 {
                return Err(ValidationError::InvalidValue {
                    field,
                    value: value.to_string(),
                    reason: "override must be a non-negative finite number".to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    fn scenario_threshold(
        &self,
        scenario_id: &str,
        category: Option<OperatorCategory>,
        global: f64,
    ) -> f64 {
        if let Some(v) = self.scenario_overrides.get(scenario_id) {
            return *v;
        }
        if let Some(v) = category.and_then(|c| self.category_defaults.get(&c)) {
            return *v;
        }
        global
    }

    fn operator_threshold(
        &self,
        operator_id: &str,
        category: OperatorCategory,
        global: f64,
    ) -> f64 {
        if let Some(v) = self.operator_overrides.get(operator_id) {
            return *v;
        }
        if let Some(v) = self.category_defaults.get(&category) {
            return *v;
        }
        global
    }
}

// ============================================================================
// EVALUATION
// ============================================================================

/// Which rollup a violation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateScope {
    Aggregate,
    Scenario,
    Operator,
    Chaos,
}

impl GateScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aggregate => "aggregate",
            Self::Scenario => "scenario",
            Self::Operator => "operator",
            Self::Chaos => "chaos",
        }
    }
}

/// One threshold breach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateViolation {
    pub scope: GateScope,
    pub id: String,
    pub metric: String,
    pub delta: f64,
    /// The most negative delta the gate would still accept.
    pub min_allowed_delta: f64,
}

/// Complete gate verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateEvaluation {
    pub passed: bool,
    pub violations: Vec<GateViolation>,
    pub chaos_runs: usize,
    pub chaos_fail_rate: f64,
}

fn check(
    violations: &mut Vec<GateViolation>,
    scope: GateScope,
    id: &str,
    metric: &str,
    delta: f64,
    threshold: f64,
) {
    let min_allowed_delta = -threshold.max(0.0);
    if delta < min_allowed_delta {
        violations.push(GateViolation {
            scope,
            id: id.to_string(),
            metric: metric.to_string(),
            delta,
            min_allowed_delta,
        });
    }
}

/// Evaluate an artifact against thresholds and an optional policy manifest.
///
/// Scopes without baseline deltas are skipped (nothing to regress against);
/// the chaos budget is checked unconditionally.
pub fn evaluate(
    artifact: &MutationArtifact,
    thresholds: &GateThresholds,
    policy: Option<&GatePolicyManifest>,
) -> GateEvaluation {
    let mut violations = Vec::new();

    if let Some(deltas) = &artifact.aggregate.deltas_from_baseline {
        check(
            &mut violations,
            GateScope::Aggregate,
            "aggregate",
            "pass_rate",
            deltas.pass_rate,
            thresholds.max_aggregate_pass_rate_drop,
        );
        check(
            &mut violations,
            GateScope::Aggregate,
            "aggregate",
            "conformance_score",
            deltas.conformance_score,
            thresholds.max_aggregate_conformance_drop,
        );
        check(
            &mut violations,
            GateScope::Aggregate,
            "aggregate",
            "cost_normalized_utility",
            deltas.cost_normalized_utility,
            thresholds.max_aggregate_cost_utility_drop,
        );
    }

    for scenario in &artifact.scenarios {
        if let Some(deltas) = &scenario.deltas_from_baseline {
            let threshold = policy
                .map(|p| {
                    p.scenario_threshold(
                        &scenario.scenario_id,
                        scenario.category,
                        thresholds.max_scenario_pass_rate_drop,
                    )
                })
                .unwrap_or(thresholds.max_scenario_pass_rate_drop);
            check(
                &mut violations,
                GateScope::Scenario,
                &scenario.scenario_id,
                "pass_rate",
                deltas.pass_rate,
                threshold,
            );
        }
    }

    for operator in &artifact.operators {
        if let Some(deltas) = &operator.deltas_from_baseline {
            let threshold = policy
                .map(|p| {
                    p.operator_threshold(
                        &operator.operator_id,
                        operator.category,
                        thresholds.max_operator_pass_rate_drop,
                    )
                })
                .unwrap_or(thresholds.max_operator_pass_rate_drop);
            check(
                &mut violations,
                GateScope::Operator,
                &operator.operator_id,
                "pass_rate",
                deltas.pass_rate,
                threshold,
            );
        }
    }

    let chaos_fail_rate = artifact.aggregate.chaos_fail_rate;
    if chaos_fail_rate > thresholds.max_chaos_scenario_fail_rate {
        violations.push(GateViolation {
            scope: GateScope::Chaos,
            id: "chaos".to_string(),
            metric: "chaos_fail_rate".to_string(),
            delta: -chaos_fail_rate,
            min_allowed_delta: -thresholds.max_chaos_scenario_fail_rate.max(0.0),
        });
    }

    GateEvaluation {
        passed: violations.is_empty(),
        violations,
        chaos_runs: artifact.aggregate.chaos_runs,
        chaos_fail_rate,
    }
}

/// Render a verdict for terminal output.
pub fn format_evaluation(evaluation: &GateEvaluation) -> String {
    let mut out = String::new();
    if evaluation.passed {
        out.push_str("GATE PASSED\n");
    } else {
        out.push_str(&format!(
            "GATE FAILED ({} violation{})\n",
            evaluation.violations.len(),
            if evaluation.violations.len() == 1 { "" } else { "s" }
        ));
    }
    for v in &evaluation.violations {
        out.push_str(&format!(
            "  [{}] {} {}: delta {:+.4} below allowed {:+.4}\n",
            v.scope.as_str(),
            v.id,
            v.metric,
            v.delta,
            v.min_allowed_delta,
        ));
    }
    out.push_str(&format!(
        "  chaos: {} runs, fail rate {:.4}\n",
        evaluation.chaos_runs, evaluation.chaos_fail_rate,
    ));
    out
}

// =============================================================================
// TESTS
// =============================================================================
