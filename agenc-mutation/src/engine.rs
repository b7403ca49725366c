//! Operator registry and deterministic candidate selection.
//!
//! Operators live in a key-ordered registry; selection walks them in id
//! order with a per-`(seed, scenario, operator)` derived rng, so the
//! candidate set is a pure function of `(seed, scenarios, registry)` and
//! never depends on registration or iteration order.

use std::collections::BTreeMap;
use std::sync::Arc;

use agenc_core::{AgencResult, SeededRng, TrajectoryTrace, ValidationError};

use crate::operators::{
    builtin_operators, MutationContext, MutationOperator, OperatorCategory,
};

// ============================================================================
// CANDIDATES
// ============================================================================

/// One mutant ready to run: a scenario paired with a mutated trace.
#[derive(Debug, Clone)]
pub struct MutationCandidate {
    pub scenario_id: String,
    pub operator_id: String,
    pub category: OperatorCategory,
    pub description: String,
    pub trace: TrajectoryTrace,
}

/// Candidate-selection options.
#[derive(Debug, Clone, Default)]
pub struct SelectionOptions {
    pub seed: u64,
    /// Restrict to these categories; `None` selects across all.
    pub categories: Option<Vec<OperatorCategory>>,
    /// Cap per scenario, applied after selection in id order.
    pub max_candidates_per_scenario: Option<usize>,
}

// ============================================================================
// ENGINE
// ============================================================================

/// Registry of mutation operators keyed by stable id.
#[derive(Default)]
pub struct MutationEngine {
    operators: BTreeMap<&'static str, Arc<dyn MutationOperator>>,
}

impl MutationEngine {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with the builtin operator set.
    pub fn with_builtin_operators() -> Self {
        let mut engine = Self::new();
        for op in builtin_operators() {
            // Builtin ids are unique; registration cannot fail here.
            let _ = engine.register(Arc::from(op));
        }
        engine
    }

    /// Register an operator.
    ///
    /// # Errors
    ///
    /// `ValidationError::InvalidValue` when an operator with the same id is
    /// already registered.
    pub fn register(&mut self, operator: Arc<dyn MutationOperator>) -> AgencResult<()> {
        let id = operator.id();
        if self.operators.contains_key(id) {
            return Err(ValidationError::InvalidValue {
                field: "operator_id".to_string(),
                value: id.to_string(),
                reason: "operator already registered".to_string(),
            }
            .into());
        }
        self.operators.insert(id, operator);
        Ok(())
    }

    /// Registered operators in id order.
    pub fn operators(&self) -> impl Iterator<Item = &Arc<dyn MutationOperator>> {
        self.operators.values()
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    /// Select mutation candidates for one scenario trace.
    ///
    /// Each operator gets its own rng derived from
    /// `(seed, scenario_id, operator_id)`, so adding or removing other
    /// operators never shifts an operator's output.
    pub fn select_candidates(
        &self,
        scenario_id: &str,
        trace: &TrajectoryTrace,
        options: &SelectionOptions,
    ) -> Vec<MutationCandidate> {
        let ctx = MutationContext { scenario_id, trace };
        let mut candidates = Vec::new();
        for (id, operator) in &self.operators {
            if let Some(categories) = &options.categories {
                if !categories.contains(&operator.category()) {
                    continue;
                }
            }
            let mut rng = SeededRng::derived(options.seed, &[scenario_id, id]);
            if let Some(outcome) = operator.apply(&ctx, &mut rng) {
                candidates.push(MutationCandidate {
                    scenario_id: scenario_id.to_string(),
                    operator_id: id.to_string(),
                    category: operator.category(),
                    description: outcome.description,
                    trace: outcome.trace,
                });
            }
        }
        if let Some(max) = options.max_candidates_per_scenario {
            candidates.truncate(max);
        }
        candidates
    }
}

// =============================================================================
// TESTS
// =============================================================================
