//! AgenC Mutation - Seeded Mutation Benchmarks and Regression Gate
//!
//! Four layers: [`operators`] defines the seeded mutation operators,
//! [`engine`] selects candidates deterministically from a key-ordered
//! registry, [`runner`] executes candidates into schema-versioned
//! [`artifact`]s, and [`gate`] evaluates artifact deltas against
//! regression thresholds.

pub mod artifact;
pub mod engine;
pub mod gate;
pub mod operators;
pub mod runner;

pub use artifact::{
    AggregateRollup, MetricDeltas, MetricSet, MutationArtifact, OperatorRollup, RunRecord,
    ScenarioRollup, MUTATION_ARTIFACT_SCHEMA_VERSION,
};
pub use engine::{MutationCandidate, MutationEngine, SelectionOptions};
pub use gate::{
    evaluate, format_evaluation, GateEvaluation, GatePolicyManifest, GateScope, GateThresholds,
    GateViolation,
};
pub use operators::{
    builtin_operators, MutationContext, MutationOperator, MutationOutcome, OperatorCategory,
};
pub use runner::{
    ExecutionOutcome, MutationRunner, ReplayScenarioExecutor, RunnerOptions, Scenario,
    ScenarioExecutor, CHAOS_SCENARIO_PREFIX,
};
