//! AgenC Replay - Deterministic Replay Engine and Comparison Service
//!
//! [`engine`] folds a trace into final task/dispute state with a
//! deterministic state hash; [`compare`] cross-checks a projected on-chain
//! event stream against a locally recorded trace and reports divergence
//! with a closed anomaly taxonomy.

pub mod compare;
pub mod engine;

pub use compare::{ComparisonError, ComparisonOptions, ComparisonService, Strictness};
pub use engine::{replay, ReplayMode};
