//! Anomaly taxonomy for state divergence.
//!
//! The set of anomaly codes is closed: comparison and replay never invent
//! new codes at runtime, so downstream consumers can branch exhaustively.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// ANOMALY CODES
// ============================================================================

/// Closed set of divergence codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyCode {
    HashMismatch,
    TypeMismatch,
    MissingEvent,
    ExtraEvent,
    TransitionInvalid,
}

impl AnomalyCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HashMismatch => "hash_mismatch",
            Self::TypeMismatch => "type_mismatch",
            Self::MissingEvent => "missing_event",
            Self::ExtraEvent => "extra_event",
            Self::TransitionInvalid => "transition_invalid",
        }
    }
}

impl std::fmt::Display for AnomalyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a detected anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalySeverity {
    Warning,
    Error,
}

/// A single detected divergence between two replayed states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub code: AnomalyCode,
    pub severity: AnomalySeverity,
    pub message: String,
    /// Machine-checkable context: entity PDA, event kinds, hashes.
    pub context: Value,
}

impl Anomaly {
    pub fn error(code: AnomalyCode, message: impl Into<String>, context: Value) -> Self {
        Self {
            code,
            severity: AnomalySeverity::Error,
            message: message.into(),
            context,
        }
    }

    pub fn warning(code: AnomalyCode, message: impl Into<String>, context: Value) -> Self {
        Self {
            code,
            severity: AnomalySeverity::Warning,
            message: message.into(),
            context,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
