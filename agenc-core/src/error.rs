//! Error types for replay engine operations.
//!
//! The taxonomy is deliberately small: `ParseError` for malformed inputs
//! (always fails fast, never partially applied), `ValidationError` for
//! threshold/manifest schema violations (raised before any comparison
//! runs), and `StorageError` for the timeline store collaborator. The
//! comparison service's strict-mode error lives in `agenc-replay` because
//! it carries the full comparison report.
//!
//! Projection and replay are total over well-formed input: ambiguity is
//! encoded as anomalies, not errors. Only schema/shape violations raise.

use thiserror::Error;

/// Malformed artifact, trace, or manifest input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unknown schema version {found} (supported: {supported})")]
    UnknownSchemaVersion { found: u32, supported: u32 },

    #[error("Duplicate sequence number {seq} in trace {trace_id}")]
    DuplicateSequence { trace_id: String, seq: u64 },

    #[error("Non-monotonic sequence at position {index}: {seq} after {prev} in trace {trace_id}")]
    NonMonotonicSequence {
        trace_id: String,
        index: usize,
        seq: u64,
        prev: u64,
    },

    #[error("Malformed record: {reason}")]
    MalformedRecord { reason: String },

    #[error("Serialization failed: {reason}")]
    Serialization { reason: String },
}

/// Threshold or manifest schema violation, raised before evaluation runs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Invalid redaction pattern {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Invalid transition {kind} for {entity_pda} at seq {seq}: {reason}")]
    InvalidTransition {
        entity_pda: String,
        kind: String,
        seq: u64,
        reason: String,
    },
}

/// Timeline store collaborator errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Append failed: {reason}")]
    AppendFailed { reason: String },

    #[error("Cursor persistence failed: {reason}")]
    CursorFailed { reason: String },

    #[error("Event page fetch failed at cursor {cursor:?}: {reason}")]
    FetchFailed {
        cursor: Option<String>,
        reason: String,
    },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Master error type for replay engine operations.
#[derive(Debug, Clone, Error)]
pub enum AgencError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type alias for replay engine operations.
pub type AgencResult<T> = Result<T, AgencError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display_unknown_schema() {
        let err = ParseError::UnknownSchemaVersion {
            found: 9,
            supported: 1,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Unknown schema version 9"));
        assert!(msg.contains("supported: 1"));
    }

    #[test]
    fn test_parse_error_display_duplicate_sequence() {
        let err = ParseError::DuplicateSequence {
            trace_id: "t-1".to_string(),
            seq: 4,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Duplicate sequence number 4"));
        assert!(msg.contains("t-1"));
    }

    #[test]
    fn test_storage_error_display_fetch_failed() {
        let err = StorageError::FetchFailed {
            cursor: Some("page-2".to_string()),
            reason: "timeout".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("page-2"));
        assert!(msg.contains("timeout"));
    }

    #[test]
    fn test_agenc_error_from_variants() {
        let parse = AgencError::from(ParseError::MalformedRecord {
            reason: "bad".to_string(),
        });
        assert!(matches!(parse, AgencError::Parse(_)));

        let validation = AgencError::from(ValidationError::RequiredFieldMissing {
            field: "seed".to_string(),
        });
        assert!(matches!(validation, AgencError::Validation(_)));

        let storage = AgencError::from(StorageError::LockPoisoned);
        assert!(matches!(storage, AgencError::Storage(_)));
    }
}
