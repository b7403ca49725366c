//! Sealing pipeline for evidence packs.
//!
//! Applied in a fixed order: dot-path field stripping on event payloads,
//! then regex redaction of string values, then actor pseudonymization.
//! The order matters: stripping removes whole fields before patterns see
//! them, and pseudonymization operates on the already-redacted case.

use std::collections::BTreeMap;

use agenc_core::{sha256_hex, AgencResult, Pubkey, ValidationError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::case::IncidentCase;

/// Fixed marker substituted for every redaction-pattern match.
pub const REDACTED_MARKER: &str = "[REDACTED]";

static DOT_PATH_RE: Lazy<Regex> = Lazy::new(|| {
    // Literal pattern, checked by test_dot_path_regex_compiles.
    Regex::new(r"^[A-Za-z0-9_]+(\.[A-Za-z0-9_]+)*$").expect("static dot-path pattern")
});

// ============================================================================
// POLICY
// ============================================================================

/// Declarative redaction policy for sealed packs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RedactionPolicy {
    /// Dot-paths stripped from each event record (e.g. `payload.proof_hash`).
    #[serde(default)]
    pub strip_paths: Vec<String>,
    /// Regex patterns whose matches are replaced with [`REDACTED_MARKER`].
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl RedactionPolicy {
    /// Validate paths and compile patterns.
    ///
    /// # Errors
    ///
    /// `ValidationError::InvalidValue` for malformed dot-paths and
    /// `ValidationError::InvalidPattern` for regexes that fail to compile.
    pub fn compile(&self) -> AgencResult<CompiledRedaction> {
        for path in &self.strip_paths {
            if !DOT_PATH_RE.is_match(path) {
                return Err(ValidationError::InvalidValue {
                    field: "strip_paths".to_string(),
                    value: path.clone(),
                    reason: "not a dot-separated field path".to_string(),
                }
                .into());
            }
        }
        let mut patterns = Vec::with_capacity(self.patterns.len());
        for pattern in &self.patterns {
            let compiled = Regex::new(pattern).map_err(|e| ValidationError::InvalidPattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;
            patterns.push(compiled);
        }
        Ok(CompiledRedaction {
            strip_paths: self
                .strip_paths
                .iter()
                .map(|p| p.split('.').map(String::from).collect())
                .collect(),
            patterns,
        })
    }
}

/// A validated, ready-to-apply redaction policy.
#[derive(Debug, Clone)]
pub struct CompiledRedaction {
    strip_paths: Vec<Vec<String>>,
    patterns: Vec<Regex>,
}

impl CompiledRedaction {
    /// Strip configured paths, then redact pattern matches, in place.
    pub fn apply_to_event(&self, event: &mut Value) {
        for path in &self.strip_paths {
            strip_path(event, path);
        }
        for pattern in &self.patterns {
            redact_strings(event, pattern);
        }
    }
}

fn strip_path(value: &mut Value, path: &[String]) {
    let Some((last, prefix)) = path.split_last() else {
        return;
    };
    let mut current = value;
    for segment in prefix {
        match current.get_mut(segment) {
            Some(next) => current = next,
            None => return,
        }
    }
    if let Value::Object(map) = current {
        map.remove(last);
    }
}

fn redact_strings(value: &mut Value, pattern: &Regex) {
    match value {
        Value::String(s) => {
            if pattern.is_match(s) {
                *s = pattern.replace_all(s, REDACTED_MARKER).into_owned();
            }
        }
        Value::Array(items) => {
            for item in items {
                redact_strings(item, pattern);
            }
        }
        Value::Object(map) => {
            for (_, item) in map.iter_mut() {
                redact_strings(item, pattern);
            }
        }
        _ => {}
    }
}

// ============================================================================
// PSEUDONYMIZATION
// ============================================================================

/// Pseudonym for an actor pubkey: `anon-` plus a truncated content hash.
pub fn pseudonymize(pubkey: &str) -> String {
    format!("anon-{}", &sha256_hex(pubkey.as_bytes())[..8])
}

/// Replace every actor-map key with its pseudonym. Roles are kept.
pub fn pseudonymize_actors(case: &mut IncidentCase) {
    let actors = std::mem::take(&mut case.actors);
    case.actors = actors
        .into_iter()
        .map(|(pubkey, role)| (pseudonymize(&pubkey), role))
        .collect::<BTreeMap<Pubkey, String>>();
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip_path_removes_nested_field() {
        let policy = RedactionPolicy {
            strip_paths: vec!["payload.proof_hash".to_string()],
            patterns: Vec::new(),
        };
        let compiled = policy.compile().unwrap();
        let mut event = json!({
            "signature": "sig-1",
            "payload": {"kind": "task_completed", "proof_hash": "secret", "reward_paid": 1},
        });
        compiled.apply_to_event(&mut event);
        assert!(event["payload"].get("proof_hash").is_none());
        assert_eq!(event["payload"]["reward_paid"], 1);
    }

    #[test]
    fn test_strip_missing_path_is_noop() {
        let compiled = RedactionPolicy {
            strip_paths: vec!["payload.absent.deep".to_string()],
            patterns: Vec::new(),
        }
        .compile()
        .unwrap();
        let mut event = json!({"payload": {"kind": "x"}});
        let before = event.clone();
        compiled.apply_to_event(&mut event);
        assert_eq!(event, before);
    }

    #[test]
    fn test_pattern_redaction_replaces_matches() {
        let compiled = RedactionPolicy {
            strip_paths: Vec::new(),
            patterns: vec!["secret-[0-9]+".to_string()],
        }
        .compile()
        .unwrap();
        let mut event = json!({
            "note": "contains secret-123 and secret-456",
            "nested": ["secret-7", "clean"],
        });
        compiled.apply_to_event(&mut event);
        assert_eq!(
            event["note"],
            format!("contains {REDACTED_MARKER} and {REDACTED_MARKER}")
        );
        assert_eq!(event["nested"][0], REDACTED_MARKER);
        assert_eq!(event["nested"][1], "clean");
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let policy = RedactionPolicy {
            strip_paths: Vec::new(),
            patterns: vec!["[unclosed".to_string()],
        };
        assert!(policy.compile().is_err());
    }

    #[test]
    fn test_invalid_dot_path_rejected() {
        let policy = RedactionPolicy {
            strip_paths: vec!["payload..double".to_string()],
            patterns: Vec::new(),
        };
        assert!(policy.compile().is_err());
    }

    #[test]
    fn test_dot_path_regex_compiles() {
        assert!(DOT_PATH_RE.is_match("payload.proof_hash"));
        assert!(!DOT_PATH_RE.is_match(".leading"));
    }

    #[test]
    fn test_pseudonym_is_stable_and_marked() {
        let a = pseudonymize("AliceKey111");
        let b = pseudonymize("AliceKey111");
        assert_eq!(a, b);
        assert!(a.starts_with("anon-"));
        assert_eq!(a.len(), "anon-".len() + 8);
        assert_ne!(a, pseudonymize("BobKey222"));
    }
}
