//! Evidence pack builder and three-part bundle serialization.
//!
//! Hashing is two-phase: the events are hashed first, that hash is appended
//! to the case's evidence-hash list, and only then is the case hashed — so
//! the case hash transitively commits to the events. `schema_hash` and
//! `tool_fingerprint` are derived from fixed layout/tool descriptions and
//! never from input content or the runtime version string, so identical
//! logical content always yields identical hashes.

use agenc_core::{
    sha256_hex, stable_stringify, AgencResult, ParseError, ProjectedTimelineEvent,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::case::IncidentCase;
use crate::redaction::{pseudonymize_actors, RedactionPolicy};

/// Current evidence manifest schema version. Readers must reject anything
/// else.
pub const EVIDENCE_SCHEMA_VERSION: u32 = 1;

/// Fixed layout description hashed into `schema_hash`. Changing the pack
/// layout means bumping [`EVIDENCE_SCHEMA_VERSION`] and this string.
const SCHEMA_LAYOUT: &str =
    "agenc.evidence/v1:manifest.json+incident-case.jsonl+events.jsonl";

/// Fixed tool description hashed into `tool_fingerprint`.
const TOOL_DESCRIPTION: &str = "agenc-evidence/1";

// ============================================================================
// INPUT & OUTPUT TYPES
// ============================================================================

/// Cursor window the source events were fetched over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CursorRange {
    pub from_slot: u64,
    pub to_slot: u64,
}

/// Everything the builder needs; the builder itself holds no state.
#[derive(Debug, Clone)]
pub struct EvidencePackInput {
    pub case: IncidentCase,
    pub events: Vec<ProjectedTimelineEvent>,
    pub seed: u64,
    /// Hash of the query that selected the source events.
    pub query_hash: String,
    pub cursor_range: CursorRange,
    pub sealed: bool,
    pub redaction_policy: Option<RedactionPolicy>,
    /// Recorded in the manifest for provenance; excluded from every hash.
    pub runtime_version: String,
}

/// Manifest committing to the pack contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceManifest {
    pub schema_version: u32,
    pub case_id: String,
    pub seed: u64,
    pub query_hash: String,
    pub cursor_range: CursorRange,
    pub schema_hash: String,
    pub tool_fingerprint: String,
    pub sealed: bool,
    /// `[events_hash, case_hash]` — children first, parent second.
    pub evidence_hashes: Vec<String>,
    pub runtime_version: String,
}

/// A built pack: manifest plus the (possibly sealed) case and events.
///
/// Events are held as canonical JSON values because sealing strips fields
/// that a typed record would have to keep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidencePack {
    pub manifest: EvidenceManifest,
    pub case: IncidentCase,
    pub events: Vec<Value>,
}

/// The three serialized artifact parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidenceBundle {
    /// Pretty-printed manifest (`manifest.json`).
    pub manifest_json: String,
    /// One canonical JSON line (`incident-case.jsonl`).
    pub case_jsonl: String,
    /// One canonical JSON line per event; empty string for zero events
    /// (`events.jsonl`).
    pub events_jsonl: String,
}

// ============================================================================
// BUILDER
// ============================================================================

/// Build an evidence pack from an input snapshot.
///
/// Pure: identical inputs produce identical packs, byte for byte.
///
/// # Errors
///
/// `ValidationError` for an invalid redaction policy; `ParseError` if
/// content cannot be serialized canonically.
pub fn build_evidence_pack(input: EvidencePackInput) -> AgencResult<EvidencePack> {
    let mut case = input.case;
    let mut events: Vec<Value> = input
        .events
        .iter()
        .map(|e| serde_json::to_value(e))
        .collect::<Result<_, _>>()
        .map_err(|e| ParseError::Serialization {
            reason: e.to_string(),
        })?;

    if input.sealed {
        if let Some(policy) = &input.redaction_policy {
            let compiled = policy.compile()?;
            for event in &mut events {
                compiled.apply_to_event(event);
            }
        }
        pseudonymize_actors(&mut case);
    }

    // Phase one: hash the children.
    let events_hash = hash_event_lines(&events);
    case.evidence_hashes.push(events_hash.clone());

    // Phase two: hash the parent, which now commits to the children.
    let case_value = serde_json::to_value(&case).map_err(|e| ParseError::Serialization {
        reason: e.to_string(),
    })?;
    let case_hash = sha256_hex(stable_stringify(&case_value).as_bytes());

    let manifest = EvidenceManifest {
        schema_version: EVIDENCE_SCHEMA_VERSION,
        case_id: case.case_id.clone(),
        seed: input.seed,
        query_hash: input.query_hash,
        cursor_range: input.cursor_range,
        schema_hash: sha256_hex(SCHEMA_LAYOUT.as_bytes()),
        tool_fingerprint: sha256_hex(TOOL_DESCRIPTION.as_bytes()),
        sealed: input.sealed,
        evidence_hashes: vec![events_hash, case_hash],
        runtime_version: input.runtime_version,
    };

    Ok(EvidencePack {
        manifest,
        case,
        events,
    })
}

fn hash_event_lines(events: &[Value]) -> String {
    let lines: Vec<String> = events.iter().map(stable_stringify).collect();
    sha256_hex(lines.join("\n").as_bytes())
}

// ============================================================================
// BUNDLE SERIALIZATION
// ============================================================================

/// Serialize a pack into its three artifact parts.
///
/// # Errors
///
/// `ParseError::Serialization` if any part fails to serialize.
pub fn serialize_evidence_pack(pack: &EvidencePack) -> AgencResult<EvidenceBundle> {
    let manifest_json =
        serde_json::to_string_pretty(&pack.manifest).map_err(|e| ParseError::Serialization {
            reason: e.to_string(),
        })?;
    let case_value = serde_json::to_value(&pack.case).map_err(|e| ParseError::Serialization {
        reason: e.to_string(),
    })?;
    let case_jsonl = stable_stringify(&case_value);
    let events_jsonl = pack
        .events
        .iter()
        .map(stable_stringify)
        .collect::<Vec<_>>()
        .join("\n");
    Ok(EvidenceBundle {
        manifest_json,
        case_jsonl,
        events_jsonl,
    })
}

/// Parse a bundle back into a pack, rejecting unknown schema versions.
///
/// # Errors
///
/// `ParseError::MalformedRecord` for invalid JSON in any part;
/// `ParseError::UnknownSchemaVersion` for any manifest version other than
/// [`EVIDENCE_SCHEMA_VERSION`].
pub fn parse_evidence_bundle(bundle: &EvidenceBundle) -> AgencResult<EvidencePack> {
    let manifest: EvidenceManifest =
        serde_json::from_str(&bundle.manifest_json).map_err(|e| ParseError::MalformedRecord {
            reason: format!("manifest: {e}"),
        })?;
    if manifest.schema_version != EVIDENCE_SCHEMA_VERSION {
        return Err(ParseError::UnknownSchemaVersion {
            found: manifest.schema_version,
            supported: EVIDENCE_SCHEMA_VERSION,
        }
        .into());
    }
    let case: IncidentCase =
        serde_json::from_str(&bundle.case_jsonl).map_err(|e| ParseError::MalformedRecord {
            reason: format!("incident case: {e}"),
        })?;
    let mut events = Vec::new();
    for (i, line) in bundle
        .events_jsonl
        .lines()
        .filter(|l| !l.is_empty())
        .enumerate()
    {
        let event: Value = serde_json::from_str(line).map_err(|e| ParseError::MalformedRecord {
            reason: format!("event line {i}: {e}"),
        })?;
        events.push(event);
    }
    Ok(EvidencePack {
        manifest,
        case,
        events,
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::SlotRange;
    use agenc_core::{Anomaly, AnomalyCode};
    use agenc_test_utils::sample_task_trace;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn sample_events() -> Vec<ProjectedTimelineEvent> {
        let trace = sample_task_trace("task-1");
        trace
            .events
            .iter()
            .enumerate()
            .map(|(i, e)| {
                let mut p = ProjectedTimelineEvent {
                    seq: e.seq,
                    slot: i as u64 + 1,
                    signature: format!("sig-{}", i + 1),
                    source_event_name: "test".to_string(),
                    source_event_type: e.kind(),
                    source_event_sequence: 0,
                    task_pda: e.payload.task_pda().cloned(),
                    dispute_pda: e.payload.dispute_pda().cloned(),
                    timestamp_ms: e.timestamp_ms,
                    payload: e.payload.clone(),
                    trace_id: None,
                    span_id: None,
                    parent_span_id: None,
                    sampled: true,
                    projection_hash: String::new(),
                };
                p.projection_hash = p.compute_projection_hash();
                p
            })
            .collect()
    }

    fn sample_case() -> IncidentCase {
        let window = SlotRange {
            from_slot: 1,
            to_slot: 4,
        };
        let mut actors = BTreeMap::new();
        actors.insert("alice".to_string(), "creator".to_string());
        actors.insert("bob".to_string(), "worker".to_string());
        IncidentCase {
            case_id: IncidentCase::derive_case_id("trace-task-1", window),
            trace_id: "trace-task-1".to_string(),
            window,
            transitions: Vec::new(),
            anomalies: vec![Anomaly::error(
                AnomalyCode::HashMismatch,
                "hashes diverge",
                json!({"scope": "deterministic_hash"}),
            )],
            actors,
            evidence_hashes: Vec::new(),
        }
    }

    fn input(sealed: bool, runtime_version: &str) -> EvidencePackInput {
        EvidencePackInput {
            case: sample_case(),
            events: sample_events(),
            seed: 42,
            query_hash: "query-hash-1".to_string(),
            cursor_range: CursorRange {
                from_slot: 1,
                to_slot: 4,
            },
            sealed,
            redaction_policy: sealed.then(|| RedactionPolicy {
                strip_paths: vec!["payload.proof_hash".to_string()],
                patterns: vec!["proof-[0-9]+".to_string()],
            }),
            runtime_version: runtime_version.to_string(),
        }
    }

    #[test]
    fn test_build_is_deterministic() {
        let a = build_evidence_pack(input(false, "1.0.0")).unwrap();
        let b = build_evidence_pack(input(false, "1.0.0")).unwrap();
        assert_eq!(a, b);
        let bundle_a = serialize_evidence_pack(&a).unwrap();
        let bundle_b = serialize_evidence_pack(&b).unwrap();
        assert_eq!(bundle_a, bundle_b);
    }

    #[test]
    fn test_case_hash_commits_to_events() {
        let base = build_evidence_pack(input(false, "1.0.0")).unwrap();
        let mut perturbed_input = input(false, "1.0.0");
        perturbed_input.events[0].slot = 99;
        let perturbed = build_evidence_pack(perturbed_input).unwrap();
        // Both the events hash and the chained case hash move.
        assert_ne!(
            base.manifest.evidence_hashes[0],
            perturbed.manifest.evidence_hashes[0]
        );
        assert_ne!(
            base.manifest.evidence_hashes[1],
            perturbed.manifest.evidence_hashes[1]
        );
    }

    #[test]
    fn test_events_hash_appended_to_case_before_hashing() {
        let pack = build_evidence_pack(input(false, "1.0.0")).unwrap();
        assert_eq!(
            pack.case.evidence_hashes.last(),
            Some(&pack.manifest.evidence_hashes[0])
        );
    }

    #[test]
    fn test_hashes_invariant_to_runtime_version() {
        let a = build_evidence_pack(input(false, "1.0.0")).unwrap();
        let b = build_evidence_pack(input(false, "9.9.9-rc1")).unwrap();
        assert_eq!(a.manifest.evidence_hashes, b.manifest.evidence_hashes);
        assert_eq!(a.manifest.schema_hash, b.manifest.schema_hash);
        assert_eq!(a.manifest.tool_fingerprint, b.manifest.tool_fingerprint);
        assert_ne!(a.manifest.runtime_version, b.manifest.runtime_version);
    }

    #[test]
    fn test_sealed_pack_strips_redacts_and_pseudonymizes() {
        let pack = build_evidence_pack(input(true, "1.0.0")).unwrap();
        assert!(pack.manifest.sealed);
        for event in &pack.events {
            assert!(event["payload"].get("proof_hash").is_none());
        }
        // Actor keys are pseudonyms; roles survive.
        assert!(pack.case.actors.keys().all(|k| k.starts_with("anon-")));
        let roles: Vec<&String> = pack.case.actors.values().collect();
        assert!(roles.contains(&&"creator".to_string()));
        assert!(roles.contains(&&"worker".to_string()));
    }

    #[test]
    fn test_sealed_and_unsealed_hashes_differ() {
        let sealed = build_evidence_pack(input(true, "1.0.0")).unwrap();
        let unsealed = build_evidence_pack(input(false, "1.0.0")).unwrap();
        assert_ne!(
            sealed.manifest.evidence_hashes,
            unsealed.manifest.evidence_hashes
        );
    }

    #[test]
    fn test_bundle_round_trip() {
        let pack = build_evidence_pack(input(false, "1.0.0")).unwrap();
        let bundle = serialize_evidence_pack(&pack).unwrap();
        let back = parse_evidence_bundle(&bundle).unwrap();
        assert_eq!(back.manifest.schema_version, pack.manifest.schema_version);
        assert_eq!(back.manifest.case_id, pack.manifest.case_id);
        assert_eq!(back, pack);
        // Per-event signatures survive exactly.
        let signatures: Vec<&str> = back
            .events
            .iter()
            .map(|e| e["signature"].as_str().unwrap())
            .collect();
        assert_eq!(signatures, vec!["sig-1", "sig-2", "sig-3", "sig-4"]);
    }

    #[test]
    fn test_zero_events_serializes_to_empty_string() {
        let mut zero = input(false, "1.0.0");
        zero.events.clear();
        let pack = build_evidence_pack(zero).unwrap();
        let bundle = serialize_evidence_pack(&pack).unwrap();
        assert_eq!(bundle.events_jsonl, "");
        let back = parse_evidence_bundle(&bundle).unwrap();
        assert!(back.events.is_empty());
    }

    #[test]
    fn test_unknown_manifest_version_rejected() {
        let pack = build_evidence_pack(input(false, "1.0.0")).unwrap();
        let mut bundle = serialize_evidence_pack(&pack).unwrap();
        bundle.manifest_json = bundle
            .manifest_json
            .replace("\"schema_version\": 1", "\"schema_version\": 2");
        assert!(parse_evidence_bundle(&bundle).is_err());
    }

    #[test]
    fn test_invalid_redaction_policy_fails_build() {
        let mut bad = input(true, "1.0.0");
        bad.redaction_policy = Some(RedactionPolicy {
            strip_paths: Vec::new(),
            patterns: vec!["[oops".to_string()],
        });
        assert!(build_evidence_pack(bad).is_err());
    }
}
