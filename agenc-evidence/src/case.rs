//! Incident case model.
//!
//! A case aggregates a trace window, the applied transitions, the anomalies
//! found, and a pubkey-to-role actor map. Cases are assembled once and then
//! hashed; the evidence builder treats them as immutable input.

use std::collections::BTreeMap;

use agenc_core::{derive_short_id, Anomaly, AppliedTransition, Pubkey};
use serde::{Deserialize, Serialize};

/// Namespace for content-derived case ids.
const CASE_ID_NAMESPACE: &str = "agenc.case";

/// Slot window the case covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SlotRange {
    pub from_slot: u64,
    pub to_slot: u64,
}

/// One incident under investigation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentCase {
    pub case_id: String,
    pub trace_id: String,
    pub window: SlotRange,
    pub transitions: Vec<AppliedTransition>,
    pub anomalies: Vec<Anomaly>,
    /// Actor pubkey to role (`creator`, `worker`, `verifier`, ...).
    /// Pseudonymized in sealed packs.
    pub actors: BTreeMap<Pubkey, String>,
    /// Content hashes this case commits to; the builder appends the events
    /// hash here before the case itself is hashed.
    pub evidence_hashes: Vec<String>,
}

impl IncidentCase {
    /// Content-derived case id over the trace id and window.
    pub fn derive_case_id(trace_id: &str, window: SlotRange) -> String {
        derive_short_id(
            CASE_ID_NAMESPACE,
            &[
                trace_id,
                &window.from_slot.to_string(),
                &window.to_slot.to_string(),
            ],
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================
