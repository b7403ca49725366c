//! AgenC Evidence - Incident Cases and Tamper-Evident Evidence Packs
//!
//! [`case`] models an incident under investigation; [`redaction`] is the
//! sealing pipeline (dot-path strip, pattern redaction, actor
//! pseudonymization); [`pack`] builds hash-chained packs and serializes
//! them into the three-part bundle format.

pub mod case;
pub mod pack;
pub mod redaction;

pub use case::{IncidentCase, SlotRange};
pub use pack::{
    build_evidence_pack, parse_evidence_bundle, serialize_evidence_pack, CursorRange,
    EvidenceBundle, EvidenceManifest, EvidencePack, EvidencePackInput, EVIDENCE_SCHEMA_VERSION,
};
pub use redaction::{
    pseudonymize, pseudonymize_actors, CompiledRedaction, RedactionPolicy, REDACTED_MARKER,
};
