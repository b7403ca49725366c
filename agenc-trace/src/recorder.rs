//! Trajectory Recorder: append-only capture of locally observed events.
//!
//! `record` serializes concurrent producers through a single mutex and
//! never fails on valid input (a poisoned lock is recovered, since records
//! are append-only and the buffer cannot be left half-written).
//! `create_trace` returns a frozen snapshot: later records are never
//! reflected in previously returned traces.

use std::sync::Mutex;

use agenc_core::{EventPayload, TrajectoryEvent, TrajectoryTrace, TRACE_SCHEMA_VERSION};

/// One `record` call's input.
#[derive(Debug, Clone)]
pub struct RecordInput {
    pub payload: EventPayload,
    pub timestamp_ms: i64,
}

/// Append buffer producing immutable trace snapshots.
#[derive(Debug)]
pub struct TrajectoryRecorder {
    trace_id: String,
    seed: u64,
    buffer: Mutex<Vec<TrajectoryEvent>>,
}

impl TrajectoryRecorder {
    pub fn new(trace_id: impl Into<String>, seed: u64) -> Self {
        Self {
            trace_id: trace_id.into(),
            seed,
            buffer: Mutex::new(Vec::new()),
        }
    }

    /// Append an event, assigning the next sequence number.
    pub fn record(&self, input: RecordInput) {
        let mut buffer = match self.buffer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let seq = buffer.len() as u64;
        buffer.push(TrajectoryEvent {
            seq,
            timestamp_ms: input.timestamp_ms,
            payload: input.payload,
        });
    }

    /// Number of recorded events so far.
    pub fn len(&self) -> usize {
        match self.buffer.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Produce an immutable trace from everything recorded so far.
    pub fn create_trace(&self) -> TrajectoryTrace {
        let events = match self.buffer.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        TrajectoryTrace {
            schema_version: TRACE_SCHEMA_VERSION,
            trace_id: self.trace_id.clone(),
            seed: self.seed,
            events,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
