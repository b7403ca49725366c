//! AgenC Trace - Event Projection and Trajectory Recording
//!
//! Two producers of canonical traces: the [`projector`] maps raw on-chain
//! event records into `ProjectedTimelineEvent`s (plus a replayable trace),
//! and the [`recorder`] captures locally observed lifecycle events during
//! an agent's real-time execution. Both feed the replay engine in
//! `agenc-replay`.

pub mod projector;
pub mod recorder;

pub use projector::{project, ProjectionOptions, ProjectionResult, ProjectionTelemetry};
pub use recorder::{RecordInput, TrajectoryRecorder};
