//! AgenC Metrics - Evaluation Estimators, Scorecards, and Calibration
//!
//! [`passk`] holds the pass@k / pass^k estimators, [`scorecard`] the
//! stratified evaluation scorecard, [`calibration`] ECE/MCE and verifier
//! agreement.

pub mod calibration;
pub mod passk;
pub mod scorecard;

pub use calibration::{
    calibration_report, CalibrationBin, CalibrationReport, CalibrationSample,
};
pub use passk::{pass_at_k, pass_caret_k};
pub use scorecard::{
    evaluation_scorecard, EvalRecord, RewardTier, Scorecard, StratumScore,
    LOW_TIER_MAX_LAMPORTS, MEDIUM_TIER_MAX_LAMPORTS,
};
