//! Stratified evaluation scorecards.
//!
//! Records are scored overall and per stratum: task type, reward tier
//! (fixed lamport cutoffs), and verifier-gated versus ungated. Each stratum
//! reports pass@k, a conformance score (one minus the policy-violation
//! rate), and cost-normalized utility (reward delta per cost unit).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::passk::pass_at_k;

/// Upper bound of the low reward tier, exclusive (lamports).
pub const LOW_TIER_MAX_LAMPORTS: u64 = 100_000_000;

/// Upper bound of the medium reward tier, exclusive (lamports).
pub const MEDIUM_TIER_MAX_LAMPORTS: u64 = 1_000_000_000;

// ============================================================================
// RECORDS & TIERS
// ============================================================================

/// Reward tier by fixed lamport cutoffs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardTier {
    Low,
    Medium,
    High,
}

impl RewardTier {
    pub fn from_lamports(reward_amount: u64) -> Self {
        if reward_amount < LOW_TIER_MAX_LAMPORTS {
            Self::Low
        } else if reward_amount < MEDIUM_TIER_MAX_LAMPORTS {
            Self::Medium
        } else {
            Self::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// One evaluated task: sampling counts plus policy and cost accounting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalRecord {
    pub task_id: String,
    pub task_type: u8,
    pub reward_amount: u64,
    pub verifier_gated: bool,
    /// Total attempts sampled for this task.
    pub samples: u64,
    /// Attempts that passed.
    pub successes: u64,
    pub policy_checks: u64,
    pub policy_violations: u64,
    pub cost_units: f64,
    pub reward_delta: f64,
}

impl EvalRecord {
    pub fn reward_tier(&self) -> RewardTier {
        RewardTier::from_lamports(self.reward_amount)
    }
}

// ============================================================================
// SCORECARD
// ============================================================================

/// Scores for one stratum of records.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct StratumScore {
    pub records: usize,
    /// Mean per-record pass@k.
    pub pass_at_k: f64,
    /// `1 - violations / checks`; 1.0 when no checks ran.
    pub conformance_score: f64,
    /// Total reward delta per cost unit; 0.0 when no cost was spent.
    pub cost_normalized_utility: f64,
}

/// The full stratified scorecard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scorecard {
    pub k: u64,
    pub overall: StratumScore,
    pub by_task_type: BTreeMap<u8, StratumScore>,
    pub by_reward_tier: BTreeMap<RewardTier, StratumScore>,
    pub verifier_gated: StratumScore,
    pub ungated: StratumScore,
}

fn score_stratum(records: &[&EvalRecord], k: u64) -> StratumScore {
    if records.is_empty() {
        return StratumScore::default();
    }
    let pass = records
        .iter()
        .map(|r| pass_at_k(r.samples, r.successes, k))
        .sum::<f64>()
        / records.len() as f64;
    let checks: u64 = records.iter().map(|r| r.policy_checks).sum();
    let violations: u64 = records.iter().map(|r| r.policy_violations).sum();
    let conformance = if checks == 0 {
        1.0
    } else {
        1.0 - (violations.min(checks) as f64 / checks as f64)
    };
    let cost: f64 = records.iter().map(|r| r.cost_units).sum();
    let reward: f64 = records.iter().map(|r| r.reward_delta).sum();
    StratumScore {
        records: records.len(),
        pass_at_k: pass,
        conformance_score: conformance,
        cost_normalized_utility: if cost > 0.0 { reward / cost } else { 0.0 },
    }
}

/// Build a stratified scorecard over evaluation records.
pub fn evaluation_scorecard(records: &[EvalRecord], k: u64) -> Scorecard {
    let all: Vec<&EvalRecord> = records.iter().collect();

    let mut by_task_type: BTreeMap<u8, Vec<&EvalRecord>> = BTreeMap::new();
    let mut by_reward_tier: BTreeMap<RewardTier, Vec<&EvalRecord>> = BTreeMap::new();
    let mut gated: Vec<&EvalRecord> = Vec::new();
    let mut ungated: Vec<&EvalRecord> = Vec::new();
    for record in records {
        by_task_type.entry(record.task_type).or_default().push(record);
        by_reward_tier
            .entry(record.reward_tier())
            .or_default()
            .push(record);
        if record.verifier_gated {
            gated.push(record);
        } else {
            ungated.push(record);
        }
    }

    Scorecard {
        k,
        overall: score_stratum(&all, k),
        by_task_type: by_task_type
            .into_iter()
            .map(|(t, group)| (t, score_stratum(&group, k)))
            .collect(),
        by_reward_tier: by_reward_tier
            .into_iter()
            .map(|(t, group)| (t, score_stratum(&group, k)))
            .collect(),
        verifier_gated: score_stratum(&gated, k),
        ungated: score_stratum(&ungated, k),
    }
}

// =============================================================================
// TESTS
// =============================================================================
