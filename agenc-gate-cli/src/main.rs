//! `agenc-gate` - CI regression gate over mutation artifacts.
//!
//! Reads a mutation artifact (and optionally a gate policy manifest) from
//! disk, evaluates it against the configured thresholds, and prints the
//! verdict. Exit code 0 on pass or `--dry-run`, 1 on gate failure or any
//! read/parse error.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Utc;
use clap::Parser;
use tracing::{error, info};

use agenc_core::{AgencResult, ParseError};
use agenc_mutation::{
    evaluate, format_evaluation, GateEvaluation, GatePolicyManifest, GateThresholds,
    MutationArtifact,
};

// ============================================================================
// CLI
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "agenc-gate",
    version,
    about = "Evaluate a mutation artifact against regression gate thresholds"
)]
struct Cli {
    /// Path to the mutation artifact JSON.
    #[arg(long)]
    artifact: PathBuf,

    /// Path to an optional gate policy manifest JSON.
    #[arg(long)]
    policy: Option<PathBuf>,

    /// Evaluate and report, but always exit 0.
    #[arg(long)]
    dry_run: bool,

    /// Max allowed aggregate pass-rate drop vs baseline.
    #[arg(long, default_value_t = 0.0)]
    max_aggregate_pass_rate_drop: f64,

    /// Max allowed aggregate conformance-score drop vs baseline.
    #[arg(long, default_value_t = 0.0)]
    max_aggregate_conformance_drop: f64,

    /// Max allowed aggregate cost-normalized-utility drop vs baseline.
    #[arg(long, default_value_t = 0.0)]
    max_aggregate_cost_utility_drop: f64,

    /// Max allowed per-scenario pass-rate drop vs baseline.
    #[arg(long, default_value_t = 0.0)]
    max_scenario_pass_rate_drop: f64,

    /// Max allowed per-operator pass-rate drop vs baseline.
    #[arg(long, default_value_t = 0.0)]
    max_operator_pass_rate_drop: f64,

    /// Max tolerated chaos-run failure rate.
    #[arg(long, default_value_t = 0.0)]
    max_chaos_scenario_fail_rate: f64,
}

impl Cli {
    fn thresholds(&self) -> GateThresholds {
        GateThresholds {
            max_aggregate_pass_rate_drop: self.max_aggregate_pass_rate_drop,
            max_aggregate_conformance_drop: self.max_aggregate_conformance_drop,
            max_aggregate_cost_utility_drop: self.max_aggregate_cost_utility_drop,
            max_scenario_pass_rate_drop: self.max_scenario_pass_rate_drop,
            max_operator_pass_rate_drop: self.max_operator_pass_rate_drop,
            max_chaos_scenario_fail_rate: self.max_chaos_scenario_fail_rate,
        }
    }
}

// ============================================================================
// MAIN
// ============================================================================

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(evaluation) => {
            print!("{}", format_evaluation(&evaluation));
            if evaluation.passed {
                ExitCode::SUCCESS
            } else if cli.dry_run {
                info!("gate failed but --dry-run set, exiting 0");
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            error!(error = %e, "gate evaluation failed");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> AgencResult<GateEvaluation> {
    let thresholds = cli.thresholds();
    thresholds.validate()?;

    let artifact_json = read_file(&cli.artifact)?;
    let artifact = MutationArtifact::parse(&artifact_json)?;
    info!(
        artifact = %cli.artifact.display(),
        runs = artifact.runs.len(),
        scenarios = artifact.scenarios.len(),
        evaluated_at = %Utc::now().to_rfc3339(),
        "loaded mutation artifact"
    );

    let policy = match &cli.policy {
        Some(path) => {
            let json = read_file(path)?;
            let manifest: GatePolicyManifest =
                serde_json::from_str(&json).map_err(|e| ParseError::MalformedRecord {
                    reason: format!("gate policy manifest: {e}"),
                })?;
            manifest.validate()?;
            Some(manifest)
        }
        None => None,
    };

    Ok(evaluate(&artifact, &thresholds, policy.as_ref()))
}

fn read_file(path: &PathBuf) -> AgencResult<String> {
    fs::read_to_string(path).map_err(|e| {
        ParseError::MalformedRecord {
            reason: format!("read {}: {e}", path.display()),
        }
        .into()
    })
}

// =============================================================================
// TESTS
// =============================================================================
