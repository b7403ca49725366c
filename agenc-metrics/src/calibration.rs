//! Confidence calibration and verifier agreement.
//!
//! Predicted confidence is binned against observed correctness: expected
//! calibration error (ECE) is the count-weighted mean gap per bin, maximum
//! calibration error (MCE) the worst gap. Agreement rate is the fraction of
//! samples where the verifier verdict matches ground truth.

use agenc_core::{AgencResult, ValidationError};
use serde::{Deserialize, Serialize};

/// One calibration observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSample {
    /// Predicted confidence in `[0, 1]`.
    pub confidence: f64,
    /// Whether the prediction was correct against ground truth.
    pub correct: bool,
    /// The verifier's verdict for the same attempt.
    pub verifier_approved: bool,
    /// Ground truth the verifier is measured against.
    pub ground_truth: bool,
}

/// One confidence bin, `[lower, upper)` (the last bin is closed).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
    pub mean_confidence: f64,
    pub accuracy: f64,
}

/// Calibration summary over all samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub bins: Vec<CalibrationBin>,
    pub expected_calibration_error: f64,
    pub maximum_calibration_error: f64,
    pub verifier_agreement_rate: f64,
    pub samples: usize,
}

/// Bin samples and compute ECE/MCE plus verifier agreement.
///
/// # Errors
///
/// `ValidationError::InvalidValue` for `bins == 0`.
pub fn calibration_report(
    samples: &[CalibrationSample],
    bins: usize,
) -> AgencResult<CalibrationReport> {
    if bins == 0 {
        return Err(ValidationError::InvalidValue {
            field: "bins".to_string(),
            value: "0".to_string(),
            reason: "at least one calibration bin is required".to_string(),
        }
        .into());
    }

    let width = 1.0 / bins as f64;
    let mut counts = vec![0usize; bins];
    let mut confidence_sums = vec![0.0f64; bins];
    let mut correct_counts = vec![0usize; bins];

    for sample in samples {
        let confidence = sample.confidence.clamp(0.0, 1.0);
        // Confidence 1.0 lands in the last bin.
        let index = ((confidence / width) as usize).min(bins - 1);
        counts[index] += 1;
        confidence_sums[index] += confidence;
        if sample.correct {
            correct_counts[index] += 1;
        }
    }

    let total = samples.len();
    let mut report_bins = Vec::with_capacity(bins);
    let mut ece = 0.0f64;
    let mut mce = 0.0f64;
    for i in 0..bins {
        let count = counts[i];
        let (mean_confidence, accuracy) = if count == 0 {
            (0.0, 0.0)
        } else {
            (
                confidence_sums[i] / count as f64,
                correct_counts[i] as f64 / count as f64,
            )
        };
        if count > 0 {
            let gap = (accuracy - mean_confidence).abs();
            ece += (count as f64 / total as f64) * gap;
            mce = mce.max(gap);
        }
        report_bins.push(CalibrationBin {
            lower: i as f64 * width,
            upper: if i + 1 == bins {
                1.0
            } else {
                (i + 1) as f64 * width
            },
            count,
            mean_confidence,
            accuracy,
        });
    }

    let agreement = if total == 0 {
        0.0
    } else {
        samples
            .iter()
            .filter(|s| s.verifier_approved == s.ground_truth)
            .count() as f64
            / total as f64
    };

    Ok(CalibrationReport {
        bins: report_bins,
        expected_calibration_error: ece,
        maximum_calibration_error: mce,
        verifier_agreement_rate: agreement,
        samples: total,
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(confidence: f64, correct: bool) -> CalibrationSample {
        CalibrationSample {
            confidence,
            correct,
            verifier_approved: correct,
            ground_truth: correct,
        }
    }

    #[test]
    fn test_perfectly_calibrated() {
        // 10 samples at 0.8 confidence, 8 correct.
        let mut samples = Vec::new();
        for i in 0..10 {
            samples.push(sample(0.8, i < 8));
        }
        let report = calibration_report(&samples, 10).unwrap();
        assert!(report.expected_calibration_error < 1e-9);
        assert!(report.maximum_calibration_error < 1e-9);
    }

    #[test]
    fn test_overconfident_model() {
        // Claims 0.95, always wrong.
        let samples: Vec<_> = (0..5).map(|_| sample(0.95, false)).collect();
        let report = calibration_report(&samples, 10).unwrap();
        assert!((report.expected_calibration_error - 0.95).abs() < 1e-9);
        assert!((report.maximum_calibration_error - 0.95).abs() < 1e-9);
    }

    #[test]
    fn test_ece_is_count_weighted() {
        // 9 perfectly calibrated samples, 1 fully miscalibrated.
        let mut samples: Vec<_> = (0..9).map(|_| sample(1.0, true)).collect();
        samples.push(sample(0.05, true)); // accuracy 1.0, confidence 0.05
        let report = calibration_report(&samples, 10).unwrap();
        assert!((report.expected_calibration_error - 0.095).abs() < 1e-9);
        assert!((report.maximum_calibration_error - 0.95).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_one_lands_in_last_bin() {
        let report = calibration_report(&[sample(1.0, true)], 10).unwrap();
        assert_eq!(report.bins[9].count, 1);
        assert_eq!(report.bins[9].upper, 1.0);
    }

    #[test]
    fn test_verifier_agreement_rate() {
        let samples = vec![
            CalibrationSample {
                confidence: 0.5,
                correct: true,
                verifier_approved: true,
                ground_truth: true,
            },
            CalibrationSample {
                confidence: 0.5,
                correct: false,
                verifier_approved: true,
                ground_truth: false,
            },
        ];
        let report = calibration_report(&samples, 4).unwrap();
        assert!((report.verifier_agreement_rate - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_zero_bins_rejected() {
        assert!(calibration_report(&[], 0).is_err());
    }

    #[test]
    fn test_empty_samples() {
        let report = calibration_report(&[], 5).unwrap();
        assert_eq!(report.samples, 0);
        assert_eq!(report.expected_calibration_error, 0.0);
        assert_eq!(report.verifier_agreement_rate, 0.0);
        assert_eq!(report.bins.len(), 5);
    }
}
