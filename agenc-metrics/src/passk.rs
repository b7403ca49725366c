//! pass@k and pass^k estimators.

/// Unbiased pass@k estimator over `n` samples with `c` successes.
///
/// Computed in product form, `1 - prod_{i=0..k} (n-c-i)/(n-i)`, which
/// avoids the overflow of explicit binomial coefficients. Conventions:
/// `n == 0` scores 0.0, `k == 0` scores 0.0, and `n - c < k` scores 1.0
/// (every size-k draw contains a success).
pub fn pass_at_k(n: u64, c: u64, k: u64) -> f64 {
    if n == 0 || k == 0 {
        return 0.0;
    }
    let c = c.min(n);
    let failures = n - c;
    if failures < k {
        return 1.0;
    }
    let mut miss = 1.0f64;
    for i in 0..k {
        miss *= (failures - i) as f64 / (n - i) as f64;
    }
    1.0 - miss
}

/// pass^k: the probability that all of `k` independent attempts pass.
///
/// A stricter estimator than pass@k; `rate` is clamped into `[0, 1]`.
pub fn pass_caret_k(rate: f64, k: u64) -> f64 {
    let rate = rate.clamp(0.0, 1.0);
    if k == 0 {
        return 1.0;
    }
    rate.powi(k.min(i32::MAX as u64) as i32)
}

// =============================================================================
// TESTS
// =============================================================================
