//! Histogram bucket bounds: defaults and generators.

use crate::error::{MetricsError, MetricsResult};

/// Bounds used when a histogram is registered without explicit buckets.
/// Tuned for request latencies in seconds.
pub const DEFAULT_BUCKETS: [f64; 14] = [
    0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.25, 0.5, 0.75, 1.0, 2.5, 5.0, 7.5, 10.0,
];

/// `count` bounds starting at `start`, each `width` above the previous.
pub fn linear_buckets(start: f64, width: f64, count: usize) -> MetricsResult<Vec<f64>> {
    if count == 0 {
        return Err(MetricsError::InvalidBuckets("count must be at least 1".to_string()));
    }
    if !(width.is_finite() && width > 0.0) || !start.is_finite() {
        return Err(MetricsError::InvalidBuckets(format!(
            "linear buckets need a finite start and positive width, got start={start} width={width}"
        )));
    }
    Ok((0..count).map(|i| start + width * i as f64).collect())
}

/// `count` bounds starting at `start`, each `factor` times the previous.
pub fn exponential_buckets(start: f64, factor: f64, count: usize) -> MetricsResult<Vec<f64>> {
    if count == 0 {
        return Err(MetricsError::InvalidBuckets("count must be at least 1".to_string()));
    }
    if !(start.is_finite() && start > 0.0) || !(factor.is_finite() && factor > 1.0) {
        return Err(MetricsError::InvalidBuckets(format!(
            "exponential buckets need start > 0 and factor > 1, got start={start} factor={factor}"
        )));
    }
    let mut bounds = Vec::with_capacity(count);
    let mut bound = start;
    for _ in 0..count {
        bounds.push(bound);
        bound *= factor;
    }
    Ok(bounds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::validate_buckets;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_buckets(&DEFAULT_BUCKETS).is_ok());
    }

    #[test]
    fn linear() {
        assert_eq!(linear_buckets(1.0, 2.0, 4).unwrap(), vec![1.0, 3.0, 5.0, 7.0]);
        assert!(linear_buckets(1.0, 0.0, 4).is_err());
        assert!(linear_buckets(1.0, 1.0, 0).is_err());
    }

    #[test]
    fn exponential() {
        assert_eq!(
            exponential_buckets(0.5, 2.0, 4).unwrap(),
            vec![0.5, 1.0, 2.0, 4.0]
        );
        assert!(exponential_buckets(0.0, 2.0, 3).is_err());
        assert!(exponential_buckets(1.0, 1.0, 3).is_err());
    }
}
