//! Configuration performance scoring.
//!
//! A configuration starts at 100 and loses points for slow assembly, memory
//! pressure, and CPU pressure; a short, completed usage window earns a
//! small bonus. Reuse folds new observations into a weighted average.

use shared_types::PerformanceMetrics;

/// Score a single observation into `[0, 100]`.
pub fn score_metrics(metrics: &PerformanceMetrics) -> f64 {
    let mut score = 100.0;

    score -= (metrics.assembly_time_ms as f64 / 50.0).min(20.0);
    score -= (metrics.memory_peak_mb / 100.0).min(10.0);
    score -= (metrics.cpu_usage_avg / 10.0).min(10.0);

    if metrics.total_usage_time_ms > 0 && metrics.total_usage_time_ms < 5000 {
        score += ((5000 - metrics.total_usage_time_ms) as f64 / 500.0).min(10.0);
    }

    score.clamp(0.0, 100.0)
}

/// Fold a new observation into a configuration's running average.
/// `use_count` is the count after the reuse; the first use sets the score.
pub fn updated_score(old_average: f64, new_score: f64, use_count: u32) -> f64 {
    if use_count <= 1 {
        return new_score;
    }
    let n = use_count as f64;
    ((old_average * (n - 1.0) * 0.8 + new_score * 0.2 * n) / n).clamp(0.0, 100.0)
}

/// Field-wise mean of several observations.
pub fn average_metrics(observations: &[&PerformanceMetrics]) -> PerformanceMetrics {
    if observations.is_empty() {
        return PerformanceMetrics::default();
    }
    let n = observations.len() as f64;
    PerformanceMetrics {
        assembly_time_ms: (observations
            .iter()
            .map(|m| m.assembly_time_ms)
            .sum::<u64>() as f64
            / n) as u64,
        memory_peak_mb: observations.iter().map(|m| m.memory_peak_mb).sum::<f64>() / n,
        cpu_usage_avg: observations.iter().map(|m| m.cpu_usage_avg).sum::<f64>() / n,
        total_usage_time_ms: (observations
            .iter()
            .map(|m| m.total_usage_time_ms)
            .sum::<u64>() as f64
            / n) as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_metrics_score_100() {
        let score = score_metrics(&PerformanceMetrics::default());
        assert_eq!(score, 100.0);
    }

    #[test]
    fn test_penalties_are_capped() {
        let metrics = PerformanceMetrics {
            assembly_time_ms: 100_000,
            memory_peak_mb: 50_000.0,
            cpu_usage_avg: 10_000.0,
            total_usage_time_ms: 0,
        };
        // 100 - 20 - 10 - 10
        assert_eq!(score_metrics(&metrics), 60.0);
    }

    #[test]
    fn test_short_usage_earns_bonus_but_clamps() {
        let metrics = PerformanceMetrics {
            total_usage_time_ms: 1000,
            ..PerformanceMetrics::default()
        };
        // 100 + min(10, 4000/500) = 108 clamped
        assert_eq!(score_metrics(&metrics), 100.0);

        let slow = PerformanceMetrics {
            assembly_time_ms: 1000, // -20
            total_usage_time_ms: 1000,
            ..PerformanceMetrics::default()
        };
        assert_eq!(score_metrics(&slow), 100.0 - 20.0 + 8.0);
    }

    #[test]
    fn test_first_use_sets_score() {
        assert_eq!(updated_score(0.0, 85.0, 1), 85.0);
    }

    #[test]
    fn test_reuse_weights_toward_history() {
        // n = 2: (old * 1 * 0.8 + new * 0.2 * 2) / 2
        let updated = updated_score(90.0, 50.0, 2);
        assert!((updated - (90.0 * 0.8 + 50.0 * 0.4) / 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_average_metrics_field_wise() {
        let a = PerformanceMetrics {
            assembly_time_ms: 100,
            memory_peak_mb: 10.0,
            cpu_usage_avg: 20.0,
            total_usage_time_ms: 0,
        };
        let b = PerformanceMetrics {
            assembly_time_ms: 300,
            memory_peak_mb: 30.0,
            cpu_usage_avg: 40.0,
            total_usage_time_ms: 2000,
        };
        let avg = average_metrics(&[&a, &b]);
        assert_eq!(avg.assembly_time_ms, 200);
        assert_eq!(avg.memory_peak_mb, 20.0);
        assert_eq!(avg.cpu_usage_avg, 30.0);
        assert_eq!(avg.total_usage_time_ms, 1000);
    }
}
