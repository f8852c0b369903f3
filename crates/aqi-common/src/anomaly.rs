//! Naive AQI spike detection against a per-station rolling window.

use serde::Serialize;

use crate::window::RollingWindow;

/// Outcome of scoring one sample against its window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnomalyVerdict {
    /// Ratio of the current value to the rolling mean.
    pub score: f64,
    /// True when the sample crossed the spike threshold.
    pub flagged: bool,
}

impl AnomalyVerdict {
    fn quiet() -> Self {
        Self {
            score: 0.0,
            flagged: false,
        }
    }
}

/// Spike detector per the city emergency SOP: flag when a value exceeds
/// 200% of its rolling average.
#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    /// Multiple of the rolling mean above which a sample is flagged.
    threshold_ratio: f64,
    /// Samples required in the window before flagging is allowed.
    min_samples: usize,
}

impl AnomalyDetector {
    pub fn new(threshold_ratio: f64, min_samples: usize) -> Self {
        Self {
            threshold_ratio,
            min_samples: min_samples.max(1),
        }
    }

    /// Score `value` against `window` without mutating it.
    ///
    /// Returns a quiet verdict while the window is warming up or the mean
    /// is zero (no meaningful baseline).
    pub fn score(&self, value: f64, window: &RollingWindow) -> AnomalyVerdict {
        if window.len() < self.min_samples {
            return AnomalyVerdict::quiet();
        }
        let mean = match window.mean() {
            Some(m) if m > 0.0 => m,
            _ => return AnomalyVerdict::quiet(),
        };

        let score = value / mean;
        AnomalyVerdict {
            score,
            flagged: score > self.threshold_ratio,
        }
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        // 200% of the 60-sample rolling average, after 5 warm-up samples
        Self::new(2.0, 5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window_with(values: &[f64]) -> RollingWindow {
        let mut w = RollingWindow::new(60);
        for &v in values {
            w.push(v);
        }
        w
    }

    #[test]
    fn test_quiet_during_warmup() {
        let detector = AnomalyDetector::default();
        let window = window_with(&[100.0, 110.0]);

        let verdict = detector.score(500.0, &window);
        assert!(!verdict.flagged);
        assert_eq!(verdict.score, 0.0);
    }

    #[test]
    fn test_spike_flagged() {
        let detector = AnomalyDetector::default();
        let window = window_with(&[100.0, 100.0, 100.0, 100.0, 100.0]);

        let verdict = detector.score(250.0, &window);
        assert!(verdict.flagged);
        assert!((verdict.score - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_normal_reading_not_flagged() {
        let detector = AnomalyDetector::default();
        let window = window_with(&[100.0, 105.0, 95.0, 110.0, 90.0]);

        let verdict = detector.score(120.0, &window);
        assert!(!verdict.flagged);
        assert!(verdict.score > 1.0 && verdict.score < 2.0);
    }

    #[test]
    fn test_zero_mean_is_quiet() {
        let detector = AnomalyDetector::default();
        let window = window_with(&[0.0, 0.0, 0.0, 0.0, 0.0]);

        let verdict = detector.score(50.0, &window);
        assert!(!verdict.flagged);
        assert_eq!(verdict.score, 0.0);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let detector = AnomalyDetector::new(2.0, 1);
        let window = window_with(&[100.0]);

        // Exactly 200% does not trigger
        assert!(!detector.score(200.0, &window).flagged);
        assert!(detector.score(200.1, &window).flagged);
    }
}
