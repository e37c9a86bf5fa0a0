//! Sign-crossing steady-state detection.
//!
//! The detector watches how often the sample stream crosses its own running
//! mean. A process still in its warm-up transient drifts monotonically
//! towards its long-run level and crosses the running mean rarely; once the
//! transient has died out, samples oscillate around the mean and crossings
//! become frequent. The detector declares the process steady when a sliding
//! window of recent samples contains enough crossings, and latches: the
//! verdict never reverts for the rest of the run.

use std::collections::VecDeque;

/// Streaming mean-crossing detector over a sliding sample window.
pub(crate) struct SteadyStateDetector {
    period: usize,
    crossings: usize,
    count: u64,
    mean: f64,
    /// Signs (above running mean or not) of the last `period` samples.
    window: VecDeque<bool>,
    steady: bool,
}

impl SteadyStateDetector {
    pub(crate) fn new(period: usize, crossings: usize) -> Self {
        assert!(period >= 2, "sample window must hold at least two samples");
        assert!(crossings >= 1, "crossing threshold must be positive");
        Self {
            period,
            crossings,
            count: 0,
            mean: 0.0,
            window: VecDeque::with_capacity(period),
            steady: false,
        }
    }

    /// Feeds one sample into the detector.
    pub(crate) fn observe(&mut self, value: f64) {
        self.count += 1;
        self.mean += (value - self.mean) / self.count as f64;

        if self.window.len() == self.period {
            self.window.pop_front();
        }
        self.window.push_back(value >= self.mean);

        if !self.steady && self.window.len() == self.period {
            let flips = self
                .window
                .iter()
                .zip(self.window.iter().skip(1))
                .filter(|(a, b)| a != b)
                .count();
            if flips >= self.crossings {
                self.steady = true;
            }
        }
    }

    /// Whether the process has been declared steady. Latches once set.
    pub(crate) fn is_steady(&self) -> bool {
        self.steady
    }
}
