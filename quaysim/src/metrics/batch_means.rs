//! Adaptive batch-means estimation.
//!
//! Batch means tame the autocorrelation of simulation output: consecutive
//! raw samples are grouped into batches and only the per-batch means enter
//! the variance estimate, which is approximately valid once batches are long
//! enough to be nearly independent. Since the required batch length is not
//! known up front, both estimators here adapt: whenever the number of
//! completed batches reaches twice its target, adjacent batches are merged
//! pairwise and the batch length doubles, keeping memory bounded for
//! arbitrarily long runs.
//!
//! [`BatchMeans`] batches by sample count and serves discrete sample streams;
//! [`TimeWeightedBatchMeans`] batches by simulated-time span and serves
//! piecewise-constant level signals, splitting observation intervals at batch
//! boundaries so each batch integrates exactly its own span.

use crate::time::MonotonicTime;

/// Count-based batch means over a discrete sample stream.
pub(crate) struct BatchMeans {
    target: usize,
    batch_size: u64,
    means: Vec<f64>,
    current_sum: f64,
    current_count: u64,
    // Grand totals, kept separately so the point estimate is exact and
    // includes the partial batch.
    total_sum: f64,
    total_count: u64,
}

impl BatchMeans {
    pub(crate) fn new(target: usize, batch_size: u64) -> Self {
        assert!(target >= 2, "batch target must be at least two");
        assert!(batch_size >= 1, "batch size must be positive");
        Self {
            target,
            batch_size,
            means: Vec::with_capacity(2 * target),
            current_sum: 0.0,
            current_count: 0,
            total_sum: 0.0,
            total_count: 0,
        }
    }

    /// Adds one sample.
    pub(crate) fn add(&mut self, value: f64) {
        self.total_sum += value;
        self.total_count += 1;
        self.current_sum += value;
        self.current_count += 1;

        if self.current_count == self.batch_size {
            self.means.push(self.current_sum / self.batch_size as f64);
            self.current_sum = 0.0;
            self.current_count = 0;

            if self.means.len() == 2 * self.target {
                merge_pairwise(&mut self.means);
                self.batch_size *= 2;
            }
        }
    }

    /// Number of completed batches.
    pub(crate) fn batch_count(&self) -> usize {
        self.means.len()
    }

    /// Grand mean over all samples, including the partial batch.
    pub(crate) fn mean(&self) -> f64 {
        if self.total_count == 0 {
            return 0.0;
        }
        self.total_sum / self.total_count as f64
    }

    /// Sample variance of the completed batch means.
    pub(crate) fn variance_of_means(&self) -> f64 {
        sample_variance(&self.means)
    }
}

/// Span-based batch means over a piecewise-constant level signal.
///
/// `record_level` is called with the new level each time the signal changes;
/// the previous level is integrated over the elapsed span.
pub(crate) struct TimeWeightedBatchMeans {
    target: usize,
    batch_seconds: f64,
    means: Vec<f64>,
    current_area: f64,
    current_elapsed: f64,
    last: Option<(MonotonicTime, f64)>,
    total_area: f64,
    total_span: f64,
}

impl TimeWeightedBatchMeans {
    pub(crate) fn new(target: usize, batch_seconds: f64) -> Self {
        assert!(target >= 2, "batch target must be at least two");
        assert!(batch_seconds > 0.0, "batch span must be positive");
        Self {
            target,
            batch_seconds,
            means: Vec::with_capacity(2 * target),
            current_area: 0.0,
            current_elapsed: 0.0,
            last: None,
            total_area: 0.0,
            total_span: 0.0,
        }
    }

    /// Records the signal level at `now`, integrating the previous level over
    /// the elapsed span.
    pub(crate) fn record_level(&mut self, now: MonotonicTime, value: f64) {
        if let Some((prev_time, prev_level)) = self.last {
            let mut remaining = now.duration_since(prev_time).as_secs_f64();
            // Split the span at batch boundaries.
            while remaining > 0.0 {
                let room = self.batch_seconds - self.current_elapsed;
                let step = remaining.min(room);
                self.current_area += prev_level * step;
                self.current_elapsed += step;
                self.total_area += prev_level * step;
                self.total_span += step;
                remaining -= step;

                if self.current_elapsed >= self.batch_seconds {
                    self.means.push(self.current_area / self.batch_seconds);
                    self.current_area = 0.0;
                    self.current_elapsed = 0.0;

                    if self.means.len() == 2 * self.target {
                        merge_pairwise(&mut self.means);
                        self.batch_seconds *= 2.0;
                    }
                }
            }
        }
        self.last = Some((now, value));
    }

    /// Number of completed batches.
    pub(crate) fn batch_count(&self) -> usize {
        self.means.len()
    }

    /// Time-weighted grand mean over the whole observed span.
    pub(crate) fn mean(&self) -> f64 {
        if self.total_span == 0.0 {
            return 0.0;
        }
        self.total_area / self.total_span
    }

    /// Sample variance of the completed batch means.
    pub(crate) fn variance_of_means(&self) -> f64 {
        sample_variance(&self.means)
    }
}

fn merge_pairwise(means: &mut Vec<f64>) {
    let merged: Vec<f64> = means.chunks_exact(2).map(|pair| (pair[0] + pair[1]) / 2.0).collect();
    *means = merged;
}

fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1.0)
}
