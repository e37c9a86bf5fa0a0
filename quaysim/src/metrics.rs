//! Metrics and the steady-state statistics engine.
//!
//! Raw observations enter the engine through one of two metric flavors:
//!
//! * [`ContinuousMetric`]: a time-weighted, pull-sampled signal such as a
//!   queue occupancy. The kernel samples it once per processed event; since
//!   the underlying signals are piecewise-constant between events, this
//!   yields exact time integrals. Repeated same-instant queries are served
//!   from a `(time, value)` cache.
//! * [`InstantaneousMetric`]: a push-fired sample stream such as completed
//!   sojourn times, broadcast to listeners. It has no standing value between
//!   samples.
//!
//! A [`MetricGroup`] pairs one raw metric with its derived moments: a
//! steady-state detector ([`steady_state`]), an adaptive batch-means
//! estimator ([`batch_means`]) and a Student-t confidence interval
//! ([`MetricGroup::confidence_interval`]), which is only reported once the
//! process is steady and enough batches have accumulated.

pub mod batch_means;
pub mod steady_state;
pub(crate) mod student_t;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::time::MonotonicTime;

use batch_means::{BatchMeans, TimeWeightedBatchMeans};
use steady_state::SteadyStateDetector;

/// A shared instantaneous level, owned by a container node and read by
/// continuous metrics and occupancy-driven routing policies.
///
/// Cloning a `Gauge` yields another handle to the same level.
#[derive(Clone, Default)]
pub struct Gauge(Rc<Cell<f64>>);

impl Gauge {
    /// Creates a gauge at level zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current level.
    pub fn get(&self) -> f64 {
        self.0.get()
    }

    /// Sets the current level.
    pub fn set(&self, value: f64) {
        self.0.set(value);
    }

    /// Adds `delta` to the current level.
    pub fn add(&self, delta: f64) {
        self.0.set(self.0.get() + delta);
    }
}

impl std::fmt::Debug for Gauge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Gauge").field(&self.get()).finish()
    }
}

/// A time-weighted, pull-sampled metric.
///
/// `report` computes the current value through the sampling closure and
/// caches it per instant, so repeated same-time queries are free. Time must
/// be non-decreasing across calls.
pub struct ContinuousMetric {
    label: String,
    source: Box<dyn FnMut(MonotonicTime) -> f64>,
    cache: Option<(MonotonicTime, f64)>,
}

impl ContinuousMetric {
    /// Creates a continuous metric from a sampling closure.
    pub fn new(label: impl Into<String>, source: impl FnMut(MonotonicTime) -> f64 + 'static) -> Self {
        Self {
            label: label.into(),
            source: Box::new(source),
            cache: None,
        }
    }

    /// The metric's display label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the value at `now`, sampling the source at most once per
    /// instant.
    ///
    /// # Panics
    ///
    /// Panics if `now` precedes the time of an earlier report.
    pub fn report(&mut self, now: MonotonicTime) -> f64 {
        if let Some((time, value)) = self.cache {
            if time == now {
                return value;
            }
            assert!(
                now > time,
                "continuous metric '{}' was sampled with a time in the past",
                self.label
            );
        }
        let value = (self.source)(now);
        self.cache = Some((now, value));

        value
    }
}

/// A push-fired metric broadcasting `(time, value)` samples to listeners.
pub struct InstantaneousMetric {
    label: String,
    listeners: Vec<Box<dyn FnMut(MonotonicTime, f64)>>,
}

impl InstantaneousMetric {
    /// Creates an instantaneous metric with no listeners, wrapped for
    /// sharing between the firing node and its metric group.
    pub fn new(label: impl Into<String>) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            label: label.into(),
            listeners: Vec::new(),
        }))
    }

    /// The metric's display label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Registers a listener invoked on every fired sample.
    pub fn subscribe(&mut self, listener: impl FnMut(MonotonicTime, f64) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Broadcasts one sample to all listeners.
    pub fn fire(&mut self, now: MonotonicTime, value: f64) {
        for listener in &mut self.listeners {
            listener(now, value);
        }
    }
}

/// Configuration of the statistical estimators attached to a metric.
#[derive(Copy, Clone, Debug)]
pub struct StatsConfig {
    /// Two-sided significance level of the confidence interval (e.g. `0.05`
    /// for a 95% interval).
    pub significance: f64,
    /// Number of batches the estimator converges back to after each merge,
    /// and the minimum batch count required before an interval is reported.
    pub target_batches: usize,
    /// Initial number of samples per batch (discrete estimator).
    pub batch_size: u64,
    /// Initial simulated-time span per batch, in seconds (time-weighted
    /// estimator).
    pub batch_seconds: f64,
    /// Size of the sliding sample window inspected by the steady-state
    /// detector.
    pub steady_period: usize,
    /// Number of mean-crossings within the window required to declare the
    /// process steady.
    pub steady_crossings: usize,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            significance: 0.05,
            target_batches: 20,
            batch_size: 16,
            batch_seconds: 60.0,
            steady_period: 25,
            steady_crossings: 5,
        }
    }
}

/// A confidence interval around a steady-state mean.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ConfidenceInterval {
    /// Lower interval bound.
    pub lower: f64,
    /// Point estimate of the mean.
    pub mean: f64,
    /// Upper interval bound.
    pub upper: f64,
}

/// The streaming estimator stack shared by both metric flavors: steady-state
/// detection, adaptive batch means and the Student-t interval.
pub(crate) struct Estimator {
    detector: SteadyStateDetector,
    batches: Batches,
    significance: f64,
    target_batches: usize,
    // Interval cache, keyed by query timestamp.
    ci_cache: Option<(MonotonicTime, Option<ConfidenceInterval>)>,
}

enum Batches {
    Discrete(BatchMeans),
    TimeWeighted(TimeWeightedBatchMeans),
}

impl Estimator {
    fn discrete(config: &StatsConfig) -> Self {
        Self {
            detector: SteadyStateDetector::new(config.steady_period, config.steady_crossings),
            batches: Batches::Discrete(BatchMeans::new(config.target_batches, config.batch_size)),
            significance: config.significance,
            target_batches: config.target_batches,
            ci_cache: None,
        }
    }

    fn time_weighted(config: &StatsConfig) -> Self {
        Self {
            detector: SteadyStateDetector::new(config.steady_period, config.steady_crossings),
            batches: Batches::TimeWeighted(TimeWeightedBatchMeans::new(
                config.target_batches,
                config.batch_seconds,
            )),
            significance: config.significance,
            target_batches: config.target_batches,
            ci_cache: None,
        }
    }

    /// Records a discrete sample.
    fn record(&mut self, value: f64) {
        self.detector.observe(value);
        match &mut self.batches {
            Batches::Discrete(batches) => batches.add(value),
            Batches::TimeWeighted(_) => unreachable!("discrete sample on a time-weighted estimator"),
        }
        self.ci_cache = None;
    }

    /// Records the level of a piecewise-constant signal at `now`.
    fn record_level(&mut self, now: MonotonicTime, value: f64) {
        self.detector.observe(value);
        match &mut self.batches {
            Batches::TimeWeighted(batches) => batches.record_level(now, value),
            Batches::Discrete(_) => unreachable!("level sample on a discrete estimator"),
        }
        self.ci_cache = None;
    }

    fn mean(&self) -> f64 {
        match &self.batches {
            Batches::Discrete(batches) => batches.mean(),
            Batches::TimeWeighted(batches) => batches.mean(),
        }
    }

    fn batch_stats(&self) -> (usize, f64, f64) {
        let (count, mean, variance) = match &self.batches {
            Batches::Discrete(batches) => {
                (batches.batch_count(), batches.mean(), batches.variance_of_means())
            }
            Batches::TimeWeighted(batches) => {
                (batches.batch_count(), batches.mean(), batches.variance_of_means())
            }
        };

        (count, mean, variance)
    }

    fn is_steady(&self) -> bool {
        self.detector.is_steady()
    }

    fn confidence_interval(&mut self, now: MonotonicTime) -> Option<ConfidenceInterval> {
        if let Some((time, interval)) = self.ci_cache {
            if time == now {
                return interval;
            }
        }
        let interval = self.compute_interval();
        self.ci_cache = Some((now, interval));

        interval
    }

    fn compute_interval(&self) -> Option<ConfidenceInterval> {
        if !self.detector.is_steady() {
            return None;
        }
        let (count, mean, variance) = self.batch_stats();
        if count < self.target_batches || count < 2 {
            return None;
        }
        let df = (count - 1) as f64;
        let critical = student_t::two_sided_critical(self.significance, df);
        let half_width = critical * (variance / count as f64).sqrt();

        Some(ConfidenceInterval {
            lower: mean - half_width,
            mean,
            upper: mean + half_width,
        })
    }
}

/// A raw metric paired with its derived moments.
///
/// Metric groups are registered on a scenario; the kernel samples continuous
/// groups once per processed event, while instantaneous groups are fed by
/// their metric's listeners. Derived statistics (`mean`, `variance`,
/// `confidence_interval`) are queryable at any time but an interval is only
/// reported once the underlying process is steady and the batch count has
/// reached its target.
pub struct MetricGroup {
    label: String,
    source: MetricSource,
    estimator: Rc<RefCell<Estimator>>,
}

enum MetricSource {
    Continuous(ContinuousMetric),
    /// Keeps the shared metric alive for the lifetime of the group.
    Instantaneous {
        _metric: Rc<RefCell<InstantaneousMetric>>,
    },
}

impl MetricGroup {
    /// Creates a metric group over a continuous (time-weighted) metric.
    pub fn continuous(metric: ContinuousMetric, config: &StatsConfig) -> Self {
        Self {
            label: metric.label().to_owned(),
            source: MetricSource::Continuous(metric),
            estimator: Rc::new(RefCell::new(Estimator::time_weighted(config))),
        }
    }

    /// Creates a metric group over an instantaneous metric, subscribing to
    /// its sample stream.
    pub fn instantaneous(metric: Rc<RefCell<InstantaneousMetric>>, config: &StatsConfig) -> Self {
        let estimator = Rc::new(RefCell::new(Estimator::discrete(config)));
        let sink = Rc::clone(&estimator);
        let label = metric.borrow().label().to_owned();
        metric
            .borrow_mut()
            .subscribe(move |_time, value| sink.borrow_mut().record(value));

        Self {
            label,
            source: MetricSource::Instantaneous { _metric: metric },
            estimator,
        }
    }

    /// The group's display label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Samples the raw metric at `now`. A no-op for instantaneous groups,
    /// which are fed by their metric's listeners instead.
    pub(crate) fn sample(&mut self, now: MonotonicTime) {
        if let MetricSource::Continuous(metric) = &mut self.source {
            let value = metric.report(now);
            self.estimator.borrow_mut().record_level(now, value);
        }
    }

    /// Point estimate of the long-run mean: total observation mass divided
    /// by total observation count or span.
    pub fn mean(&self) -> f64 {
        self.estimator.borrow().mean()
    }

    /// Sample variance of the batch means.
    pub fn variance(&self) -> f64 {
        self.estimator.borrow().batch_stats().2
    }

    /// Whether the underlying process has been detected steady.
    ///
    /// Once this returns `true` it remains `true` for the rest of the run.
    pub fn is_steady(&self) -> bool {
        self.estimator.borrow().is_steady()
    }

    /// The Student-t confidence interval at `now`, if the process is steady
    /// and the batch count has reached its target.
    ///
    /// The result is cached per timestamp.
    pub fn confidence_interval(&self, now: MonotonicTime) -> Option<ConfidenceInterval> {
        self.estimator.borrow_mut().confidence_interval(now)
    }
}
