//! Input-selection disciplines for join nodes.

use std::cmp::Ordering;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::metrics::Gauge;
use crate::policy::select::{self, AvailabilitySet};

/// Decides which ready input channel a join node pulls from next.
///
/// The mirror image of [`ForkPolicy`](crate::policy::ForkPolicy): channels
/// are the hosting node's pull inputs in wiring order, availability is
/// readiness rather than openness, and occupancy-driven variants rank inputs
/// by the container feeding them.
pub trait JoinPolicy {
    /// Binds the policy to the hosting node's inputs.
    ///
    /// # Panics
    ///
    /// Panics if the policy was already bound to a node.
    fn init(&mut self, ready: &[bool], gauges: &[Option<Gauge>]);

    /// Picks a ready channel index.
    ///
    /// # Panics
    ///
    /// Panics when no channel is ready.
    fn select(&mut self) -> usize;

    /// A channel transitioned to ready.
    fn on_channel_ready(&mut self, index: usize);

    /// A channel transitioned to not-ready.
    fn on_channel_not_ready(&mut self, index: usize);

    /// Whether no channel is currently ready.
    fn none_ready(&self) -> bool;
}

fn expect_ready(choice: Option<usize>) -> usize {
    choice.unwrap_or_else(|| panic!("no ready channel to select"))
}

fn resolve_gauges(gauges: &[Option<Gauge>]) -> Vec<Gauge> {
    gauges
        .iter()
        .enumerate()
        .map(|(index, gauge)| {
            gauge.clone().unwrap_or_else(|| {
                panic!("no container reachable behind channel {index} of an occupancy policy")
            })
        })
        .collect()
}

/// Uniformly random draws over the ready channels.
pub struct RandomJoin {
    set: AvailabilitySet,
    rng: ChaCha8Rng,
}

impl RandomJoin {
    pub fn new(seed: u64) -> Self {
        Self {
            set: AvailabilitySet::default(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl JoinPolicy for RandomJoin {
    fn init(&mut self, ready: &[bool], _gauges: &[Option<Gauge>]) {
        self.set.bind(ready);
    }

    fn select(&mut self) -> usize {
        expect_ready(select::random(&self.set, &mut self.rng))
    }

    fn on_channel_ready(&mut self, index: usize) {
        self.set.set(index, true);
    }

    fn on_channel_not_ready(&mut self, index: usize) {
        self.set.set(index, false);
    }

    fn none_ready(&self) -> bool {
        self.set.none()
    }
}

/// Cyclic draws in wiring order, skipping channels that are not ready.
pub struct RoundRobinJoin {
    set: AvailabilitySet,
    cursor: usize,
}

impl RoundRobinJoin {
    pub fn new() -> Self {
        Self {
            set: AvailabilitySet::default(),
            cursor: 0,
        }
    }
}

impl Default for RoundRobinJoin {
    fn default() -> Self {
        Self::new()
    }
}

impl JoinPolicy for RoundRobinJoin {
    fn init(&mut self, ready: &[bool], _gauges: &[Option<Gauge>]) {
        self.set.bind(ready);
    }

    fn select(&mut self) -> usize {
        expect_ready(select::round_robin(&self.set, &mut self.cursor))
    }

    fn on_channel_ready(&mut self, index: usize) {
        self.set.set(index, true);
    }

    fn on_channel_not_ready(&mut self, index: usize) {
        self.set.set(index, false);
    }

    fn none_ready(&self) -> bool {
        self.set.none()
    }
}

/// Always the lowest-index ready channel, giving earlier inputs absolute
/// precedence.
pub struct FirstReadyJoin {
    set: AvailabilitySet,
}

impl FirstReadyJoin {
    pub fn new() -> Self {
        Self {
            set: AvailabilitySet::default(),
        }
    }
}

impl Default for FirstReadyJoin {
    fn default() -> Self {
        Self::new()
    }
}

impl JoinPolicy for FirstReadyJoin {
    fn init(&mut self, ready: &[bool], _gauges: &[Option<Gauge>]) {
        self.set.bind(ready);
    }

    fn select(&mut self) -> usize {
        expect_ready(select::first_available(&self.set))
    }

    fn on_channel_ready(&mut self, index: usize) {
        self.set.set(index, true);
    }

    fn on_channel_not_ready(&mut self, index: usize) {
        self.set.set(index, false);
    }

    fn none_ready(&self) -> bool {
        self.set.none()
    }
}

/// Draws from the ready channel whose upstream container holds the fewest
/// items. Ties resolve to the lowest index.
pub struct LeastFullJoin {
    set: AvailabilitySet,
    gauges: Vec<Gauge>,
}

impl LeastFullJoin {
    pub fn new() -> Self {
        Self {
            set: AvailabilitySet::default(),
            gauges: Vec::new(),
        }
    }
}

impl Default for LeastFullJoin {
    fn default() -> Self {
        Self::new()
    }
}

impl JoinPolicy for LeastFullJoin {
    fn init(&mut self, ready: &[bool], gauges: &[Option<Gauge>]) {
        self.set.bind(ready);
        self.gauges = resolve_gauges(gauges);
    }

    fn select(&mut self) -> usize {
        expect_ready(select::extreme_occupancy(&self.set, &self.gauges, false))
    }

    fn on_channel_ready(&mut self, index: usize) {
        self.set.set(index, true);
    }

    fn on_channel_not_ready(&mut self, index: usize) {
        self.set.set(index, false);
    }

    fn none_ready(&self) -> bool {
        self.set.none()
    }
}

/// Draws from the ready channel whose upstream container holds the most
/// items, the usual choice for draining the longest queue first.
pub struct MostFullJoin {
    set: AvailabilitySet,
    gauges: Vec<Gauge>,
}

impl MostFullJoin {
    pub fn new() -> Self {
        Self {
            set: AvailabilitySet::default(),
            gauges: Vec::new(),
        }
    }
}

impl Default for MostFullJoin {
    fn default() -> Self {
        Self::new()
    }
}

impl JoinPolicy for MostFullJoin {
    fn init(&mut self, ready: &[bool], gauges: &[Option<Gauge>]) {
        self.set.bind(ready);
        self.gauges = resolve_gauges(gauges);
    }

    fn select(&mut self) -> usize {
        expect_ready(select::extreme_occupancy(&self.set, &self.gauges, true))
    }

    fn on_channel_ready(&mut self, index: usize) {
        self.set.set(index, true);
    }

    fn on_channel_not_ready(&mut self, index: usize) {
        self.set.set(index, false);
    }

    fn none_ready(&self) -> bool {
        self.set.none()
    }
}

/// Draws from the ready channel that ranks first under a caller-supplied
/// comparator over channel indices.
pub struct PriorityJoin {
    set: AvailabilitySet,
    compare: Box<dyn Fn(usize, usize) -> Ordering>,
}

impl PriorityJoin {
    pub fn new(compare: impl Fn(usize, usize) -> Ordering + 'static) -> Self {
        Self {
            set: AvailabilitySet::default(),
            compare: Box::new(compare),
        }
    }
}

impl JoinPolicy for PriorityJoin {
    fn init(&mut self, ready: &[bool], _gauges: &[Option<Gauge>]) {
        self.set.bind(ready);
    }

    fn select(&mut self) -> usize {
        expect_ready(select::by_rank(&self.set, &*self.compare))
    }

    fn on_channel_ready(&mut self, index: usize) {
        self.set.set(index, true);
    }

    fn on_channel_not_ready(&mut self, index: usize) {
        self.set.set(index, false);
    }

    fn none_ready(&self) -> bool {
        self.set.none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_robin_skips_channels_that_are_not_ready() {
        let mut policy = RoundRobinJoin::new();
        policy.init(&[true, false, true], &[None, None, None]);
        assert_eq!(policy.select(), 0);
        assert_eq!(policy.select(), 2);
        policy.on_channel_ready(1);
        assert_eq!(policy.select(), 0);
        assert_eq!(policy.select(), 1);
    }

    #[test]
    fn most_full_drains_the_longest_queue() {
        let left = Gauge::new();
        let right = Gauge::new();
        let mut policy = MostFullJoin::new();
        policy.init(&[true, true], &[Some(left.clone()), Some(right.clone())]);
        left.set(2.0);
        right.set(6.0);
        assert_eq!(policy.select(), 1);
        right.set(1.0);
        assert_eq!(policy.select(), 0);
    }

    #[test]
    #[should_panic(expected = "no ready channel")]
    fn selection_with_no_ready_channel_panics() {
        let mut policy = FirstReadyJoin::new();
        policy.init(&[false], &[None]);
        policy.select();
    }

    #[test]
    fn priority_ranks_indices() {
        // Prefer the highest index.
        let mut policy = PriorityJoin::new(|a, b| b.cmp(&a));
        policy.init(&[true, true, true], &[None, None, None]);
        assert_eq!(policy.select(), 2);
        policy.on_channel_not_ready(2);
        assert_eq!(policy.select(), 1);
    }

    #[test]
    fn none_ready_tracks_transitions() {
        let mut policy = RandomJoin::new(3);
        policy.init(&[false, false], &[None, None]);
        assert!(policy.none_ready());
        policy.on_channel_ready(0);
        assert!(!policy.none_ready());
        policy.on_channel_not_ready(0);
        assert!(policy.none_ready());
    }
}
