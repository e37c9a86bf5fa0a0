//! Output-selection disciplines for fork nodes.

use std::cmp::Ordering;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::metrics::Gauge;
use crate::policy::select::{self, AvailabilitySet};

/// Decides which open output channel a fork node routes the next item to.
///
/// Channels are identified by their index in the hosting node's output list,
/// in wiring order. The node mirrors open/close transitions into the policy
/// and only calls [`select`](ForkPolicy::select) when at least one channel is
/// open.
pub trait ForkPolicy {
    /// Binds the policy to the hosting node's outputs.
    ///
    /// `open` holds the initial open flag per channel; `gauges` holds the
    /// nearest downstream container gauge per channel, where one was found.
    ///
    /// # Panics
    ///
    /// Panics if the policy was already bound to a node.
    fn init(&mut self, open: &[bool], gauges: &[Option<Gauge>]);

    /// Picks an open channel index.
    ///
    /// # Panics
    ///
    /// Panics when every channel is closed.
    fn select(&mut self) -> usize;

    /// A channel transitioned to open.
    fn on_channel_open(&mut self, index: usize);

    /// A channel transitioned to closed.
    fn on_channel_close(&mut self, index: usize);

    /// Whether every channel is currently closed.
    fn all_closed(&self) -> bool;
}

fn expect_open(choice: Option<usize>) -> usize {
    choice.unwrap_or_else(|| panic!("no open channel to select"))
}

/// Uniformly random routing over the open channels.
pub struct RandomFork {
    set: AvailabilitySet,
    rng: ChaCha8Rng,
}

impl RandomFork {
    pub fn new(seed: u64) -> Self {
        Self {
            set: AvailabilitySet::default(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl ForkPolicy for RandomFork {
    fn init(&mut self, open: &[bool], _gauges: &[Option<Gauge>]) {
        self.set.bind(open);
    }

    fn select(&mut self) -> usize {
        expect_open(select::random(&self.set, &mut self.rng))
    }

    fn on_channel_open(&mut self, index: usize) {
        self.set.set(index, true);
    }

    fn on_channel_close(&mut self, index: usize) {
        self.set.set(index, false);
    }

    fn all_closed(&self) -> bool {
        self.set.none()
    }
}

/// Cyclic routing in wiring order, skipping closed channels.
///
/// A channel that closes and reopens rejoins the cycle at its wiring
/// position rather than at the back.
pub struct RoundRobinFork {
    set: AvailabilitySet,
    cursor: usize,
}

impl RoundRobinFork {
    pub fn new() -> Self {
        Self {
            set: AvailabilitySet::default(),
            cursor: 0,
        }
    }
}

impl Default for RoundRobinFork {
    fn default() -> Self {
        Self::new()
    }
}

impl ForkPolicy for RoundRobinFork {
    fn init(&mut self, open: &[bool], _gauges: &[Option<Gauge>]) {
        self.set.bind(open);
    }

    fn select(&mut self) -> usize {
        expect_open(select::round_robin(&self.set, &mut self.cursor))
    }

    fn on_channel_open(&mut self, index: usize) {
        self.set.set(index, true);
    }

    fn on_channel_close(&mut self, index: usize) {
        self.set.set(index, false);
    }

    fn all_closed(&self) -> bool {
        self.set.none()
    }
}

/// Always the lowest-index open channel, making later channels overflow
/// destinations.
pub struct FirstAvailableFork {
    set: AvailabilitySet,
}

impl FirstAvailableFork {
    pub fn new() -> Self {
        Self {
            set: AvailabilitySet::default(),
        }
    }
}

impl Default for FirstAvailableFork {
    fn default() -> Self {
        Self::new()
    }
}

impl ForkPolicy for FirstAvailableFork {
    fn init(&mut self, open: &[bool], _gauges: &[Option<Gauge>]) {
        self.set.bind(open);
    }

    fn select(&mut self) -> usize {
        expect_open(select::first_available(&self.set))
    }

    fn on_channel_open(&mut self, index: usize) {
        self.set.set(index, true);
    }

    fn on_channel_close(&mut self, index: usize) {
        self.set.set(index, false);
    }

    fn all_closed(&self) -> bool {
        self.set.none()
    }
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

/// Routes to the open channel whose downstream container holds the fewest
/// items. Ties resolve to the lowest index.
pub struct LeastFullFork {
    set: AvailabilitySet,
    gauges: Vec<Gauge>,
}

impl LeastFullFork {
    pub fn new() -> Self {
        Self {
            set: AvailabilitySet::default(),
            gauges: Vec::new(),
        }
    }
}

impl Default for LeastFullFork {
    fn default() -> Self {
        Self::new()
    }
}

impl ForkPolicy for LeastFullFork {
    fn init(&mut self, open: &[bool], gauges: &[Option<Gauge>]) {
        self.set.bind(open);
        self.gauges = resolve_gauges(gauges);
    }

    fn select(&mut self) -> usize {
        expect_open(select::extreme_occupancy(&self.set, &self.gauges, false))
    }

    fn on_channel_open(&mut self, index: usize) {
        self.set.set(index, true);
    }

    fn on_channel_close(&mut self, index: usize) {
        self.set.set(index, false);
    }

    fn all_closed(&self) -> bool {
        self.set.none()
    }
}

/// Routes to the open channel whose downstream container holds the most
/// items. Ties resolve to the lowest index.
pub struct MostFullFork {
    set: AvailabilitySet,
    gauges: Vec<Gauge>,
}

impl MostFullFork {
    pub fn new() -> Self {
        Self {
            set: AvailabilitySet::default(),
            gauges: Vec::new(),
        }
    }
}

impl Default for MostFullFork {
    fn default() -> Self {
        Self::new()
    }
}

impl ForkPolicy for MostFullFork {
    fn init(&mut self, open: &[bool], gauges: &[Option<Gauge>]) {
        self.set.bind(open);
        self.gauges = resolve_gauges(gauges);
    }

    fn select(&mut self) -> usize {
        expect_open(select::extreme_occupancy(&self.set, &self.gauges, true))
    }

    fn on_channel_open(&mut self, index: usize) {
        self.set.set(index, true);
    }

    fn on_channel_close(&mut self, index: usize) {
        self.set.set(index, false);
    }

    fn all_closed(&self) -> bool {
        self.set.none()
    }
}

/// Routes to the open channel that ranks first under a caller-supplied
/// comparator over channel indices.
pub struct PriorityFork {
    set: AvailabilitySet,
    compare: Box<dyn Fn(usize, usize) -> Ordering>,
}

impl PriorityFork {
    pub fn new(compare: impl Fn(usize, usize) -> Ordering + 'static) -> Self {
        Self {
            set: AvailabilitySet::default(),
            compare: Box::new(compare),
        }
    }
}

impl ForkPolicy for PriorityFork {
    fn init(&mut self, open: &[bool], _gauges: &[Option<Gauge>]) {
        self.set.bind(open);
    }

    fn select(&mut self) -> usize {
        expect_open(select::by_rank(&self.set, &*self.compare))
    }

    fn on_channel_open(&mut self, index: usize) {
        self.set.set(index, true);
    }

    fn on_channel_close(&mut self, index: usize) {
        self.set.set(index, false);
    }

    fn all_closed(&self) -> bool {
        self.set.none()
    }
}
