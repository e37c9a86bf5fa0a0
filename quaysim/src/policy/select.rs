//! Availability bookkeeping and selection helpers shared by the fork and
//! join disciplines.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::metrics::Gauge;

/// Per-channel availability flags, mirrored from the hosting node's channel
/// states.
///
/// A set is bound exactly once, when the hosting node initializes its policy
/// against the wired channel list.
#[derive(Default)]
pub(crate) struct AvailabilitySet {
    flags: Vec<bool>,
    available: usize,
    bound: bool,
}

impl AvailabilitySet {
    pub(crate) fn bind(&mut self, flags: &[bool]) {
        if self.bound {
            panic!("policy is already bound to a node");
        }
        self.bound = true;
        self.flags = flags.to_vec();
        self.available = flags.iter().filter(|f| **f).count();
    }

    pub(crate) fn set(&mut self, index: usize, available: bool) {
        let was = std::mem::replace(&mut self.flags[index], available);
        match (was, available) {
            (false, true) => self.available += 1,
            (true, false) => self.available -= 1,
            _ => {}
        }
    }

    pub(crate) fn is_available(&self, index: usize) -> bool {
        self.flags[index]
    }

    pub(crate) fn none(&self) -> bool {
        self.available == 0
    }

    pub(crate) fn len(&self) -> usize {
        self.flags.len()
    }

    fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.flags
            .iter()
            .enumerate()
            .filter_map(|(i, f)| f.then_some(i))
    }
}

pub(crate) fn first_available(set: &AvailabilitySet) -> Option<usize> {
    set.indices().next()
}

/// Scans from the cursor for the next available index and advances the
/// cursor past it, so every available channel gets its turn in index order.
pub(crate) fn round_robin(set: &AvailabilitySet, cursor: &mut usize) -> Option<usize> {
    let n = set.len();
    for offset in 0..n {
        let index = (*cursor + offset) % n;
        if set.is_available(index) {
            *cursor = (index + 1) % n;
            return Some(index);
        }
    }

    None
}

pub(crate) fn random(set: &AvailabilitySet, rng: &mut ChaCha8Rng) -> Option<usize> {
    if set.none() {
        return None;
    }
    let pick = rng.gen_range(0..set.available);

    set.indices().nth(pick)
}

/// Picks the available index whose gauge is extreme (lowest level, or
/// highest when `most` is set). Ties resolve to the lowest index.
pub(crate) fn extreme_occupancy(
    set: &AvailabilitySet,
    gauges: &[Gauge],
    most: bool,
) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for index in set.indices() {
        let level = gauges[index].get();
        let better = match best {
            None => true,
            Some((_, incumbent)) => {
                if most {
                    level > incumbent
                } else {
                    level < incumbent
                }
            }
        };
        if better {
            best = Some((index, level));
        }
    }

    best.map(|(index, _)| index)
}

/// Picks the available index that sorts first under the comparator. Ties
/// resolve to the lowest index.
pub(crate) fn by_rank(
    set: &AvailabilitySet,
    compare: &dyn Fn(usize, usize) -> std::cmp::Ordering,
) -> Option<usize> {
    let mut best: Option<usize> = None;
    for index in set.indices() {
        best = match best {
            None => Some(index),
            Some(incumbent) => {
                if compare(index, incumbent) == std::cmp::Ordering::Less {
                    Some(index)
                } else {
                    Some(incumbent)
                }
            }
        };
    }

    best
}
