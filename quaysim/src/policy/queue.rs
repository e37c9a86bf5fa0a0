//! Storage disciplines for buffering nodes.

use std::cmp::Ordering;
use std::collections::VecDeque;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Decides the storage order of a buffering node.
///
/// The hosting node owns capacity enforcement and channel flow control; the
/// policy only orders the items it is given. Dequeuing from an empty policy
/// is a hosting-node bug and panics.
pub trait QueuePolicy<T> {
    /// Stores one item.
    fn enqueue(&mut self, item: T);

    /// Removes and returns the next item under this discipline.
    ///
    /// # Panics
    ///
    /// Panics when the queue is empty.
    fn dequeue(&mut self) -> T;

    /// Number of stored items.
    fn occupancy(&self) -> usize;

    /// Iterates over the stored items in an unspecified order.
    fn contents(&self) -> Box<dyn Iterator<Item = &T> + '_>;
}

/// First-in, first-out storage.
pub struct FifoQueue<T> {
    items: VecDeque<T>,
}

impl<T> FifoQueue<T> {
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }
}

impl<T> Default for FifoQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> QueuePolicy<T> for FifoQueue<T> {
    fn enqueue(&mut self, item: T) {
        self.items.push_back(item);
    }

    fn dequeue(&mut self) -> T {
        self.items
            .pop_front()
            .unwrap_or_else(|| panic!("dequeue from an empty queue"))
    }

    fn occupancy(&self) -> usize {
        self.items.len()
    }

    fn contents(&self) -> Box<dyn Iterator<Item = &T> + '_> {
        Box::new(self.items.iter())
    }
}

/// Uniformly random service order, from a private seeded random stream.
pub struct RandomQueue<T> {
    items: Vec<T>,
    rng: ChaCha8Rng,
}

impl<T> RandomQueue<T> {
    pub fn new(seed: u64) -> Self {
        Self {
            items: Vec::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl<T> QueuePolicy<T> for RandomQueue<T> {
    fn enqueue(&mut self, item: T) {
        self.items.push(item);
    }

    fn dequeue(&mut self) -> T {
        if self.items.is_empty() {
            panic!("dequeue from an empty queue");
        }
        let index = self.rng.gen_range(0..self.items.len());

        self.items.swap_remove(index)
    }

    fn occupancy(&self) -> usize {
        self.items.len()
    }

    fn contents(&self) -> Box<dyn Iterator<Item = &T> + '_> {
        Box::new(self.items.iter())
    }
}

/// Comparator-ordered storage. Items that sort earlier dequeue first; equal
/// items dequeue in insertion order.
pub struct PriorityQueue<T> {
    items: VecDeque<T>,
    compare: Box<dyn Fn(&T, &T) -> Ordering>,
}

impl<T> PriorityQueue<T> {
    pub fn new(compare: impl Fn(&T, &T) -> Ordering + 'static) -> Self {
        Self {
            items: VecDeque::new(),
            compare: Box::new(compare),
        }
    }
}

impl<T> QueuePolicy<T> for PriorityQueue<T> {
    fn enqueue(&mut self, item: T) {
        // Insert after all items that do not sort strictly later, which
        // keeps equal items in arrival order.
        let position = self
            .items
            .partition_point(|stored| (self.compare)(stored, &item) != Ordering::Greater);
        self.items.insert(position, item);
    }

    fn dequeue(&mut self) -> T {
        self.items
            .pop_front()
            .unwrap_or_else(|| panic!("dequeue from an empty queue"))
    }

    fn occupancy(&self) -> usize {
        self.items.len()
    }

    fn contents(&self) -> Box<dyn Iterator<Item = &T> + '_> {
        Box::new(self.items.iter())
    }
}

/// A counting pool of indistinguishable tokens.
///
/// Tokens carry no payload, so the pool stores only a count. It backs
/// token-gated subnetworks, where a gate withdraws a token per admitted item
/// and a release node returns it.
pub struct TokenPool {
    count: usize,
}

impl TokenPool {
    /// Creates a pool holding `count` tokens.
    pub fn new(count: usize) -> Self {
        Self { count }
    }
}

impl QueuePolicy<()> for TokenPool {
    fn enqueue(&mut self, _item: ()) {
        self.count += 1;
    }

    fn dequeue(&mut self) {
        if self.count == 0 {
            panic!("dequeue from an empty queue");
        }
        self.count -= 1;
    }

    fn occupancy(&self) -> usize {
        self.count
    }

    fn contents(&self) -> Box<dyn Iterator<Item = &()> + '_> {
        Box::new(std::iter::repeat(&()).take(self.count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_preserves_arrival_order() {
        let mut queue = FifoQueue::new();
        queue.enqueue("a");
        queue.enqueue("b");
        queue.enqueue("c");
        assert_eq!(queue.occupancy(), 3);
        assert_eq!(queue.dequeue(), "a");
        assert_eq!(queue.dequeue(), "b");
        assert_eq!(queue.dequeue(), "c");
    }

    #[test]
    #[should_panic(expected = "empty queue")]
    fn fifo_rejects_empty_dequeue() {
        let mut queue: FifoQueue<u32> = FifoQueue::new();
        queue.dequeue();
    }

    #[test]
    fn random_drains_every_item() {
        let mut queue = RandomQueue::new(42);
        for i in 0..10 {
            queue.enqueue(i);
        }
        let mut drained: Vec<i32> = (0..10).map(|_| queue.dequeue()).collect();
        drained.sort_unstable();
        assert_eq!(drained, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn random_is_reproducible() {
        let order = |seed| {
            let mut queue = RandomQueue::new(seed);
            for i in 0..10 {
                queue.enqueue(i);
            }
            (0..10).map(|_| queue.dequeue()).collect::<Vec<i32>>()
        };
        assert_eq!(order(7), order(7));
    }

    #[test]
    fn priority_sorts_and_keeps_equal_items_in_order() {
        let mut queue = PriorityQueue::new(|a: &(u32, &str), b| a.0.cmp(&b.0));
        queue.enqueue((2, "first low"));
        queue.enqueue((1, "high"));
        queue.enqueue((2, "second low"));
        assert_eq!(queue.dequeue(), (1, "high"));
        assert_eq!(queue.dequeue(), (2, "first low"));
        assert_eq!(queue.dequeue(), (2, "second low"));
    }

    #[test]
    fn token_pool_counts() {
        let mut pool = TokenPool::new(2);
        assert_eq!(pool.occupancy(), 2);
        pool.dequeue();
        pool.dequeue();
        assert_eq!(pool.occupancy(), 0);
        pool.enqueue(());
        assert_eq!(pool.occupancy(), 1);
        assert_eq!(pool.contents().count(), 1);
    }

    #[test]
    #[should_panic(expected = "empty queue")]
    fn token_pool_rejects_empty_dequeue() {
        let mut pool = TokenPool::new(0);
        pool.dequeue();
    }
}
