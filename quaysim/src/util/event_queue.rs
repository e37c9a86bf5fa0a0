//! Time-ordered event queue.

use std::mem;

/// A priority queue with deterministic FIFO ordering of same-key entries.
///
/// This is an array-based binary heap with one twist: each entry is tagged at
/// insertion with a monotonically increasing epoch, and the heap is ordered by
/// the `(key, epoch)` pair. Same-key entries are therefore guaranteed to be
/// pulled in insertion order, which is what makes the execution order of
/// equal-time events reproducible across simulation runs.
///
/// There is deliberately no support for deleting arbitrary entries: the kernel
/// has no event-cancellation primitive, so a plain heap without cross-indexing
/// is sufficient.
pub(crate) struct EventQueue<K, V>
where
    K: Copy + Ord,
{
    heap: Vec<Entry<K, V>>,
    next_epoch: u64,
}

impl<K: Copy + Ord, V> EventQueue<K, V> {
    /// Creates an empty `EventQueue`.
    pub(crate) fn new() -> Self {
        Self {
            heap: Vec::new(),
            next_epoch: 0,
        }
    }

    /// Returns the number of entries in the queue.
    #[allow(unused)]
    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }

    /// Returns `true` if the queue holds no entry.
    pub(crate) fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Inserts a new key-value pair.
    ///
    /// This operation has *O*(log(*N*)) worst-case theoretical complexity.
    pub(crate) fn insert(&mut self, key: K, value: V) {
        let epoch = self.next_epoch;
        assert_ne!(epoch, u64::MAX);
        self.next_epoch += 1;

        self.heap.push(Entry {
            key: UniqueKey { key, epoch },
            value,
        });
        self.sift_up(self.heap.len() - 1);
    }

    /// Pulls the value with the lowest key.
    ///
    /// If there are several equal lowest keys, the value which was inserted
    /// first is returned.
    ///
    /// This operation has *O*(log(*N*)) worst-case theoretical complexity.
    pub(crate) fn pull(&mut self) -> Option<(K, V)> {
        if self.heap.is_empty() {
            return None;
        }
        let last = self.heap.len() - 1;
        self.heap.swap(0, last);
        let entry = self.heap.pop()?;
        if !self.heap.is_empty() {
            self.sift_down(0);
        }

        Some((entry.key.key, entry.value))
    }

    /// Peeks a reference to the lowest key, leaving the entry in the queue.
    ///
    /// If there are several equal lowest keys, the key which was inserted
    /// first is returned.
    pub(crate) fn peek_key(&self) -> Option<&K> {
        self.heap.first().map(|entry| &entry.key.key)
    }

    /// Moves the entry at `idx` up the heap while a parent has a larger key.
    fn sift_up(&mut self, idx: usize) {
        let mut child = idx;
        while child != 0 {
            let parent = (child - 1) / 2;
            if self.heap[child].key >= self.heap[parent].key {
                break;
            }
            self.heap.swap(child, parent);
            child = parent;
        }
    }

    /// Moves the entry at `idx` down the heap while a child has a smaller key.
    fn sift_down(&mut self, idx: usize) {
        let mut parent = idx;
        loop {
            let mut child = 2 * parent + 1;
            if child >= self.heap.len() {
                break;
            }
            // If the sibling exists and has a smaller key, make it the
            // candidate for swapping.
            if let Some(sibling) = self.heap.get(child + 1) {
                if self.heap[child].key > sibling.key {
                    child += 1;
                }
            }
            if self.heap[parent].key <= self.heap[child].key {
                break;
            }
            self.heap.swap(parent, child);
            parent = child;
        }
    }

    /// Drains the queue, returning all values in an unspecified order.
    #[allow(unused)]
    pub(crate) fn clear(&mut self) {
        mem::take(&mut self.heap);
    }
}

/// A single heap entry.
struct Entry<K: Copy, V> {
    key: UniqueKey<K>,
    value: V,
}

/// A unique key made of the user-provided key complemented by a unique epoch.
///
/// Implementation note: `UniqueKey` automatically derives `PartialOrd`, which
/// implies that lexicographic order between `key` and `epoch` must be
/// preserved to make sure that `key` has a higher sorting priority than
/// `epoch`.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct UniqueKey<K: Copy> {
    /// The user-provided key.
    key: K,
    /// A unique epoch that indicates the insertion date.
    epoch: u64,
}

#[cfg(test)]
mod tests {
    use std::fmt::Debug;

    use super::*;

    enum Op<K, V> {
        Insert(K, V),
        Pull(Option<(K, V)>),
    }

    fn check<K: Copy + Ord + Debug, V: Eq + Debug>(operations: impl IntoIterator<Item = Op<K, V>>) {
        let mut queue = EventQueue::new();

        for op in operations {
            match op {
                Op::Insert(key, value) => queue.insert(key, value),
                Op::Pull(kv) => assert_eq!(queue.pull(), kv),
            }
        }
    }

    #[test]
    fn event_queue_smoke() {
        let operations = [
            Op::Insert(5, 'a'),
            Op::Insert(2, 'b'),
            Op::Insert(3, 'c'),
            Op::Insert(4, 'd'),
            Op::Insert(9, 'e'),
            Op::Insert(1, 'f'),
            Op::Insert(8, 'g'),
            Op::Insert(0, 'h'),
            Op::Insert(7, 'i'),
            Op::Insert(6, 'j'),
            Op::Pull(Some((0, 'h'))),
            Op::Pull(Some((1, 'f'))),
            Op::Pull(Some((2, 'b'))),
            Op::Pull(Some((3, 'c'))),
            Op::Pull(Some((4, 'd'))),
            Op::Pull(Some((5, 'a'))),
            Op::Pull(Some((6, 'j'))),
            Op::Pull(Some((7, 'i'))),
            Op::Pull(Some((8, 'g'))),
            Op::Pull(Some((9, 'e'))),
        ];

        check(operations);
    }

    #[test]
    fn event_queue_interleaved() {
        let operations = [
            Op::Insert(2, 'a'),
            Op::Insert(7, 'b'),
            Op::Insert(5, 'c'),
            Op::Pull(Some((2, 'a'))),
            Op::Insert(4, 'd'),
            Op::Pull(Some((4, 'd'))),
            Op::Insert(8, 'e'),
            Op::Insert(2, 'f'),
            Op::Pull(Some((2, 'f'))),
            Op::Pull(Some((5, 'c'))),
            Op::Pull(Some((7, 'b'))),
            Op::Insert(5, 'g'),
            Op::Insert(3, 'h'),
            Op::Pull(Some((3, 'h'))),
            Op::Pull(Some((5, 'g'))),
            Op::Pull(Some((8, 'e'))),
            Op::Pull(None),
        ];

        check(operations);
    }

    #[test]
    fn event_queue_equal_keys_are_fifo() {
        let operations = [
            Op::Insert(4, 'a'),
            Op::Insert(1, 'b'),
            Op::Insert(3, 'c'),
            Op::Pull(Some((1, 'b'))),
            Op::Insert(4, 'd'),
            Op::Insert(8, 'e'),
            Op::Insert(3, 'f'),
            Op::Pull(Some((3, 'c'))),
            Op::Pull(Some((3, 'f'))),
            Op::Pull(Some((4, 'a'))),
            Op::Insert(8, 'g'),
            Op::Pull(Some((4, 'd'))),
            Op::Pull(Some((8, 'e'))),
            Op::Pull(Some((8, 'g'))),
            Op::Pull(None),
        ];

        check(operations);
    }

    #[test]
    fn event_queue_peek() {
        let mut queue = EventQueue::new();
        assert_eq!(queue.peek_key(), None);
        queue.insert(3, 'a');
        queue.insert(1, 'b');
        queue.insert(2, 'c');
        assert_eq!(queue.peek_key(), Some(&1));
        assert_eq!(queue.pull(), Some((1, 'b')));
        assert_eq!(queue.peek_key(), Some(&2));
    }
}
