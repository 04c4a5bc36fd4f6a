//! Binary min-heap keyed by a numeric priority.
//!
//! Used by the sweep-line transforms: Coverage keeps the ends of active
//! segments, Pileup keeps lane release positions and free lane ids.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Heap entry. Ordering is reversed so that `BinaryHeap` (a max-heap)
/// yields the smallest priority first. Ties pop in insertion order.
#[derive(Debug, Clone)]
struct HeapEntry<T> {
    priority: f64,
    seq: u64,
    value: T,
}

impl<T> PartialEq for HeapEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for HeapEntry<T> {}

impl<T> Ord for HeapEntry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap
        other
            .priority
            .total_cmp(&self.priority)
            .then(other.seq.cmp(&self.seq))
    }
}

impl<T> PartialOrd for HeapEntry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Min-heap of values ordered by an `f64` priority.
#[derive(Debug, Clone)]
pub struct MinHeap<T> {
    heap: BinaryHeap<HeapEntry<T>>,
    seq: u64,
}

impl<T> Default for MinHeap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MinHeap<T> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            seq: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(capacity),
            seq: 0,
        }
    }

    /// Push a value with the given priority.
    #[inline]
    pub fn push(&mut self, value: T, priority: f64) {
        self.heap.push(HeapEntry {
            priority,
            seq: self.seq,
            value,
        });
        self.seq += 1;
    }

    /// Remove and return the value with the smallest priority.
    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        self.heap.pop().map(|e| e.value)
    }

    /// Remove and return the smallest entry as `(value, priority)`.
    #[inline]
    pub fn pop_entry(&mut self) -> Option<(T, f64)> {
        self.heap.pop().map(|e| (e.value, e.priority))
    }

    /// Smallest priority currently in the heap.
    #[inline]
    pub fn peek_priority(&self) -> Option<f64> {
        self.heap.peek().map(|e| e.priority)
    }

    /// Value with the smallest priority.
    #[inline]
    pub fn peek(&self) -> Option<&T> {
        self.heap.peek().map(|e| &e.value)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Remove all entries.
    pub fn clear(&mut self) {
        self.heap.clear();
        self.seq = 0;
    }

    /// Remove all entries and release the allocated storage.
    pub fn release(&mut self) {
        self.heap = BinaryHeap::new();
        self.seq = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pops_in_priority_order() {
        let mut heap = MinHeap::new();
        heap.push("c", 3.0);
        heap.push("a", 1.0);
        heap.push("b", 2.0);

        assert_eq!(heap.peek_priority(), Some(1.0));
        assert_eq!(heap.pop(), Some("a"));
        assert_eq!(heap.pop(), Some("b"));
        assert_eq!(heap.pop(), Some("c"));
        assert_eq!(heap.pop(), None);
    }

    #[test]
    fn test_ties_pop_in_insertion_order() {
        let mut heap = MinHeap::new();
        heap.push(1, 5.0);
        heap.push(2, 5.0);
        heap.push(3, 5.0);

        assert_eq!(heap.pop_entry(), Some((1, 5.0)));
        assert_eq!(heap.pop_entry(), Some((2, 5.0)));
        assert_eq!(heap.pop_entry(), Some((3, 5.0)));
    }

    #[test]
    fn test_negative_priorities() {
        let mut heap = MinHeap::new();
        heap.push(0, 0.0);
        heap.push(1, -10.0);
        assert_eq!(heap.pop(), Some(1));
    }

    #[test]
    fn test_clear() {
        let mut heap = MinHeap::new();
        heap.push((), 1.0);
        heap.clear();
        assert!(heap.is_empty());
        assert_eq!(heap.len(), 0);
        assert!(heap.peek().is_none());
    }
}
