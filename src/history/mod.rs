//! # History Module
//!
//! Fixed-capacity FIFO buffers of recent samples, used for the sparkline
//! and graph visualizations. Pushing into a full buffer evicts the oldest
//! sample.
//!
//! ## Example
//!
//! ```rust
//! use tonic_metrics::history::HistoryBuffer;
//!
//! let mut history = HistoryBuffer::new(3);
//! for value in [1.0, 2.0, 3.0, 4.0] {
//!     history.push(value);
//! }
//! assert_eq!(history.to_vec(), vec![2.0, 3.0, 4.0]);
//! ```

use std::collections::{vec_deque, VecDeque};

/// Samples kept per series unless a widget asks for more
pub const DEFAULT_CAPACITY: usize = 60;

/// Bounded, ordered history of samples (oldest first)
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryBuffer<T = f64> {
    samples: VecDeque<T>,
    capacity: usize,
}

impl<T> HistoryBuffer<T> {
    /// Creates an empty buffer. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { samples: VecDeque::with_capacity(capacity), capacity }
    }

    /// Appends a sample, evicting the oldest one when full
    pub fn push(&mut self, sample: T) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Changes the capacity, keeping the most recent samples that fit
    pub fn resize(&mut self, capacity: usize) {
        let capacity = capacity.max(1);
        while self.samples.len() > capacity {
            self.samples.pop_front();
        }
        self.capacity = capacity;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Most recent sample
    pub fn latest(&self) -> Option<&T> {
        self.samples.back()
    }

    pub fn iter(&self) -> vec_deque::Iter<'_, T> {
        self.samples.iter()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

impl<T: Clone> HistoryBuffer<T> {
    /// Copies the samples out, oldest first
    pub fn to_vec(&self) -> Vec<T> {
        self.samples.iter().cloned().collect()
    }
}

impl<T> Default for HistoryBuffer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl<'a, T> IntoIterator for &'a HistoryBuffer<T> {
    type Item = &'a T;
    type IntoIter = vec_deque::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_len_is_bounded_by_capacity() {
        let mut history = HistoryBuffer::new(5);
        for n in 0..12 {
            history.push(n as f64);
            assert_eq!(history.len(), (n + 1).min(5));
        }
        assert_eq!(history.to_vec(), vec![7.0, 8.0, 9.0, 10.0, 11.0]);
        assert_eq!(history.latest(), Some(&11.0));
    }

    #[test]
    fn test_resize_keeps_most_recent() {
        let mut history = HistoryBuffer::new(10);
        for n in 0..10 {
            history.push(n);
        }
        history.resize(3);
        assert_eq!(history.to_vec(), vec![7, 8, 9]);
        assert_eq!(history.capacity(), 3);

        history.resize(6);
        history.push(10);
        assert_eq!(history.to_vec(), vec![7, 8, 9, 10]);
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let mut history = HistoryBuffer::new(0);
        history.push("a");
        history.push("b");
        assert_eq!(history.capacity(), 1);
        assert_eq!(history.to_vec(), vec!["b"]);
    }

    #[test]
    fn test_default_and_clear() {
        let mut history: HistoryBuffer = HistoryBuffer::default();
        assert_eq!(history.capacity(), DEFAULT_CAPACITY);
        assert!(history.is_empty());
        history.push(1.5);
        history.clear();
        assert!(history.latest().is_none());
    }
}
