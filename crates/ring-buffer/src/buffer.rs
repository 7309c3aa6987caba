//! Ring Buffer Implementation

use std::collections::VecDeque;

/// Fixed-capacity ring buffer, oldest sample first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingBuffer<T> {
    /// Samples, oldest at the front
    storage: VecDeque<T>,
    /// Capacity of the buffer
    capacity: usize,
}

impl<T> RingBuffer<T> {
    /// Create a new ring buffer with given capacity (at least 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            storage: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a sample (drops the oldest if full)
    pub fn push(&mut self, sample: T) {
        if self.storage.len() >= self.capacity {
            self.storage.pop_front();
        }
        self.storage.push_back(sample);
    }

    /// Number of samples currently held
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Iterate oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.storage.iter()
    }

    /// Count samples matching a predicate
    pub fn count_where<F>(&self, mut predicate: F) -> usize
    where
        F: FnMut(&T) -> bool,
    {
        self.storage.iter().filter(|s| predicate(s)).count()
    }

    /// Clear the buffer
    pub fn clear(&mut self) {
        self.storage.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_overwrite_oldest() {
        let mut buffer = RingBuffer::new(5);

        for i in 0..10 {
            buffer.push(i);
        }

        assert_eq!(buffer.len(), 5);
        assert_eq!(buffer.iter().copied().collect::<Vec<_>>(), vec![5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_count_where_and_clear() {
        let mut buffer = RingBuffer::new(5);
        for v in [true, false, true, true, false] {
            buffer.push(v);
        }
        assert_eq!(buffer.count_where(|v| *v), 3);

        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.count_where(|v| *v), 0);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut buffer = RingBuffer::new(0);
        buffer.push(1);
        buffer.push(2);
        assert_eq!(buffer.iter().copied().collect::<Vec<_>>(), vec![2]);
    }

    proptest! {
        #[test]
        fn holds_the_most_recent_window(values in proptest::collection::vec(any::<u8>(), 0..64), cap in 1usize..10) {
            let mut buffer = RingBuffer::new(cap);
            for v in &values {
                buffer.push(*v);
            }
            let start = values.len().saturating_sub(cap);
            let expected: Vec<u8> = values[start..].to_vec();
            prop_assert_eq!(buffer.iter().copied().collect::<Vec<_>>(), expected);
        }
    }
}
