//! Bounded FIFO.

use std::collections::VecDeque;

/// First-in first-out queue that refuses items beyond its capacity.
#[derive(Debug, Clone)]
pub struct CaptureQueue<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> CaptureQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    /// Appends `item`, handing it back when the queue is full.
    pub fn push(&mut self, item: T) -> Result<(), T> {
        if self.is_full() {
            return Err(item);
        }
        self.items.push_back(item);
        Ok(())
    }

    pub fn front(&self) -> Option<&T> {
        self.items.front()
    }

    pub fn pop_front(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// Removes the first item matching `pred`, keeping the order of the rest.
    pub fn remove_where(&mut self, mut pred: impl FnMut(&T) -> bool) -> Option<T> {
        let pos = self.items.iter().position(|item| pred(item))?;
        self.items.remove(pos)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.items.drain(..)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_push_refuses_beyond_capacity() {
        let mut q = CaptureQueue::new(2);
        assert!(q.push(1).is_ok());
        assert!(q.push(2).is_ok());
        assert_eq!(q.push(3), Err(3));
        assert_eq!(q.pop_front(), Some(1));
        assert!(q.push(3).is_ok());
        assert_eq!(q.iter().copied().collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut q = CaptureQueue::new(4);
        for i in 0..4 {
            q.push(i).unwrap();
        }
        assert_eq!(q.remove_where(|&i| i == 1), Some(1));
        assert_eq!(q.remove_where(|&i| i == 9), None);
        assert_eq!(q.drain().collect::<Vec<_>>(), vec![0, 2, 3]);
        assert!(q.is_empty());
    }

    proptest! {
        #[test]
        fn prop_never_exceeds_capacity(cap in 1usize..8, ops in proptest::collection::vec(any::<bool>(), 0..64)) {
            let mut q = CaptureQueue::new(cap);
            let mut accepted = std::collections::VecDeque::new();
            for (n, push) in ops.into_iter().enumerate() {
                if push {
                    if q.push(n).is_ok() {
                        accepted.push_back(n);
                    }
                } else {
                    prop_assert_eq!(q.pop_front(), accepted.pop_front());
                }
                prop_assert!(q.len() <= cap);
            }
        }
    }
}
