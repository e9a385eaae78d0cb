//! Multi-level FIFO queue keyed by [`JobPriority`].
//!
//! Levels are scanned in [`JobPriority::ORDER`]; within a level items leave in insertion order
//! unless inserted at the front. There is no starvation guard: a steady stream of `Top` work
//! keeps lower levels waiting.

use std::collections::VecDeque;

use super::priority::JobPriority;

pub struct PriorityQueue<T> {
    buckets: [VecDeque<T>; JobPriority::COUNT],
}

impl<T> Default for PriorityQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PriorityQueue<T> {
    pub fn new() -> Self {
        Self {
            buckets: std::array::from_fn(|_| VecDeque::new()),
        }
    }

    /// Append `item` at `priority`, or put it at the head of that level when `to_front`
    /// (backward prefetch re-primes the head).
    pub fn enqueue(&mut self, item: T, priority: JobPriority, to_front: bool) {
        let bucket = &mut self.buckets[priority.rank()];
        if to_front {
            bucket.push_front(item);
        } else {
            bucket.push_back(item);
        }
    }

    pub fn dequeue(&mut self, priority: JobPriority) -> Option<T> {
        self.buckets[priority.rank()].pop_front()
    }

    /// Head of the first non-empty level.
    pub fn dequeue_any(&mut self) -> Option<T> {
        self.buckets.iter_mut().find_map(|b| b.pop_front())
    }

    /// Move the first item matching `pred` to `priority`. Returns the moved item so the caller
    /// can update any priority it stores, or `None` when nothing matched.
    pub fn change_priority_by<F>(
        &mut self,
        pred: F,
        priority: JobPriority,
        to_front: bool,
    ) -> Option<&mut T>
    where
        F: Fn(&T) -> bool,
    {
        let (level, index) = self.position(&pred)?;
        let item = self.buckets[level].remove(index)?;
        self.enqueue(item, priority, to_front);
        let bucket = &mut self.buckets[priority.rank()];
        if to_front {
            bucket.front_mut()
        } else {
            bucket.back_mut()
        }
    }

    /// Remove the first item at `priority` matching `pred`.
    pub fn remove_by<F>(&mut self, priority: JobPriority, pred: F) -> Option<T>
    where
        F: Fn(&T) -> bool,
    {
        let bucket = &mut self.buckets[priority.rank()];
        let index = bucket.iter().position(pred)?;
        bucket.remove(index)
    }

    pub fn count(&self) -> usize {
        self.buckets.iter().map(VecDeque::len).sum()
    }

    pub fn count_at(&self, priority: JobPriority) -> usize {
        self.buckets[priority.rank()].len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(VecDeque::is_empty)
    }

    pub fn clear(&mut self) -> Vec<T> {
        self.buckets.iter_mut().flat_map(|b| b.drain(..)).collect()
    }

    fn position<F>(&self, pred: &F) -> Option<(usize, usize)>
    where
        F: Fn(&T) -> bool,
    {
        self.buckets
            .iter()
            .enumerate()
            .find_map(|(level, b)| b.iter().position(pred).map(|i| (level, i)))
    }
}

impl<T: PartialEq> PriorityQueue<T> {
    /// Move `item` to `priority`, appended at the destination level.
    pub fn change_priority(&mut self, item: &T, priority: JobPriority) -> bool {
        self.change_priority_by(|x| x == item, priority, false)
            .is_some()
    }

    pub fn remove(&mut self, priority: JobPriority, item: &T) -> bool {
        self.remove_by(priority, |x| x == item).is_some()
    }
}

