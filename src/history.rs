use std::collections::VecDeque;

/// Fixed-length history in arrival order. Once full, each push evicts the oldest entry.
#[derive(Debug, Clone)]
pub struct History<T> {
    items: VecDeque<T>,
    limit: usize,
}

impl<T> History<T> {
    pub fn new(limit: usize) -> Self {
        assert!(limit > 0, "history limit must be positive");

        Self {
            items: VecDeque::with_capacity(limit),
            limit,
        }
    }

    /// Records `item` as the newest entry, returning the evicted one.
    pub fn record(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() == self.limit {
            self.items.pop_front()
        } else {
            None
        };

        self.items.push_back(item);
        evicted
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Keeps only the `keep` newest entries.
    pub fn retain_newest(&mut self, keep: usize) {
        let excess = self.items.len().saturating_sub(keep);
        self.items.drain(..excess);
    }

    /// Oldest first
    #[inline]
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &'_ T> + ExactSizeIterator {
        self.items.iter()
    }

    /// The `n` newest entries, oldest first
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &'_ T> {
        self.items.range(self.items.len().saturating_sub(n)..)
    }
}

#[cfg(test)]
mod tests {
    use super::History;

    #[test]
    fn evicts_oldest() {
        let mut h = History::new(3);
        assert_eq!(h.record(1), None);
        assert_eq!(h.record(2), None);
        assert_eq!(h.record(3), None);
        assert_eq!(h.record(4), Some(1));

        assert_eq!(h.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
    }

    #[test]
    fn recent_and_retain() {
        let mut h = History::new(10);
        for i in 0..6 {
            h.record(i);
        }

        assert_eq!(h.recent(2).copied().collect::<Vec<_>>(), vec![4, 5]);
        assert_eq!(h.recent(100).count(), 6);

        h.retain_newest(4);
        assert_eq!(h.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4, 5]);
        h.retain_newest(10);
        assert_eq!(h.len(), 4);
    }
}
