//! Run-scoped identifier allocation
//!
//! Group and model ids must be unique within a run and identical between runs
//! over the same input. Callers reserve whole blocks in a fixed order before
//! any parallel work starts.

use std::ops::Range;
use std::sync::atomic::{AtomicU32, Ordering};

/// Monotonic id counter shared by reference
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicU32,
}

impl IdAllocator {
    pub fn new(first: u32) -> Self {
        Self {
            next: AtomicU32::new(first),
        }
    }

    /// Take one id
    pub fn next_id(&self) -> u32 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Take `count` consecutive ids
    pub fn reserve(&self, count: u32) -> Range<u32> {
        let start = self.next.fetch_add(count, Ordering::Relaxed);
        start..start + count
    }

    /// The id the next call would return
    pub fn peek(&self) -> u32 {
        self.next.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_are_consecutive() {
        let ids = IdAllocator::new(30000);
        assert_eq!(ids.reserve(3), 30000..30003);
        assert_eq!(ids.next_id(), 30003);
        assert_eq!(ids.reserve(0), 30004..30004);
        assert_eq!(ids.peek(), 30004);
    }

    #[test]
    fn test_concurrent_ids_are_unique() {
        let ids = IdAllocator::new(0);
        let mut taken: Vec<u32> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| (0..250).map(|_| ids.next_id()).collect::<Vec<_>>()))
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect()
        });
        taken.sort_unstable();
        taken.dedup();
        assert_eq!(taken.len(), 1000);
        assert_eq!(ids.peek(), 1000);
    }
}
