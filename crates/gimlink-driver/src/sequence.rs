use std::sync::atomic::{AtomicU16, Ordering};

/// Hands out outbound sequence numbers.
///
/// Values increase by one per call and wrap from `u16::MAX` to `0`. The first
/// value is `1`. Concurrent callers always receive distinct values (until the
/// counter wraps around).
#[derive(Debug, Default)]
pub struct SequenceAllocator {
    last: AtomicU16,
}

impl SequenceAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume after `last`; the next call returns `last + 1`.
    pub fn starting_after(last: u16) -> Self {
        Self {
            last: AtomicU16::new(last),
        }
    }

    pub fn next(&self) -> u16 {
        self.last.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    /// Most recently allocated value (`0` before the first call).
    pub fn last(&self) -> u16 {
        self.last.load(Ordering::Relaxed)
    }
}
