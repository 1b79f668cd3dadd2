//! Concatenation reference numbers
//!
//! Every multipart message needs a reference that differs from the ones
//! still in flight, otherwise the receiver merges fragments of unrelated
//! messages. References cycle through 0..=255 starting at a random value.

use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU8, Ordering};

/// Cycling 8-bit reference generator, safe to share between tasks
#[derive(Debug)]
pub struct ReferenceCounter {
    next: AtomicU8,
}

impl ReferenceCounter {
    /// Start counting at `start`
    pub fn new(start: u8) -> Self {
        Self {
            next: AtomicU8::new(start),
        }
    }

    /// Start counting at a random value
    pub fn random() -> Self {
        Self::new(rand::random())
    }

    /// Take the next reference, wrapping after 255
    pub fn next(&self) -> u8 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for ReferenceCounter {
    fn default() -> Self {
        Self::random()
    }
}

static GLOBAL_REFERENCE: Lazy<ReferenceCounter> = Lazy::new(ReferenceCounter::random);

/// Next reference from the process-wide counter
pub fn next_reference() -> u8 {
    GLOBAL_REFERENCE.next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_wraps_around() {
        let counter = ReferenceCounter::new(254);
        assert_eq!(counter.next(), 254);
        assert_eq!(counter.next(), 255);
        assert_eq!(counter.next(), 0);
    }

    #[test]
    fn test_concurrent_references_are_distinct() {
        let counter = Arc::new(ReferenceCounter::new(0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let counter = Arc::clone(&counter);
                std::thread::spawn(move || (0..64).map(|_| counter.next()).collect::<Vec<_>>())
            })
            .collect();
        let mut seen = HashSet::new();
        for handle in handles {
            for reference in handle.join().unwrap() {
                assert!(seen.insert(reference));
            }
        }
        assert_eq!(seen.len(), 256);
    }
}
