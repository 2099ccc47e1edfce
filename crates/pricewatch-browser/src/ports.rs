//! Debugging port allocation for browser sessions.

use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::ops::RangeInclusive;
use std::sync::{Mutex, PoisonError};

/// Hands out unique ports from a fixed inclusive range.
///
/// Ports are picked uniformly among the free ones. When every port is held
/// the held set is assumed to have leaked: it is cleared and the pick is
/// retried once. State is process-local.
#[derive(Debug)]
pub struct PortAllocator {
    range: RangeInclusive<u16>,
    held: Mutex<HashSet<u16>>,
}

impl PortAllocator {
    /// Create an allocator over `start..=end`.
    ///
    /// An inverted range is treated as the single port `start`.
    pub fn new(start: u16, end: u16) -> Self {
        let end = end.max(start);
        Self {
            range: start..=end,
            held: Mutex::new(HashSet::new()),
        }
    }

    /// Reserve a free port.
    pub fn acquire(&self) -> u16 {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        let mut rng = rand::thread_rng();

        let mut free: Vec<u16> = self.range.clone().filter(|p| !held.contains(p)).collect();
        if free.is_empty() {
            tracing::warn!(
                "All {} ports in {:?} held, assuming leaked releases and resetting",
                held.len(),
                self.range
            );
            held.clear();
            free = self.range.clone().collect();
        }

        let port = *free.choose(&mut rng).unwrap_or(self.range.start());
        held.insert(port);
        port
    }

    /// Return a port to the free set. Releasing an unheld port is a no-op.
    pub fn release(&self, port: u16) {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        held.remove(&port);
    }

    /// Number of ports currently held.
    pub fn in_use(&self) -> usize {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Total ports in the range.
    pub fn capacity(&self) -> usize {
        self.range.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_acquire_unique_until_exhausted() {
        let ports = PortAllocator::new(9222, 9231);
        let acquired: HashSet<u16> = (0..10).map(|_| ports.acquire()).collect();
        assert_eq!(acquired.len(), 10);
        assert!(acquired.iter().all(|p| (9222..=9231).contains(p)));
        assert_eq!(ports.in_use(), 10);
    }

    #[test]
    fn test_exhaustion_resets_held_set() {
        let ports = PortAllocator::new(9222, 9223);
        ports.acquire();
        ports.acquire();
        assert_eq!(ports.in_use(), 2);

        let port = ports.acquire();
        assert!((9222..=9223).contains(&port));
        assert_eq!(ports.in_use(), 1);
    }

    #[test]
    fn test_release_frees_port() {
        let ports = PortAllocator::new(9222, 9222);
        let port = ports.acquire();
        ports.release(port);
        assert_eq!(ports.in_use(), 0);
        ports.release(port);
        assert_eq!(ports.acquire(), 9222);
    }

    #[test]
    fn test_concurrent_acquire_is_unique() {
        let ports = Arc::new(PortAllocator::new(9222, 9999));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ports = Arc::clone(&ports);
                std::thread::spawn(move || (0..50).map(|_| ports.acquire()).collect::<Vec<_>>())
            })
            .collect();

        let mut all = HashSet::new();
        for handle in handles {
            for port in handle.join().expect("thread panicked") {
                assert!(all.insert(port), "port {port} handed out twice");
            }
        }
        assert_eq!(all.len(), 400);
    }
}
