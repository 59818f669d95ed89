//! Request ID for worker message correlation.
//!
//! Ids are plain integers handed out by a per-correlator counter.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Correlation key linking a worker request to its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(u64);

impl RequestId {
    /// Wrap a raw id (e.g. one recovered from a damaged frame).
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<RequestId> for u64 {
    fn from(id: RequestId) -> Self {
        id.0
    }
}

/// Monotonic id source owned by one correlator.
///
/// Starts at 1 and increments by one per allocation. A `u64` cannot wrap
/// within any realistic session, so ids never repeat.
#[derive(Debug)]
pub struct RequestIdAllocator {
    next: AtomicU64,
}

impl RequestIdAllocator {
    pub const FIRST: u64 = 1;

    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(Self::FIRST),
        }
    }

    /// Allocate the next id.
    pub fn allocate(&self) -> RequestId {
        RequestId(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Number of ids handed out so far.
    pub fn issued(&self) -> u64 {
        self.next.load(Ordering::Relaxed) - Self::FIRST
    }
}

impl Default for RequestIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_ids_are_monotonic() {
        let ids = RequestIdAllocator::new();
        let first = ids.allocate();
        let second = ids.allocate();
        assert_eq!(first.get(), RequestIdAllocator::FIRST);
        assert_eq!(second.get(), first.get() + 1);
        assert_eq!(ids.issued(), 2);
    }

    #[test]
    fn test_ids_unique_across_threads() {
        let ids = Arc::new(RequestIdAllocator::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ids = Arc::clone(&ids);
                std::thread::spawn(move || (0..500).map(|_| ids.allocate()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {}", id);
            }
        }
        assert_eq!(seen.len(), 2000);
    }

    #[test]
    fn test_request_id_serializes_as_integer() {
        let json = serde_json::to_string(&RequestId::from_raw(42)).unwrap();
        assert_eq!(json, "42");
    }
}
