//! Request fencing.
//!
//! Every play intent takes a [`FenceToken`] from a [`RequestFence`]. Before each
//! side effect the intent checks its token is still current; a newer intent
//! makes every older token stale and the older intent stops silently.

use std::sync::atomic::{AtomicU64, Ordering};

/// Generation captured when an intent starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FenceToken(u64);

impl FenceToken {
    pub fn generation(self) -> u64 {
        self.0
    }
}

/// Monotonic generation counter.
#[derive(Debug, Default)]
pub struct RequestFence {
    generation: AtomicU64,
}

impl RequestFence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new generation, invalidating every outstanding token.
    pub fn advance(&self) -> FenceToken {
        FenceToken(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Token for the current generation without invalidating anything.
    pub fn current(&self) -> FenceToken {
        FenceToken(self.generation.load(Ordering::SeqCst))
    }

    pub fn is_current(&self, token: FenceToken) -> bool {
        self.generation.load(Ordering::SeqCst) == token.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_invalidates_older_tokens() {
        let fence = RequestFence::new();
        let first = fence.advance();
        assert!(fence.is_current(first));

        let second = fence.advance();
        assert!(!fence.is_current(first));
        assert!(fence.is_current(second));
        assert!(second > first);
    }

    #[test]
    fn test_current_does_not_advance() {
        let fence = RequestFence::new();
        let token = fence.advance();
        assert_eq!(fence.current(), token);
        assert!(fence.is_current(fence.current()));
    }
}
