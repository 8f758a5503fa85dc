use serde::{Deserialize, Serialize};
use tracing::debug;

/// Lifecycle of the reachability cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheState {
    Clean,
    Dirty,
    Computing,
}

/// Tracks whether the reachability cache reflects the current state.
///
/// Any mutation calls [`invalidate`](CacheTracker::invalidate). The engine
/// brackets a fixpoint with [`begin`](CacheTracker::begin) and
/// [`finish`](CacheTracker::finish); while computing, nested begins are
/// refused and invalidations are dropped, so writes the fixpoint makes to
/// its own state do not schedule another pass.
#[derive(Debug, Clone)]
pub struct CacheTracker {
    state: CacheState,
    recomputes: u64,
    ignored: u64,
}

impl Default for CacheTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheTracker {
    /// A tracker that has never computed, so it starts dirty.
    pub fn new() -> Self {
        Self {
            state: CacheState::Dirty,
            recomputes: 0,
            ignored: 0,
        }
    }

    pub fn state(&self) -> CacheState {
        self.state
    }

    pub fn is_clean(&self) -> bool {
        self.state == CacheState::Clean
    }

    pub fn is_dirty(&self) -> bool {
        self.state == CacheState::Dirty
    }

    pub fn is_computing(&self) -> bool {
        self.state == CacheState::Computing
    }

    /// Mark the cache stale. Ignored while computing.
    pub fn invalidate(&mut self) {
        match self.state {
            CacheState::Computing => {
                self.ignored += 1;
                debug!("invalidation during recompute ignored");
            }
            _ => self.state = CacheState::Dirty,
        }
    }

    /// Enter the computing state. Returns `false` if already computing.
    pub fn begin(&mut self) -> bool {
        if self.state == CacheState::Computing {
            debug!("nested recompute refused");
            self.ignored += 1;
            return false;
        }
        self.state = CacheState::Computing;
        true
    }

    pub fn finish(&mut self) {
        self.state = CacheState::Clean;
        self.recomputes += 1;
    }

    /// Completed recomputations since creation.
    pub fn recomputes(&self) -> u64 {
        self.recomputes
    }

    /// Invalidations and nested begins dropped while computing.
    pub fn ignored(&self) -> u64 {
        self.ignored
    }
}
