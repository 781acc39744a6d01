//! Reusable per-worker scratch space, modelled on the reference crate's own thread-local workspace
//! pattern: a [`thread_local::ThreadLocal`] of [`RefCell`]s, one [`LocalWorkspace`] per worker
//! thread, fetched on demand and reused for the life of the thread instead of being reallocated
//! per history.

use std::cell::RefCell;

use smallvec::SmallVec;
use thread_local::ThreadLocal;

use crate::geometry::Locator;
use crate::particle::FissionBank;
use crate::tally::TallySet;

/// Scratch buffers a single worker thread reuses across many histories within a batch.
#[derive(Default)]
pub struct LocalWorkspace {
    /// Stack used by [`crate::geometry::cell::evaluate`]; cleared, never reallocated, between
    /// calls as long as expression depth stays within its inline capacity.
    pub eval_stack: SmallVec<[bool; 16]>,
    /// Last-found-cell cache, reused as the starting point for neighbour resolution.
    pub last_locator: Option<Locator>,
    /// This worker's tally set for the batch currently in flight.
    pub tallies: Option<TallySet>,
    /// This worker's append-only fission daughters for the batch currently in flight.
    pub output_bank: FissionBank,
}

/// Per-thread pool of [`LocalWorkspace`]s, one entry allocated lazily the first time each worker
/// thread touches it.
#[derive(Default)]
pub struct Workspace {
    local: ThreadLocal<RefCell<LocalWorkspace>>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns this thread's [`LocalWorkspace`], allocating a fresh (empty) one on first use.
    pub fn get_local(&self) -> &RefCell<LocalWorkspace> {
        self.local.get_or(|| RefCell::new(LocalWorkspace::default()))
    }

    /// Drains every worker thread's tally set and output bank, leaving fresh empty state behind.
    /// Called once at batch end, on the thread that drives the batch loop.
    pub fn take_all(&mut self) -> Vec<(TallySet, FissionBank)> {
        self.local
            .iter_mut()
            .map(|cell| {
                let mut local = cell.borrow_mut();
                let tallies = local.tallies.take().unwrap_or_default();
                let bank = std::mem::take(&mut local.output_bank);
                (tallies, bank)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_local_persists_within_a_thread() {
        let ws = Workspace::new();
        ws.get_local().borrow_mut().eval_stack.push(true);
        assert_eq!(ws.get_local().borrow().eval_stack.len(), 1);
    }
}
