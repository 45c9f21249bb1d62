//! Search generations.
//!
//! Only one search is active at a time. Each [`SearchSession::begin`] call
//! starts a new generation and invalidates every earlier [`SearchTicket`];
//! a result whose ticket is no longer current must be discarded rather than
//! loaded into the view.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Issues generation tokens. Cheap to clone; clones share the counter.
#[derive(Debug, Clone, Default)]
pub struct SearchSession {
    generation: Arc<AtomicU64>,
}

/// Token identifying one search generation.
#[derive(Debug, Clone)]
pub struct SearchTicket {
    generation: u64,
    latest: Arc<AtomicU64>,
}

impl SearchSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new search, superseding any in flight.
    pub fn begin(&self) -> SearchTicket {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        SearchTicket {
            generation,
            latest: Arc::clone(&self.generation),
        }
    }

    /// Invalidate outstanding tickets without starting a search.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

impl SearchTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True while no newer search has begun.
    pub fn is_current(&self) -> bool {
        self.latest.load(Ordering::SeqCst) == self.generation
    }
}
