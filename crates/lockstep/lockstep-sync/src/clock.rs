//! Single-writer progress counter shared by all lanes.
//!
//! Exactly one lane advances the clock, once per base period, after its own
//! tick-local work. Everyone else only reads it. `advance` publishes with
//! `Release` and `now` observes with `Acquire`, so a reader that sees tick
//! `n` also sees every write the closing lane made before advancing to `n`.

use std::sync::atomic::{AtomicU64, Ordering};

/// Shared base-period counter.
///
/// Kept on its own cache line: four lanes poll it right after every global
/// crossing while the closing lane writes it.
#[repr(C, align(64))]
#[derive(Debug, Default)]
pub struct StepClock {
    tick: AtomicU64,
}

impl StepClock {
    pub const fn new() -> Self {
        Self {
            tick: AtomicU64::new(0),
        }
    }

    #[inline(always)]
    pub fn now(&self) -> u64 {
        self.tick.load(Ordering::Acquire)
    }

    /// Moves to the next tick and returns it.
    ///
    /// # Single Writer
    /// Only the closing lane may call this. Concurrent writers would still
    /// produce a consistent count, but the lanes' rate decisions assume one
    /// advance per global wave.
    #[inline(always)]
    pub fn advance(&self) -> u64 {
        self.tick.fetch_add(1, Ordering::Release) + 1
    }

    /// Rewinds to tick 0. Only valid while no lane is running.
    pub fn reset(&self) {
        self.tick.store(0, Ordering::Release);
    }
}
