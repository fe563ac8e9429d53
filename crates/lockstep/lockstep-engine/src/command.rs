//! External command boundary.
//!
//! The altitude set-point is a single `f64` that can be changed from any
//! thread at any time. It is stored as an atomic bit pattern, so a reader
//! never sees a torn value, but nothing orders an out-of-band `set` against
//! the lanes: the consuming task picks it up at its next scheduled
//! invocation, whichever that turns out to be.
//!
//! Updates that must land on an exact tick go through a [`CommandUpdate`]
//! schedule instead. Those are applied by the leader of the global
//! rendezvous while every lane is parked, so tick `at_tick` and everything
//! after it see the new value.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

pub(crate) struct CommandCell {
    bits: AtomicU64,
}

impl CommandCell {
    pub(crate) fn new(value: f64) -> Self {
        Self {
            bits: AtomicU64::new(value.to_bits()),
        }
    }

    #[inline]
    pub(crate) fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }

    #[inline]
    pub(crate) fn set(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Release);
    }
}

/// Cloneable setter for the external command.
#[derive(Clone)]
pub struct CommandHandle {
    cell: Arc<CommandCell>,
}

impl CommandHandle {
    pub(crate) fn new(initial: f64) -> Self {
        Self {
            cell: Arc::new(CommandCell::new(initial)),
        }
    }

    /// Injects a new command value. Takes effect at the consuming task's next
    /// invocation, not immediately.
    pub fn set(&self, value: f64) {
        self.cell.set(value);
    }

    pub fn get(&self) -> f64 {
        self.cell.get()
    }

    pub(crate) fn cell(&self) -> Arc<CommandCell> {
        Arc::clone(&self.cell)
    }
}

impl std::fmt::Debug for CommandHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandHandle")
            .field("value", &self.get())
            .finish()
    }
}

/// A command value to inject when the clock reaches `at_tick`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CommandUpdate {
    pub at_tick: u64,
    pub value: f64,
}

/// Tick-ordered list of pending updates. Read-only once the run starts.
#[derive(Debug, Default)]
pub(crate) struct CommandSchedule {
    updates: Vec<CommandUpdate>,
}

impl CommandSchedule {
    pub(crate) fn new(mut updates: Vec<CommandUpdate>) -> Self {
        // Stable: for equal ticks the last listed update wins.
        updates.sort_by_key(|u| u.at_tick);
        Self { updates }
    }

    /// Applies every update scheduled for exactly `tick`.
    pub(crate) fn apply(&self, tick: u64, cell: &CommandCell) {
        let start = self.updates.partition_point(|u| u.at_tick < tick);
        for update in self.updates[start..].iter().take_while(|u| u.at_tick == tick) {
            cell.set(update.value);
            info!(tick, value = update.value, "command updated");
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.updates.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_clones_share_one_value() {
        let handle = CommandHandle::new(11_000.0);
        let other = handle.clone();
        other.set(10_500.0);
        assert_eq!(handle.get(), 10_500.0);
    }

    #[test]
    fn schedule_applies_only_its_own_tick() {
        let cell = CommandCell::new(0.0);
        let schedule = CommandSchedule::new(vec![
            CommandUpdate { at_tick: 40, value: 2.0 },
            CommandUpdate { at_tick: 20, value: 1.0 },
            CommandUpdate { at_tick: 40, value: 3.0 },
        ]);
        assert_eq!(schedule.len(), 3);

        schedule.apply(19, &cell);
        assert_eq!(cell.get(), 0.0);
        schedule.apply(20, &cell);
        assert_eq!(cell.get(), 1.0);
        schedule.apply(21, &cell);
        assert_eq!(cell.get(), 1.0);
        schedule.apply(40, &cell);
        assert_eq!(cell.get(), 3.0);
    }
}
