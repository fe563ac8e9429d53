//! Double-buffered signal store.
//!
//! Every signal owns two slots. A write at tick `t` goes to slot
//! `(t / divisor) & 1`, i.e. slots alternate with the parity of the
//! producer's own period. For a 200 Hz signal that is plain `t & 1`.
//!
//! # Invariant
//!
//! While the producer is working on period `p`, the other slot holds the
//! value it finished in period `p - 1`. A consumer that reads the current
//! slot must be ordered after the producer by a rendezvous crossing; a
//! consumer with no such ordering reads the previous slot, which was sealed
//! by the last global crossing.
//!
//! The store itself performs no synchronization beyond making each slot an
//! atomic word (no torn `f64`). Ordering between lanes comes from the
//! barriers.

use crate::record::OutputRecord;
use crate::signal::Signal;
use std::sync::atomic::{AtomicU64, Ordering};

/// Maps a tick to the slot a signal with `divisor` uses during that tick.
///
/// ```text
/// divisor = 1 : t = 0 1 2 3 4 5 ...  -> 0 1 0 1 0 1
/// divisor = 2 : t = 0 1 2 3 4 5 ...  -> 0 0 1 1 0 0
/// divisor = 4 : t = 0 .. 3, 4 .. 7   -> 0 ..., 1 ...
/// ```
#[inline(always)]
pub fn slot_index(tick: u64, divisor: u64) -> usize {
    ((tick / divisor) & 1) as usize
}

#[derive(Default)]
struct SignalSlots {
    slots: [AtomicU64; 2],
}

pub struct SignalStore {
    signals: [SignalSlots; Signal::COUNT],
}

impl SignalStore {
    /// Builds a store with every slot at `0.0`.
    pub fn new() -> Self {
        Self {
            signals: std::array::from_fn(|_| SignalSlots::default()),
        }
    }

    /// Writes `value` into the slot `sig` uses at `tick`.
    ///
    /// # Single Writer
    /// Only the producer of `sig` writes it, and only during its own tick.
    #[inline]
    pub fn write(&self, sig: Signal, tick: u64, value: f64) {
        let slot = slot_index(tick, sig.divisor());
        self.signals[sig.index()].slots[slot].store(value.to_bits(), Ordering::Release);
    }

    /// Reads the slot `sig` uses at `tick`: the value of the producer's
    /// current period.
    #[inline]
    pub fn read(&self, sig: Signal, tick: u64) -> f64 {
        let slot = slot_index(tick, sig.divisor());
        f64::from_bits(self.signals[sig.index()].slots[slot].load(Ordering::Acquire))
    }

    /// Reads the other slot: the value the producer finished in its previous
    /// period.
    #[inline]
    pub fn read_previous(&self, sig: Signal, tick: u64) -> f64 {
        let slot = slot_index(tick, sig.divisor()) ^ 1;
        f64::from_bits(self.signals[sig.index()].slots[slot].load(Ordering::Acquire))
    }

    /// Assembles the record published at the start of tick `tick`, from the
    /// values sealed at the end of `tick - 1`.
    ///
    /// `tick` must be at least 1 and every producer of `tick - 1` must have
    /// crossed the global rendezvous.
    pub fn snapshot(&self, tick: u64) -> OutputRecord {
        let sealed = tick.saturating_sub(1);
        OutputRecord {
            va: self.read(Signal::Va, sealed),
            vz: self.read(Signal::Vz, sealed),
            q: self.read(Signal::Q, sealed),
            az: self.read(Signal::Az, sealed),
            h: self.read(Signal::H, sealed),
            delta_th_c: self.read(Signal::DeltaThC, sealed),
            delta_e_c: self.read(Signal::DeltaEC, sealed),
            t_simu: tick * OutputRecord::TICK_QUANTUM,
        }
    }

    /// Zeroes every slot. Only valid while no lane is running.
    pub fn reset(&self) {
        for signal in &self.signals {
            for slot in &signal.slots {
                slot.store(0.0f64.to_bits(), Ordering::Release);
            }
        }
    }
}

impl Default for SignalStore {
    fn default() -> Self {
        Self::new()
    }
}
