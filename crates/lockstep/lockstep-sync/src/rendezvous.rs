//! Reusable, generation-tagged counting barrier.
//!
//! A `Rendezvous` blocks `threshold` participants until all of them have
//! arrived, releases them together, and is immediately ready for the next
//! wave. It is created once and reused for the lifetime of a run.
//!
//! # Protocol
//!
//! **Arrival:**
//! 1. Lock the wave state and remember the open generation
//! 2. Increment `arrived`
//! 3. If this is the threshold-th arrival: run the release hook, reset
//!    `arrived`, open the next generation, wake every waiter
//! 4. Otherwise sleep until the generation moves past the remembered one
//!
//! A waiter only leaves once the generation it arrived in has been closed, so
//! a fast participant that re-enters for wave K+1 is counted against K+1 and
//! can never complete wave K on behalf of a slow peer.
//!
//! # Payload
//!
//! The leader (threshold-th arrival) computes a `Copy` payload while every
//! other participant of the wave is still parked. All participants of the
//! wave receive that payload in their [`Crossing`]. The payload slot cannot be
//! overwritten before every waiter has read it: the next wave needs those same
//! waiters to arrive before it can close.
//!
//! # Abort
//!
//! There is no timeout. A wave with fewer than `threshold` live participants
//! blocks forever. `abort()` is the only way out: it wakes everyone and makes
//! every pending and future `wait` return [`Aborted`].

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

/// Returned by [`Rendezvous::wait`] once the barrier has been aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("rendezvous '{name}' was aborted")]
pub struct Aborted {
    pub name: &'static str,
}

/// Result of one successful crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crossing<P = ()> {
    /// Index of the wave this participant was released from (0-based).
    pub generation: u64,
    /// Value computed by the leader of the wave.
    pub payload: P,
    /// True for exactly one participant per wave: the threshold-th arrival.
    pub leader: bool,
}

struct WaveState<P> {
    arrived: usize,
    generation: u64,
    payload: P,
    aborted: bool,
}

pub struct Rendezvous<P = ()> {
    name: &'static str,
    threshold: usize,
    state: Mutex<WaveState<P>>,
    released: Condvar,
}

impl<P: Copy + Default> Rendezvous<P> {
    /// Creates a barrier expecting `threshold` participants per wave.
    ///
    /// # Panics
    /// Panics if `threshold` is 0: such a barrier can never form a wave.
    pub fn new(name: &'static str, threshold: usize) -> Self {
        assert!(threshold > 0, "rendezvous threshold must be at least 1");
        Self {
            name,
            threshold,
            state: Mutex::new(WaveState {
                arrived: 0,
                generation: 0,
                payload: P::default(),
                aborted: false,
            }),
            released: Condvar::new(),
        }
    }

    /// Blocks until the current wave is complete. The payload of the wave is
    /// `P::default()`.
    #[inline]
    pub fn wait(&self) -> Result<Crossing<P>, Aborted> {
        self.wait_with(|_| P::default())
    }
}

impl<P: Copy> Rendezvous<P> {
    /// Blocks until the current wave is complete.
    ///
    /// If the caller turns out to be the leader, `on_release` runs with the
    /// wave's generation before anyone is released, and its return value
    /// becomes the wave's payload. Every other participant's closure is
    /// dropped unused.
    pub fn wait_with<F>(&self, on_release: F) -> Result<Crossing<P>, Aborted>
    where
        F: FnOnce(u64) -> P,
    {
        let mut state = self.state.lock();
        if state.aborted {
            return Err(self.aborted());
        }

        let generation = state.generation;
        state.arrived += 1;

        if state.arrived == self.threshold {
            let payload = on_release(generation);
            state.payload = payload;
            state.arrived = 0;
            state.generation = generation.wrapping_add(1);
            self.released.notify_all();
            trace!(rendezvous = self.name, generation, "wave released");
            return Ok(Crossing {
                generation,
                payload,
                leader: true,
            });
        }

        while state.generation == generation && !state.aborted {
            self.released.wait(&mut state);
        }

        // Aborted while our own wave was still open.
        if state.generation == generation {
            return Err(self.aborted());
        }

        Ok(Crossing {
            generation,
            payload: state.payload,
            leader: false,
        })
    }

    /// Wakes every waiter with [`Aborted`] and poisons all future waits.
    ///
    /// Participants already released from a closed wave keep their `Ok`;
    /// they observe the abort on their next `wait`.
    pub fn abort(&self) {
        let mut state = self.state.lock();
        if !state.aborted {
            state.aborted = true;
            debug!(
                rendezvous = self.name,
                generation = state.generation,
                arrived = state.arrived,
                "rendezvous aborted"
            );
        }
        self.released.notify_all();
    }

    pub fn is_aborted(&self) -> bool {
        self.state.lock().aborted
    }

    /// Number of waves released so far.
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    #[inline]
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    fn aborted(&self) -> Aborted {
        Aborted { name: self.name }
    }
}

impl<P> std::fmt::Debug for Rendezvous<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rendezvous")
            .field("name", &self.name)
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn single_participant_never_blocks() {
        let b = Rendezvous::<()>::new("solo", 1);
        for expected in 0..5 {
            let c = b.wait().expect("not aborted");
            assert_eq!(c.generation, expected);
            assert!(c.leader);
        }
        assert_eq!(b.generation(), 5);
    }

    #[test]
    #[should_panic(expected = "at least 1")]
    fn zero_threshold_is_rejected() {
        let _ = Rendezvous::<()>::new("empty", 0);
    }

    /// Back-to-back waves: every participant increments a counter before each
    /// wait and, once released, must see the full count for that wave. A wave
    /// closed by a fast re-entrant participant would show up as a short count.
    #[test]
    fn back_to_back_waves_are_never_conflated() {
        const PARTIES: usize = 5;
        const WAVES: u64 = 2_000;

        let barrier = Arc::new(Rendezvous::<()>::new("stress", PARTIES));
        let arrivals = Arc::new(AtomicU64::new(0));
        let leaders = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..PARTIES)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                let arrivals = Arc::clone(&arrivals);
                let leaders = Arc::clone(&leaders);
                thread::spawn(move || {
                    for wave in 0..WAVES {
                        arrivals.fetch_add(1, Ordering::SeqCst);
                        let c = barrier.wait().expect("not aborted");
                        assert_eq!(c.generation, wave);
                        let seen = arrivals.load(Ordering::SeqCst);
                        assert!(
                            seen >= (wave + 1) * PARTIES as u64,
                            "released from wave {wave} after only {seen} arrivals"
                        );
                        if c.leader {
                            leaders.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().expect("participant panicked");
        }
        assert_eq!(leaders.load(Ordering::SeqCst), WAVES as usize);
        assert_eq!(barrier.generation(), WAVES);
    }

    #[test]
    fn leader_payload_reaches_every_participant() {
        let barrier = Arc::new(Rendezvous::<u64>::new("payload", 3));
        let hook_runs = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                let hook_runs = Arc::clone(&hook_runs);
                thread::spawn(move || {
                    (0..100u64)
                        .map(|_| {
                            let c = barrier
                                .wait_with(|generation| {
                                    hook_runs.fetch_add(1, Ordering::SeqCst);
                                    generation * 10
                                })
                                .expect("not aborted");
                            assert_eq!(c.payload, c.generation * 10);
                            c.payload
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        for h in handles {
            let payloads = h.join().expect("participant panicked");
            assert_eq!(payloads, (0..100).map(|g| g * 10).collect::<Vec<_>>());
        }
        assert_eq!(hook_runs.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn abort_releases_a_parked_waiter() {
        let barrier = Arc::new(Rendezvous::<()>::new("abort", 2));
        let waiter = {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || barrier.wait())
        };

        while barrier.state.lock().arrived == 0 {
            thread::yield_now();
        }
        barrier.abort();

        let result = waiter.join().expect("waiter panicked");
        assert_eq!(result, Err(Aborted { name: "abort" }));
        assert!(barrier.is_aborted());
        assert_eq!(barrier.wait(), Err(Aborted { name: "abort" }));
    }
}
