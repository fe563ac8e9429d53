//! A rendezvous joined by fewer live participants than its threshold never
//! releases. There is no timeout inside the barrier, so the hang is observed
//! from the outside with a channel deadline, then cleared with `abort()`.
//!
//! ```bash
//! cargo test -p lockstep-sync --test deadlock -- --nocapture
//! ```

use crossbeam_channel::{RecvTimeoutError, bounded};
use lockstep_sync::{Aborted, Rendezvous};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const THRESHOLD: usize = 3;
const HANG_DEADLINE: Duration = Duration::from_millis(300);

#[test]
fn short_handed_wave_hangs_until_aborted() {
    let barrier = Arc::new(Rendezvous::<()>::new("short_handed", THRESHOLD));
    let (tx, rx) = bounded(THRESHOLD);

    let handles: Vec<_> = (0..THRESHOLD - 1)
        .map(|_| {
            let barrier = Arc::clone(&barrier);
            let tx = tx.clone();
            thread::spawn(move || {
                let result = barrier.wait();
                let _ = tx.send(result);
            })
        })
        .collect();
    drop(tx);

    // N-1 participants: nobody is released within the deadline.
    assert_eq!(rx.recv_timeout(HANG_DEADLINE), Err(RecvTimeoutError::Timeout));
    assert_eq!(barrier.generation(), 0);

    barrier.abort();
    for _ in 0..THRESHOLD - 1 {
        let result = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("abort should wake every waiter");
        assert_eq!(result, Err(Aborted { name: "short_handed" }));
    }
    for h in handles {
        h.join().expect("waiter panicked");
    }
}

#[test]
fn full_wave_releases_within_deadline() {
    let barrier = Arc::new(Rendezvous::<()>::new("full", THRESHOLD));
    let (tx, rx) = bounded(THRESHOLD);

    let handles: Vec<_> = (0..THRESHOLD)
        .map(|_| {
            let barrier = Arc::clone(&barrier);
            let tx = tx.clone();
            thread::spawn(move || {
                let _ = tx.send(barrier.wait());
            })
        })
        .collect();

    let mut leaders = 0;
    for _ in 0..THRESHOLD {
        let crossing = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("full wave must release")
            .expect("not aborted");
        assert_eq!(crossing.generation, 0);
        leaders += usize::from(crossing.leader);
    }
    assert_eq!(leaders, 1);
    for h in handles {
        h.join().expect("participant panicked");
    }
}
