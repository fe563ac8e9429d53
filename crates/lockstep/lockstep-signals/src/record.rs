#![forbid(unsafe_code)]

use serde::Serialize;

// One snapshot of the loop, built once per tick by the closing lane and
// handed to the output sink. Nothing keeps it afterwards.
// POD, fixed size: five plant signals, two actuator commands, simulated time.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct OutputRecord {
    pub va: f64,
    pub vz: f64,
    pub q: f64,
    pub az: f64,
    pub h: f64,
    pub delta_th_c: f64,
    pub delta_e_c: f64,
    /// Elapsed simulated time, in `TICK_QUANTUM` units per tick (ms).
    pub t_simu: u64,
}

impl OutputRecord {
    /// Simulated time added by every base tick.
    pub const TICK_QUANTUM: u64 = 5;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    /// Eight words: one cache line per record.
    #[test]
    fn record_fits_a_cache_line() {
        assert_eq!(size_of::<OutputRecord>(), 64, "OutputRecord layout changed");
    }
}
