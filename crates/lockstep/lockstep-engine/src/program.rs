//! Static lane programs.
//!
//! Each lane runs the same loop: cross the global rendezvous, then walk its
//! step list once, executing every step whose rate guard fires on the current
//! tick. A step either invokes a task or crosses one of the narrow
//! rendezvous. The tables below are the whole schedule.
//!
//! ```text
//!            every tick            tick%2==0          tick%20==0   tick%4==0                      tick%4==3
//! lane-1 | engine  |EE|          |F| vz_filter        va_command   |C| va_control                 |O| throttle_final
//! lane-2 | elevator|EE| dynamics |F| h_filter         h_command    altitude_hold |C| vz_control   |O| elevator_final
//! lane-3 |                       |F| q_filter
//! lane-4 |                       |F| va_filter
//! lane-5 |                       |F| az_filter
//! ```
//!
//! `|EE|` engine/elevator pair, `|F|` filter (all five), `|C|` control pair,
//! `|O|` output pair. Lane 1 closes every tick.

use crate::task::TaskId;

/// Number of lanes, and parties of the global per-tick rendezvous.
pub const LANE_COUNT: usize = 5;

/// Name of the global per-tick rendezvous.
pub const CYCLE_START: &str = "cycle_start";

/// Lane identifier (0-based index; displayed 1-based).
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LaneId(pub u8);

impl LaneId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn thread_name(self) -> String {
        format!("lane-{}", self.0 + 1)
    }
}

impl std::fmt::Display for LaneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "lane-{}", self.0 + 1)
    }
}

/// Frequency-division guard: fires when `tick % divisor == phase`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rate {
    pub divisor: u64,
    pub phase: u64,
}

impl Rate {
    /// 200 Hz.
    pub const EVERY_TICK: Rate = Rate::new(1, 0);
    /// 100 Hz.
    pub const FILTER: Rate = Rate::new(2, 0);
    /// 50 Hz control computation.
    pub const CONTROL: Rate = Rate::new(4, 0);
    /// 50 Hz actuator finalization, last tick of the control period.
    pub const OUTPUT: Rate = Rate::new(4, 3);
    /// 10 Hz.
    pub const OUTER_LOOP: Rate = Rate::new(20, 0);

    pub const fn new(divisor: u64, phase: u64) -> Self {
        assert!(divisor > 0 && phase < divisor, "phase must be below divisor");
        Self { divisor, phase }
    }

    #[inline(always)]
    pub fn fires(self, tick: u64) -> bool {
        tick % self.divisor == self.phase
    }
}

/// The narrow rendezvous. The global one is not listed here: every lane
/// crosses it unconditionally at the top of the loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BarrierId {
    EngineElevator,
    Filter,
    Control,
    Output,
}

impl BarrierId {
    pub const ALL: [BarrierId; 4] = [
        BarrierId::EngineElevator,
        BarrierId::Filter,
        BarrierId::Control,
        BarrierId::Output,
    ];

    pub const fn threshold(self) -> usize {
        match self {
            BarrierId::EngineElevator => 2,
            BarrierId::Filter => 5,
            BarrierId::Control => 2,
            BarrierId::Output => 2,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            BarrierId::EngineElevator => "engine_elevator",
            BarrierId::Filter => "filter",
            BarrierId::Control => "control",
            BarrierId::Output => "output",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Call(TaskId),
    Cross(BarrierId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Step {
    pub rate: Rate,
    pub action: Action,
}

const fn call(rate: Rate, task: TaskId) -> Step {
    Step {
        rate,
        action: Action::Call(task),
    }
}

const fn cross(rate: Rate, barrier: BarrierId) -> Step {
    Step {
        rate,
        action: Action::Cross(barrier),
    }
}

#[derive(Clone, Copy, Debug)]
pub struct LaneProgram {
    pub lane: LaneId,
    /// The closing lane advances the clock and emits the output record.
    pub closes_tick: bool,
    pub steps: &'static [Step],
}

const LANE_1: &[Step] = &[
    call(Rate::EVERY_TICK, TaskId::Engine),
    cross(Rate::EVERY_TICK, BarrierId::EngineElevator),
    cross(Rate::FILTER, BarrierId::Filter),
    call(Rate::FILTER, TaskId::VzFilter),
    call(Rate::OUTER_LOOP, TaskId::VaCommand),
    cross(Rate::CONTROL, BarrierId::Control),
    call(Rate::CONTROL, TaskId::VaControl),
    cross(Rate::OUTPUT, BarrierId::Output),
    call(Rate::OUTPUT, TaskId::ThrottleFinalizer),
];

const LANE_2: &[Step] = &[
    call(Rate::EVERY_TICK, TaskId::Elevator),
    cross(Rate::EVERY_TICK, BarrierId::EngineElevator),
    call(Rate::EVERY_TICK, TaskId::AircraftDynamics),
    cross(Rate::FILTER, BarrierId::Filter),
    call(Rate::FILTER, TaskId::HFilter),
    call(Rate::OUTER_LOOP, TaskId::HCommand),
    call(Rate::CONTROL, TaskId::AltitudeHold),
    cross(Rate::CONTROL, BarrierId::Control),
    call(Rate::CONTROL, TaskId::VzControl),
    cross(Rate::OUTPUT, BarrierId::Output),
    call(Rate::OUTPUT, TaskId::ElevatorFinalizer),
];

const LANE_3: &[Step] = &[
    cross(Rate::FILTER, BarrierId::Filter),
    call(Rate::FILTER, TaskId::QFilter),
];

const LANE_4: &[Step] = &[
    cross(Rate::FILTER, BarrierId::Filter),
    call(Rate::FILTER, TaskId::VaFilter),
];

const LANE_5: &[Step] = &[
    cross(Rate::FILTER, BarrierId::Filter),
    call(Rate::FILTER, TaskId::AzFilter),
];

pub const PROGRAMS: [LaneProgram; LANE_COUNT] = [
    LaneProgram {
        lane: LaneId(0),
        closes_tick: true,
        steps: LANE_1,
    },
    LaneProgram {
        lane: LaneId(1),
        closes_tick: false,
        steps: LANE_2,
    },
    LaneProgram {
        lane: LaneId(2),
        closes_tick: false,
        steps: LANE_3,
    },
    LaneProgram {
        lane: LaneId(3),
        closes_tick: false,
        steps: LANE_4,
    },
    LaneProgram {
        lane: LaneId(4),
        closes_tick: false,
        steps: LANE_5,
    },
];

/// Ticks after which every rate guard repeats.
pub const HYPERPERIOD: u64 = 20;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_task_runs_on_exactly_one_lane() {
        for task in TaskId::ALL {
            let owners = PROGRAMS
                .iter()
                .filter(|p| p.steps.iter().any(|s| s.action == Action::Call(task)))
                .count();
            assert_eq!(owners, 1, "{task} must be owned by exactly one lane");
        }
    }

    /// A barrier crossed by a different number of lanes than its threshold
    /// deadlocks the run. Check every tick of the hyperperiod.
    #[test]
    fn barrier_participation_matches_thresholds() {
        for tick in 0..HYPERPERIOD {
            for barrier in BarrierId::ALL {
                let crossings: usize = PROGRAMS
                    .iter()
                    .map(|p| {
                        p.steps
                            .iter()
                            .filter(|s| s.action == Action::Cross(barrier) && s.rate.fires(tick))
                            .count()
                    })
                    .sum();
                assert!(
                    crossings == 0 || crossings == barrier.threshold(),
                    "{} crossed by {crossings} lanes at tick {tick}",
                    barrier.name()
                );
            }
        }
    }

    #[test]
    fn lane_ids_match_positions_and_one_lane_closes() {
        for (i, p) in PROGRAMS.iter().enumerate() {
            assert_eq!(p.lane.index(), i);
        }
        assert_eq!(PROGRAMS.iter().filter(|p| p.closes_tick).count(), 1);
    }

    #[test]
    fn rate_guards() {
        assert!(Rate::EVERY_TICK.fires(7));
        assert!(Rate::FILTER.fires(4) && !Rate::FILTER.fires(5));
        assert!(Rate::OUTPUT.fires(3) && Rate::OUTPUT.fires(7) && !Rate::OUTPUT.fires(4));
        assert!(Rate::OUTER_LOOP.fires(40) && !Rate::OUTER_LOOP.fires(30));
    }

    #[test]
    fn lane_display_is_one_based() {
        assert_eq!(LaneId(0).to_string(), "lane-1");
        assert_eq!(LaneId(4).thread_name(), "lane-5");
    }
}
