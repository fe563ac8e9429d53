//! Rate-grouped worker loop.
//!
//! # Per-tick protocol
//!
//! 1. Cross the global rendezvous. Its leader reads the step clock, applies
//!    any command update due on that tick, and hands the tick to every lane
//!    as the wave payload. No lane uses a privately incremented counter.
//! 2. The closing lane publishes the record for the tick just reached. All
//!    producers of the previous tick are behind the crossing, so the
//!    snapshot cannot race with them.
//! 3. Stop if the run length has been reached. Every lane makes this decision
//!    on the same payload, so all five leave on the same wave.
//! 4. Walk the lane program, skipping steps whose guard does not fire.
//! 5. The closing lane advances the clock and sleeps for the pacing delay.

use crate::command::{CommandCell, CommandSchedule};
use crate::program::{BarrierId, CYCLE_START, LANE_COUNT, LaneId, Rate};
use crate::sink::{OutputSink, emits_at};
use crate::task::{TaskContext, TaskFn, TaskId};
use lockstep_signals::SignalStore;
use lockstep_sync::{Aborted, Rendezvous, StepClock};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// The five rendezvous of a run.
pub(crate) struct Barriers {
    /// Global per-tick wave; the payload is the tick.
    pub(crate) cycle_start: Rendezvous<u64>,
    engine_elevator: Rendezvous,
    filter: Rendezvous,
    control: Rendezvous,
    output: Rendezvous,
}

impl Barriers {
    pub(crate) fn new() -> Self {
        let narrow = |id: BarrierId| Rendezvous::<()>::new(id.name(), id.threshold());
        Self {
            cycle_start: Rendezvous::new(CYCLE_START, LANE_COUNT),
            engine_elevator: narrow(BarrierId::EngineElevator),
            filter: narrow(BarrierId::Filter),
            control: narrow(BarrierId::Control),
            output: narrow(BarrierId::Output),
        }
    }

    #[inline]
    pub(crate) fn get(&self, id: BarrierId) -> &Rendezvous {
        match id {
            BarrierId::EngineElevator => &self.engine_elevator,
            BarrierId::Filter => &self.filter,
            BarrierId::Control => &self.control,
            BarrierId::Output => &self.output,
        }
    }

    pub(crate) fn abort_all(&self) {
        self.cycle_start.abort();
        for id in BarrierId::ALL {
            self.get(id).abort();
        }
    }
}

/// State shared by all lanes for one run.
pub(crate) struct Shared {
    pub(crate) clock: StepClock,
    pub(crate) store: SignalStore,
    pub(crate) command: Arc<CommandCell>,
    pub(crate) schedule: CommandSchedule,
    pub(crate) barriers: Barriers,
    pub(crate) max_ticks: u64,
    pub(crate) pace: Option<Duration>,
}

impl Shared {
    /// Runs inside the global rendezvous, on its leader, with every other
    /// lane parked. Returns the tick broadcast to the wave.
    fn open_tick(&self) -> u64 {
        let tick = self.clock.now();
        self.schedule.apply(tick, &self.command);
        tick
    }
}

pub(crate) enum LaneAction {
    Call {
        task: TaskId,
        body: TaskFn,
        calls: u64,
    },
    Cross(BarrierId),
}

pub(crate) struct LaneStep {
    pub(crate) rate: Rate,
    pub(crate) action: LaneAction,
}

#[derive(Debug, Default)]
pub(crate) struct LaneOutcome {
    /// Global rendezvous crossings, including the final one that ends the run.
    pub(crate) crossings: u64,
    pub(crate) emitted: u64,
    pub(crate) invocations: Vec<(TaskId, u64)>,
}

pub(crate) struct Lane {
    pub(crate) id: LaneId,
    pub(crate) closes_tick: bool,
    pub(crate) steps: Vec<LaneStep>,
    pub(crate) sink: Option<Box<dyn OutputSink>>,
}

impl Lane {
    pub(crate) fn run(mut self, shared: &Shared) -> Result<LaneOutcome, Aborted> {
        debug!(lane = %self.id, steps = self.steps.len(), "lane started");
        let mut outcome = LaneOutcome::default();

        loop {
            let crossing = shared
                .barriers
                .cycle_start
                .wait_with(|_| shared.open_tick())?;
            outcome.crossings += 1;
            let tick = crossing.payload;
            debug_assert_eq!(
                crossing.generation, tick,
                "step clock drifted from the global wave count"
            );

            if let Some(sink) = self.sink.as_mut() {
                if emits_at(tick) {
                    sink.emit(&shared.store.snapshot(tick));
                    outcome.emitted += 1;
                }
            }

            if tick >= shared.max_ticks {
                break;
            }

            for step in &mut self.steps {
                if !step.rate.fires(tick) {
                    continue;
                }
                match &mut step.action {
                    LaneAction::Cross(id) => {
                        shared.barriers.get(*id).wait()?;
                    }
                    LaneAction::Call { task, body, calls } => {
                        let ctx = TaskContext::new(*task, tick, &shared.store, &shared.command);
                        body(&ctx);
                        *calls += 1;
                    }
                }
            }

            if self.closes_tick {
                let next = shared.clock.advance();
                trace!(lane = %self.id, tick = next, "tick closed");
                if let Some(pace) = shared.pace {
                    std::thread::sleep(pace);
                }
            }
        }

        outcome.invocations = self
            .steps
            .iter()
            .filter_map(|step| match step.action {
                LaneAction::Call { task, calls, .. } => Some((task, calls)),
                LaneAction::Cross(_) => None,
            })
            .collect();

        debug!(
            lane = %self.id,
            crossings = outcome.crossings,
            emitted = outcome.emitted,
            "lane finished"
        );
        Ok(outcome)
    }
}
