//! Orchestrator: builds the lanes, owns the shared state, spawns and joins.
//!
//! Startup is all-or-nothing. If any lane fails to spawn, every rendezvous is
//! aborted so the lanes already running fall out of their first wait, they
//! are joined, and the spawn error is returned. A lane that panics aborts the
//! rendezvous on its way out for the same reason: its peers would otherwise
//! wait for it forever.

use crate::command::{CommandHandle, CommandSchedule, CommandUpdate};
use crate::error::RunError;
use crate::lane::{Barriers, Lane, LaneAction, LaneOutcome, LaneStep, Shared};
use crate::program::{Action, LANE_COUNT, LaneId, PROGRAMS};
use crate::sink::OutputSink;
use crate::task::{TaskId, TaskRegistry};
use lockstep_signals::SignalStore;
use lockstep_sync::{Aborted, StepClock};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Altitude set-point injected before the first tick unless configured
/// otherwise.
pub const DEFAULT_INITIAL_COMMAND: f64 = 11_000.0;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Sleep after each closed tick, to approach wall-clock pacing.
    pub pace: Option<Duration>,
    pub initial_command: f64,
    pub command_schedule: Vec<CommandUpdate>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            pace: None,
            initial_command: DEFAULT_INITIAL_COMMAND,
            command_schedule: Vec::new(),
        }
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub ticks: u64,
    pub emitted: u64,
    /// Global crossings per lane. A healthy run of `L` ticks gives `L + 1`:
    /// one per tick plus the wave on which everyone stops.
    pub crossings: [u64; LANE_COUNT],
    invocations: [u64; TaskId::COUNT],
}

impl RunReport {
    fn new(ticks: u64) -> Self {
        Self {
            ticks,
            emitted: 0,
            crossings: [0; LANE_COUNT],
            invocations: [0; TaskId::COUNT],
        }
    }

    fn absorb(&mut self, lane: LaneId, outcome: LaneOutcome) {
        self.crossings[lane.index()] = outcome.crossings;
        self.emitted += outcome.emitted;
        for (task, calls) in outcome.invocations {
            self.invocations[task.index()] = calls;
        }
    }

    /// How many times `task` ran.
    pub fn invocations(&self, task: TaskId) -> u64 {
        self.invocations[task.index()]
    }
}

type LaneResult = Result<LaneOutcome, Aborted>;
type LaneBody = Box<dyn FnOnce() -> LaneResult + Send + 'static>;

pub struct Scheduler {
    config: SchedulerConfig,
    registry: TaskRegistry,
    sink: Box<dyn OutputSink>,
    command: CommandHandle,
}

impl Scheduler {
    pub fn new<S>(registry: TaskRegistry, sink: S) -> Self
    where
        S: OutputSink + 'static,
    {
        Self::with_config(registry, sink, SchedulerConfig::default())
    }

    pub fn with_config<S>(registry: TaskRegistry, sink: S, config: SchedulerConfig) -> Self
    where
        S: OutputSink + 'static,
    {
        Self {
            command: CommandHandle::new(config.initial_command),
            config,
            registry,
            sink: Box::new(sink),
        }
    }

    /// Setter for the external command, usable from any thread before and
    /// during the run.
    pub fn command_handle(&self) -> CommandHandle {
        self.command.clone()
    }

    /// Runs `ticks` base periods and blocks until every lane has stopped.
    pub fn run(self, ticks: u64) -> Result<RunReport, RunError> {
        self.run_with_spawner(ticks, spawn_thread)
    }

    fn run_with_spawner<F>(self, ticks: u64, spawn: F) -> Result<RunReport, RunError>
    where
        F: FnMut(LaneId, LaneBody) -> io::Result<JoinHandle<LaneResult>>,
    {
        info!(ticks, "initializing scheduler");
        let Scheduler {
            config,
            registry,
            sink,
            command,
        } = self;

        let lanes = build_lanes(registry, sink)?;

        let shared = Arc::new(Shared {
            clock: StepClock::new(),
            store: SignalStore::new(),
            command: command.cell(),
            schedule: CommandSchedule::new(config.command_schedule),
            barriers: Barriers::new(),
            max_ticks: ticks,
            pace: config.pace,
        });
        shared.store.reset();
        shared.clock.reset();

        // The initial command was injected when the handle was created; a
        // `set` made since then wins.
        info!(
            command = command.get(),
            scheduled = shared.schedule.len(),
            "initial command set"
        );

        info!(lanes = LANE_COUNT, "spawning lanes");
        let handles = spawn_lanes(lanes, &shared, spawn)?;

        info!("joining lanes");
        let report = join_lanes(ticks, handles)?;
        info!(ticks = report.ticks, emitted = report.emitted, "run complete");
        Ok(report)
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

fn spawn_thread(lane: LaneId, body: LaneBody) -> io::Result<JoinHandle<LaneResult>> {
    thread::Builder::new().name(lane.thread_name()).spawn(body)
}

/// Moves every task body into the lane that runs it. Fails before any thread
/// exists if an identifier has no body.
fn build_lanes(
    mut registry: TaskRegistry,
    sink: Box<dyn OutputSink>,
) -> Result<Vec<Lane>, RunError> {
    if let Some(&missing) = registry.missing().first() {
        error!(task = %missing, "unresolved task");
        return Err(RunError::UnresolvedTask(missing));
    }

    let mut sink = Some(sink);
    let mut lanes = Vec::with_capacity(LANE_COUNT);
    for program in &PROGRAMS {
        let mut steps = Vec::with_capacity(program.steps.len());
        for step in program.steps {
            let action = match step.action {
                Action::Cross(barrier) => LaneAction::Cross(barrier),
                Action::Call(task) => LaneAction::Call {
                    task,
                    body: registry.take(task)?,
                    calls: 0,
                },
            };
            steps.push(LaneStep {
                rate: step.rate,
                action,
            });
        }
        lanes.push(Lane {
            id: program.lane,
            closes_tick: program.closes_tick,
            steps,
            sink: if program.closes_tick { sink.take() } else { None },
        });
    }
    Ok(lanes)
}

/// Aborts every rendezvous if the owning thread unwinds.
struct AbortOnPanic<'a> {
    lane: LaneId,
    barriers: &'a Barriers,
}

impl Drop for AbortOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            warn!(lane = %self.lane, "lane panicked; aborting rendezvous");
            self.barriers.abort_all();
        }
    }
}

fn spawn_lanes<F>(
    lanes: Vec<Lane>,
    shared: &Arc<Shared>,
    mut spawn: F,
) -> Result<Vec<(LaneId, JoinHandle<LaneResult>)>, RunError>
where
    F: FnMut(LaneId, LaneBody) -> io::Result<JoinHandle<LaneResult>>,
{
    let mut handles = Vec::with_capacity(lanes.len());
    for lane in lanes {
        let id = lane.id;
        let lane_shared = Arc::clone(shared);
        let body: LaneBody = Box::new(move || {
            let _guard = AbortOnPanic {
                lane: id,
                barriers: &lane_shared.barriers,
            };
            lane.run(&lane_shared)
        });

        match spawn(id, body) {
            Ok(handle) => {
                debug!(lane = %id, "lane spawned");
                handles.push((id, handle));
            }
            Err(source) => {
                error!(lane = %id, error = %source, "failed to spawn lane");
                shared.barriers.abort_all();
                for (started, handle) in handles {
                    let outcome = handle.join();
                    debug!(lane = %started, stopped = outcome.is_ok(), "lane stopped after abort");
                }
                return Err(RunError::Spawn { lane: id, source });
            }
        }
    }
    Ok(handles)
}

fn join_lanes(
    ticks: u64,
    handles: Vec<(LaneId, JoinHandle<LaneResult>)>,
) -> Result<RunReport, RunError> {
    let mut report = RunReport::new(ticks);
    let mut failure: Option<RunError> = None;

    for (lane, handle) in handles {
        match handle.join() {
            Ok(Ok(outcome)) => report.absorb(lane, outcome),
            Ok(Err(source)) => {
                if failure.is_none() {
                    failure = Some(RunError::Interrupted { lane, source });
                }
            }
            Err(_) => {
                error!(lane = %lane, "lane panicked");
                // A panic is the root cause of any interruption; keep the first one.
                if !matches!(failure, Some(RunError::LanePanicked(_))) {
                    failure = Some(RunError::LanePanicked(lane));
                }
            }
        }
    }

    match failure {
        Some(err) => Err(err),
        None => Ok(report),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::NullSink;

    fn noop_registry() -> TaskRegistry {
        let mut registry = TaskRegistry::new();
        for id in TaskId::ALL {
            registry.register(id, |_| {});
        }
        registry
    }

    #[test]
    fn spawn_failure_stops_the_lanes_already_running() {
        const FAILING: LaneId = LaneId(3);

        let scheduler = Scheduler::new(noop_registry(), NullSink);
        let result = scheduler.run_with_spawner(1_000, |lane, body| {
            if lane == FAILING {
                Err(io::Error::new(io::ErrorKind::OutOfMemory, "no threads left"))
            } else {
                spawn_thread(lane, body)
            }
        });

        // Returning at all means lanes 1-3 were released and joined.
        match result {
            Err(RunError::Spawn { lane, source }) => {
                assert_eq!(lane, FAILING);
                assert_eq!(source.kind(), io::ErrorKind::OutOfMemory);
            }
            other => panic!("expected a spawn failure, got {other:?}"),
        }
    }

    #[test]
    fn failure_on_first_lane_spawns_nothing() {
        let scheduler = Scheduler::new(noop_registry(), NullSink);
        let mut attempts = 0;
        let result = scheduler.run_with_spawner(10, |_, _| {
            attempts += 1;
            Err(io::Error::other("refused"))
        });
        assert_eq!(attempts, 1);
        assert_eq!(result.map_err(|e| e.exit_code()), Err(3));
    }

    #[test]
    fn unresolved_task_fails_before_spawning() {
        let mut partial = TaskRegistry::new();
        for id in TaskId::ALL {
            if id != TaskId::VzControl {
                partial.register(id, |_| {});
            }
        }

        let mut spawned = 0;
        let result = Scheduler::new(partial, NullSink).run_with_spawner(10, |lane, body| {
            spawned += 1;
            spawn_thread(lane, body)
        });
        assert!(matches!(result, Err(RunError::UnresolvedTask(TaskId::VzControl))));
        assert_eq!(spawned, 0);
    }
}
