use crate::command::CommandCell;
use crate::error::RunError;
use lockstep_signals::{Signal, SignalStore};

/// Logical task identifiers. The set is fixed; the bodies are supplied from
/// outside through a [`TaskRegistry`].
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskId {
    Engine = 0,
    Elevator = 1,
    AircraftDynamics = 2,
    HFilter = 3,
    AzFilter = 4,
    VzFilter = 5,
    QFilter = 6,
    VaFilter = 7,
    AltitudeHold = 8,
    VzControl = 9,
    VaControl = 10,
    HCommand = 11,
    VaCommand = 12,
    ThrottleFinalizer = 13,
    ElevatorFinalizer = 14,
}

impl TaskId {
    pub const COUNT: usize = 15;

    pub const ALL: [TaskId; Self::COUNT] = [
        TaskId::Engine,
        TaskId::Elevator,
        TaskId::AircraftDynamics,
        TaskId::HFilter,
        TaskId::AzFilter,
        TaskId::VzFilter,
        TaskId::QFilter,
        TaskId::VaFilter,
        TaskId::AltitudeHold,
        TaskId::VzControl,
        TaskId::VaControl,
        TaskId::HCommand,
        TaskId::VaCommand,
        TaskId::ThrottleFinalizer,
        TaskId::ElevatorFinalizer,
    ];

    #[inline(always)]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            TaskId::Engine => "engine",
            TaskId::Elevator => "elevator",
            TaskId::AircraftDynamics => "aircraft_dynamics",
            TaskId::HFilter => "h_filter",
            TaskId::AzFilter => "az_filter",
            TaskId::VzFilter => "vz_filter",
            TaskId::QFilter => "q_filter",
            TaskId::VaFilter => "va_filter",
            TaskId::AltitudeHold => "altitude_hold",
            TaskId::VzControl => "vz_control",
            TaskId::VaControl => "va_control",
            TaskId::HCommand => "h_command",
            TaskId::VaCommand => "va_command",
            TaskId::ThrottleFinalizer => "throttle_finalizer",
            TaskId::ElevatorFinalizer => "elevator_finalizer",
        }
    }

    /// The signals this task is allowed to write.
    pub fn outputs(self) -> &'static [Signal] {
        match self {
            TaskId::Engine => &[Signal::Thrust],
            TaskId::Elevator => &[Signal::DeltaE],
            TaskId::AircraftDynamics => &[Signal::Va, Signal::Vz, Signal::Q, Signal::Az, Signal::H],
            TaskId::HFilter => &[Signal::HFiltered],
            TaskId::AzFilter => &[Signal::AzFiltered],
            TaskId::VzFilter => &[Signal::VzFiltered],
            TaskId::QFilter => &[Signal::QFiltered],
            TaskId::VaFilter => &[Signal::VaFiltered],
            TaskId::AltitudeHold => &[Signal::VzCommand],
            TaskId::VzControl => &[Signal::DeltaEC],
            TaskId::VaControl => &[Signal::DeltaThC],
            TaskId::HCommand => &[Signal::HCommand],
            TaskId::VaCommand => &[Signal::VaCommand],
            TaskId::ThrottleFinalizer => &[Signal::ThrottleDemand],
            TaskId::ElevatorFinalizer => &[Signal::ElevatorDemand],
        }
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// What a task sees while it runs: the tick it runs in, the signal store
/// and the external command.
pub struct TaskContext<'a> {
    task: TaskId,
    tick: u64,
    store: &'a SignalStore,
    command: &'a CommandCell,
}

impl<'a> TaskContext<'a> {
    pub(crate) fn new(
        task: TaskId,
        tick: u64,
        store: &'a SignalStore,
        command: &'a CommandCell,
    ) -> Self {
        Self {
            task,
            tick,
            store,
            command,
        }
    }

    #[inline]
    pub fn task(&self) -> TaskId {
        self.task
    }

    #[inline]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Value of `sig` for the producer's current period. Only sound when the
    /// producer is on this lane or is ordered before us by a rendezvous.
    #[inline]
    pub fn read(&self, sig: Signal) -> f64 {
        self.store.read(sig, self.tick)
    }

    /// Value of `sig` from the producer's previous period, sealed by the
    /// last global crossing.
    #[inline]
    pub fn read_previous(&self, sig: Signal) -> f64 {
        self.store.read_previous(sig, self.tick)
    }

    #[inline]
    pub fn write(&self, sig: Signal, value: f64) {
        debug_assert!(
            self.task.outputs().contains(&sig),
            "{} does not produce {sig}",
            self.task
        );
        self.store.write(sig, self.tick, value);
    }

    /// Current external command (altitude set-point).
    #[inline]
    pub fn command(&self) -> f64 {
        self.command.get()
    }
}

pub type TaskFn = Box<dyn FnMut(&TaskContext<'_>) + Send>;

/// Resolves every [`TaskId`] to a body. Consumed by the scheduler, which
/// moves each body into the lane that runs it.
pub struct TaskRegistry {
    tasks: [Option<TaskFn>; TaskId::COUNT],
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            tasks: std::array::from_fn(|_| None),
        }
    }

    /// Registers (or replaces) the body for `id`.
    pub fn register<F>(&mut self, id: TaskId, body: F) -> &mut Self
    where
        F: FnMut(&TaskContext<'_>) + Send + 'static,
    {
        self.tasks[id.index()] = Some(Box::new(body));
        self
    }

    pub fn is_registered(&self, id: TaskId) -> bool {
        self.tasks[id.index()].is_some()
    }

    /// Identifiers without a body, in `TaskId` order.
    pub fn missing(&self) -> Vec<TaskId> {
        TaskId::ALL
            .into_iter()
            .filter(|id| !self.is_registered(*id))
            .collect()
    }

    pub(crate) fn take(&mut self, id: TaskId) -> Result<TaskFn, RunError> {
        self.tasks[id.index()]
            .take()
            .ok_or(RunError::UnresolvedTask(id))
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("missing", &self.missing())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_is_ordered_by_index() {
        for (i, id) in TaskId::ALL.iter().enumerate() {
            assert_eq!(id.index(), i, "{id} is out of place");
        }
    }

    #[test]
    fn every_signal_has_exactly_one_producer() {
        for sig in Signal::ALL {
            let producers = TaskId::ALL
                .iter()
                .filter(|t| t.outputs().contains(&sig))
                .count();
            assert_eq!(producers, 1, "{sig}");
        }
    }

    #[test]
    fn registry_reports_and_resolves() {
        let mut registry = TaskRegistry::new();
        assert_eq!(registry.missing().len(), TaskId::COUNT);

        registry
            .register(TaskId::Engine, |_| {})
            .register(TaskId::QFilter, |_| {});
        assert!(registry.is_registered(TaskId::Engine));
        assert!(!registry.missing().contains(&TaskId::QFilter));

        assert!(registry.take(TaskId::Engine).is_ok());
        assert!(matches!(
            registry.take(TaskId::Engine),
            Err(RunError::UnresolvedTask(TaskId::Engine))
        ));
    }

    #[test]
    fn context_reads_back_its_own_write() {
        let store = SignalStore::new();
        let command = CommandCell::new(11_000.0);
        let ctx = TaskContext::new(TaskId::AircraftDynamics, 9, &store, &command);
        ctx.write(Signal::H, 42.0);
        assert_eq!(ctx.read(Signal::H), 42.0);
        assert_eq!(ctx.read_previous(Signal::H), 0.0);
        assert_eq!(ctx.command(), 11_000.0);
    }
}
