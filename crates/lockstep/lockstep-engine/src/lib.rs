//! Fixed-rate, five-lane synchronous scheduler.
//!
//! Tasks at 200/100/50/10 Hz run in a fixed relative order every 200 Hz base
//! tick. Lanes are OS threads; data dependencies between them are enforced
//! only by rendezvous crossings (see [`program`] for the schedule and
//! `lane.rs` for the per-tick protocol).

mod command;
mod error;
mod lane;
pub mod program;
mod scheduler;
mod sink;
mod task;

pub use command::{CommandHandle, CommandUpdate};
pub use error::RunError;
pub use program::{BarrierId, LANE_COUNT, LaneId, Rate};
pub use scheduler::{DEFAULT_INITIAL_COMMAND, RunReport, Scheduler, SchedulerConfig};
pub use sink::{EMIT_SKIP_MODULUS, NullSink, OutputSink, emits_at};
pub use task::{TaskContext, TaskFn, TaskId, TaskRegistry};

pub use lockstep_signals::{OutputRecord, Signal};
