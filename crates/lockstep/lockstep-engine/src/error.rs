use crate::program::LaneId;
use crate::task::TaskId;
use lockstep_sync::Aborted;

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("no task registered for '{0}'")]
    UnresolvedTask(TaskId),

    #[error("failed to spawn {lane}")]
    Spawn {
        lane: LaneId,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} panicked")]
    LanePanicked(LaneId),

    #[error("{lane} was interrupted")]
    Interrupted {
        lane: LaneId,
        #[source]
        source: Aborted,
    },
}

impl RunError {
    /// Non-zero process status for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::UnresolvedTask(_) => 2,
            RunError::Spawn { .. } => 3,
            RunError::LanePanicked(_) => 4,
            RunError::Interrupted { .. } => 5,
        }
    }
}
