use thiserror::Error;

use crate::priority::Priority;
use crate::thread::{ThreadId, ThreadState};

/// Result type used by scheduler operations.
pub type SchedResult<T> = Result<T, SchedError>;

/// Recoverable scheduler errors. Every rejection leaves the scheduler state
/// untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SchedError {
    #[error("preemption threshold {threshold} is less urgent than priority {priority} of thread {thread}")]
    ThresholdInvalid {
        thread: ThreadId,
        threshold: Priority,
        priority: Priority,
    },
    #[error("thread {0} is not registered")]
    UnknownThread(ThreadId),
    #[error("priority {priority} outside configured range 0..{max}")]
    PriorityOutOfRange { priority: Priority, max: u16 },
    #[error("thread {thread} is {state:?}, which this operation does not accept")]
    InvalidState { thread: ThreadId, state: ThreadState },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("max priorities {0} must be a multiple of 32 between 32 and 1024")]
    InvalidMaxPriorities(u16),
}
