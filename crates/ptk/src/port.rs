//! Hand-off to the low-level dispatcher.
//!
//! The engine decides *which* thread should run; a port decides *when* the
//! register-level switch happens. `set_next` is called with the critical
//! section held right after `execute_ptr` was committed. `preempt_check` is
//! called with the critical section released and may switch synchronously
//! through [`Dispatch::switch_context`] or decline.

use crate::state::{ContextSwitch, SchedulerState};
use crate::sync::Mutex;
use crate::thread::ThreadId;

pub trait SchedulerPort: Send + Sync {
    /// Notifies the port of a new execute thread, e.g. to pend a switch
    /// interrupt. Runs inside the critical section.
    fn set_next(&self, _next: ThreadId) {}

    /// Switch opportunity. Runs outside the critical section.
    fn preempt_check(&self, dispatch: Dispatch<'_>);
}

/// View of the scheduler handed to [`SchedulerPort::preempt_check`].
pub struct Dispatch<'a> {
    state: &'a Mutex<SchedulerState>,
}

impl<'a> Dispatch<'a> {
    pub(crate) fn new(state: &'a Mutex<SchedulerState>) -> Self {
        Self { state }
    }

    pub fn execute_thread(&self) -> Option<ThreadId> {
        self.state.lock().execute_thread()
    }

    pub fn current_thread(&self) -> Option<ThreadId> {
        self.state.lock().current_thread()
    }

    pub fn in_interrupt(&self) -> bool {
        self.state.lock().in_interrupt()
    }

    /// True when nobody holds the critical section.
    pub fn is_critical_section_free(&self) -> bool {
        self.state.try_lock().is_some()
    }

    /// Performs the pending switch, if any and if not inside an interrupt.
    pub fn switch_context(&self) -> Option<ContextSwitch> {
        self.state.lock().switch_context()
    }
}

/// Port for hosted builds: switches immediately whenever allowed.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostedPort;

impl SchedulerPort for HostedPort {
    fn preempt_check(&self, dispatch: Dispatch<'_>) {
        if let Some(switch) = dispatch.switch_context() {
            log::trace!("context switch {:?} -> {:?}", switch.from, switch.to);
        }
    }
}
