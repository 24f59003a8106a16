//! Scheduler globals and the ready-queue manager.
//!
//! One `SchedulerState` exists per kernel. It is only ever touched with the
//! critical section held, which is the lock the engine wraps it in. The
//! dispatcher operations below mirror what the kernel's resume/suspend paths do
//! with preemption thresholds: they keep `execute_ptr` pointing at the thread
//! that should run and maintain the preempted map on both sides.

use crate::config::SchedulerConfig;
use crate::error::{SchedError, SchedResult};
use crate::ledger::ThresholdLedger;
use crate::priority::Priority;
use crate::ready::ReadyQueue;
use crate::thread::{ThreadControl, ThreadId, ThreadSpec, ThreadState};

/// A switch performed by the port: `from` stops running, `to` starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextSwitch {
    pub from: Option<ThreadId>,
    pub to: Option<ThreadId>,
}

pub struct SchedulerState {
    pub(crate) config: SchedulerConfig,
    pub(crate) ready: ReadyQueue,
    pub(crate) ledger: ThresholdLedger,
    pub(crate) execute_ptr: Option<ThreadId>,
    current_ptr: Option<ThreadId>,
    system_state: u32,
}

impl SchedulerState {
    /// Builds an empty scheduler. `config` must already be validated.
    pub fn new(config: SchedulerConfig) -> Self {
        let max = config.max_priorities;
        Self {
            config,
            ready: ReadyQueue::new(max),
            ledger: ThresholdLedger::new(max),
            execute_ptr: None,
            current_ptr: None,
            system_state: 0,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn ready(&self) -> &ReadyQueue {
        &self.ready
    }

    pub fn ledger(&self) -> &ThresholdLedger {
        &self.ledger
    }

    pub fn thread(&self, id: ThreadId) -> Option<&ThreadControl> {
        self.ledger.get(id)
    }

    /// Thread selected to run next.
    pub fn execute_thread(&self) -> Option<ThreadId> {
        self.execute_ptr
    }

    /// Thread actually running; lags `execute_thread` until the port switches.
    pub fn current_thread(&self) -> Option<ThreadId> {
        self.current_ptr
    }

    pub fn highest_ready_priority(&self) -> Option<Priority> {
        self.ready.highest_ready_priority()
    }

    pub fn in_interrupt(&self) -> bool {
        self.system_state != 0
    }

    pub fn interrupt_depth(&self) -> u32 {
        self.system_state
    }

    pub(crate) fn thread_checked(&self, id: ThreadId) -> SchedResult<&ThreadControl> {
        self.ledger.get(id).ok_or(SchedError::UnknownThread(id))
    }

    pub(crate) fn thread_mut(&mut self, id: ThreadId) -> SchedResult<&mut ThreadControl> {
        self.ledger.get_mut(id).ok_or(SchedError::UnknownThread(id))
    }

    pub(crate) fn check_priority(&self, priority: Priority) -> SchedResult<()> {
        if self.config.contains(priority) {
            Ok(())
        } else {
            Err(SchedError::PriorityOutOfRange {
                priority,
                max: self.config.max_priorities,
            })
        }
    }

    pub(crate) fn register(&mut self, spec: &ThreadSpec) -> SchedResult<ThreadId> {
        self.check_priority(spec.priority)?;
        let threshold = self.config.coerce_threshold(spec.priority, spec.threshold);
        if threshold > spec.priority {
            return Err(SchedError::ThresholdInvalid {
                thread: self.ledger.next_id(),
                threshold,
                priority: spec.priority,
            });
        }
        Ok(self.ledger.register(spec.name, spec.priority, threshold))
    }

    /// Suspended → Ready. Returns true when `execute_ptr` moved to `id`.
    pub(crate) fn make_ready(&mut self, id: ThreadId) -> SchedResult<bool> {
        let tcb = self.thread_mut(id)?;
        if tcb.state() != ThreadState::Suspended {
            return Err(SchedError::InvalidState {
                thread: id,
                state: tcb.state(),
            });
        }
        tcb.set_state(ThreadState::Ready);
        let priority = tcb.priority();

        let previous_highest = self.ready.highest_ready_priority();
        if !self.ready.insert(priority, id) {
            // Peers already queued at this priority; the new thread waits its turn.
            return Ok(false);
        }
        if previous_highest.is_some_and(|highest| !priority.is_more_urgent_than(highest)) {
            return Ok(false);
        }

        let executing = self
            .execute_ptr
            .and_then(|exec| self.ledger.get(exec))
            .map(|exec| (exec.priority(), exec.effective_threshold(), exec.is_threshold_active()));

        match executing {
            None => {
                self.execute_ptr = Some(id);
                Ok(true)
            }
            Some((exec_priority, exec_threshold, threshold_active)) => {
                if !priority.is_more_urgent_than(exec_threshold) {
                    return Ok(false);
                }
                if self.config.preemption_threshold && threshold_active {
                    self.ledger.mark_preempted(exec_priority);
                }
                self.execute_ptr = Some(id);
                Ok(true)
            }
        }
    }

    /// Ready/Running → Suspended. Returns true when `execute_ptr` changed.
    pub(crate) fn make_suspended(&mut self, id: ThreadId) -> SchedResult<bool> {
        let tcb = self.thread_mut(id)?;
        if !tcb.state().is_ready() {
            return Err(SchedError::InvalidState {
                thread: id,
                state: tcb.state(),
            });
        }
        tcb.set_state(ThreadState::Suspended);
        let priority = tcb.priority();

        let was_head = self.ready.head(priority) == Some(id);
        let emptied = self.ready.remove(priority, id);
        if was_head || emptied {
            // The preempted bit always describes the ring head.
            self.ledger.clear_preempted(priority);
        }

        if self.execute_ptr != Some(id) {
            return Ok(false);
        }
        self.execute_ptr = self.select_next();
        Ok(true)
    }

    /// The executing thread yields. Returns true when `execute_ptr` changed.
    pub(crate) fn relinquish(&mut self, id: ThreadId) -> SchedResult<bool> {
        let tcb = self.thread_checked(id)?;
        if self.execute_ptr != Some(id) || !tcb.state().is_ready() {
            return Err(SchedError::InvalidState {
                thread: id,
                state: tcb.state(),
            });
        }
        let priority = tcb.priority();

        if let Some(highest) = self.ready.highest_ready_priority() {
            if highest.is_more_urgent_than(priority) {
                // A more urgent thread was only waiting on our threshold.
                self.execute_ptr = self.ready.head(highest);
                return Ok(true);
            }
        }

        if self.ready.ring(priority).len() < 2 {
            return Ok(false);
        }
        self.execute_ptr = self.ready.rotate(priority);
        Ok(true)
    }

    pub(crate) fn remove_thread(&mut self, id: ThreadId) -> SchedResult<ThreadControl> {
        let state = self.thread_checked(id)?.state();
        if state != ThreadState::Suspended {
            return Err(SchedError::InvalidState { thread: id, state });
        }
        if self.current_ptr == Some(id) {
            self.current_ptr = None;
        }
        self.ledger.remove(id).ok_or(SchedError::UnknownThread(id))
    }

    pub(crate) fn set_inherited(&mut self, id: ThreadId, inherited: Option<Priority>) -> SchedResult<()> {
        if let Some(priority) = inherited {
            self.check_priority(priority)?;
        }
        let tcb = self.thread_mut(id)?;
        let inherited = inherited.unwrap_or(tcb.priority());
        tcb.set_inherited(inherited);
        Ok(())
    }

    pub(crate) fn enter_interrupt(&mut self) {
        self.system_state += 1;
    }

    /// Returns true when the outermost interrupt was left.
    pub(crate) fn exit_interrupt(&mut self) -> bool {
        debug_assert!(self.system_state > 0, "interrupt exit without enter");
        self.system_state = self.system_state.saturating_sub(1);
        self.system_state == 0
    }

    /// Makes `execute_ptr` the running thread. Refused inside interrupts or
    /// when nothing changed.
    pub(crate) fn switch_context(&mut self) -> Option<ContextSwitch> {
        if self.in_interrupt() || self.execute_ptr == self.current_ptr {
            return None;
        }

        let from = self.current_ptr;
        let to = self.execute_ptr;
        if let Some(tcb) = from.and_then(|id| self.ledger.get_mut(id)) {
            if tcb.state() == ThreadState::Running {
                tcb.set_state(ThreadState::Ready);
            }
        }
        if let Some(tcb) = to.and_then(|id| self.ledger.get_mut(id)) {
            tcb.set_state(ThreadState::Running);
        }
        self.current_ptr = to;
        Some(ContextSwitch { from, to })
    }

    /// Picks the thread to run after the executing one left the ready queue.
    ///
    /// Normally the head of the highest ready priority. A thread preempted while
    /// holding a threshold is restored first if that priority does not beat its
    /// threshold.
    fn select_next(&mut self) -> Option<ThreadId> {
        let highest = self.ready.highest_ready_priority()?;
        let next = self.ready.head(highest);

        let Some(preempted) = self.ledger.lowest_preempted() else {
            return next;
        };
        let candidate = self
            .ready
            .head(preempted)
            .and_then(|id| self.ledger.get(id))
            .map(|tcb| (tcb.id(), tcb.effective_threshold()));

        match candidate {
            Some((id, threshold)) if !highest.is_more_urgent_than(threshold) => {
                self.ledger.clear_preempted(preempted);
                Some(id)
            }
            _ => next,
        }
    }
}
