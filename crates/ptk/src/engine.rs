//! The preemption engine: threshold changes and the dispatcher services that
//! share its critical section.
//!
//! Every operation enters the critical section once, mutates
//! [`SchedulerState`], commits a new execute thread if one is warranted and
//! then releases the section around a single
//! [`SchedulerPort::preempt_check`] call so the port can switch.

use crate::config::SchedulerConfig;
use crate::error::{ConfigError, SchedError, SchedResult};
use crate::perf::{NoObserver, PreemptionEvent, PreemptionObserver};
use crate::port::{Dispatch, HostedPort, SchedulerPort};
use crate::priority::Priority;
use crate::state::SchedulerState;
use crate::sync::{Mutex, MutexGuard};
use crate::thread::{ThreadControl, ThreadId, ThreadSpec};
use crate::trace::{records, Payload, TraceHook};

const NO_THREAD: u32 = u32::MAX;

pub struct EngineBuilder<P = HostedPort, O = NoObserver> {
    config: SchedulerConfig,
    port: P,
    observer: O,
    trace: Option<TraceHook>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            config: SchedulerConfig::default(),
            port: HostedPort,
            observer: NoObserver,
            trace: None,
        }
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: SchedulerPort, O: PreemptionObserver> EngineBuilder<P, O> {
    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn port<Q: SchedulerPort>(self, port: Q) -> EngineBuilder<Q, O> {
        EngineBuilder {
            config: self.config,
            port,
            observer: self.observer,
            trace: self.trace,
        }
    }

    pub fn observer<R: PreemptionObserver>(self, observer: R) -> EngineBuilder<P, R> {
        EngineBuilder {
            config: self.config,
            port: self.port,
            observer,
            trace: self.trace,
        }
    }

    pub fn with_trace_hook(mut self, hook: TraceHook) -> Self {
        self.trace = Some(hook);
        self
    }

    pub fn build(self) -> Result<PreemptionEngine<P, O>, ConfigError> {
        self.config.validate()?;
        log::debug!(
            "{}: {} priorities, thresholds {}, performance info {}",
            self.config.name,
            self.config.max_priorities,
            if self.config.preemption_threshold { "graded" } else { "on/off" },
            self.config.performance_info
        );
        Ok(PreemptionEngine {
            state: Mutex::new(SchedulerState::new(self.config)),
            port: self.port,
            observer: Mutex::new(self.observer),
            trace: Mutex::new(self.trace),
        })
    }
}

pub struct PreemptionEngine<P = HostedPort, O = NoObserver> {
    state: Mutex<SchedulerState>,
    port: P,
    observer: Mutex<O>,
    trace: Mutex<Option<TraceHook>>,
}

impl PreemptionEngine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Engine with the hosted port and no observer.
    pub fn new(config: SchedulerConfig) -> Result<Self, ConfigError> {
        EngineBuilder::new().config(config).build()
    }
}

impl<P: SchedulerPort, O: PreemptionObserver> PreemptionEngine<P, O> {
    /// Changes the preemption threshold of `thread` and returns the previous
    /// user threshold.
    ///
    /// If the new threshold exposes the executing thread to the highest ready
    /// priority, that priority's ring head becomes the execute thread and the
    /// port gets one switch opportunity before this returns. A rejected
    /// threshold changes nothing.
    pub fn change_threshold(&self, thread: ThreadId, new_threshold: Priority) -> SchedResult<Priority> {
        let mut state = self.state.lock();

        let tcb = state.thread_checked(thread)?;
        let priority = tcb.priority();
        let user_threshold = tcb.user_threshold();
        let payload = Payload::new()
            .bytes(&thread.raw().to_le_bytes())
            .bytes(&new_threshold.to_le_bytes())
            .bytes(&tcb.effective_threshold().to_le_bytes())
            .bytes(&[tcb.state().code()]);
        let new_threshold = state.config.coerce_threshold(priority, new_threshold);

        self.emit_record(records::thread::PREEMPTION_CHANGE, payload.as_slice(), true);

        if new_threshold > priority {
            log::warn!("thread {thread}: threshold {new_threshold} rejected, priority is {priority}");
            return Err(SchedError::ThresholdInvalid {
                thread,
                threshold: new_threshold,
                priority,
            });
        }

        // Drop a stale preempted mark before the new threshold takes effect.
        if state.config.preemption_threshold
            && (user_threshold == priority || new_threshold == priority)
            && state.ready.head(priority) == Some(thread)
        {
            state.ledger.clear_preempted(priority);
        }

        let tcb = state.thread_mut(thread)?;
        let old_threshold = tcb.apply_threshold(new_threshold);
        let effective = tcb.effective_threshold();
        log::debug!(
            "thread {thread}: threshold {old_threshold} -> {new_threshold} (effective {effective})"
        );

        let preempting = state
            .highest_ready_priority()
            .filter(|highest| highest.is_more_urgent_than(priority))
            .filter(|highest| highest.is_more_urgent_than(new_threshold))
            .and_then(|highest| state.ready.head(highest).map(|next| (highest, next)));

        let Some((highest, next)) = preempting else {
            return Ok(old_threshold);
        };
        if state.execute_ptr != Some(thread) {
            return Ok(old_threshold);
        }

        if state.config.preemption_threshold && effective != priority {
            state.ledger.mark_preempted(priority);
        }

        let previous = state.execute_ptr;
        if state.config.performance_info {
            self.observer.lock().on_threshold_preemption(&PreemptionEvent {
                preempted: thread,
                preempting: next,
                priority: highest,
                solicited: !state.in_interrupt(),
                previous_execute: previous,
            });
        }

        state.execute_ptr = Some(next);
        self.announce(&state, previous);
        drop(state);

        self.port.preempt_check(Dispatch::new(&self.state));

        let state = self.state.lock();
        log::trace!(
            "thread {thread}: preempted by {next}, now running {:?}",
            state.current_thread()
        );
        Ok(old_threshold)
    }

    /// Registers a thread. It starts suspended unless `spec.auto_start`.
    pub fn create_thread(&self, spec: ThreadSpec) -> SchedResult<ThreadId> {
        let mut state = self.state.lock();
        let id = state.register(&spec)?;
        log::debug!(
            "thread {id} '{}' created at priority {} threshold {}",
            spec.name,
            spec.priority,
            state.thread_checked(id)?.user_threshold()
        );

        if spec.auto_start {
            let previous = state.execute_ptr;
            let moved = state.make_ready(id)?;
            self.emit_thread_record(records::thread::RESUME, id, spec.priority);
            self.dispatch(state, previous, moved);
        }
        Ok(id)
    }

    /// Makes a suspended thread ready.
    pub fn resume(&self, thread: ThreadId) -> SchedResult<()> {
        let mut state = self.state.lock();
        let previous = state.execute_ptr;
        let moved = state.make_ready(thread)?;
        let priority = state.thread_checked(thread)?.priority();
        self.emit_thread_record(records::thread::RESUME, thread, priority);
        self.dispatch(state, previous, moved);
        Ok(())
    }

    /// Takes a ready or running thread off the ready queue.
    pub fn suspend(&self, thread: ThreadId) -> SchedResult<()> {
        let mut state = self.state.lock();
        let previous = state.execute_ptr;
        let moved = state.make_suspended(thread)?;
        let priority = state.thread_checked(thread)?.priority();
        self.emit_thread_record(records::thread::SUSPEND, thread, priority);
        self.dispatch(state, previous, moved);
        Ok(())
    }

    /// The executing thread gives up the CPU to a ready peer or to a more
    /// urgent thread its threshold was holding off.
    pub fn relinquish(&self, thread: ThreadId) -> SchedResult<()> {
        let mut state = self.state.lock();
        let previous = state.execute_ptr;
        let moved = state.relinquish(thread)?;
        self.emit_record(records::thread::RELINQUISH, &thread.raw().to_le_bytes(), true);
        self.dispatch(state, previous, moved);
        Ok(())
    }

    /// Deletes a suspended thread.
    pub fn delete_thread(&self, thread: ThreadId) -> SchedResult<()> {
        let removed = self.state.lock().remove_thread(thread)?;
        log::debug!("thread {thread} '{}' deleted", removed.name());
        Ok(())
    }

    /// Resource-subsystem hook: sets (or with `None` clears) the priority
    /// `thread` inherited while owning a resource. The effective threshold is
    /// recomputed; dispatch decisions are left to the caller.
    pub fn set_inherited_priority(&self, thread: ThreadId, inherited: Option<Priority>) -> SchedResult<()> {
        self.state.lock().set_inherited(thread, inherited)
    }

    pub fn interrupt_enter(&self) {
        self.state.lock().enter_interrupt();
    }

    /// Leaving the outermost interrupt gives the port its switch opportunity.
    pub fn interrupt_exit(&self) {
        let mut state = self.state.lock();
        let pending = state.exit_interrupt() && state.execute_ptr != state.current_thread();
        drop(state);
        if pending {
            self.port.preempt_check(Dispatch::new(&self.state));
        }
    }

    /// Snapshot of one thread's threshold state.
    pub fn thread(&self, thread: ThreadId) -> Option<ThreadControl> {
        self.state.lock().thread(thread).cloned()
    }

    pub fn execute_thread(&self) -> Option<ThreadId> {
        self.state.lock().execute_thread()
    }

    pub fn current_thread(&self) -> Option<ThreadId> {
        self.state.lock().current_thread()
    }

    pub fn highest_ready_priority(&self) -> Option<Priority> {
        self.state.lock().highest_ready_priority()
    }

    pub fn is_preempted(&self, priority: Priority) -> bool {
        self.state.lock().ledger().is_preempted(priority)
    }

    /// Runs `f` inside the critical section.
    pub fn with_state<R>(&self, f: impl FnOnce(&SchedulerState) -> R) -> R {
        f(&*self.state.lock())
    }

    pub fn with_observer<R>(&self, f: impl FnOnce(&O) -> R) -> R {
        f(&*self.observer.lock())
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn set_trace_hook(&self, trace: Option<TraceHook>) {
        *self.trace.lock() = trace;
    }

    /// Publishes a new execute thread and, once the critical section is
    /// released, lets the port switch.
    fn dispatch(&self, state: MutexGuard<'_, SchedulerState>, previous: Option<ThreadId>, moved: bool) {
        if !moved || state.execute_ptr == previous {
            return;
        }
        self.announce(&state, previous);
        drop(state);
        self.port.preempt_check(Dispatch::new(&self.state));
    }

    fn announce(&self, state: &SchedulerState, previous: Option<ThreadId>) {
        let previous_raw = previous.map_or(NO_THREAD, ThreadId::raw);
        match state.execute_ptr {
            Some(next) => {
                log::debug!("execute thread {next} (was {previous:?})");
                self.port.set_next(next);
                let payload = Payload::new()
                    .bytes(&next.raw().to_le_bytes())
                    .bytes(&previous_raw.to_le_bytes());
                self.emit_record(records::sched::NEXT, payload.as_slice(), true);
            }
            None => {
                log::debug!("no ready thread (was {previous:?})");
                self.emit_record(records::sched::IDLE, &previous_raw.to_le_bytes(), true);
            }
        }
    }

    fn emit_thread_record(&self, record: u8, thread: ThreadId, priority: Priority) {
        let payload = Payload::new()
            .bytes(&thread.raw().to_le_bytes())
            .bytes(&priority.to_le_bytes());
        self.emit_record(record, payload.as_slice(), true);
    }

    fn emit_record(&self, record: u8, payload: &[u8], timestamp: bool) {
        let trace = self.trace.lock().clone();

        if let Some(trace) = trace {
            let _ = trace(record, payload, timestamp);
        }
    }
}
