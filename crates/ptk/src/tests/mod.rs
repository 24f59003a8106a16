use std::sync::Mutex;

use crate::perf::PerformanceCounters;
use crate::port::{Dispatch, SchedulerPort};
use crate::{PreemptionEngine, Priority, SchedulerConfig, ThreadId, ThreadSpec};

mod threshold;

pub(crate) fn p(raw: u16) -> Priority {
    Priority::new(raw)
}

/// Port that records every hand-off and then switches like the hosted port.
#[derive(Default)]
pub(crate) struct RecordingPort {
    pub(crate) next: Mutex<Vec<ThreadId>>,
    /// Whether the critical section was free at each `preempt_check`.
    pub(crate) checks: Mutex<Vec<bool>>,
}

impl RecordingPort {
    pub(crate) fn check_count(&self) -> usize {
        self.checks.lock().unwrap().len()
    }
}

impl SchedulerPort for RecordingPort {
    fn set_next(&self, next: ThreadId) {
        self.next.lock().unwrap().push(next);
    }

    fn preempt_check(&self, dispatch: Dispatch<'_>) {
        self.checks
            .lock()
            .unwrap()
            .push(dispatch.is_critical_section_free());
        dispatch.switch_context();
    }
}

pub(crate) type TestEngine = PreemptionEngine<RecordingPort, PerformanceCounters>;

pub(crate) fn engine_with(config: SchedulerConfig) -> TestEngine {
    PreemptionEngine::builder()
        .config(config)
        .port(RecordingPort::default())
        .observer(PerformanceCounters::new())
        .build()
        .expect("valid config")
}

pub(crate) fn engine() -> TestEngine {
    engine_with(
        SchedulerConfig::builder()
            .performance_info(true)
            .build()
            .expect("valid config"),
    )
}

pub(crate) fn start(engine: &TestEngine, name: &'static str, priority: u16, threshold: u16) -> ThreadId {
    engine
        .create_thread(
            ThreadSpec::new(name, p(priority))
                .threshold(p(threshold))
                .auto_start(),
        )
        .expect("thread created")
}
