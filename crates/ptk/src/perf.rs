//! Performance information about threshold preemptions.
//!
//! The engine reports every preemption it causes through
//! [`PreemptionObserver`] when `performance_info` is enabled. Observers only
//! count; they never influence the scheduling decision.

use std::collections::BTreeMap;

use heapless::HistoryBuffer;

use crate::priority::Priority;
use crate::thread::ThreadId;

/// Default number of entries kept in the execute log.
pub const EXECUTE_LOG_SIZE: usize = 8;

/// A preemption caused by lowering a preemption threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreemptionEvent {
    /// Thread that changed its threshold and is losing the CPU.
    pub preempted: ThreadId,
    /// Head of the highest ready priority, the new execute thread.
    pub preempting: ThreadId,
    /// Priority of the preempting thread.
    pub priority: Priority,
    /// Raised from thread context rather than from an interrupt handler.
    pub solicited: bool,
    /// Execute thread in effect just before the change.
    pub previous_execute: Option<ThreadId>,
}

pub trait PreemptionObserver: Send {
    fn on_threshold_preemption(&mut self, event: &PreemptionEvent);
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoObserver;

impl PreemptionObserver for NoObserver {
    fn on_threshold_preemption(&mut self, _event: &PreemptionEvent) {}
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ThreadPerformance {
    pub solicited_preemptions: u32,
    pub last_preempting_thread: Option<ThreadId>,
}

/// Counters plus an `N`-entry circular log of execute threads.
pub struct PerformanceCounters<const N: usize = EXECUTE_LOG_SIZE> {
    total_preemptions: u32,
    solicited_preemptions: u32,
    threads: BTreeMap<ThreadId, ThreadPerformance>,
    execute_log: HistoryBuffer<ThreadId, N>,
}

impl<const N: usize> PerformanceCounters<N> {
    pub fn new() -> Self {
        Self {
            total_preemptions: 0,
            solicited_preemptions: 0,
            threads: BTreeMap::new(),
            execute_log: HistoryBuffer::new(),
        }
    }

    pub fn total_preemptions(&self) -> u32 {
        self.total_preemptions
    }

    pub fn solicited_preemptions(&self) -> u32 {
        self.solicited_preemptions
    }

    pub fn thread(&self, id: ThreadId) -> ThreadPerformance {
        self.threads.get(&id).copied().unwrap_or_default()
    }

    /// Logged execute threads, oldest first.
    pub fn execute_log(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.execute_log.oldest_ordered().copied()
    }

    pub fn execute_log_len(&self) -> usize {
        self.execute_log.len()
    }
}

impl<const N: usize> Default for PerformanceCounters<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> PreemptionObserver for PerformanceCounters<N> {
    fn on_threshold_preemption(&mut self, event: &PreemptionEvent) {
        self.total_preemptions = self.total_preemptions.wrapping_add(1);

        let entry = self.threads.entry(event.preempted).or_default();
        if event.solicited {
            self.solicited_preemptions = self.solicited_preemptions.wrapping_add(1);
            entry.solicited_preemptions = entry.solicited_preemptions.wrapping_add(1);
        }
        entry.last_preempting_thread = Some(event.preempting);

        // Only log a change of execute thread.
        if let Some(previous) = event.previous_execute {
            if self.execute_log.recent() != Some(&previous) {
                self.execute_log.write(previous);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(preempted: u32, preempting: u32, solicited: bool) -> PreemptionEvent {
        PreemptionEvent {
            preempted: ThreadId(preempted),
            preempting: ThreadId(preempting),
            priority: Priority::new(1),
            solicited,
            previous_execute: Some(ThreadId(preempted)),
        }
    }

    #[test]
    fn counts_solicited_and_unsolicited() {
        let mut counters: PerformanceCounters = PerformanceCounters::new();
        counters.on_threshold_preemption(&event(1, 2, true));
        counters.on_threshold_preemption(&event(1, 3, false));

        assert_eq!(counters.total_preemptions(), 2);
        assert_eq!(counters.solicited_preemptions(), 1);

        let thread = counters.thread(ThreadId(1));
        assert_eq!(thread.solicited_preemptions, 1);
        assert_eq!(thread.last_preempting_thread, Some(ThreadId(3)));
        assert_eq!(counters.thread(ThreadId(9)), ThreadPerformance::default());
    }

    #[test]
    fn execute_log_skips_repeats_and_wraps() {
        let mut counters: PerformanceCounters<3> = PerformanceCounters::new();
        for preempted in [1, 1, 2, 3, 4] {
            counters.on_threshold_preemption(&event(preempted, 0, true));
        }

        let log: Vec<ThreadId> = counters.execute_log().collect();
        assert_eq!(log, vec![ThreadId(2), ThreadId(3), ThreadId(4)]);
        assert_eq!(counters.execute_log_len(), 3);
    }
}
