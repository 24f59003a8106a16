//! Per-thread threshold bookkeeping.

use core::fmt;

use crate::priority::Priority;

/// Identifier of a thread registered with the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(pub u32);

impl ThreadId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    Ready,
    Running,
    Suspended,
}

impl ThreadState {
    /// Ready and Running threads both sit in their priority's ready ring.
    pub fn is_ready(self) -> bool {
        matches!(self, Self::Ready | Self::Running)
    }

    pub(crate) fn code(self) -> u8 {
        match self {
            Self::Ready => 0,
            Self::Running => 1,
            Self::Suspended => 2,
        }
    }
}

/// Parameters for registering a thread.
#[derive(Debug, Clone, Copy)]
pub struct ThreadSpec {
    pub name: &'static str,
    pub priority: Priority,
    pub threshold: Priority,
    pub auto_start: bool,
}

impl ThreadSpec {
    /// A thread with no threshold (threshold equal to its priority) that starts
    /// suspended.
    pub fn new(name: &'static str, priority: Priority) -> Self {
        Self {
            name,
            priority,
            threshold: priority,
            auto_start: false,
        }
    }

    pub fn threshold(mut self, threshold: Priority) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn auto_start(mut self) -> Self {
        self.auto_start = true;
        self
    }
}

/// Threshold state owned by one thread.
#[derive(Debug, Clone)]
pub struct ThreadControl {
    id: ThreadId,
    name: &'static str,
    priority: Priority,
    user_threshold: Priority,
    effective_threshold: Priority,
    inherited_priority: Priority,
    state: ThreadState,
}

impl ThreadControl {
    pub(crate) fn new(id: ThreadId, name: &'static str, priority: Priority, threshold: Priority) -> Self {
        debug_assert!(threshold <= priority);
        Self {
            id,
            name,
            priority,
            user_threshold: threshold,
            effective_threshold: threshold,
            inherited_priority: priority,
            state: ThreadState::Suspended,
        }
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Threshold last requested by the thread's owner.
    pub fn user_threshold(&self) -> Priority {
        self.user_threshold
    }

    /// Threshold actually enforced by the dispatcher.
    pub fn effective_threshold(&self) -> Priority {
        self.effective_threshold
    }

    pub fn inherited_priority(&self) -> Priority {
        self.inherited_priority
    }

    pub fn state(&self) -> ThreadState {
        self.state
    }

    /// True when the enforced threshold shields against priorities more urgent
    /// than the thread's own.
    pub fn is_threshold_active(&self) -> bool {
        self.effective_threshold != self.priority
    }

    /// Stores `threshold` as the user threshold and returns the previous one.
    pub(crate) fn apply_threshold(&mut self, threshold: Priority) -> Priority {
        let old = core::mem::replace(&mut self.user_threshold, threshold);
        self.recompute_effective();
        old
    }

    pub(crate) fn set_inherited(&mut self, inherited: Priority) {
        self.inherited_priority = inherited;
        self.recompute_effective();
    }

    pub(crate) fn set_state(&mut self, state: ThreadState) {
        self.state = state;
    }

    // Inheritance wins whenever it is more urgent than the requested threshold.
    fn recompute_effective(&mut self) {
        self.effective_threshold = self.user_threshold.min(self.inherited_priority);
    }
}
