//! # ptk
//!
//! Preemption-threshold scheduling core for a small single-core real-time
//! kernel.
//!
//! Every thread carries, next to its fixed priority, a *preemption threshold*:
//! while it runs, only threads more urgent than the threshold may preempt it.
//! The crate keeps the ready-map, the preempted-by-threshold map and the
//! per-thread threshold ledger consistent, and decides when a threshold
//! change must hand the CPU to another thread.
//!
//! ## Module Overview
//! - [`bitmap`] – single/two-level priority bitmaps.
//! - [`ready`]  – per-priority ready rings and the ready-map.
//! - [`thread`], [`ledger`] – per-thread thresholds and the preempted-map.
//! - [`state`]  – scheduler globals and the ready-queue manager.
//! - [`engine`] – `change_threshold` and the critical-section discipline.
//! - [`port`]   – hand-off to the low-level context switch.
//! - [`perf`], [`trace`] – optional observers.

pub mod bitmap;
pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod perf;
pub mod port;
pub mod priority;
pub mod ready;
pub mod state;
pub mod sync;
pub mod thread;
pub mod trace;

pub use bitmap::PriorityBitmap;
pub use config::{SchedulerConfig, SchedulerConfigBuilder};
pub use engine::{EngineBuilder, PreemptionEngine};
pub use error::{ConfigError, SchedError, SchedResult};
pub use ledger::ThresholdLedger;
pub use perf::{NoObserver, PerformanceCounters, PreemptionEvent, PreemptionObserver};
pub use port::{Dispatch, HostedPort, SchedulerPort};
pub use priority::Priority;
pub use ready::{ReadyQueue, ReadyRing};
pub use state::{ContextSwitch, SchedulerState};
pub use thread::{ThreadControl, ThreadId, ThreadSpec, ThreadState};
pub use trace::{TraceError, TraceHook};

#[cfg(test)]
mod tests;
