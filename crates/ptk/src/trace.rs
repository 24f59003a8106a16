//! Binary trace records emitted by the scheduler.
//!
//! The hook receives a record id, a little-endian payload and whether the
//! sink should timestamp it. Sinks are optional and their failures never
//! change a scheduling decision.

use std::sync::Arc;

use thiserror::Error;

/// Largest payload the scheduler ever emits.
pub const MAX_PAYLOAD_LEN: usize = 16;

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(usize),
    #[error("trace sink rejected record: {0}")]
    Sink(&'static str),
}

pub type TraceResult = Result<(), TraceError>;

pub type TraceHook = Arc<dyn Fn(u8, &[u8], bool) -> TraceResult + Send + Sync>;

/// Record identifiers.
pub mod records {
    /// Thread service records.
    pub mod thread {
        /// Threshold change requested: thread u32, new threshold u16,
        /// effective threshold u16, state u8.
        pub const PREEMPTION_CHANGE: u8 = 60;
        /// Thread made ready: thread u32, priority u16.
        pub const RESUME: u8 = 61;
        /// Thread suspended: thread u32, priority u16.
        pub const SUSPEND: u8 = 62;
        /// Running thread yielded: thread u32.
        pub const RELINQUISH: u8 = 63;
    }

    /// Scheduler records.
    pub mod sched {
        /// New execute thread: next u32, previous u32 (`u32::MAX` for none).
        pub const NEXT: u8 = 52;
        /// Nothing left to run: previous u32.
        pub const IDLE: u8 = 53;
    }
}

/// Fixed-capacity payload builder.
#[derive(Default)]
pub(crate) struct Payload {
    buf: heapless::Vec<u8, MAX_PAYLOAD_LEN>,
}

impl Payload {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn bytes(mut self, bytes: &[u8]) -> Self {
        // Capacity covers every record above; overflow is a programming error.
        let pushed = self.buf.extend_from_slice(bytes);
        debug_assert!(pushed.is_ok(), "trace payload exceeds {MAX_PAYLOAD_LEN} bytes");
        self
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        &self.buf
    }
}
