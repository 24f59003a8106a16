//! Priority levels.
//!
//! Lower numbers are more urgent: `Priority(0)` is the highest urgency the
//! kernel knows. The derived `Ord` is numeric, so `a < b` reads as "`a` is more
//! urgent than `b`".

use core::fmt;

/// Number of priority levels covered by one bitmap word.
pub const PRIORITIES_PER_GROUP: u16 = 32;

/// Largest supported priority range.
pub const MAX_PRIORITY_LIMIT: u16 = 1024;

/// A scheduling priority or preemption threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Priority(u16);

impl Priority {
    /// The most urgent priority. As a threshold it disables all preemption.
    pub const HIGHEST: Priority = Priority(0);

    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Index of the 32-level group this priority falls into.
    pub const fn group(self) -> usize {
        (self.0 / PRIORITIES_PER_GROUP) as usize
    }

    /// Bit mask of this priority inside its group word.
    pub const fn group_bit(self) -> u32 {
        1u32 << (self.0 % PRIORITIES_PER_GROUP)
    }

    /// Returns true if `self` would preempt a thread running at `other`.
    pub const fn is_more_urgent_than(self, other: Priority) -> bool {
        self.0 < other.0
    }

    pub(crate) const fn from_group(group: usize, bit: u32) -> Self {
        Self(group as u16 * PRIORITIES_PER_GROUP + bit as u16)
    }

    pub(crate) fn to_le_bytes(self) -> [u8; 2] {
        self.0.to_le_bytes()
    }
}

impl From<u16> for Priority {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shorthand for building a [`Priority`] from a literal.
#[macro_export]
macro_rules! prio {
    ($value:expr) => {
        $crate::Priority::new($value)
    };
}
