//! Priority bitmaps with constant-time "most urgent set priority" lookup.
//!
//! Up to 32 priorities fit in one word and lookup is a single trailing-zero
//! count. Larger ranges use a two-level layout: a group-active word whose bit
//! `g` says that group `g`'s 32-bit sub-map is non-empty, plus one sub-map per
//! group. Every `set`/`clear` then touches both levels, but lookup stays two
//! trailing-zero counts regardless of the range.
//!
//! Priorities outside the bitmap's capacity are a caller contract violation and
//! trip an assertion.

use crate::priority::{Priority, MAX_PRIORITY_LIMIT, PRIORITIES_PER_GROUP};

const MAX_GROUPS: usize = (MAX_PRIORITY_LIMIT / PRIORITIES_PER_GROUP) as usize;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Layout {
    Single(u32),
    TwoLevel {
        active: u32,
        maps: [u32; MAX_GROUPS],
        groups: usize,
    },
}

/// Set of occupied priorities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityBitmap {
    capacity: u16,
    layout: Layout,
}

impl PriorityBitmap {
    /// Creates an empty bitmap covering `[0, capacity)`.
    ///
    /// # Panics
    ///
    /// Panics unless `capacity` is a non-zero multiple of 32 no larger than
    /// 1024. [`SchedulerConfig`](crate::SchedulerConfig) validates this before
    /// any bitmap is built.
    pub fn new(capacity: u16) -> Self {
        assert!(
            capacity >= PRIORITIES_PER_GROUP
                && capacity <= MAX_PRIORITY_LIMIT
                && capacity % PRIORITIES_PER_GROUP == 0,
            "bitmap capacity {capacity} must be a multiple of 32 in 32..=1024"
        );

        let layout = if capacity == PRIORITIES_PER_GROUP {
            Layout::Single(0)
        } else {
            Layout::TwoLevel {
                active: 0,
                maps: [0; MAX_GROUPS],
                groups: (capacity / PRIORITIES_PER_GROUP) as usize,
            }
        };

        Self { capacity, layout }
    }

    pub fn capacity(&self) -> u16 {
        self.capacity
    }

    /// Returns true when the two-level layout is in use.
    pub fn is_two_level(&self) -> bool {
        matches!(self.layout, Layout::TwoLevel { .. })
    }

    pub fn set(&mut self, prio: Priority) {
        self.assert_range(prio);
        match &mut self.layout {
            Layout::Single(word) => *word |= prio.group_bit(),
            Layout::TwoLevel { active, maps, .. } => {
                let group = prio.group();
                *active |= 1u32 << group;
                maps[group] |= prio.group_bit();
            }
        }
    }

    pub fn clear(&mut self, prio: Priority) {
        self.assert_range(prio);
        match &mut self.layout {
            Layout::Single(word) => *word &= !prio.group_bit(),
            Layout::TwoLevel { active, maps, .. } => {
                let group = prio.group();
                maps[group] &= !prio.group_bit();
                if maps[group] == 0 {
                    *active &= !(1u32 << group);
                }
            }
        }
    }

    pub fn is_set(&self, prio: Priority) -> bool {
        self.assert_range(prio);
        self.group_map(prio.group()) & prio.group_bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        match &self.layout {
            Layout::Single(word) => *word == 0,
            Layout::TwoLevel { active, .. } => *active == 0,
        }
    }

    /// Returns the most urgent (numerically smallest) set priority.
    pub fn lowest_set(&self) -> Option<Priority> {
        match &self.layout {
            Layout::Single(0) => None,
            Layout::Single(word) => Some(Priority::from_group(0, word.trailing_zeros())),
            Layout::TwoLevel { active: 0, .. } => None,
            Layout::TwoLevel { active, maps, .. } => {
                let group = active.trailing_zeros() as usize;
                Some(Priority::from_group(group, maps[group].trailing_zeros()))
            }
        }
    }

    /// Group-active bit for group `group`. A single-level bitmap reports its
    /// only group as active whenever it is non-empty.
    pub fn group_active(&self, group: usize) -> bool {
        match &self.layout {
            Layout::Single(word) => group == 0 && *word != 0,
            Layout::TwoLevel { active, groups, .. } => {
                group < *groups && active & (1u32 << group) != 0
            }
        }
    }

    /// Raw 32-bit sub-map for `group`, zero for groups past the capacity.
    pub fn group_map(&self, group: usize) -> u32 {
        match &self.layout {
            Layout::Single(word) if group == 0 => *word,
            Layout::Single(_) => 0,
            Layout::TwoLevel { maps, groups, .. } if group < *groups => maps[group],
            Layout::TwoLevel { .. } => 0,
        }
    }

    /// Number of 32-priority groups.
    pub fn groups(&self) -> usize {
        (self.capacity / PRIORITIES_PER_GROUP) as usize
    }

    /// Iterates set priorities from most to least urgent.
    pub fn iter(&self) -> impl Iterator<Item = Priority> + '_ {
        (0..self.groups()).flat_map(move |group| {
            let mut map = self.group_map(group);
            core::iter::from_fn(move || {
                if map == 0 {
                    return None;
                }
                let bit = map.trailing_zeros();
                map &= map - 1;
                Some(Priority::from_group(group, bit))
            })
        })
    }

    fn assert_range(&self, prio: Priority) {
        assert!(
            prio.raw() < self.capacity,
            "priority {prio} exceeds supported range 0..{}",
            self.capacity
        );
    }
}
