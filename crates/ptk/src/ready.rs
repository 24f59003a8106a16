//! Ready rings and the ready-map.

use std::collections::VecDeque;

use crate::bitmap::PriorityBitmap;
use crate::priority::Priority;
use crate::thread::ThreadId;

/// Circular list of ready threads sharing one priority. The front is the head,
/// the next thread to receive the CPU at this priority.
#[derive(Debug, Default, Clone)]
pub struct ReadyRing {
    members: VecDeque<ThreadId>,
}

impl ReadyRing {
    pub fn head(&self) -> Option<ThreadId> {
        self.members.front().copied()
    }

    pub fn push_back(&mut self, id: ThreadId) {
        debug_assert!(!self.members.contains(&id), "thread {id} already in ring");
        self.members.push_back(id);
    }

    /// Removes `id`; returns false when it was not a member.
    pub fn remove(&mut self, id: ThreadId) -> bool {
        match self.members.iter().position(|member| *member == id) {
            Some(index) => {
                self.members.remove(index);
                true
            }
            None => false,
        }
    }

    /// Advances the head by one (round-robin) and returns the new head.
    pub fn rotate(&mut self) -> Option<ThreadId> {
        if self.members.len() > 1 {
            self.members.rotate_left(1);
        }
        self.head()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.members.iter().copied()
    }
}

/// All ready rings plus the ready-map and the cached highest ready priority.
pub struct ReadyQueue {
    rings: Vec<ReadyRing>,
    map: PriorityBitmap,
    highest: Option<Priority>,
}

impl ReadyQueue {
    pub fn new(max_priorities: u16) -> Self {
        Self {
            rings: vec![ReadyRing::default(); max_priorities as usize],
            map: PriorityBitmap::new(max_priorities),
            highest: None,
        }
    }

    /// Appends `id` at the tail of its ring. Returns true if the ring was empty.
    pub fn insert(&mut self, prio: Priority, id: ThreadId) -> bool {
        let ring = &mut self.rings[prio.raw() as usize];
        let was_empty = ring.is_empty();
        ring.push_back(id);
        if was_empty {
            self.map.set(prio);
            self.refresh_highest();
        }
        was_empty
    }

    /// Removes `id` from its ring. Returns true if the ring became empty.
    pub fn remove(&mut self, prio: Priority, id: ThreadId) -> bool {
        let ring = &mut self.rings[prio.raw() as usize];
        if !ring.remove(id) {
            return false;
        }
        let emptied = ring.is_empty();
        if emptied {
            self.map.clear(prio);
            self.refresh_highest();
        }
        emptied
    }

    pub fn head(&self, prio: Priority) -> Option<ThreadId> {
        self.rings[prio.raw() as usize].head()
    }

    pub fn rotate(&mut self, prio: Priority) -> Option<ThreadId> {
        self.rings[prio.raw() as usize].rotate()
    }

    pub fn ring(&self, prio: Priority) -> &ReadyRing {
        &self.rings[prio.raw() as usize]
    }

    /// Most urgent priority with a ready thread.
    pub fn highest_ready_priority(&self) -> Option<Priority> {
        self.highest
    }

    /// Head of the most urgent non-empty ring.
    pub fn highest_ready_thread(&self) -> Option<ThreadId> {
        self.highest.and_then(|prio| self.head(prio))
    }

    pub fn is_ready(&self, prio: Priority) -> bool {
        self.map.is_set(prio)
    }

    pub fn ready_map(&self) -> &PriorityBitmap {
        &self.map
    }

    fn refresh_highest(&mut self) {
        self.highest = self.map.lowest_set();
    }
}
