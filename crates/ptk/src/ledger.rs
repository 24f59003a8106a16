//! Thread table plus the preempted-by-threshold map.
//!
//! A bit in the preempted map says the head thread of that priority is ready
//! but was pushed aside while it held a graded threshold; the dispatcher
//! consults it to hand the CPU back before less urgent threads that the
//! threshold was shielding against.

use crate::bitmap::PriorityBitmap;
use crate::priority::Priority;
use crate::thread::{ThreadControl, ThreadId};

pub struct ThresholdLedger {
    threads: Vec<Option<ThreadControl>>,
    preempted: PriorityBitmap,
}

impl ThresholdLedger {
    pub fn new(max_priorities: u16) -> Self {
        Self {
            threads: Vec::new(),
            preempted: PriorityBitmap::new(max_priorities),
        }
    }

    /// Id the next `register` call will hand out.
    pub(crate) fn next_id(&self) -> ThreadId {
        let index = self
            .threads
            .iter()
            .position(Option::is_none)
            .unwrap_or(self.threads.len());
        ThreadId(index as u32)
    }

    /// Stores a new thread, reusing the first free slot.
    pub(crate) fn register(
        &mut self,
        name: &'static str,
        priority: Priority,
        threshold: Priority,
    ) -> ThreadId {
        let id = self.next_id();
        let index = id.index();
        if index == self.threads.len() {
            self.threads.push(None);
        }
        self.threads[index] = Some(ThreadControl::new(id, name, priority, threshold));
        id
    }

    pub(crate) fn remove(&mut self, id: ThreadId) -> Option<ThreadControl> {
        self.threads.get_mut(id.index()).and_then(Option::take)
    }

    pub fn get(&self, id: ThreadId) -> Option<&ThreadControl> {
        self.threads.get(id.index()).and_then(Option::as_ref)
    }

    pub(crate) fn get_mut(&mut self, id: ThreadId) -> Option<&mut ThreadControl> {
        self.threads.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ThreadControl> {
        self.threads.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn preempted_map(&self) -> &PriorityBitmap {
        &self.preempted
    }

    pub(crate) fn mark_preempted(&mut self, prio: Priority) {
        self.preempted.set(prio);
    }

    pub(crate) fn clear_preempted(&mut self, prio: Priority) {
        self.preempted.clear(prio);
    }

    pub fn is_preempted(&self, prio: Priority) -> bool {
        self.preempted.is_set(prio)
    }

    pub fn lowest_preempted(&self) -> Option<Priority> {
        self.preempted.lowest_set()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_are_reused_after_remove() {
        let mut ledger = ThresholdLedger::new(32);
        let a = ledger.register("a", Priority::new(5), Priority::new(5));
        let b = ledger.register("b", Priority::new(6), Priority::new(2));
        assert_ne!(a, b);
        assert_eq!(ledger.len(), 2);

        let removed = ledger.remove(a).expect("thread a registered");
        assert_eq!(removed.name(), "a");
        assert!(ledger.get(a).is_none());

        let c = ledger.register("c", Priority::new(7), Priority::new(7));
        assert_eq!(c, a);
        assert_eq!(ledger.get(c).map(ThreadControl::name), Some("c"));
    }

    #[test]
    fn preempted_map_tracks_marks() {
        let mut ledger = ThresholdLedger::new(64);
        ledger.mark_preempted(Priority::new(40));
        ledger.mark_preempted(Priority::new(12));
        assert_eq!(ledger.lowest_preempted(), Some(Priority::new(12)));

        ledger.clear_preempted(Priority::new(12));
        assert!(ledger.is_preempted(Priority::new(40)));
        assert_eq!(ledger.lowest_preempted(), Some(Priority::new(40)));
    }
}
