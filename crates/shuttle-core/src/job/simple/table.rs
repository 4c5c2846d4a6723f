//! Per-index task bookkeeping.
//!
//! Invariant: `launched_count == |{i : slots[i].launched}|` and
//! `finished_count == |{i : slots[i].finished}|`. Only the mutators below touch
//! the flags, and each one adjusts its counter only when the flag actually flips.

use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct TaskSlot {
    pub launched: bool,
    pub finished: bool,
    pub num_failures: u32,
    /// Hosts this index has already been handed to.
    pub blacklist: HashSet<String>,
}

#[derive(Debug, Clone)]
pub struct TaskTable {
    slots: Vec<TaskSlot>,
    launched_count: usize,
    finished_count: usize,
}

impl TaskTable {
    pub fn new(num_tasks: usize) -> Self {
        Self {
            slots: vec![TaskSlot::default(); num_tasks],
            launched_count: 0,
            finished_count: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot(&self, index: usize) -> Option<&TaskSlot> {
        self.slots.get(index)
    }

    pub fn launched_count(&self) -> usize {
        self.launched_count
    }

    pub fn finished_count(&self) -> usize {
        self.finished_count
    }

    pub fn all_finished(&self) -> bool {
        self.finished_count == self.slots.len()
    }

    /// False for an index outside the table.
    pub fn is_launched(&self, index: usize) -> bool {
        self.slot(index).is_some_and(|s| s.launched)
    }

    /// False for an index outside the table.
    pub fn is_finished(&self, index: usize) -> bool {
        self.slot(index).is_some_and(|s| s.finished)
    }

    /// Can `host` be given this index right now?
    pub fn is_eligible(&self, index: usize, host: &str) -> bool {
        self.slot(index).is_some_and(|slot| {
            !slot.launched && !slot.finished && !slot.blacklist.contains(host)
        })
    }

    /// First eligible index in `candidates`, with `host` added to its blacklist.
    pub fn claim_first(&mut self, candidates: &[usize], host: &str) -> Option<usize> {
        let index = candidates
            .iter()
            .copied()
            .find(|&i| self.is_eligible(i, host))?;
        self.slots[index].blacklist.insert(host.to_string());
        Some(index)
    }

    /// Returns false if the index was already launched.
    pub fn mark_launched(&mut self, index: usize) -> bool {
        let slot = &mut self.slots[index];
        if slot.launched {
            return false;
        }
        slot.launched = true;
        self.launched_count += 1;
        true
    }

    /// Returns false if the index was not launched.
    pub fn unlaunch(&mut self, index: usize) -> bool {
        let slot = &mut self.slots[index];
        if !slot.launched {
            return false;
        }
        slot.launched = false;
        self.launched_count -= 1;
        true
    }

    /// Returns false if the index was already finished.
    pub fn mark_finished(&mut self, index: usize) -> bool {
        let slot = &mut self.slots[index];
        if slot.finished {
            return false;
        }
        slot.finished = true;
        self.finished_count += 1;
        true
    }

    /// Count one more failure; returns the new total.
    pub fn record_failure(&mut self, index: usize) -> u32 {
        let slot = &mut self.slots[index];
        slot.num_failures += 1;
        slot.num_failures
    }

    /// Recount launched flags. If the counter drifted, fix it and return the
    /// old value.
    pub fn repair_launched_count(&mut self) -> Result<usize, usize> {
        let n = self.slots.iter().filter(|s| s.launched).count();
        if n == self.launched_count {
            Ok(n)
        } else {
            let stale = self.launched_count;
            self.launched_count = n;
            Err(stale)
        }
    }

    /// Indices that are launched and not yet finished.
    pub fn running_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.launched && !s.finished)
            .map(|(i, _)| i)
    }

    #[cfg(test)]
    pub(crate) fn force_launched_count(&mut self, n: usize) {
        self.launched_count = n;
    }
}
