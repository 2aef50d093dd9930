//! Cross-thread node marking for Lazy SMP.
//!
//! Each worker marks the position key it is about to search into a shared,
//! fixed-size table, and clears the mark on the way back out. A worker that
//! finds another thread's mark still on a child key it's about to search
//! knows that child is (or very recently was) being explored elsewhere, and
//! can lean on that as a soft LMR hint. Lookups and marks are relaxed and
//! best-effort: a stale read or a hash collision on the table index costs a
//! slightly worse reduction guess, never correctness, since the negamax
//! window itself is still the source of truth.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

const SENTINEL_THREAD: i64 = -1;
const TABLE_BITS: u32 = 13;
const TABLE_SIZE: usize = 1 << TABLE_BITS;
const TABLE_MASK: u64 = (TABLE_SIZE as u64) - 1;

struct Slot {
    thread_id: AtomicI64,
    key: AtomicU64,
}

/// Shared table of which thread is currently searching which position key.
pub struct ThreadMarkTable {
    slots: Box<[Slot]>,
}

impl ThreadMarkTable {
    pub fn new() -> Self {
        let slots = (0..TABLE_SIZE)
            .map(|_| Slot {
                thread_id: AtomicI64::new(SENTINEL_THREAD),
                key: AtomicU64::new(0),
            })
            .collect();
        Self { slots }
    }

    #[inline]
    fn index(key: u64) -> usize {
        (key & TABLE_MASK) as usize
    }

    /// Mark `key` as being searched by `thread_id`, overwriting whatever was
    /// there (a hash collision just evicts the older, less-relevant mark).
    pub fn mark(&self, thread_id: usize, key: u64) {
        let slot = &self.slots[Self::index(key)];
        slot.key.store(key, Ordering::Relaxed);
        slot.thread_id.store(thread_id as i64, Ordering::Relaxed);
    }

    /// Clear `thread_id`'s mark on `key`, but only if it's still the one
    /// sitting there — a newer mark from another thread on the same slot
    /// (after a collision) is left alone.
    pub fn unmark(&self, thread_id: usize, key: u64) {
        let slot = &self.slots[Self::index(key)];
        if slot.key.load(Ordering::Relaxed) == key
            && slot.thread_id.load(Ordering::Relaxed) == thread_id as i64
        {
            slot.thread_id.store(SENTINEL_THREAD, Ordering::Relaxed);
        }
    }

    /// `true` if some thread other than `thread_id` is currently marked as
    /// searching `key`.
    pub fn marked_by_other(&self, thread_id: usize, key: u64) -> bool {
        let slot = &self.slots[Self::index(key)];
        let marker = slot.thread_id.load(Ordering::Relaxed);
        marker != SENTINEL_THREAD
            && marker != thread_id as i64
            && slot.key.load(Ordering::Relaxed) == key
    }
}

impl Default for ThreadMarkTable {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard: marks a node on construction, unmarks it on drop regardless
/// of which of negamax's many return points is taken.
pub struct NodeMark<'a> {
    table: &'a ThreadMarkTable,
    thread_id: usize,
    key: u64,
}

impl<'a> NodeMark<'a> {
    pub fn enter(table: &'a ThreadMarkTable, thread_id: usize, key: u64) -> Self {
        table.mark(thread_id, key);
        Self { table, thread_id, key }
    }
}

impl Drop for NodeMark<'_> {
    fn drop(&mut self) {
        self.table.unmark(self.thread_id, self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmarked_key_is_not_marked_by_other() {
        let table = ThreadMarkTable::new();
        assert!(!table.marked_by_other(0, 12345));
    }

    #[test]
    fn mark_is_visible_to_other_threads_only() {
        let table = ThreadMarkTable::new();
        table.mark(1, 999);
        assert!(table.marked_by_other(0, 999));
        assert!(!table.marked_by_other(1, 999));
    }

    #[test]
    fn guard_unmarks_on_drop() {
        let table = ThreadMarkTable::new();
        {
            let _guard = NodeMark::enter(&table, 2, 42);
            assert!(table.marked_by_other(0, 42));
        }
        assert!(!table.marked_by_other(0, 42));
    }

    #[test]
    fn unmark_leaves_a_newer_mark_from_another_thread_alone() {
        let table = ThreadMarkTable::new();
        table.mark(1, 7);
        table.mark(2, 7);
        table.unmark(1, 7);
        assert!(table.marked_by_other(0, 7));
    }
}
