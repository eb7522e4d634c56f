//! Linear-probing LRU pool with tombstone deletion.
//!
//! Entries never move once placed, so each slot's value is simply its array
//! position. A removed entry leaves a tombstone that keeps later probe chains
//! intact; lookups skip tombstones and stop at the first plain free slot.
//! Insertions reuse the first free-or-tombstoned slot on the key's chain.

use crate::error::{InvariantError, Result};
use crate::lru::list::SlotList;
use crate::lru::robin::check_lists;
use crate::lru::slot::{distance, home_of, max_size_bits_with_tombstone, Slot, Word};
use crate::lru::{dump_slots, max_size_for, Evicted, GetOrPut, TraversalOrder};
use crate::Error;

/// Linear-probing LRU pool handing out slot indices in `0..capacity`.
pub struct BitsLinearProbeLruPool<const SIZE_BITS: u32, W: Word = u32> {
    slots: Box<[Slot<W, SIZE_BITS>]>,
    mru: SlotList,
    free: SlotList,
    max_size: usize,
}

impl<const SIZE_BITS: u32, W: Word> BitsLinearProbeLruPool<SIZE_BITS, W> {
    const CAPACITY: usize = 1 << SIZE_BITS;
    const MASK: usize = Self::CAPACITY - 1;
    const VALID_SIZE_BITS: () = assert!(
        SIZE_BITS >= 1 && SIZE_BITS <= max_size_bits_with_tombstone::<W>(),
        "SIZE_BITS out of range for this machine word"
    );

    /// Creates an empty pool of `2^SIZE_BITS` slots holding at most
    /// `floor(load_factor * capacity)` live entries (clamped to
    /// `[1, capacity - 1]`).
    pub fn new(load_factor: f32) -> Self {
        let () = Self::VALID_SIZE_BITS;
        let mut pool = Self {
            slots: (0..Self::CAPACITY).map(Slot::vacant).collect(),
            mru: SlotList::new(),
            free: SlotList::new(),
            max_size: max_size_for(load_factor, Self::CAPACITY),
        };
        pool.clear();
        pool
    }

    /// Position of `key`, skipping tombstones and stopping at a plain free
    /// slot.
    fn find(&self, key: W) -> Option<usize> {
        let mut pos = home_of::<W, SIZE_BITS>(key);
        for _ in 0..Self::CAPACITY {
            let slot = self.slots[pos];
            if slot.is_free() {
                if !slot.is_tombstone() {
                    return None;
                }
            } else if slot.key == key {
                return Some(pos);
            }
            pos = (pos + 1) & Self::MASK;
        }
        None
    }

    /// First free or tombstoned slot on `key`'s probe chain.
    fn first_free_pos(&self, key: W) -> Option<usize> {
        let mut pos = home_of::<W, SIZE_BITS>(key);
        for _ in 0..Self::CAPACITY {
            if self.slots[pos].is_free() {
                return Some(pos);
            }
            pos = (pos + 1) & Self::MASK;
        }
        None
    }

    fn remove_at(&mut self, pos: usize) -> usize {
        self.mru.detach(&mut self.slots, pos);
        let slot = &mut self.slots[pos];
        slot.set_free(true);
        slot.set_tombstone(true);
        self.free.push_front(&mut self.slots, pos);
        self.reclaim_tombstones(pos);
        pos
    }

    /// A tombstone directly followed by a plain free slot ends every chain
    /// that reaches it, so it and the tombstones before it can go plain.
    fn reclaim_tombstones(&mut self, pos: usize) {
        let next = self.slots[(pos + 1) & Self::MASK];
        if !next.is_free() || next.is_tombstone() {
            return;
        }
        let mut pos = pos;
        for _ in 0..Self::CAPACITY {
            let slot = &mut self.slots[pos];
            if !(slot.is_free() && slot.is_tombstone()) {
                break;
            }
            slot.set_tombstone(false);
            pos = (pos + Self::MASK) & Self::MASK;
        }
    }

    fn evict_if_full(&mut self) -> Option<Evicted<W>> {
        if self.mru.len() < self.max_size {
            return None;
        }
        let tail = self.mru.tail(&self.slots)?;
        let key = self.slots[tail].key;
        let value = self.remove_at(tail);
        Some(Evicted { key, value })
    }

    /// Returns the value for `key`, inserting it if absent.
    ///
    /// A hit moves `key` to the MRU head. A miss first evicts the LRU entry
    /// if the pool is at [`max_size`](Self::max_size), then claims the first
    /// free or tombstoned slot on the key's probe chain.
    ///
    /// # Errors
    ///
    /// [`Error::PoolExhausted`] if no free slot exists anywhere in the table.
    pub fn get_or_put(&mut self, key: W) -> Result<GetOrPut<W>> {
        if let Some(pos) = self.find(key) {
            self.mru.move_to_front(&mut self.slots, pos);
            return Ok(GetOrPut {
                value: self.slots[pos].value(),
                evicted: None,
                is_active: true,
            });
        }

        let evicted = self.evict_if_full();
        let pos = self.first_free_pos(key).ok_or(Error::PoolExhausted)?;
        self.free.detach(&mut self.slots, pos);
        let slot = &mut self.slots[pos];
        slot.key = key;
        slot.set_free(false);
        slot.set_tombstone(false);
        self.mru.push_front(&mut self.slots, pos);
        Ok(GetOrPut {
            value: self.slots[pos].value(),
            evicted,
            is_active: false,
        })
    }

    /// Returns the value for `key` and marks it most recently used.
    pub fn get(&mut self, key: W) -> Option<usize> {
        let pos = self.find(key)?;
        self.mru.move_to_front(&mut self.slots, pos);
        Some(self.slots[pos].value())
    }

    /// Returns `true` if `key` is live.
    pub fn has(&self, key: W) -> bool {
        self.find(key).is_some()
    }

    /// Removes `key`, leaving a tombstone, and returns its value.
    pub fn remove(&mut self, key: W) -> Option<usize> {
        let pos = self.find(key)?;
        Some(self.remove_at(pos))
    }

    /// Drops every entry and clears all tombstones.
    pub fn clear(&mut self) {
        self.mru.clear();
        self.free.clear();
        for pos in (0..Self::CAPACITY).rev() {
            self.slots[pos] = Slot::vacant(pos);
            self.free.push_front(&mut self.slots, pos);
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.mru.len()
    }

    /// Returns `true` if there are no live entries.
    pub fn is_empty(&self) -> bool {
        self.mru.len() == 0
    }

    /// Live-entry ceiling above which insertions evict.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Number of slots, `2^SIZE_BITS`.
    pub const fn capacity(&self) -> usize {
        Self::CAPACITY
    }

    /// Number of tombstoned slots.
    pub fn tombstones(&self) -> usize {
        self.slots.iter().filter(|s| s.is_tombstone()).count()
    }

    /// Live `(key, value)` pairs from most to least recently used.
    pub fn iter(&self) -> impl Iterator<Item = (W, usize)> + '_ {
        self.mru
            .iter(&self.slots)
            .map(|pos| (self.slots[pos].key, self.slots[pos].value()))
    }

    /// Renders the slot table in the given order, one slot per line.
    pub fn dump(&self, order: TraversalOrder) -> String {
        match order {
            TraversalOrder::Array => dump_slots(&self.slots, 0..Self::CAPACITY),
            TraversalOrder::Mru => dump_slots(&self.slots, self.mru.iter(&self.slots)),
            TraversalOrder::Free => dump_slots(&self.slots, self.free.iter(&self.slots)),
        }
    }

    /// Validates internal invariants.
    ///
    /// # Errors
    ///
    /// Describes the first violated invariant.
    pub fn check_invariants(&self) -> std::result::Result<(), InvariantError> {
        check_lists(&self.slots, &self.mru, &self.free, self.max_size)?;
        for (pos, slot) in self.slots.iter().enumerate() {
            if slot.value() != pos {
                return Err(InvariantError::new(format!(
                    "slot {pos} holds value {}",
                    slot.value()
                )));
            }
            if slot.is_tombstone() && !slot.is_free() {
                return Err(InvariantError::new(format!("live slot {pos} is tombstoned")));
            }
            if slot.is_free() {
                continue;
            }
            let home = slot.home();
            for step in 0..distance(home, pos, Self::MASK) {
                let probed = self.slots[(home + step) & Self::MASK];
                if probed.is_free() && !probed.is_tombstone() {
                    return Err(InvariantError::new(format!(
                        "key {:?} at {pos} is unreachable past a free slot",
                        slot.key
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn small_pool_evicts_oldest() {
        let mut pool = BitsLinearProbeLruPool::<2>::new(0.5);
        let a = pool.get_or_put(0).unwrap();
        assert_eq!((a.value, a.evicted, a.is_active), (0, None, false));
        let b = pool.get_or_put(1).unwrap();
        assert_eq!((b.value, b.evicted, b.is_active), (1, None, false));
        let c = pool.get_or_put(2).unwrap();
        assert_eq!(c.evicted, Some(Evicted { key: 0, value: 0 }));
        assert_eq!(c.value, 2);
        assert_eq!(pool.get(0), None);
        pool.check_invariants().unwrap();
    }

    #[test]
    fn tombstone_keeps_chain_reachable() {
        let mut pool = BitsLinearProbeLruPool::<3>::new(0.9);
        for key in [1u32, 9, 17] {
            pool.get_or_put(key).unwrap();
        }
        // Slot 4 stays plain free, so the tombstone at 2 is kept.
        assert_eq!(pool.remove(9), Some(2));
        assert_eq!(pool.tombstones(), 1);
        assert!(pool.has(17));
        assert!(!pool.has(9));

        // Re-inserting on the same chain reuses the tombstoned slot.
        let again = pool.get_or_put(25).unwrap();
        assert_eq!(again.value, 2);
        assert_eq!(pool.tombstones(), 0);
        pool.check_invariants().unwrap();
    }

    #[test]
    fn trailing_tombstones_are_reclaimed() {
        let mut pool = BitsLinearProbeLruPool::<3>::new(0.9);
        for key in [1u32, 9, 17] {
            pool.get_or_put(key).unwrap();
        }
        pool.remove(9).unwrap();
        assert_eq!(pool.tombstones(), 1);
        // Slot 3 is followed by a plain free slot: it and the tombstone at 2
        // both go back to plain free.
        pool.remove(17).unwrap();
        assert_eq!(pool.tombstones(), 0);
        pool.check_invariants().unwrap();
    }

    #[test]
    fn hit_moves_to_front() {
        let mut pool = BitsLinearProbeLruPool::<3, u64>::new(0.5);
        for key in [3u64, 4, 5, 6] {
            pool.get_or_put(key).unwrap();
        }
        assert!(pool.get_or_put(3).unwrap().is_active);
        let put = pool.get_or_put(7).unwrap();
        assert_eq!(put.evicted.map(|e| e.key), Some(4));
        assert_eq!(
            pool.iter().map(|(k, _)| k).collect::<Vec<_>>(),
            vec![7, 3, 6, 5]
        );
    }

    #[test]
    fn dump_shows_tombstones() {
        let mut pool = BitsLinearProbeLruPool::<2>::new(0.75);
        pool.get_or_put(1).unwrap();
        pool.get_or_put(5).unwrap();
        pool.remove(1).unwrap();
        assert!(pool.dump(TraversalOrder::Free).contains("tomb"));
        assert_eq!(pool.dump(TraversalOrder::Mru).lines().count(), 1);
    }
}
