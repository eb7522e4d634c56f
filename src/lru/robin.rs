//! Robin Hood table with back-shift deletion, and the index pool built on it.
//!
//! Insertion probes from the key's home slot and claims the first slot whose
//! resident sits closer to its own home than the incoming key would. The
//! resident and every entry behind it up to the next free slot move one slot
//! forward, so entries in a cluster stay ordered by home position (ties keep
//! insertion order). Deletion is the exact inverse: the entries behind the
//! hole shift back until a free slot or an entry already at home.
//!
//! Entries carry their value when they move. The free slot consumed by an
//! insertion donates its value to the new key, and the slot vacated by a
//! deletion receives the deleted entry's value, so values always form a
//! permutation of `0..capacity`.

use rustc_hash::FxHashSet;

use crate::error::{InvariantError, Result};
use crate::lru::list::SlotList;
use crate::lru::slot::{distance, home_of, max_size_bits, Slot, Word};
use crate::lru::{dump_slots, max_size_for, Evicted, GetOrPut, TraversalOrder};
use crate::Error;

/// Table and list bookkeeping shared by [`BitsRobinLruPool`] and
/// [`BitsRobinLruCache`](crate::lru::BitsRobinLruCache).
pub(crate) struct RobinTable<W: Word, const S: u32> {
    slots: Box<[Slot<W, S>]>,
    mru: SlotList,
    free: SlotList,
    max_size: usize,
}

impl<W: Word, const S: u32> RobinTable<W, S> {
    pub(crate) const CAPACITY: usize = 1 << S;
    const MASK: usize = Self::CAPACITY - 1;
    const VALID_SIZE_BITS: () = assert!(
        S >= 1 && S <= max_size_bits::<W>(),
        "SIZE_BITS out of range for this machine word"
    );

    pub(crate) fn new(load_factor: f32) -> Self {
        let () = Self::VALID_SIZE_BITS;
        let mut table = Self {
            slots: (0..Self::CAPACITY).map(Slot::vacant).collect(),
            mru: SlotList::new(),
            free: SlotList::new(),
            max_size: max_size_for(load_factor, Self::CAPACITY),
        };
        table.clear();
        table
    }

    pub(crate) fn clear(&mut self) {
        self.mru.clear();
        self.free.clear();
        for pos in (0..Self::CAPACITY).rev() {
            self.slots[pos] = Slot::vacant(pos);
            self.free.push_front(&mut self.slots, pos);
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.mru.len()
    }

    #[inline]
    pub(crate) fn max_size(&self) -> usize {
        self.max_size
    }

    #[inline]
    pub(crate) fn value_at(&self, pos: usize) -> usize {
        self.slots[pos].value()
    }

    #[inline]
    pub(crate) fn set_value_at(&mut self, pos: usize, value: usize) {
        self.slots[pos].set_value(value);
    }

    /// Position of `key`, if live.
    ///
    /// Stops at the first free slot, or as soon as a resident is closer to
    /// its home than `key` would be at this step: a live `key` can never sit
    /// behind such a resident.
    pub(crate) fn find(&self, key: W) -> Option<usize> {
        let mut pos = home_of::<W, S>(key);
        for step in 0..Self::CAPACITY {
            let slot = self.slots[pos];
            if slot.is_free() {
                return None;
            }
            if slot.key == key {
                return Some(pos);
            }
            if distance(slot.home(), pos, Self::MASK) < step {
                return None;
            }
            pos = (pos + 1) & Self::MASK;
        }
        None
    }

    pub(crate) fn probe_distance(&self, key: W) -> Option<usize> {
        self.find(key)
            .map(|pos| distance(self.slots[pos].home(), pos, Self::MASK))
    }

    #[inline]
    pub(crate) fn touch(&mut self, pos: usize) {
        self.mru.move_to_front(&mut self.slots, pos);
    }

    /// Evicts the LRU tail when the table is at its live-entry ceiling.
    pub(crate) fn evict_if_full(&mut self) -> Option<Evicted<W>> {
        if self.mru.len() < self.max_size {
            return None;
        }
        let tail = self.mru.tail(&self.slots)?;
        let key = self.slots[tail].key;
        let value = self.remove_at(tail);
        Some(Evicted { key, value })
    }

    /// Inserts an absent `key` at the MRU head and returns its position.
    ///
    /// The new entry holds the value of the free slot it consumed.
    pub(crate) fn insert(&mut self, key: W) -> Result<usize> {
        let mut pos = home_of::<W, S>(key);
        let mut step = 0;
        let target = loop {
            if step == Self::CAPACITY {
                return Err(Error::PoolExhausted);
            }
            let resident = self.slots[pos];
            if resident.is_free() || distance(resident.home(), pos, Self::MASK) < step {
                break pos;
            }
            pos = (pos + 1) & Self::MASK;
            step += 1;
        };

        // The displaced run ends at the next free slot.
        let mut free_pos = target;
        let mut scanned = 0;
        while !self.slots[free_pos].is_free() {
            free_pos = (free_pos + 1) & Self::MASK;
            scanned += 1;
            if scanned == Self::CAPACITY {
                return Err(Error::PoolExhausted);
            }
        }
        self.free.detach(&mut self.slots, free_pos);
        let spare_value = self.slots[free_pos].value();

        // Each displaced entry moves one slot further from home, back to front.
        let mut dst = free_pos;
        while dst != target {
            let src = (dst + Self::MASK) & Self::MASK;
            self.slots[dst] = self.slots[src];
            self.mru.relocate(&mut self.slots, src, dst);
            dst = src;
        }

        let mut slot = Slot::vacant(target);
        slot.key = key;
        slot.set_free(false);
        slot.set_value(spare_value);
        self.slots[target] = slot;
        self.mru.push_front(&mut self.slots, target);
        Ok(target)
    }

    /// Removes the entry at `pos` and returns the value it held.
    ///
    /// The value stays with the slot that ends up free after the back-shift.
    pub(crate) fn remove_at(&mut self, pos: usize) -> usize {
        let removed = self.slots[pos].value();
        self.mru.detach(&mut self.slots, pos);

        let mut hole = pos;
        loop {
            let next = (hole + 1) & Self::MASK;
            let slot = self.slots[next];
            if slot.is_free() || distance(slot.home(), next, Self::MASK) == 0 {
                break;
            }
            self.slots[hole] = slot;
            self.mru.relocate(&mut self.slots, next, hole);
            hole = next;
        }

        let mut vacant = Slot::vacant(hole);
        vacant.set_value(removed);
        self.slots[hole] = vacant;
        self.free.push_front(&mut self.slots, hole);
        removed
    }

    /// Live `(key, value)` pairs from most to least recently used.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (W, usize)> + '_ {
        self.mru
            .iter(&self.slots)
            .map(|pos| (self.slots[pos].key, self.slots[pos].value()))
    }

    pub(crate) fn dump(&self, order: TraversalOrder) -> String {
        match order {
            TraversalOrder::Array => dump_slots(&self.slots, 0..Self::CAPACITY),
            TraversalOrder::Mru => dump_slots(&self.slots, self.mru.iter(&self.slots)),
            TraversalOrder::Free => dump_slots(&self.slots, self.free.iter(&self.slots)),
        }
    }

    /// Validates list membership, link symmetry, the size ceiling and the
    /// Robin Hood ordering. With `values_are_permutation`, also checks that
    /// slot values cover `0..capacity` exactly once.
    pub(crate) fn check_invariants(
        &self,
        values_are_permutation: bool,
    ) -> std::result::Result<(), InvariantError> {
        check_lists(&self.slots, &self.mru, &self.free, self.max_size)?;

        for pos in 0..Self::CAPACITY {
            let slot = self.slots[pos];
            if slot.is_tombstone() {
                return Err(InvariantError::new(format!(
                    "slot {pos} carries a tombstone"
                )));
            }
            if slot.is_free() {
                continue;
            }
            let dist = distance(slot.home(), pos, Self::MASK);
            if dist == 0 {
                continue;
            }
            let prev_pos = (pos + Self::MASK) & Self::MASK;
            let prev = self.slots[prev_pos];
            if prev.is_free() {
                return Err(InvariantError::new(format!(
                    "slot {pos} is {dist} from home but slot {prev_pos} is free"
                )));
            }
            let prev_dist = distance(prev.home(), prev_pos, Self::MASK);
            if prev_dist + 1 < dist {
                return Err(InvariantError::new(format!(
                    "slot {pos} (distance {dist}) was probed past slot {prev_pos} \
                     (distance {prev_dist})"
                )));
            }
        }

        if values_are_permutation {
            let mut seen = vec![false; Self::CAPACITY];
            for slot in self.slots.iter() {
                let v = slot.value();
                if std::mem::replace(&mut seen[v], true) {
                    return Err(InvariantError::new(format!("value {v} held twice")));
                }
            }
        }
        Ok(())
    }
}

/// Checks that the MRU and free lists partition the slot array.
pub(crate) fn check_lists<W: Word, const S: u32>(
    slots: &[Slot<W, S>],
    mru: &SlotList,
    free: &SlotList,
    max_size: usize,
) -> std::result::Result<(), InvariantError> {
    if mru.len() + free.len() != slots.len() {
        return Err(InvariantError::new(format!(
            "lists hold {} + {} slots, table has {}",
            mru.len(),
            free.len(),
            slots.len()
        )));
    }
    if mru.len() > max_size || max_size >= slots.len() {
        return Err(InvariantError::new(format!(
            "size {} / max {} / capacity {} out of order",
            mru.len(),
            max_size,
            slots.len()
        )));
    }

    let mut seen = vec![false; slots.len()];
    let mut keys = FxHashSet::default();
    for (list, live) in [(mru, true), (free, false)] {
        let mut count = 0;
        for pos in list.iter(slots) {
            count += 1;
            let slot = slots[pos];
            if std::mem::replace(&mut seen[pos], true) {
                return Err(InvariantError::new(format!("slot {pos} linked twice")));
            }
            if slot.is_free() == live {
                return Err(InvariantError::new(format!(
                    "slot {pos} free flag disagrees with its list"
                )));
            }
            if slots[slot.next()].prev() != pos || slots[slot.prev()].next() != pos {
                return Err(InvariantError::new(format!("slot {pos} links are asymmetric")));
            }
            if live && !keys.insert(slot.key) {
                return Err(InvariantError::new(format!(
                    "key {:?} is live twice",
                    slot.key
                )));
            }
        }
        if count != list.len() {
            return Err(InvariantError::new(format!(
                "list walk found {count} slots, length says {}",
                list.len()
            )));
        }
    }
    Ok(())
}

/// Robin Hood LRU pool handing out stable indices in `0..capacity`.
///
/// Use the returned `value` to index a caller-owned array of objects; see
/// [`LruPool`](crate::lru::LruPool) and [`LruCache`](crate::lru::LruCache).
pub struct BitsRobinLruPool<const SIZE_BITS: u32, W: Word = u32> {
    table: RobinTable<W, SIZE_BITS>,
}

impl<const SIZE_BITS: u32, W: Word> BitsRobinLruPool<SIZE_BITS, W> {
    /// Creates an empty pool of `2^SIZE_BITS` slots holding at most
    /// `floor(load_factor * capacity)` live entries (clamped to
    /// `[1, capacity - 1]`).
    pub fn new(load_factor: f32) -> Self {
        Self {
            table: RobinTable::new(load_factor),
        }
    }

    /// Returns the value for `key`, inserting it if absent.
    ///
    /// A hit moves `key` to the MRU head. A miss first evicts the LRU entry
    /// if the pool is at [`max_size`](Self::max_size).
    ///
    /// # Errors
    ///
    /// [`Error::PoolExhausted`] if no free slot could be found, which the
    /// size ceiling rules out in practice.
    pub fn get_or_put(&mut self, key: W) -> Result<GetOrPut<W>> {
        if let Some(pos) = self.table.find(key) {
            self.table.touch(pos);
            return Ok(GetOrPut {
                value: self.table.value_at(pos),
                evicted: None,
                is_active: true,
            });
        }
        let evicted = self.table.evict_if_full();
        let pos = self.table.insert(key)?;
        Ok(GetOrPut {
            value: self.table.value_at(pos),
            evicted,
            is_active: false,
        })
    }

    /// Returns the value for `key` and marks it most recently used.
    pub fn get(&mut self, key: W) -> Option<usize> {
        let pos = self.table.find(key)?;
        self.table.touch(pos);
        Some(self.table.value_at(pos))
    }

    /// Returns the value for `key` without touching recency.
    pub fn peek(&self, key: W) -> Option<usize> {
        self.table.find(key).map(|pos| self.table.value_at(pos))
    }

    /// Returns `true` if `key` is live.
    pub fn has(&self, key: W) -> bool {
        self.table.find(key).is_some()
    }

    /// Removes `key` and returns the value it held, which becomes the value
    /// handed to a later insertion.
    pub fn remove(&mut self, key: W) -> Option<usize> {
        let pos = self.table.find(key)?;
        Some(self.table.remove_at(pos))
    }

    /// Slots between `key`'s home and where it is stored.
    pub fn probe_distance(&self, key: W) -> Option<usize> {
        self.table.probe_distance(key)
    }

    /// Drops every entry and restores the initial value assignment.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if there are no live entries.
    pub fn is_empty(&self) -> bool {
        self.table.len() == 0
    }

    /// Live-entry ceiling above which insertions evict.
    pub fn max_size(&self) -> usize {
        self.table.max_size()
    }

    /// Number of slots, `2^SIZE_BITS`.
    pub const fn capacity(&self) -> usize {
        RobinTable::<W, SIZE_BITS>::CAPACITY
    }

    /// Live `(key, value)` pairs from most to least recently used.
    pub fn iter(&self) -> impl Iterator<Item = (W, usize)> + '_ {
        self.table.iter()
    }

    /// Renders the slot table in the given order, one slot per line.
    pub fn dump(&self, order: TraversalOrder) -> String {
        self.table.dump(order)
    }

    /// Validates internal invariants.
    ///
    /// # Errors
    ///
    /// Describes the first violated invariant.
    pub fn check_invariants(&self) -> std::result::Result<(), InvariantError> {
        self.table.check_invariants(true)
    }
}

impl<const SIZE_BITS: u32, W: Word> std::fmt::Debug for BitsRobinLruPool<SIZE_BITS, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitsRobinLruPool")
            .field("len", &self.len())
            .field("max_size", &self.max_size())
            .field("capacity", &self.capacity())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn first_inserts_take_home_slot_values() {
        let mut pool = BitsRobinLruPool::<2>::new(0.5);
        assert_eq!(pool.capacity(), 4);
        assert_eq!(pool.max_size(), 2);

        let a = pool.get_or_put(0).unwrap();
        assert_eq!((a.value, a.evicted, a.is_active), (0, None, false));
        let b = pool.get_or_put(1).unwrap();
        assert_eq!((b.value, b.evicted, b.is_active), (1, None, false));

        let c = pool.get_or_put(2).unwrap();
        assert_eq!(c.evicted, Some(Evicted { key: 0, value: 0 }));
        assert!(!c.is_active);
        assert_eq!(pool.get(0), None);
        pool.check_invariants().unwrap();
    }

    #[test]
    fn hit_returns_same_value() {
        let mut pool = BitsRobinLruPool::<4>::new(0.75);
        let first = pool.get_or_put(42).unwrap();
        let second = pool.get_or_put(42).unwrap();
        assert!(second.is_active);
        assert_eq!(first.value, second.value);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn colliding_keys_stay_ordered_by_insertion() {
        let mut pool = BitsRobinLruPool::<3>::new(0.9);
        // All home at slot 1.
        for key in [1u32, 9, 17] {
            pool.get_or_put(key).unwrap();
        }
        assert_eq!(pool.probe_distance(1), Some(0));
        assert_eq!(pool.probe_distance(9), Some(1));
        assert_eq!(pool.probe_distance(17), Some(2));

        // Residents 9 and 17 are further from home than key 2 at each step,
        // so it lands behind the whole cluster.
        pool.get_or_put(2).unwrap();
        assert_eq!(pool.probe_distance(2), Some(2));
        assert_eq!(pool.probe_distance(17), Some(2));
        pool.check_invariants().unwrap();
    }

    #[test]
    fn insertion_displaces_richer_resident() {
        let mut pool = BitsRobinLruPool::<3>::new(0.9);
        pool.get_or_put(2).unwrap(); // home 2 at 2
        pool.get_or_put(1).unwrap(); // home 1 at 1
        pool.get_or_put(9).unwrap(); // home 1, steals 2 (resident distance 0 < 1)
        assert_eq!(pool.probe_distance(9), Some(1));
        assert_eq!(pool.probe_distance(2), Some(1));
        pool.check_invariants().unwrap();
    }

    #[test]
    fn back_shift_restores_home_positions() {
        let mut pool = BitsRobinLruPool::<3>::new(0.9);
        for key in [1u32, 9, 17, 2] {
            pool.get_or_put(key).unwrap();
        }
        let removed = pool.remove(9).unwrap();
        pool.check_invariants().unwrap();
        assert_eq!(pool.probe_distance(17), Some(1));
        assert_eq!(pool.probe_distance(2), Some(1));

        // The freed value is the one handed to the next insertion that
        // consumes the vacated slot.
        let again = pool.get_or_put(3).unwrap();
        assert_eq!(pool.probe_distance(3), Some(1));
        assert_eq!(again.value, removed);
    }

    #[test]
    fn remove_missing_key() {
        let mut pool = BitsRobinLruPool::<3>::new(0.5);
        pool.get_or_put(5).unwrap();
        assert_eq!(pool.remove(13), None);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn get_moves_key_to_front() {
        let mut pool = BitsRobinLruPool::<3>::new(0.5);
        for key in [10u32, 11, 12, 13] {
            pool.get_or_put(key).unwrap();
        }
        assert!(pool.get(10).is_some());
        let put = pool.get_or_put(14).unwrap();
        assert_eq!(put.evicted.map(|e| e.key), Some(11));
        assert_eq!(
            pool.iter().map(|(k, _)| k).collect::<Vec<_>>(),
            vec![14, 10, 13, 12]
        );
    }

    #[test]
    fn wraparound_cluster() {
        let mut pool = BitsRobinLruPool::<3>::new(0.9);
        for key in [7u32, 15, 23] {
            pool.get_or_put(key).unwrap();
        }
        assert_eq!(pool.probe_distance(23), Some(2));
        assert_eq!(pool.peek(23), pool.peek(23));
        pool.remove(7).unwrap();
        assert_eq!(pool.probe_distance(15), Some(0));
        assert_eq!(pool.probe_distance(23), Some(1));
        pool.check_invariants().unwrap();
    }

    #[test]
    fn clear_resets_values() {
        let mut pool = BitsRobinLruPool::<2, u64>::new(0.75);
        pool.get_or_put(3).unwrap();
        pool.get_or_put(7).unwrap();
        pool.clear();
        assert!(pool.is_empty());
        assert_eq!(pool.get_or_put(1).unwrap().value, 1);
        pool.check_invariants().unwrap();
    }

    #[test]
    fn dump_lists_every_order() {
        let mut pool = BitsRobinLruPool::<2>::new(0.5);
        pool.get_or_put(1).unwrap();
        assert_eq!(pool.dump(TraversalOrder::Array).lines().count(), 4);
        assert_eq!(pool.dump(TraversalOrder::Mru).lines().count(), 1);
        assert_eq!(pool.dump(TraversalOrder::Free).lines().count(), 3);
        assert!(pool.dump(TraversalOrder::Mru).contains("live key=1"));
    }
}
