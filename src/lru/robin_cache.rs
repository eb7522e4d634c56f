//! Robin Hood LRU map from machine-word keys to small caller-chosen values.

use crate::error::{InvariantError, Result};
use crate::lru::robin::RobinTable;
use crate::lru::slot::Word;
use crate::lru::{Evicted, TraversalOrder};

/// Fixed-capacity LRU map whose values are stored directly in the packed
/// slot word, so they must fit in `SIZE_BITS` bits.
///
/// Unlike [`BitsRobinLruPool`](crate::lru::BitsRobinLruPool), values have no
/// identity of their own: a removed value is returned and forgotten.
pub struct BitsRobinLruCache<const SIZE_BITS: u32, W: Word = u32> {
    table: RobinTable<W, SIZE_BITS>,
}

impl<const SIZE_BITS: u32, W: Word> BitsRobinLruCache<SIZE_BITS, W> {
    /// Largest storable value.
    pub const MAX_VALUE: usize = (1 << SIZE_BITS) - 1;

    /// Creates an empty cache; see
    /// [`BitsRobinLruPool::new`](crate::lru::BitsRobinLruPool::new) for
    /// `load_factor`.
    pub fn new(load_factor: f32) -> Self {
        Self {
            table: RobinTable::new(load_factor),
        }
    }

    /// Associates `value` with `key` and marks it most recently used.
    ///
    /// Inserting a new key into a full cache evicts the LRU entry first and
    /// returns it.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfRange`](crate::Error::OutOfRange) if `value` exceeds
    /// [`MAX_VALUE`](Self::MAX_VALUE);
    /// [`Error::PoolExhausted`](crate::Error::PoolExhausted) if probing found
    /// no free slot.
    pub fn put(&mut self, key: W, value: usize) -> Result<Option<Evicted<W>>> {
        if value > Self::MAX_VALUE {
            return Err(crate::Error::OutOfRange {
                index: value,
                len: Self::MAX_VALUE + 1,
            });
        }
        if let Some(pos) = self.table.find(key) {
            self.table.set_value_at(pos, value);
            self.table.touch(pos);
            return Ok(None);
        }
        let evicted = self.table.evict_if_full();
        let pos = self.table.insert(key)?;
        self.table.set_value_at(pos, value);
        Ok(evicted)
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

    /// Removes `key`, returning its value.
    pub fn remove(&mut self, key: W) -> Option<usize> {
        let pos = self.table.find(key)?;
        Some(self.table.remove_at(pos))
    }

    /// Slots between `key`'s home and where it is stored.
    pub fn probe_distance(&self, key: W) -> Option<usize> {
        self.table.probe_distance(key)
    }

    /// Drops every entry.
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
        self.table.check_invariants(false)
    }
}
