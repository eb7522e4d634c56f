//! Fixed-capacity LRU pools over bit-packed open-addressed tables.
//!
//! Every table has `2^SIZE_BITS` slots allocated once at construction. Each
//! slot belongs to exactly one of two intrusive lists: the MRU list of live
//! entries (head = most recently used, tail = eviction candidate) or the
//! free list. The live count never exceeds `max_size`, which is always below
//! the capacity, so probing always terminates at a free slot.
//!
//! ## Variants
//!
//! | Type                        | Probing     | Deletion    | Slot value          |
//! |-----------------------------|-------------|-------------|---------------------|
//! | [`BitsLinearProbeLruPool`]  | linear      | tombstones  | fixed slot index    |
//! | [`BitsRobinLruPool`]        | Robin Hood  | back-shift  | stable object index |
//! | [`BitsRobinLruCache`]       | Robin Hood  | back-shift  | caller-provided     |
//!
//! [`LruPool`] and [`LruCache`] put a flat array of full objects next to a
//! [`BitsRobinLruPool`] and index it with the pool's values.
//!
//! ## Example
//!
//! ```
//! use nitrogl::lru::BitsRobinLruPool;
//!
//! // 4 slots, at most 2 live entries.
//! let mut pool = BitsRobinLruPool::<2>::new(0.5);
//! assert!(!pool.get_or_put(10).unwrap().is_active);
//! assert!(!pool.get_or_put(11).unwrap().is_active);
//!
//! // A third key evicts the least recently used one.
//! let put = pool.get_or_put(12).unwrap();
//! assert_eq!(put.evicted.map(|e| e.key), Some(10));
//! assert!(!pool.has(10));
//! ```

use std::fmt::Write as _;

mod cache;
mod linear_probe;
mod list;
mod pool;
mod robin;
mod robin_cache;
pub(crate) mod slot;

pub use cache::LruCache;
pub use linear_probe::BitsLinearProbeLruPool;
pub use pool::LruPool;
pub use robin::BitsRobinLruPool;
pub use robin_cache::BitsRobinLruCache;
pub use slot::{max_size_bits, max_size_bits_with_tombstone, Word};

use crate::lru::slot::Slot;

/// An entry pushed out of a pool to make room for a new key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evicted<W> {
    /// Key of the evicted entry.
    pub key: W,
    /// Value the evicted entry held; now available for reuse.
    pub value: usize,
}

/// Outcome of a `get_or_put` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetOrPut<W> {
    /// Value now associated with the key.
    pub value: usize,
    /// The least recently used entry, if one had to be evicted first.
    pub evicted: Option<Evicted<W>>,
    /// `true` if the key was already present.
    pub is_active: bool,
}

/// Slot ordering used by the `dump` diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalOrder {
    /// Raw array order.
    Array,
    /// Most to least recently used live entries.
    Mru,
    /// Free list order.
    Free,
}

/// `floor(load_factor * capacity)`, clamped to `[1, capacity - 1]`.
#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub(crate) fn max_size_for(load_factor: f32, capacity: usize) -> usize {
    let raw = (load_factor * capacity as f32).floor() as usize;
    raw.clamp(1, capacity - 1)
}

pub(crate) fn dump_slots<W: Word, const S: u32>(
    slots: &[Slot<W, S>],
    positions: impl Iterator<Item = usize>,
) -> String {
    let mut out = String::new();
    for pos in positions {
        let slot = slots[pos];
        let state = match (slot.is_free(), slot.is_tombstone()) {
            (false, _) => "live",
            (true, false) => "free",
            (true, true) => "tomb",
        };
        let _ = writeln!(
            out,
            "[{pos:>4}] {state} key={:?} value={} prev={} next={}",
            slot.key,
            slot.value(),
            slot.prev(),
            slot.next()
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_size_is_clamped() {
        assert_eq!(max_size_for(0.5, 4), 2);
        assert_eq!(max_size_for(0.0, 4), 1);
        assert_eq!(max_size_for(1.0, 4), 3);
        assert_eq!(max_size_for(0.75, 1024), 768);
        assert_eq!(max_size_for(f32::NAN, 8), 1);
        assert_eq!(max_size_for(0.5, 2), 1);
    }
}
