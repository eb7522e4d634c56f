//! Bit-packed slot layout shared by every pool variant.
//!
//! A slot is a key plus one machine word holding four fields:
//!
//! ```text
//!  BITS-1   BITS-2                3S        2S        S         0
//!  ┌──────┬──────────┬─────────┬─────────┬─────────┬─────────┐
//!  │ free │ tombstone│ (unused)│  next   │  prev   │  value  │
//!  └──────┴──────────┴─────────┴─────────┴─────────┴─────────┘
//! ```
//!
//! `value`, `prev` and `next` are `S = SIZE_BITS` wide, so a table always has
//! `2^S` slots and positions wrap with a mask instead of a modulo.

use std::fmt::Debug;
use std::hash::Hash;

/// Unsigned machine word a pool packs its slots into.
pub trait Word: Copy + Eq + Hash + Debug + Default + 'static {
    /// Width of the word in bits.
    const BITS: u32;

    /// Widens to `u64` without loss.
    fn to_u64(self) -> u64;

    /// Narrows from `u64`, discarding high bits.
    fn from_u64(v: u64) -> Self;
}

impl Word for u32 {
    const BITS: u32 = 32;

    #[inline]
    fn to_u64(self) -> u64 {
        u64::from(self)
    }

    #[inline]
    #[expect(clippy::cast_possible_truncation)]
    fn from_u64(v: u64) -> Self {
        v as u32
    }
}

impl Word for u64 {
    const BITS: u32 = 64;

    #[inline]
    fn to_u64(self) -> u64 {
        self
    }

    #[inline]
    fn from_u64(v: u64) -> Self {
        v
    }
}

/// Largest `SIZE_BITS` for tables without a tombstone bit.
pub const fn max_size_bits<W: Word>() -> u32 {
    (W::BITS - 1) / 3
}

/// Largest `SIZE_BITS` for tables that also carry a tombstone bit.
pub const fn max_size_bits_with_tombstone<W: Word>() -> u32 {
    (W::BITS - 2) / 3
}

/// One table entry: the key plus the packed `value/prev/next/flags` word.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) struct Slot<W: Word, const SIZE_BITS: u32> {
    pub(crate) key: W,
    bits: W,
}

impl<W: Word, const SIZE_BITS: u32> Slot<W, SIZE_BITS> {
    const FIELD_MASK: u64 = (1u64 << SIZE_BITS) - 1;
    const PREV_SHIFT: u32 = SIZE_BITS;
    const NEXT_SHIFT: u32 = SIZE_BITS * 2;
    const FREE_BIT: u64 = 1u64 << (W::BITS - 1);
    const TOMBSTONE_BIT: u64 = 1u64 << (W::BITS - 2);

    /// A free, non-tombstoned slot whose value and links all point at `pos`.
    pub(crate) fn vacant(pos: usize) -> Self {
        let mut slot = Self {
            key: W::default(),
            bits: W::from_u64(Self::FREE_BIT),
        };
        slot.set_value(pos);
        slot.set_prev(pos);
        slot.set_next(pos);
        slot
    }

    // Fields are at most 21 bits wide.
    #[inline]
    #[expect(clippy::cast_possible_truncation)]
    fn field(self, shift: u32) -> usize {
        ((self.bits.to_u64() >> shift) & Self::FIELD_MASK) as usize
    }

    #[inline]
    fn set_field(&mut self, shift: u32, v: usize) {
        debug_assert!((v as u64) <= Self::FIELD_MASK, "field overflow: {v}");
        let cleared = self.bits.to_u64() & !(Self::FIELD_MASK << shift);
        self.bits = W::from_u64(cleared | ((v as u64 & Self::FIELD_MASK) << shift));
    }

    #[inline]
    fn flag(self, bit: u64) -> bool {
        self.bits.to_u64() & bit != 0
    }

    #[inline]
    fn set_flag(&mut self, bit: u64, on: bool) {
        let raw = self.bits.to_u64();
        self.bits = W::from_u64(if on { raw | bit } else { raw & !bit });
    }

    #[inline]
    pub(crate) fn value(self) -> usize {
        self.field(0)
    }

    #[inline]
    pub(crate) fn set_value(&mut self, v: usize) {
        self.set_field(0, v);
    }

    #[inline]
    pub(crate) fn prev(self) -> usize {
        self.field(Self::PREV_SHIFT)
    }

    #[inline]
    pub(crate) fn set_prev(&mut self, v: usize) {
        self.set_field(Self::PREV_SHIFT, v);
    }

    #[inline]
    pub(crate) fn next(self) -> usize {
        self.field(Self::NEXT_SHIFT)
    }

    #[inline]
    pub(crate) fn set_next(&mut self, v: usize) {
        self.set_field(Self::NEXT_SHIFT, v);
    }

    #[inline]
    pub(crate) fn is_free(self) -> bool {
        self.flag(Self::FREE_BIT)
    }

    #[inline]
    pub(crate) fn set_free(&mut self, on: bool) {
        self.set_flag(Self::FREE_BIT, on);
    }

    #[inline]
    pub(crate) fn is_tombstone(self) -> bool {
        self.flag(Self::TOMBSTONE_BIT)
    }

    #[inline]
    pub(crate) fn set_tombstone(&mut self, on: bool) {
        self.set_flag(Self::TOMBSTONE_BIT, on);
    }

    /// Home position of this slot's key in a table of `2^SIZE_BITS` slots.
    #[inline]
    pub(crate) fn home(self) -> usize {
        home_of::<W, SIZE_BITS>(self.key)
    }
}

impl<W: Word, const SIZE_BITS: u32> Debug for Slot<W, SIZE_BITS> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slot")
            .field("key", &self.key)
            .field("value", &self.value())
            .field("prev", &self.prev())
            .field("next", &self.next())
            .field("free", &self.is_free())
            .field("tombstone", &self.is_tombstone())
            .finish()
    }
}

/// Home position of `key`: its low `SIZE_BITS` bits.
#[inline]
#[expect(clippy::cast_possible_truncation)]
pub(crate) fn home_of<W: Word, const SIZE_BITS: u32>(key: W) -> usize {
    (key.to_u64() & ((1u64 << SIZE_BITS) - 1)) as usize
}

/// Wraparound-safe distance from `home` forward to `pos`.
#[inline]
pub(crate) fn distance(home: usize, pos: usize, mask: usize) -> usize {
    pos.wrapping_sub(home) & mask
}
