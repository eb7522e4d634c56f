//! Incremental `MurmurHash2A`-style hashing over a stream of machine words.
//!
//! Used to derive structural hash codes for sampler trees, which key the
//! compiled-program cache.
//!
//! ```
//! use nitrogl::murmur::IterativeMurmur;
//!
//! let a = IterativeMurmur::<u64>::begin(0).next(1).next(2).end();
//! let b = IterativeMurmur::<u64>::begin(0).next(2).next(1).end();
//! assert_ne!(a, b);
//! ```

use crate::lru::Word;

/// Word sizes with murmur mixing constants.
pub trait MurmurWord: Word {
    /// Multiplier.
    const M: Self;
    /// Mixing shift.
    const R: u32;

    /// Mixes `k` into `h`.
    #[must_use]
    fn mix(h: Self, k: Self) -> Self;

    /// Final avalanche.
    #[must_use]
    fn finalize(h: Self) -> Self;
}

impl MurmurWord for u32 {
    const M: Self = 0x5bd1_e995;
    const R: u32 = 24;

    #[inline]
    fn mix(h: Self, k: Self) -> Self {
        let mut k = k.wrapping_mul(Self::M);
        k ^= k >> Self::R;
        k = k.wrapping_mul(Self::M);
        h.wrapping_mul(Self::M) ^ k
    }

    #[inline]
    fn finalize(h: Self) -> Self {
        let mut h = h ^ (h >> 13);
        h = h.wrapping_mul(Self::M);
        h ^ (h >> 15)
    }
}

impl MurmurWord for u64 {
    const M: Self = 0xc6a4_a793_5bd1_e995;
    const R: u32 = 47;

    #[inline]
    fn mix(h: Self, k: Self) -> Self {
        let mut k = k.wrapping_mul(Self::M);
        k ^= k >> Self::R;
        k = k.wrapping_mul(Self::M);
        h.wrapping_mul(Self::M) ^ k
    }

    #[inline]
    fn finalize(h: Self) -> Self {
        let mut h = h ^ (h >> Self::R);
        h = h.wrapping_mul(Self::M);
        h ^ (h >> Self::R)
    }
}

/// Stateful hash accumulator: `begin(seed).next(w)...end()`.
#[derive(Debug, Clone, Copy)]
pub struct IterativeMurmur<W: MurmurWord> {
    h: W,
    len: u64,
}

impl<W: MurmurWord> IterativeMurmur<W> {
    /// Starts a hash with `seed`.
    #[must_use]
    pub fn begin(seed: W) -> Self {
        Self { h: seed, len: 0 }
    }

    /// Mixes in one word.
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn next(mut self, word: W) -> Self {
        self.h = W::mix(self.h, word);
        self.len += 1;
        self
    }

    /// Mixes in bytes, packed little-endian into words with the tail
    /// zero-padded, followed by the byte length so that padding cannot
    /// alias a shorter input.
    #[must_use]
    pub fn next_bytes(mut self, bytes: &[u8]) -> Self {
        let width = (W::BITS / 8) as usize;
        for chunk in bytes.chunks(width) {
            let word = chunk
                .iter()
                .enumerate()
                .fold(0u64, |acc, (i, b)| acc | (u64::from(*b) << (8 * i)));
            self = self.next(W::from_u64(word));
        }
        self.next(W::from_u64(bytes.len() as u64))
    }

    /// Mixes in a string's UTF-8 bytes.
    #[must_use]
    pub fn next_str(self, s: &str) -> Self {
        self.next_bytes(s.as_bytes())
    }

    /// Finishes the hash.
    #[must_use]
    pub fn end(self) -> W {
        let h = W::mix(self.h, W::from_u64(self.len));
        W::finalize(h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let a = IterativeMurmur::<u32>::begin(7).next(1).next(2).end();
        let b = IterativeMurmur::<u32>::begin(7).next(1).next(2).end();
        assert_eq!(a, b);
    }

    #[test]
    fn seed_and_length_matter() {
        let base = IterativeMurmur::<u64>::begin(0).next(5).end();
        assert_ne!(base, IterativeMurmur::<u64>::begin(1).next(5).end());
        assert_ne!(base, IterativeMurmur::<u64>::begin(0).next(5).next(0).end());
        assert_ne!(
            IterativeMurmur::<u64>::begin(0).end(),
            IterativeMurmur::<u64>::begin(0).next(0).end()
        );
    }

    #[test]
    fn strings_differing_in_tail() {
        let h = |s: &str| IterativeMurmur::<u32>::begin(0).next_str(s).end();
        assert_ne!(h("data.color"), h("data.colos"));
        assert_ne!(h("abc"), h("abc\0"));
        assert_eq!(h("uv * 2.0"), h("uv * 2.0"));
    }

    #[test]
    fn byte_packing_is_little_endian() {
        let packed = IterativeMurmur::<u32>::begin(3)
            .next(0x6463_6261)
            .next(4)
            .end();
        let bytes = IterativeMurmur::<u32>::begin(3).next_str("abcd").end();
        assert_eq!(packed, bytes);
    }
}
