//! Object pool indexed by a [`BitsRobinLruPool`].

use crate::error::{InvariantError, Result};
use crate::lru::robin::BitsRobinLruPool;
use crate::lru::slot::Word;

/// Fixed set of pre-constructed objects recycled in LRU order.
///
/// Objects are built once and never dropped until the pool is. When a key
/// maps to an object that previously belonged to another key, [`get`]
/// reports `is_active == false` so the caller can reinitialise it.
///
/// [`get`]: Self::get
pub struct LruPool<V, const SIZE_BITS: u32, W: Word = u32> {
    index: BitsRobinLruPool<SIZE_BITS, W>,
    items: Box<[V]>,
}

impl<V: Default, const SIZE_BITS: u32, W: Word> LruPool<V, SIZE_BITS, W> {
    /// Creates a pool whose objects are all `V::default()`.
    pub fn new(load_factor: f32) -> Self {
        Self::construct(load_factor, |_| V::default())
    }
}

impl<V, const SIZE_BITS: u32, W: Word> LruPool<V, SIZE_BITS, W> {
    /// Creates a pool and builds every object up front with `make(index)`.
    pub fn construct(load_factor: f32, make: impl FnMut(usize) -> V) -> Self {
        let index = BitsRobinLruPool::new(load_factor);
        let items = (0..index.capacity()).map(make).collect();
        Self { index, items }
    }

    /// Returns the object for `key` and whether it already belonged to it.
    ///
    /// # Errors
    ///
    /// Propagates [`Error::PoolExhausted`](crate::Error::PoolExhausted).
    pub fn get(&mut self, key: W) -> Result<(&mut V, bool)> {
        let put = self.index.get_or_put(key)?;
        Ok((&mut self.items[put.value], put.is_active))
    }

    /// Returns the object for `key` if it is live, without touching recency.
    pub fn peek(&self, key: W) -> Option<&V> {
        self.index.peek(key).map(|i| &self.items[i])
    }

    /// Returns `true` if `key` is live.
    pub fn contains(&self, key: W) -> bool {
        self.index.has(key)
    }

    /// Releases `key`. Its object stays constructed for reuse.
    pub fn remove(&mut self, key: W) -> bool {
        self.index.remove(key).is_some()
    }

    /// Releases every key.
    pub fn clear(&mut self) {
        self.index.clear();
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns `true` if no key is live.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Number of objects.
    pub fn capacity(&self) -> usize {
        self.items.len()
    }

    /// Validates the underlying index.
    ///
    /// # Errors
    ///
    /// Describes the first violated invariant.
    pub fn check_invariants(&self) -> std::result::Result<(), InvariantError> {
        self.index.check_invariants()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn objects_are_built_once() {
        let mut built = 0;
        let mut pool = LruPool::<usize, 2>::construct(0.5, |i| {
            built += 1;
            i * 10
        });
        assert_eq!(built, 4);

        let (obj, active) = pool.get(1).unwrap();
        assert!(!active);
        assert_eq!(*obj, 10);
        *obj = 99;

        let (obj, active) = pool.get(1).unwrap();
        assert!(active);
        assert_eq!(*obj, 99);
    }

    #[test]
    fn evicted_object_is_recycled() {
        let mut pool = LruPool::<Vec<u8>, 2>::new(0.5);
        pool.get(0).unwrap().0.push(1);
        pool.get(1).unwrap().0.push(2);

        // Key 4 evicts key 0; the removed slot's object is what key 4 gets
        // once the freed slot is the one it lands in.
        let (obj, active) = pool.get(4).unwrap();
        assert!(!active);
        assert_eq!(obj.as_slice(), &[1]);
        assert!(!pool.contains(0));
        pool.check_invariants().unwrap();
    }

    #[test]
    fn remove_keeps_object_alive() {
        let mut pool = LruPool::<String, 3>::new(0.5);
        pool.get(5).unwrap().0.push_str("five");
        assert!(pool.remove(5));
        assert!(!pool.remove(5));
        assert_eq!(pool.peek(5), None);
        assert_eq!(pool.len(), 0);

        let (obj, active) = pool.get(5).unwrap();
        assert!(!active);
        assert_eq!(obj.as_str(), "five");
    }
}
