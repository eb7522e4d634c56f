//! Object cache indexed by a [`BitsRobinLruPool`].

use crate::error::{InvariantError, Result};
use crate::lru::robin::BitsRobinLruPool;
use crate::lru::slot::Word;

/// Fixed-capacity LRU map from machine-word keys to owned values.
///
/// Values live in a flat array indexed by the pool's slot values. A slot's
/// object is created on first insertion and dropped (or handed back) when
/// its key is evicted or removed.
///
/// # Example
///
/// ```
/// use nitrogl::lru::LruCache;
///
/// let mut cache = LruCache::<&str, 2>::new(0.5);
/// cache.put(1, "one").unwrap();
/// cache.put(2, "two").unwrap();
/// assert_eq!(cache.get(1), Some(&mut "one"));
///
/// // Key 2 is now least recently used.
/// assert_eq!(cache.put(3, "three").unwrap(), Some((2, "two")));
/// ```
pub struct LruCache<V, const SIZE_BITS: u32, W: Word = u32> {
    index: BitsRobinLruPool<SIZE_BITS, W>,
    items: Box<[Option<V>]>,
}

impl<V, const SIZE_BITS: u32, W: Word> LruCache<V, SIZE_BITS, W> {
    /// Creates an empty cache; see
    /// [`BitsRobinLruPool::new`](crate::lru::BitsRobinLruPool::new) for
    /// `load_factor`.
    pub fn new(load_factor: f32) -> Self {
        let index = BitsRobinLruPool::new(load_factor);
        let items = (0..index.capacity()).map(|_| None).collect();
        Self { index, items }
    }

    /// Inserts or replaces the value for `key` and marks it most recently
    /// used.
    ///
    /// Returns the entry evicted to make room, so the caller can release
    /// anything it owns. A replaced value for the same key is dropped.
    ///
    /// # Errors
    ///
    /// Propagates [`Error::PoolExhausted`](crate::Error::PoolExhausted).
    pub fn put(&mut self, key: W, value: V) -> Result<Option<(W, V)>> {
        let put = self.index.get_or_put(key)?;
        let evicted = put
            .evicted
            .and_then(|e| self.items[e.value].take().map(|v| (e.key, v)));
        self.items[put.value] = Some(value);
        Ok(evicted)
    }

    /// Returns the value for `key` and marks it most recently used.
    pub fn get(&mut self, key: W) -> Option<&mut V> {
        let index = self.index.get(key)?;
        self.items[index].as_mut()
    }

    /// Returns the value for `key` without touching recency.
    pub fn peek(&self, key: W) -> Option<&V> {
        let index = self.index.peek(key)?;
        self.items[index].as_ref()
    }

    /// Returns `true` if `key` is cached.
    pub fn contains(&self, key: W) -> bool {
        self.index.has(key)
    }

    /// Removes `key` and returns its value.
    pub fn remove(&mut self, key: W) -> Option<V> {
        let index = self.index.remove(key)?;
        self.items[index].take()
    }

    /// Removes every entry, returning them in MRU order.
    pub fn drain(&mut self) -> Vec<(W, V)> {
        let live: Vec<(W, usize)> = self.index.iter().collect();
        self.index.clear();
        live.into_iter()
            .filter_map(|(key, index)| self.items[index].take().map(|v| (key, v)))
            .collect()
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.index.clear();
        self.items.iter_mut().for_each(|item| *item = None);
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Entry ceiling above which insertions evict.
    pub fn max_size(&self) -> usize {
        self.index.max_size()
    }

    /// `(key, &value)` pairs from most to least recently used.
    pub fn iter(&self) -> impl Iterator<Item = (W, &V)> + '_ {
        self.index
            .iter()
            .filter_map(|(key, index)| self.items[index].as_ref().map(|v| (key, v)))
    }

    /// Validates the index and that exactly the live slots hold objects.
    ///
    /// # Errors
    ///
    /// Describes the first violated invariant.
    pub fn check_invariants(&self) -> std::result::Result<(), InvariantError> {
        self.index.check_invariants()?;
        let constructed = self.items.iter().filter(|i| i.is_some()).count();
        if constructed != self.index.len() {
            return Err(InvariantError::new(format!(
                "{constructed} objects constructed for {} live keys",
                self.index.len()
            )));
        }
        Ok(())
    }
}
