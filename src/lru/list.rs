//! Circular doubly linked lists threaded through the slot array.
//!
//! The slot array is the arena and `prev`/`next` are positions in it, so a
//! list is just a head position and a length. The head's `prev` is the tail;
//! a node whose `prev == next == self` is the only element of its list.

use crate::lru::slot::{Slot, Word};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct SlotList {
    head: Option<usize>,
    len: usize,
}

impl SlotList {
    pub(crate) const fn new() -> Self {
        Self { head: None, len: 0 }
    }

    #[inline]
    pub(crate) fn head(&self) -> Option<usize> {
        self.head
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Tail position (least recently used for the MRU list).
    #[inline]
    pub(crate) fn tail<W: Word, const S: u32>(&self, slots: &[Slot<W, S>]) -> Option<usize> {
        self.head.map(|h| slots[h].prev())
    }

    pub(crate) fn push_front<W: Word, const S: u32>(&mut self, slots: &mut [Slot<W, S>], pos: usize) {
        match self.head {
            None => {
                slots[pos].set_prev(pos);
                slots[pos].set_next(pos);
            }
            Some(head) => {
                let tail = slots[head].prev();
                slots[pos].set_prev(tail);
                slots[pos].set_next(head);
                slots[tail].set_next(pos);
                slots[head].set_prev(pos);
            }
        }
        self.head = Some(pos);
        self.len += 1;
    }

    /// Unlinks `pos`. The slot's own links are left pointing at itself.
    pub(crate) fn detach<W: Word, const S: u32>(&mut self, slots: &mut [Slot<W, S>], pos: usize) {
        let next = slots[pos].next();
        if next == pos {
            self.head = None;
        } else {
            let prev = slots[pos].prev();
            slots[prev].set_next(next);
            slots[next].set_prev(prev);
            if self.head == Some(pos) {
                self.head = Some(next);
            }
        }
        slots[pos].set_prev(pos);
        slots[pos].set_next(pos);
        self.len -= 1;
    }

    pub(crate) fn move_to_front<W: Word, const S: u32>(
        &mut self,
        slots: &mut [Slot<W, S>],
        pos: usize,
    ) {
        if self.head != Some(pos) {
            self.detach(slots, pos);
            self.push_front(slots, pos);
        }
    }

    /// Repoints the neighbours of the node whose contents were just copied
    /// from `from` to `to`.
    ///
    /// `slots[to]` must already hold the node (with its old links) and `to`
    /// must not be linked into this list.
    pub(crate) fn relocate<W: Word, const S: u32>(
        &mut self,
        slots: &mut [Slot<W, S>],
        from: usize,
        to: usize,
    ) {
        let prev = slots[to].prev();
        let next = slots[to].next();
        if next == from {
            // Singleton.
            slots[to].set_prev(to);
            slots[to].set_next(to);
        } else {
            slots[prev].set_next(to);
            slots[next].set_prev(to);
        }
        if self.head == Some(from) {
            self.head = Some(to);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.head = None;
        self.len = 0;
    }

    /// Positions from head to tail.
    pub(crate) fn iter<'a, W: Word, const S: u32>(
        &self,
        slots: &'a [Slot<W, S>],
    ) -> SlotListIter<'a, W, S> {
        SlotListIter {
            slots,
            head: self.head,
            current: self.head,
            remaining: self.len,
        }
    }
}

pub(crate) struct SlotListIter<'a, W: Word, const S: u32> {
    slots: &'a [Slot<W, S>],
    head: Option<usize>,
    current: Option<usize>,
    remaining: usize,
}

impl<W: Word, const S: u32> Iterator for SlotListIter<'_, W, S> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        let pos = self.current?;
        self.remaining -= 1;
        let next = self.slots[pos].next();
        self.current = if Some(next) == self.head { None } else { Some(next) };
        Some(pos)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}
