//! Arena-backed intrusive lists
//!
//! Nodes live in one `Vec` and refer to each other by index, so policies get
//! O(1) unlink/relink without reference-counted cycles. Several [`Links`]
//! can share an [`Arena`] (LFU keeps one list per frequency).

use std::collections::HashMap;

use bytes::Bytes;

const NIL: usize = usize::MAX;

#[derive(Debug)]
struct Node {
    key: Bytes,
    freq: u32,
    prev: usize,
    next: usize,
}

// == Arena ==
#[derive(Debug, Default)]
pub(crate) struct Arena {
    nodes: Vec<Node>,
    free: Vec<usize>,
}

impl Arena {
    /// Stores a detached node and returns its handle.
    pub fn alloc(&mut self, key: Bytes, freq: u32) -> usize {
        let node = Node {
            key,
            freq,
            prev: NIL,
            next: NIL,
        };
        match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    /// Returns a detached node's slot to the free list.
    pub fn release(&mut self, idx: usize) -> Bytes {
        self.free.push(idx);
        std::mem::take(&mut self.nodes[idx].key)
    }

    pub fn key(&self, idx: usize) -> &Bytes {
        &self.nodes[idx].key
    }

    pub fn freq(&self, idx: usize) -> u32 {
        self.nodes[idx].freq
    }

    pub fn set_freq(&mut self, idx: usize, freq: u32) {
        self.nodes[idx].freq = freq;
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
    }
}

// == Links ==
/// Head/tail of one list threaded through an [`Arena`].
#[derive(Debug, Clone, Copy)]
pub(crate) struct Links {
    head: usize,
    tail: usize,
    len: usize,
}

impl Default for Links {
    fn default() -> Self {
        Self {
            head: NIL,
            tail: NIL,
            len: 0,
        }
    }
}

impl Links {
    pub fn push_back(&mut self, arena: &mut Arena, idx: usize) {
        arena.nodes[idx].prev = self.tail;
        arena.nodes[idx].next = NIL;
        if self.tail == NIL {
            self.head = idx;
        } else {
            arena.nodes[self.tail].next = idx;
        }
        self.tail = idx;
        self.len += 1;
    }

    /// Detaches `idx`, which must belong to this list.
    pub fn unlink(&mut self, arena: &mut Arena, idx: usize) {
        let (prev, next) = (arena.nodes[idx].prev, arena.nodes[idx].next);
        if prev == NIL {
            self.head = next;
        } else {
            arena.nodes[prev].next = next;
        }
        if next == NIL {
            self.tail = prev;
        } else {
            arena.nodes[next].prev = prev;
        }
        arena.nodes[idx].prev = NIL;
        arena.nodes[idx].next = NIL;
        self.len -= 1;
    }

    pub fn front(&self) -> Option<usize> {
        (self.head != NIL).then_some(self.head)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Handles from front to back.
    pub fn iter<'a>(&self, arena: &'a Arena) -> impl Iterator<Item = usize> + 'a {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            if cursor == NIL {
                return None;
            }
            let idx = cursor;
            cursor = arena.nodes[idx].next;
            Some(idx)
        })
    }
}

// == Key Order ==
/// A single ordered list of keys with O(1) lookup, shared by the LRU and
/// FIFO policies. Front is the next victim.
#[derive(Debug, Default)]
pub(crate) struct KeyOrder {
    arena: Arena,
    index: HashMap<Bytes, usize>,
    order: Links,
}

impl KeyOrder {
    /// Appends `key` at the back. Returns false if it was already tracked.
    pub fn push_back(&mut self, key: Bytes) -> bool {
        if self.index.contains_key(&key) {
            return false;
        }
        let idx = self.arena.alloc(key.clone(), 0);
        self.order.push_back(&mut self.arena, idx);
        self.index.insert(key, idx);
        true
    }

    /// Moves a tracked key to the back.
    pub fn move_to_back(&mut self, key: &[u8]) {
        if let Some(&idx) = self.index.get(key) {
            self.order.unlink(&mut self.arena, idx);
            self.order.push_back(&mut self.arena, idx);
        }
    }

    pub fn remove(&mut self, key: &[u8]) -> bool {
        match self.index.remove(key) {
            Some(idx) => {
                self.order.unlink(&mut self.arena, idx);
                self.arena.release(idx);
                true
            }
            None => false,
        }
    }

    pub fn front(&self) -> Option<&Bytes> {
        self.order.front().map(|idx| self.arena.key(idx))
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn clear(&mut self) {
        self.arena.clear();
        self.index.clear();
        self.order = Links::default();
    }

    #[cfg(test)]
    pub fn keys(&self) -> Vec<Bytes> {
        self.order
            .iter(&self.arena)
            .map(|idx| self.arena.key(idx).clone())
            .collect()
    }
}
