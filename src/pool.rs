//! Fixed-size node pool.
//!
//! All storage lives in one `[Node; N]` array owned by the pool. Unused slots
//! are threaded into an intrusive free list through their `parent` link, so
//! allocation and release are O(1) and never touch an allocator.

use crate::error::{MapError, Result};
use crate::tracing_helpers::debug_log;

// =============================================================================
// Slot links
// =============================================================================

/// Slot index inside the pool, or [`Link::NIL`].
///
/// Tree links (parent/left/right), the root, cursors and the free list all use
/// this type instead of references.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Link(u32);

impl Link {
    pub(crate) const NIL: Link = Link(u32::MAX);

    #[inline]
    pub(crate) fn new(index: usize) -> Self {
        debug_assert!(index < u32::MAX as usize);
        Self(index as u32)
    }

    #[inline]
    pub(crate) fn is_nil(self) -> bool {
        self == Self::NIL
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        debug_assert!(!self.is_nil());
        self.0 as usize
    }

    /// Index for range checks on untrusted links; `NIL` maps past any pool.
    #[inline]
    pub(crate) fn raw(self) -> usize {
        self.0 as usize
    }
}

impl core::fmt::Debug for Link {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.is_nil() {
            f.write_str("NIL")
        } else {
            write!(f, "#{}", self.0)
        }
    }
}

// =============================================================================
// Nodes
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Color {
    Red,
    Black,
}

#[derive(Clone, Debug)]
pub(crate) struct Node<K, V> {
    /// `Some` exactly while the slot is occupied.
    pub(crate) entry: Option<(K, V)>,
    pub(crate) color: Color,
    /// Doubles as the free-list "next" link while the slot is vacant.
    pub(crate) parent: Link,
    pub(crate) left: Link,
    pub(crate) right: Link,
    /// Bumped every time the slot is released; stale positions fail to match.
    pub(crate) generation: u32,
}

impl<K, V> Node<K, V> {
    fn vacant(next_free: Link, generation: u32) -> Self {
        Self {
            entry: None,
            color: Color::Black,
            parent: next_free,
            left: Link::NIL,
            right: Link::NIL,
            generation,
        }
    }
}

// =============================================================================
// Pool
// =============================================================================

#[derive(Clone, Debug)]
pub(crate) struct NodePool<K, V, const N: usize> {
    nodes: [Node<K, V>; N],
    free_head: Link,
    occupied: usize,
}

impl<K, V, const N: usize> NodePool<K, V, N> {
    const INDEX_FITS: () = assert!(N < u32::MAX as usize, "capacity must fit in a u32 slot index");

    pub(crate) fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::INDEX_FITS;
        Self {
            nodes: core::array::from_fn(|i| Node::vacant(Self::next_of(i), 0)),
            free_head: Self::first_free(),
            occupied: 0,
        }
    }

    #[inline]
    fn next_of(i: usize) -> Link {
        if i + 1 < N {
            Link::new(i + 1)
        } else {
            Link::NIL
        }
    }

    #[inline]
    fn first_free() -> Link {
        if N == 0 {
            Link::NIL
        } else {
            Link::new(0)
        }
    }

    #[inline]
    pub(crate) const fn capacity(&self) -> usize {
        N
    }

    #[inline]
    pub(crate) fn occupied_count(&self) -> usize {
        self.occupied
    }

    #[inline]
    pub(crate) fn is_full(&self) -> bool {
        self.free_head.is_nil()
    }

    /// Takes a slot off the free list and stores the payload in it as a
    /// detached red node.
    pub(crate) fn allocate(&mut self, key: K, value: V) -> Result<Link> {
        let link = self.free_head;
        if link.is_nil() {
            debug_log!(capacity = N, "node pool exhausted");
            return Err(MapError::CapacityExceeded { capacity: N });
        }

        let node = &mut self.nodes[link.index()];
        debug_assert!(node.entry.is_none(), "free list holds an occupied slot");
        self.free_head = node.parent;
        node.entry = Some((key, value));
        node.color = Color::Red;
        node.parent = Link::NIL;
        node.left = Link::NIL;
        node.right = Link::NIL;
        self.occupied += 1;
        Ok(link)
    }

    /// Clears the slot, pushes it back on the free list and hands back the
    /// payload. The caller must have unlinked the node from the tree.
    pub(crate) fn release(&mut self, link: Link) -> (K, V) {
        let free_head = self.free_head;
        let node = &mut self.nodes[link.index()];
        let entry = node.entry.take().expect("released slot must be occupied");
        let generation = node.generation.wrapping_add(1);
        *node = Node::vacant(free_head, generation);
        self.free_head = link;
        self.occupied -= 1;
        entry
    }

    /// Drops every payload and rebuilds the full free list.
    pub(crate) fn reset(&mut self) {
        for (i, node) in self.nodes.iter_mut().enumerate() {
            let generation = if node.entry.is_some() {
                node.generation.wrapping_add(1)
            } else {
                node.generation
            };
            *node = Node::vacant(Self::next_of(i), generation);
        }
        self.free_head = Self::first_free();
        self.occupied = 0;
    }

    #[inline]
    pub(crate) fn node(&self, link: Link) -> &Node<K, V> {
        &self.nodes[link.index()]
    }

    #[inline]
    pub(crate) fn node_mut(&mut self, link: Link) -> &mut Node<K, V> {
        &mut self.nodes[link.index()]
    }

    /// Looks up a link from outside the tree; `None` for out-of-range or
    /// vacant slots.
    #[inline]
    pub(crate) fn get(&self, link: Link) -> Option<&Node<K, V>> {
        self.nodes.get(link.raw()).filter(|node| node.entry.is_some())
    }

    #[inline]
    pub(crate) fn entry(&self, link: Link) -> &(K, V) {
        self.nodes[link.index()]
            .entry
            .as_ref()
            .expect("linked slot must be occupied")
    }

    #[inline]
    pub(crate) fn entry_mut(&mut self, link: Link) -> &mut (K, V) {
        self.nodes[link.index()]
            .entry
            .as_mut()
            .expect("linked slot must be occupied")
    }

    #[cfg(test)]
    pub(crate) fn free_list_len(&self) -> usize {
        let mut len = 0;
        let mut cur = self.free_head;
        while !cur.is_nil() {
            assert!(self.nodes[cur.index()].entry.is_none());
            len += 1;
            cur = self.nodes[cur.index()].parent;
        }
        len
    }

    #[cfg(test)]
    pub(crate) fn occupied_links(&self) -> impl Iterator<Item = Link> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.entry.is_some())
            .map(|(i, _)| Link::new(i))
    }
}
