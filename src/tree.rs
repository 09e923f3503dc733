//! Red-black tree over the node pool.
//!
//! Nodes are addressed by [`Link`] and never move: erasing a node with two
//! children relinks its in-order successor into its place instead of copying
//! the successor's payload. Every other slot keeps its key, which is what lets
//! positions to untouched elements survive an erase.

use core::borrow::Borrow;

use crate::compare::Compare;
use crate::error::Result;
use crate::pool::{Color, Link, NodePool};
use crate::tracing_helpers::trace_log;

#[derive(Clone, Debug)]
pub(crate) struct RbTree<K, V, const N: usize, C> {
    pub(crate) pool: NodePool<K, V, N>,
    root: Link,
    cmp: C,
}

impl<K, V, const N: usize, C> RbTree<K, V, N, C> {
    pub(crate) fn new(cmp: C) -> Self {
        Self {
            pool: NodePool::new(),
            root: Link::NIL,
            cmp,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.pool.occupied_count()
    }

    #[inline]
    pub(crate) fn comparator(&self) -> &C {
        &self.cmp
    }

    pub(crate) fn clear(&mut self) {
        self.pool.reset();
        self.root = Link::NIL;
    }

    // =========================================================================
    // Link accessors (NIL-tolerant where the algorithms need it)
    // =========================================================================

    #[inline]
    fn parent(&self, n: Link) -> Link {
        self.pool.node(n).parent
    }

    #[inline]
    fn left(&self, n: Link) -> Link {
        self.pool.node(n).left
    }

    #[inline]
    fn right(&self, n: Link) -> Link {
        self.pool.node(n).right
    }

    /// NIL leaves are black.
    #[inline]
    fn color(&self, n: Link) -> Color {
        if n.is_nil() {
            Color::Black
        } else {
            self.pool.node(n).color
        }
    }

    #[inline]
    fn set_color(&mut self, n: Link, color: Color) {
        if !n.is_nil() {
            self.pool.node_mut(n).color = color;
        }
    }

    #[inline]
    fn set_parent(&mut self, n: Link, parent: Link) {
        if !n.is_nil() {
            self.pool.node_mut(n).parent = parent;
        }
    }

    #[inline]
    fn set_left(&mut self, n: Link, child: Link) {
        self.pool.node_mut(n).left = child;
    }

    #[inline]
    fn set_right(&mut self, n: Link, child: Link) {
        self.pool.node_mut(n).right = child;
    }

    #[inline]
    pub(crate) fn key(&self, n: Link) -> &K {
        &self.pool.entry(n).0
    }

    /// Points `parent`'s child slot that held `old` (or the root) at `new`.
    fn replace_child(&mut self, parent: Link, old: Link, new: Link) {
        if parent.is_nil() {
            self.root = new;
        } else if self.left(parent) == old {
            self.set_left(parent, new);
        } else {
            self.set_right(parent, new);
        }
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    fn minimum(&self, mut n: Link) -> Link {
        while !self.left(n).is_nil() {
            n = self.left(n);
        }
        n
    }

    fn maximum(&self, mut n: Link) -> Link {
        while !self.right(n).is_nil() {
            n = self.right(n);
        }
        n
    }

    pub(crate) fn first(&self) -> Link {
        if self.root.is_nil() {
            Link::NIL
        } else {
            self.minimum(self.root)
        }
    }

    pub(crate) fn last(&self) -> Link {
        if self.root.is_nil() {
            Link::NIL
        } else {
            self.maximum(self.root)
        }
    }

    /// In-order successor of an occupied node; NIL past the last one.
    pub(crate) fn successor(&self, n: Link) -> Link {
        if !self.right(n).is_nil() {
            return self.minimum(self.right(n));
        }
        let mut child = n;
        let mut parent = self.parent(n);
        while !parent.is_nil() && child == self.right(parent) {
            child = parent;
            parent = self.parent(parent);
        }
        parent
    }

    /// In-order predecessor of an occupied node; NIL before the first one.
    pub(crate) fn predecessor(&self, n: Link) -> Link {
        if !self.left(n).is_nil() {
            return self.maximum(self.left(n));
        }
        let mut child = n;
        let mut parent = self.parent(n);
        while !parent.is_nil() && child == self.left(parent) {
            child = parent;
            parent = self.parent(parent);
        }
        parent
    }

    // =========================================================================
    // Rotations
    // =========================================================================

    fn rotate_left(&mut self, x: Link) {
        let y = self.right(x);
        let y_left = self.left(y);
        self.set_right(x, y_left);
        self.set_parent(y_left, x);

        let x_parent = self.parent(x);
        self.set_parent(y, x_parent);
        self.replace_child(x_parent, x, y);

        self.set_left(y, x);
        self.set_parent(x, y);
    }

    fn rotate_right(&mut self, x: Link) {
        let y = self.left(x);
        let y_right = self.right(y);
        self.set_left(x, y_right);
        self.set_parent(y_right, x);

        let x_parent = self.parent(x);
        self.set_parent(y, x_parent);
        self.replace_child(x_parent, x, y);

        self.set_right(y, x);
        self.set_parent(x, y);
    }

    // =========================================================================
    // Erase
    // =========================================================================

    /// Unlinks `z`, rebalances, releases its slot and returns the payload
    /// together with the link that now follows `z` in order.
    pub(crate) fn erase(&mut self, z: Link) -> (Link, (K, V)) {
        let next = self.successor(z);

        let z_left = self.left(z);
        let z_right = self.right(z);
        let z_parent = self.parent(z);

        let x;
        let x_parent;
        let removed_color;

        if z_left.is_nil() || z_right.is_nil() {
            x = if z_left.is_nil() { z_right } else { z_left };
            x_parent = z_parent;
            self.set_parent(x, z_parent);
            self.replace_child(z_parent, z, x);
            removed_color = self.color(z);
        } else {
            // Move the successor node (not its payload) into z's position.
            let y = next;
            x = self.right(y);
            removed_color = self.color(y);

            self.set_parent(z_left, y);
            self.set_left(y, z_left);

            if y == z_right {
                x_parent = y;
            } else {
                let y_parent = self.parent(y);
                x_parent = y_parent;
                self.set_parent(x, y_parent);
                self.set_left(y_parent, x);
                self.set_right(y, z_right);
                self.set_parent(z_right, y);
            }

            self.replace_child(z_parent, z, y);
            self.set_parent(y, z_parent);
            let z_color = self.color(z);
            self.set_color(y, z_color);
        }

        if removed_color == Color::Black {
            self.erase_fixup(x, x_parent);
        }

        trace_log!(slot = ?z, "erase");
        (next, self.pool.release(z))
    }

    fn erase_fixup(&mut self, mut x: Link, mut x_parent: Link) {
        while x != self.root && self.color(x) == Color::Black {
            if x == self.left(x_parent) {
                let mut w = self.right(x_parent);
                if self.color(w) == Color::Red {
                    self.set_color(w, Color::Black);
                    self.set_color(x_parent, Color::Red);
                    self.rotate_left(x_parent);
                    w = self.right(x_parent);
                }
                if self.color(self.left(w)) == Color::Black
                    && self.color(self.right(w)) == Color::Black
                {
                    self.set_color(w, Color::Red);
                    x = x_parent;
                    x_parent = self.parent(x_parent);
                } else {
                    if self.color(self.right(w)) == Color::Black {
                        let w_left = self.left(w);
                        self.set_color(w_left, Color::Black);
                        self.set_color(w, Color::Red);
                        self.rotate_right(w);
                        w = self.right(x_parent);
                    }
                    let parent_color = self.color(x_parent);
                    self.set_color(w, parent_color);
                    self.set_color(x_parent, Color::Black);
                    let w_right = self.right(w);
                    self.set_color(w_right, Color::Black);
                    self.rotate_left(x_parent);
                    x = self.root;
                    break;
                }
            } else {
                let mut w = self.left(x_parent);
                if self.color(w) == Color::Red {
                    self.set_color(w, Color::Black);
                    self.set_color(x_parent, Color::Red);
                    self.rotate_right(x_parent);
                    w = self.left(x_parent);
                }
                if self.color(self.right(w)) == Color::Black
                    && self.color(self.left(w)) == Color::Black
                {
                    self.set_color(w, Color::Red);
                    x = x_parent;
                    x_parent = self.parent(x_parent);
                } else {
                    if self.color(self.left(w)) == Color::Black {
                        let w_right = self.right(w);
                        self.set_color(w_right, Color::Black);
                        self.set_color(w, Color::Red);
                        self.rotate_left(w);
                        w = self.left(x_parent);
                    }
                    let parent_color = self.color(x_parent);
                    self.set_color(w, parent_color);
                    self.set_color(x_parent, Color::Black);
                    let w_left = self.left(w);
                    self.set_color(w_left, Color::Black);
                    self.rotate_right(x_parent);
                    x = self.root;
                    break;
                }
            }
        }
        self.set_color(x, Color::Black);
    }

    // =========================================================================
    // Insert fixup
    // =========================================================================

    fn insert_fixup(&mut self, mut z: Link) {
        while self.color(self.parent(z)) == Color::Red {
            // A red parent is never the root, so the grandparent exists.
            let mut p = self.parent(z);
            let g = self.parent(p);
            if p == self.left(g) {
                let uncle = self.right(g);
                if self.color(uncle) == Color::Red {
                    self.set_color(p, Color::Black);
                    self.set_color(uncle, Color::Black);
                    self.set_color(g, Color::Red);
                    z = g;
                } else {
                    if z == self.right(p) {
                        z = p;
                        self.rotate_left(z);
                        p = self.parent(z);
                    }
                    self.set_color(p, Color::Black);
                    self.set_color(g, Color::Red);
                    self.rotate_right(g);
                }
            } else {
                let uncle = self.left(g);
                if self.color(uncle) == Color::Red {
                    self.set_color(p, Color::Black);
                    self.set_color(uncle, Color::Black);
                    self.set_color(g, Color::Red);
                    z = g;
                } else {
                    if z == self.left(p) {
                        z = p;
                        self.rotate_right(z);
                        p = self.parent(z);
                    }
                    self.set_color(p, Color::Black);
                    self.set_color(g, Color::Red);
                    self.rotate_left(g);
                }
            }
        }
        let root = self.root;
        self.set_color(root, Color::Black);
    }

    /// Allocates a node and hangs it under `parent` on the given side.
    fn attach(&mut self, parent: Link, as_left: bool, key: K, value: V) -> Result<Link> {
        let z = self.pool.allocate(key, value)?;
        self.pool.node_mut(z).parent = parent;
        if parent.is_nil() {
            self.root = z;
        } else if as_left {
            self.set_left(parent, z);
        } else {
            self.set_right(parent, z);
        }
        self.insert_fixup(z);
        trace_log!(slot = ?z, "insert");
        Ok(z)
    }
}

impl<K, V, const N: usize, C> RbTree<K, V, N, C> {
    // =========================================================================
    // Lookup
    // =========================================================================

    /// First node whose key is not less than `key`; NIL when none.
    pub(crate) fn lower_bound<Q>(&self, key: &Q) -> Link
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        let mut result = Link::NIL;
        let mut n = self.root;
        while !n.is_nil() {
            let k: &Q = self.key(n).borrow();
            if self.cmp.less(k, key) {
                n = self.right(n);
            } else {
                result = n;
                n = self.left(n);
            }
        }
        result
    }

    /// First node whose key is greater than `key`; NIL when none.
    pub(crate) fn upper_bound<Q>(&self, key: &Q) -> Link
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        let mut result = Link::NIL;
        let mut n = self.root;
        while !n.is_nil() {
            let k: &Q = self.key(n).borrow();
            if self.cmp.less(key, k) {
                result = n;
                n = self.left(n);
            } else {
                n = self.right(n);
            }
        }
        result
    }

    pub(crate) fn equal_range<Q>(&self, key: &Q) -> (Link, Link)
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        (self.lower_bound(key), self.upper_bound(key))
    }

    pub(crate) fn find<Q>(&self, key: &Q) -> Link
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        let mut n = self.root;
        while !n.is_nil() {
            let k: &Q = self.key(n).borrow();
            if self.cmp.less(key, k) {
                n = self.left(n);
            } else if self.cmp.less(k, key) {
                n = self.right(n);
            } else {
                return n;
            }
        }
        Link::NIL
    }

    // =========================================================================
    // Insert
    // =========================================================================

    /// Inserts `key` unless an equivalent key is present. Returns the node
    /// holding the key and whether it was created. The stored value of an
    /// existing key is never replaced; on `CapacityExceeded` the tree is
    /// untouched.
    pub(crate) fn insert(&mut self, key: K, value: V) -> Result<(Link, bool)>
    where
        C: Compare<K>,
    {
        let mut parent = Link::NIL;
        let mut as_left = false;
        let mut n = self.root;
        while !n.is_nil() {
            parent = n;
            if self.cmp.less(&key, self.key(n)) {
                as_left = true;
                n = self.left(n);
            } else if self.cmp.less(self.key(n), &key) {
                as_left = false;
                n = self.right(n);
            } else {
                return Ok((n, false));
            }
        }
        let z = self.attach(parent, as_left, key, value)?;
        Ok((z, true))
    }

    /// Like [`insert`](Self::insert), but first tries to attach the node
    /// directly in front of `hint` (NIL meaning the end). A hint that does not
    /// bracket the key falls back to a full descent, so the outcome never
    /// depends on the hint.
    pub(crate) fn insert_with_hint(&mut self, hint: Link, key: K, value: V) -> Result<(Link, bool)>
    where
        C: Compare<K>,
    {
        if let Some((parent, as_left)) = self.hinted_parent(hint, &key) {
            let z = self.attach(parent, as_left, key, value)?;
            return Ok((z, true));
        }
        trace_log!(hint = ?hint, "insert hint not usable");
        self.insert(key, value)
    }

    /// Attachment point for a key that sorts strictly between the predecessor
    /// of `hint` and `hint` itself.
    fn hinted_parent(&self, hint: Link, key: &K) -> Option<(Link, bool)>
    where
        C: Compare<K>,
    {
        if self.root.is_nil() {
            return None;
        }
        if hint.is_nil() {
            let last = self.last();
            return self
                .cmp
                .less(self.key(last), key)
                .then_some((last, false));
        }
        if !self.cmp.less(key, self.key(hint)) {
            return None;
        }
        let prev = self.predecessor(hint);
        if prev.is_nil() {
            // hint is the first node, so its left slot is free.
            return Some((hint, true));
        }
        if !self.cmp.less(self.key(prev), key) {
            return None;
        }
        // Adjacent nodes: either prev has no right child or hint has no left.
        if self.right(prev).is_nil() {
            Some((prev, false))
        } else {
            Some((hint, true))
        }
    }
}

// =============================================================================
// Invariant checks
// =============================================================================

#[cfg(test)]
impl<K, V, const N: usize, C: Compare<K>> RbTree<K, V, N, C> {
    /// Asserts every structural invariant and returns the black height.
    pub(crate) fn validate(&self) -> usize {
        assert_eq!(self.color(self.root), Color::Black, "root must be black");
        if !self.root.is_nil() {
            assert!(self.parent(self.root).is_nil(), "root has a parent");
        }
        let mut reachable = 0usize;
        let black_height = self.validate_subtree(self.root, &mut reachable);

        assert_eq!(reachable, self.len(), "reachable nodes must match len");
        assert_eq!(
            self.pool.free_list_len() + reachable,
            N,
            "free list and tree must partition the pool"
        );
        for link in self.pool.occupied_links() {
            let mut n = link;
            while !self.parent(n).is_nil() {
                n = self.parent(n);
            }
            assert_eq!(n, self.root, "occupied slot {link:?} is not in the tree");
        }

        let mut prev = Link::NIL;
        let mut n = self.first();
        while !n.is_nil() {
            if !prev.is_nil() {
                assert!(
                    self.cmp.less(self.key(prev), self.key(n)),
                    "in-order keys must be strictly increasing"
                );
            }
            prev = n;
            n = self.successor(n);
        }
        black_height
    }

    fn validate_subtree(&self, n: Link, reachable: &mut usize) -> usize {
        if n.is_nil() {
            return 1;
        }
        *reachable += 1;
        let left = self.left(n);
        let right = self.right(n);
        for child in [left, right] {
            if !child.is_nil() {
                assert_eq!(self.parent(child), n, "child/parent links disagree");
            }
        }
        if self.color(n) == Color::Red {
            assert_eq!(self.color(left), Color::Black, "red node with red child");
            assert_eq!(self.color(right), Color::Black, "red node with red child");
        }
        let lh = self.validate_subtree(left, reachable);
        let rh = self.validate_subtree(right, reachable);
        assert_eq!(lh, rh, "black heights differ below {n:?}");
        lh + usize::from(self.color(n) == Color::Black)
    }
}
