//! The public map type.

use core::borrow::Borrow;
use core::fmt;
use core::ops::{Bound, RangeBounds};
use core::sync::atomic::{AtomicU32, Ordering};

use crate::compare::{Compare, Less};
use crate::cursor::{Cursor, CursorMut, Position};
use crate::error::{MapError, Result};
use crate::pool::Link;
use crate::tracing_helpers::debug_log;
use crate::tree::RbTree;

/// Ordered map with room for exactly `N` entries, stored inline.
///
/// Keys are unique under the comparator `C`. Inserting a new key into a full
/// map fails with [`MapError::CapacityExceeded`] and leaves the map unchanged;
/// no operation ever allocates.
///
/// ```rust
/// use fixed_rbmap::{FixedMap, MapError};
///
/// let mut map: FixedMap<u32, &str, 2> = FixedMap::new();
/// map.insert(2, "b")?;
/// map.insert(1, "a")?;
/// assert_eq!(map.insert(3, "c"), Err(MapError::CapacityExceeded { capacity: 2 }));
/// assert_eq!(map.iter().collect::<Vec<_>>(), [(&1, &"a"), (&2, &"b")]);
/// # Ok::<(), MapError>(())
/// ```
pub struct FixedMap<K, V, const N: usize, C = Less> {
    pub(crate) tree: RbTree<K, V, N, C>,
    /// Stamped into every [`Position`] this map hands out.
    id: u32,
}

/// Map ids start at 1; [`Position::END`] carries 0.
static NEXT_MAP_ID: AtomicU32 = AtomicU32::new(1);

fn next_map_id() -> u32 {
    NEXT_MAP_ID.fetch_add(1, Ordering::Relaxed)
}

impl<K, V, const N: usize> FixedMap<K, V, N> {
    pub fn new() -> Self {
        Self::with_comparator(Less)
    }
}

impl<K, V, const N: usize, C> FixedMap<K, V, N, C> {
    pub fn with_comparator(cmp: C) -> Self {
        Self {
            tree: RbTree::new(cmp),
            id: next_map_id(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.tree.pool.is_full()
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        self.tree.pool.capacity()
    }

    /// Same as [`capacity`](Self::capacity); the map never grows.
    #[inline]
    pub const fn max_size(&self) -> usize {
        N
    }

    /// Free slots left.
    #[inline]
    pub fn remaining_capacity(&self) -> usize {
        N - self.len()
    }

    pub fn comparator(&self) -> &C {
        self.tree.comparator()
    }

    /// Drops every entry. Capacity is unchanged and every outstanding
    /// [`Position`] other than [`Position::END`] becomes invalid.
    pub fn clear(&mut self) {
        debug_log!(len = self.len(), "clear");
        self.tree.clear();
    }

    // =========================================================================
    // Positions
    // =========================================================================

    pub(crate) fn position_of(&self, link: Link) -> Position {
        if link.is_nil() {
            Position::END
        } else {
            Position {
                link,
                generation: self.tree.pool.node(link).generation,
                map: self.id,
            }
        }
    }

    /// Maps a caller-supplied position back to a live link. Positions taken
    /// from another map are rejected.
    fn resolve(&self, pos: Position) -> Result<Link> {
        if pos.link.is_nil() {
            return Ok(Link::NIL);
        }
        if pos.map != self.id {
            return Err(MapError::InvalidCursor);
        }
        match self.tree.pool.get(pos.link) {
            Some(node) if node.generation == pos.generation => Ok(pos.link),
            _ => Err(MapError::InvalidCursor),
        }
    }

    /// Erases the element at `pos` and returns the position of the element
    /// that followed it (or [`Position::END`]).
    pub fn erase_at(&mut self, pos: Position) -> Result<Position> {
        let link = self.resolve(pos)?;
        if link.is_nil() {
            return Err(MapError::InvalidCursor);
        }
        let (next, _) = self.tree.erase(link);
        Ok(self.position_of(next))
    }

    /// Erases the half-open range `[first, last)` and returns `last`.
    ///
    /// The whole range is checked before anything is erased: if `last` is not
    /// reachable from `first`, nothing changes and `InvalidCursor` is returned.
    pub fn erase_range(&mut self, first: Position, last: Position) -> Result<Position> {
        let first = self.resolve(first)?;
        let last = self.resolve(last)?;

        let mut count = 0usize;
        let mut n = first;
        while n != last {
            if n.is_nil() {
                return Err(MapError::InvalidCursor);
            }
            n = self.tree.successor(n);
            count += 1;
        }

        let mut n = first;
        for _ in 0..count {
            n = self.tree.erase(n).0;
        }
        debug_assert_eq!(n, last);
        Ok(self.position_of(last))
    }

    /// Keeps only the entries for which `f` returns `true`, visiting them in
    /// order.
    pub fn retain(&mut self, mut f: impl FnMut(&K, &mut V) -> bool) {
        let mut n = self.tree.first();
        while !n.is_nil() {
            let (k, v) = self.tree.pool.entry_mut(n);
            if f(&*k, v) {
                n = self.tree.successor(n);
            } else {
                n = self.tree.erase(n).0;
            }
        }
    }

    /// Calls `f` on every entry in order with mutable access to the value.
    pub fn for_each_mut(&mut self, mut f: impl FnMut(&K, &mut V)) {
        let mut n = self.tree.first();
        while !n.is_nil() {
            let (k, v) = self.tree.pool.entry_mut(n);
            f(&*k, v);
            n = self.tree.successor(n);
        }
    }

    // =========================================================================
    // Cursors and iteration
    // =========================================================================

    fn cursor(&self, link: Link) -> Cursor<'_, K, V, N, C> {
        Cursor { map: self, link }
    }

    fn cursor_mut(&mut self, link: Link) -> CursorMut<'_, K, V, N, C> {
        CursorMut { map: self, link }
    }

    /// Cursor at the smallest key (the end cursor when empty).
    pub fn cursor_front(&self) -> Cursor<'_, K, V, N, C> {
        self.cursor(self.tree.first())
    }

    /// Cursor at the largest key (the end cursor when empty).
    pub fn cursor_back(&self) -> Cursor<'_, K, V, N, C> {
        self.cursor(self.tree.last())
    }

    /// Past-the-end cursor; [`Cursor::retreat`] from here walks in reverse.
    pub fn cursor_end(&self) -> Cursor<'_, K, V, N, C> {
        self.cursor(Link::NIL)
    }

    pub fn cursor_front_mut(&mut self) -> CursorMut<'_, K, V, N, C> {
        let first = self.tree.first();
        self.cursor_mut(first)
    }

    pub fn cursor_back_mut(&mut self) -> CursorMut<'_, K, V, N, C> {
        let last = self.tree.last();
        self.cursor_mut(last)
    }

    pub fn cursor_end_mut(&mut self) -> CursorMut<'_, K, V, N, C> {
        self.cursor_mut(Link::NIL)
    }

    pub fn cursor_at(&self, pos: Position) -> Result<Cursor<'_, K, V, N, C>> {
        let link = self.resolve(pos)?;
        Ok(self.cursor(link))
    }

    pub fn cursor_at_mut(&mut self, pos: Position) -> Result<CursorMut<'_, K, V, N, C>> {
        let link = self.resolve(pos)?;
        Ok(self.cursor_mut(link))
    }

    pub fn first_key_value(&self) -> Option<(&K, &V)> {
        self.cursor_front().key_value().ok()
    }

    pub fn last_key_value(&self) -> Option<(&K, &V)> {
        self.cursor_back().key_value().ok()
    }

    /// Entries in ascending order; `.rev()` walks them descending.
    pub fn iter(&self) -> Iter<'_, K, V, N, C> {
        Iter {
            tree: &self.tree,
            front: self.tree.first(),
            back: self.tree.last(),
        }
    }

    pub fn keys(&self) -> impl DoubleEndedIterator<Item = &K> + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl DoubleEndedIterator<Item = &V> + '_ {
        self.iter().map(|(_, v)| v)
    }
}

impl<K, V, const N: usize, C> FixedMap<K, V, N, C> {
    // =========================================================================
    // Lookup
    // =========================================================================

    /// Cursor at `key`, or the end cursor.
    pub fn find<Q>(&self, key: &Q) -> Cursor<'_, K, V, N, C>
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.cursor(self.tree.find(key))
    }

    pub fn find_mut<Q>(&mut self, key: &Q) -> CursorMut<'_, K, V, N, C>
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        let link = self.tree.find(key);
        self.cursor_mut(link)
    }

    /// Cursor at the first key not less than `key`.
    pub fn lower_bound<Q>(&self, key: &Q) -> Cursor<'_, K, V, N, C>
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.cursor(self.tree.lower_bound(key))
    }

    pub fn lower_bound_mut<Q>(&mut self, key: &Q) -> CursorMut<'_, K, V, N, C>
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        let link = self.tree.lower_bound(key);
        self.cursor_mut(link)
    }

    /// Cursor at the first key greater than `key`.
    pub fn upper_bound<Q>(&self, key: &Q) -> Cursor<'_, K, V, N, C>
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.cursor(self.tree.upper_bound(key))
    }

    pub fn upper_bound_mut<Q>(&mut self, key: &Q) -> CursorMut<'_, K, V, N, C>
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        let link = self.tree.upper_bound(key);
        self.cursor_mut(link)
    }

    /// `(lower_bound(key), upper_bound(key))`; spans at most one element.
    pub fn equal_range<Q>(&self, key: &Q) -> (Cursor<'_, K, V, N, C>, Cursor<'_, K, V, N, C>)
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        let (lo, hi) = self.tree.equal_range(key);
        (self.cursor(lo), self.cursor(hi))
    }

    /// Entries whose keys fall inside `range`, in ascending order. An empty or
    /// inverted range yields nothing.
    pub fn range<Q, R>(&self, range: R) -> Iter<'_, K, V, N, C>
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
        R: RangeBounds<Q>,
    {
        let front = match range.start_bound() {
            Bound::Included(q) => self.tree.lower_bound(q),
            Bound::Excluded(q) => self.tree.upper_bound(q),
            Bound::Unbounded => self.tree.first(),
        };
        let end = match range.end_bound() {
            Bound::Included(q) => self.tree.upper_bound(q),
            Bound::Excluded(q) => self.tree.lower_bound(q),
            Bound::Unbounded => Link::NIL,
        };
        let back = if end.is_nil() {
            self.tree.last()
        } else {
            self.tree.predecessor(end)
        };

        let empty = front.is_nil() || back.is_nil() || {
            let lo: &Q = self.tree.key(front).borrow();
            let hi: &Q = self.tree.key(back).borrow();
            front != back && self.tree.comparator().less(hi, lo)
        };
        if empty {
            return Iter {
                tree: &self.tree,
                front: Link::NIL,
                back: Link::NIL,
            };
        }
        Iter {
            tree: &self.tree,
            front,
            back,
        }
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.find(key).value().ok()
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        let link = self.tree.find(key);
        if link.is_nil() {
            None
        } else {
            Some(&mut self.tree.pool.entry_mut(link).1)
        }
    }

    /// Checked access; never inserts.
    pub fn at<Q>(&self, key: &Q) -> Result<&V>
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.get(key).ok_or(MapError::KeyNotFound)
    }

    pub fn at_mut<Q>(&mut self, key: &Q) -> Result<&mut V>
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.get_mut(key).ok_or(MapError::KeyNotFound)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        !self.tree.find(key).is_nil()
    }

    /// `1` if `key` is stored, else `0`.
    pub fn count<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        usize::from(self.contains_key(key))
    }

    // =========================================================================
    // Removal by key
    // =========================================================================

    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        let link = self.tree.find(key);
        if link.is_nil() {
            return None;
        }
        Some(self.tree.erase(link).1)
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.remove_entry(key).map(|(_, v)| v)
    }

    /// Number of entries removed (`0` or `1`).
    pub fn erase<Q>(&mut self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        usize::from(self.remove_entry(key).is_some())
    }
}

impl<K, V, const N: usize, C: Compare<K>> FixedMap<K, V, N, C> {
    // =========================================================================
    // Insertion
    // =========================================================================

    /// Builds a map from `iter`, failing if it yields more than `N` distinct
    /// keys. Later duplicates of a key are ignored.
    ///
    /// The partially built map is dropped on failure. To keep the entries
    /// inserted before the overflow, start from [`new`](FixedMap::new) or
    /// [`with_comparator`](Self::with_comparator) and call
    /// [`insert_iter`](Self::insert_iter).
    pub fn try_from_iter<I>(iter: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        C: Default,
    {
        let mut map = Self::with_comparator(C::default());
        map.insert_iter(iter)?;
        Ok(map)
    }

    /// Inserts `key` unless an equivalent key is already present, in which
    /// case the stored value is kept and `value` is dropped. Returns the
    /// position of the key and whether it was inserted.
    pub fn insert(&mut self, key: K, value: V) -> Result<(Position, bool)> {
        let (link, inserted) = self.tree.insert(key, value)?;
        Ok((self.position_of(link), inserted))
    }

    /// Same result as [`insert`](Self::insert). `hint` is the position the
    /// key is expected to precede; a correct hint skips the descent, a wrong
    /// or stale one is ignored.
    pub fn insert_with_hint(&mut self, hint: Position, key: K, value: V) -> Result<(Position, bool)> {
        let (link, inserted) = match self.resolve(hint) {
            Ok(hint) => self.tree.insert_with_hint(hint, key, value)?,
            Err(_) => self.tree.insert(key, value)?,
        };
        Ok((self.position_of(link), inserted))
    }

    /// Inserts every pair in order. On overflow the pairs inserted before the
    /// failing one stay in the map.
    pub fn insert_iter<I>(&mut self, iter: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        for (key, value) in iter {
            self.tree.insert(key, value)?;
        }
        Ok(())
    }

    /// Replaces the contents with the pairs of `iter`.
    pub fn assign<I>(&mut self, iter: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        self.clear();
        self.insert_iter(iter)
    }

    /// Value for `key`, inserting `f()` first if it is absent.
    pub fn get_or_insert_with(&mut self, key: K, f: impl FnOnce() -> V) -> Result<&mut V> {
        let mut link = self.tree.find(&key);
        if link.is_nil() {
            link = self.tree.insert(key, f())?.0;
        }
        Ok(&mut self.tree.pool.entry_mut(link).1)
    }

    /// Value for `key`, inserting `V::default()` first if it is absent.
    pub fn get_or_insert_default(&mut self, key: K) -> Result<&mut V>
    where
        V: Default,
    {
        self.get_or_insert_with(key, V::default)
    }
}

// =============================================================================
// Iterators
// =============================================================================

/// Double-ended iterator over a contiguous run of entries.
pub struct Iter<'a, K, V, const N: usize, C = Less> {
    tree: &'a RbTree<K, V, N, C>,
    /// Both ends are inclusive; both NIL once exhausted.
    front: Link,
    back: Link,
}

impl<K, V, const N: usize, C> Clone for Iter<'_, K, V, N, C> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree,
            front: self.front,
            back: self.back,
        }
    }
}

impl<'a, K, V, const N: usize, C> Iterator for Iter<'a, K, V, N, C> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.front.is_nil() {
            return None;
        }
        let link = self.front;
        if link == self.back {
            self.front = Link::NIL;
            self.back = Link::NIL;
        } else {
            self.front = self.tree.successor(link);
        }
        let (k, v) = self.tree.pool.entry(link);
        Some((k, v))
    }
}

impl<K, V, const N: usize, C> DoubleEndedIterator for Iter<'_, K, V, N, C> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.back.is_nil() {
            return None;
        }
        let link = self.back;
        if link == self.front {
            self.front = Link::NIL;
            self.back = Link::NIL;
        } else {
            self.back = self.tree.predecessor(link);
        }
        let (k, v) = self.tree.pool.entry(link);
        Some((k, v))
    }
}

impl<K, V, const N: usize, C> core::iter::FusedIterator for Iter<'_, K, V, N, C> {}

impl<'a, K, V, const N: usize, C> IntoIterator for &'a FixedMap<K, V, N, C> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V, N, C>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// =============================================================================
// Trait impls
// =============================================================================

/// The copy gets its own id: positions from the source do not resolve in it.
impl<K: Clone, V: Clone, const N: usize, C: Clone> Clone for FixedMap<K, V, N, C> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
            id: next_map_id(),
        }
    }
}

impl<K, V, const N: usize, C: Default> Default for FixedMap<K, V, N, C> {
    fn default() -> Self {
        Self::with_comparator(C::default())
    }
}

impl<K: fmt::Debug, V: fmt::Debug, const N: usize, C> fmt::Debug for FixedMap<K, V, N, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Equal when both hold the same entries in the same order. Capacity and
/// comparator do not take part.
impl<K, V, const N: usize, const M: usize, C1, C2> PartialEq<FixedMap<K, V, M, C2>>
    for FixedMap<K, V, N, C1>
where
    K: PartialEq,
    V: PartialEq,
{
    fn eq(&self, other: &FixedMap<K, V, M, C2>) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<K: Eq, V: Eq, const N: usize, C> Eq for FixedMap<K, V, N, C> {}
