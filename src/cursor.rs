//! Positions and cursors over the in-order sequence.
//!
//! A [`Cursor`] borrows the map and can only walk it; a [`CursorMut`] borrows
//! it exclusively and can also edit values and remove elements. Either can be
//! turned into a [`Position`], a borrow-free handle that the map re-validates
//! whenever it is used again.

use core::fmt;

use crate::compare::Less;
use crate::error::{MapError, Result};
use crate::map::FixedMap;
use crate::pool::Link;

// =============================================================================
// Position
// =============================================================================

/// Detached location in a [`FixedMap`]: a slot index plus the slot's
/// generation and the id of the map that issued it, or the end sentinel.
///
/// Positions stay valid until the element they name is erased (or the map is
/// cleared). Erasing other elements never invalidates them. Handing a
/// position to any map other than the one it came from fails with
/// [`MapError::InvalidCursor`]; clones count as other maps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Position {
    pub(crate) link: Link,
    pub(crate) generation: u32,
    pub(crate) map: u32,
}

impl Position {
    /// The past-the-end position of any map.
    pub const END: Position = Position {
        link: Link::NIL,
        generation: 0,
        map: 0,
    };

    #[inline]
    pub fn is_end(&self) -> bool {
        self.link.is_nil()
    }
}

// =============================================================================
// Cursor
// =============================================================================

/// Read-only bidirectional cursor.
///
/// Moving past either end is an error and leaves the cursor where it was.
pub struct Cursor<'a, K, V, const N: usize, C = Less> {
    pub(crate) map: &'a FixedMap<K, V, N, C>,
    pub(crate) link: Link,
}

impl<K, V, const N: usize, C> Clone for Cursor<'_, K, V, N, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V, const N: usize, C> Copy for Cursor<'_, K, V, N, C> {}

impl<'a, K, V, const N: usize, C> Cursor<'a, K, V, N, C> {
    #[inline]
    pub fn is_end(&self) -> bool {
        self.link.is_nil()
    }

    pub fn key_value(&self) -> Result<(&'a K, &'a V)> {
        if self.link.is_nil() {
            return Err(MapError::InvalidCursor);
        }
        let (k, v) = self.map.tree.pool.entry(self.link);
        Ok((k, v))
    }

    pub fn key(&self) -> Result<&'a K> {
        self.key_value().map(|(k, _)| k)
    }

    pub fn value(&self) -> Result<&'a V> {
        self.key_value().map(|(_, v)| v)
    }

    /// Moves to the next element, or to the end after the last one.
    pub fn advance(&mut self) -> Result<()> {
        self.link = step_forward(self.map, self.link)?;
        Ok(())
    }

    /// Moves to the previous element; from the end, to the last one.
    pub fn retreat(&mut self) -> Result<()> {
        self.link = step_back(self.map, self.link)?;
        Ok(())
    }

    #[inline]
    pub fn position(&self) -> Position {
        self.map.position_of(self.link)
    }
}

/// Cursors are equal when they walk the same map instance and sit on the same
/// element.
impl<K, V, const N: usize, C> PartialEq for Cursor<'_, K, V, N, C> {
    fn eq(&self, other: &Self) -> bool {
        core::ptr::eq(self.map, other.map) && self.link == other.link
    }
}

impl<K, V, const N: usize, C> Eq for Cursor<'_, K, V, N, C> {}

impl<K: fmt::Debug, V: fmt::Debug, const N: usize, C> fmt::Debug for Cursor<'_, K, V, N, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Cursor").field(&self.key_value().ok()).finish()
    }
}

// =============================================================================
// CursorMut
// =============================================================================

/// Cursor holding the map exclusively; can edit values and erase in place.
pub struct CursorMut<'a, K, V, const N: usize, C = Less> {
    pub(crate) map: &'a mut FixedMap<K, V, N, C>,
    pub(crate) link: Link,
}

impl<K, V, const N: usize, C> CursorMut<'_, K, V, N, C> {
    #[inline]
    pub fn is_end(&self) -> bool {
        self.link.is_nil()
    }

    pub fn key(&self) -> Result<&K> {
        self.as_cursor().key()
    }

    pub fn value(&self) -> Result<&V> {
        self.as_cursor().value()
    }

    pub fn value_mut(&mut self) -> Result<&mut V> {
        self.key_value_mut().map(|(_, v)| v)
    }

    pub fn key_value_mut(&mut self) -> Result<(&K, &mut V)> {
        if self.link.is_nil() {
            return Err(MapError::InvalidCursor);
        }
        let (k, v) = self.map.tree.pool.entry_mut(self.link);
        Ok((&*k, v))
    }

    pub fn advance(&mut self) -> Result<()> {
        self.link = step_forward(&*self.map, self.link)?;
        Ok(())
    }

    pub fn retreat(&mut self) -> Result<()> {
        self.link = step_back(&*self.map, self.link)?;
        Ok(())
    }

    /// Erases the current element and moves to its in-order successor.
    pub fn remove_current(&mut self) -> Result<(K, V)> {
        if self.link.is_nil() {
            return Err(MapError::InvalidCursor);
        }
        let (next, entry) = self.map.tree.erase(self.link);
        self.link = next;
        Ok(entry)
    }

    #[inline]
    pub fn position(&self) -> Position {
        self.map.position_of(self.link)
    }

    /// Read-only view at the same element.
    pub fn as_cursor(&self) -> Cursor<'_, K, V, N, C> {
        Cursor {
            map: &*self.map,
            link: self.link,
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug, const N: usize, C> fmt::Debug for CursorMut<'_, K, V, N, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CursorMut")
            .field(&self.as_cursor().key_value().ok())
            .finish()
    }
}

fn step_forward<K, V, const N: usize, C>(map: &FixedMap<K, V, N, C>, link: Link) -> Result<Link> {
    if link.is_nil() {
        return Err(MapError::InvalidCursor);
    }
    Ok(map.tree.successor(link))
}

fn step_back<K, V, const N: usize, C>(map: &FixedMap<K, V, N, C>, link: Link) -> Result<Link> {
    let prev = if link.is_nil() {
        map.tree.last()
    } else {
        map.tree.predecessor(link)
    };
    if prev.is_nil() {
        Err(MapError::InvalidCursor)
    } else {
        Ok(prev)
    }
}

#[cfg(test)]
mod tests {
    use crate::{FixedMap, MapError, Position};

    fn sample() -> FixedMap<u32, &'static str, 8> {
        FixedMap::try_from_iter([(2, "two"), (1, "one"), (3, "three")]).unwrap()
    }

    #[test]
    fn test_walk_forward_to_end() {
        let map = sample();
        let mut c = map.cursor_front();
        let mut seen = Vec::new();
        while !c.is_end() {
            seen.push(*c.key().unwrap());
            c.advance().unwrap();
        }
        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(c, map.cursor_end());
        assert_eq!(c.advance(), Err(MapError::InvalidCursor));
        assert_eq!(c.key_value(), Err(MapError::InvalidCursor));
        assert!(c.is_end());
    }

    #[test]
    fn test_walk_backward_from_end() {
        let map = sample();
        let mut c = map.cursor_end();
        let mut seen = Vec::new();
        while c.retreat().is_ok() {
            seen.push(*c.value().unwrap());
        }
        assert_eq!(seen, vec!["three", "two", "one"]);
        // Retreating past the first element fails and stays put.
        assert_eq!(c, map.cursor_front());
        assert_eq!(c.key(), Ok(&1));
    }

    #[test]
    fn test_empty_map_cursors() {
        let map: FixedMap<u32, u32, 4> = FixedMap::new();
        let mut c = map.cursor_front();
        assert!(c.is_end());
        assert_eq!(c, map.cursor_end());
        assert_eq!(c.retreat(), Err(MapError::InvalidCursor));
        assert_eq!(map.cursor_back(), map.cursor_end());
    }

    #[test]
    fn test_cursors_of_different_maps_differ() {
        let a = sample();
        let b = sample();
        assert_ne!(a.cursor_front(), b.cursor_front());
        assert_ne!(a.cursor_end(), b.cursor_end());
        // Positions are map-independent handles.
        assert_eq!(a.cursor_end().position(), Position::END);
    }

    #[test]
    fn test_cursor_mut_edits_and_removes() {
        let mut map = sample();
        {
            let mut c = map.cursor_front_mut();
            *c.value_mut().unwrap() = "uno";
            c.advance().unwrap();
            assert_eq!(c.remove_current(), Ok((2, "two")));
            assert_eq!(c.key(), Ok(&3));
            assert_eq!(c.remove_current(), Ok((3, "three")));
            assert!(c.is_end());
            assert_eq!(c.remove_current(), Err(MapError::InvalidCursor));
            c.retreat().unwrap();
            assert_eq!(c.key_value_mut().map(|(k, _)| *k), Ok(1));
        }
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&1), Some(&"uno"));
    }

    #[test]
    fn test_position_round_trip() {
        let map = sample();
        let pos = map.find(&2).position();
        let c = map.cursor_at(pos).unwrap();
        assert_eq!(c.key_value(), Ok((&2, &"two")));
        assert!(map.cursor_at(Position::END).unwrap().is_end());
    }
}
