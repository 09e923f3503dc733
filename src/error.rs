use thiserror::Error;

/// Failures reported by [`FixedMap`](crate::FixedMap) and its cursors.
///
/// Every variant leaves the map internally consistent; callers may keep using
/// the map after handling any of them.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MapError {
    /// A new node was needed but every slot of the pool is occupied.
    #[error("map is full (capacity {capacity})")]
    CapacityExceeded { capacity: usize },
    /// `at`/`at_mut` was called with a key that is not stored.
    #[error("key not found")]
    KeyNotFound,
    /// The cursor or position is at a sentinel, was invalidated by an erase,
    /// or does not belong to this map.
    #[error("invalid cursor")]
    InvalidCursor,
}

pub type Result<T, E = MapError> = core::result::Result<T, E>;
