//! # fixed-rbmap
//!
//! A fixed-capacity ordered map for targets without a heap.
//!
//! Entries live in a `[Node; N]` pool inside the map itself and are linked
//! into a red-black tree by slot index. Nothing is allocated after
//! construction; a full map rejects new keys with
//! [`MapError::CapacityExceeded`] and is left untouched.
//!
//! ## Example
//!
//! ```rust
//! use fixed_rbmap::FixedMap;
//!
//! let mut map: FixedMap<&str, u32, 8> = FixedMap::new();
//! map.insert("b", 2).unwrap();
//! map.insert("a", 1).unwrap();
//!
//! assert_eq!(map.get("a"), Some(&1));
//! assert_eq!(map.find("b").value(), Ok(&2));
//! assert!(map.find("z").is_end());
//!
//! // Erase while walking: erase_at hands back the next position.
//! let mut pos = map.cursor_front().position();
//! while !pos.is_end() {
//!     pos = map.erase_at(pos).unwrap();
//! }
//! assert!(map.is_empty());
//! ```
//!
//! ## Features
//!
//! - `std` (default): implements `std::error::Error` through `thiserror`.
//!   Without it the crate is `no_std`.
//! - `tracing`: emits `tracing` events for node insertion/erasure, pool
//!   exhaustion and clears.

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![forbid(unsafe_code)]

mod compare;
mod cursor;
mod error;
mod map;
mod pool;
mod tracing_helpers;
mod tree;

pub use compare::{Compare, FnCompare, Greater, Less};
pub use cursor::{Cursor, CursorMut, Position};
pub use error::{MapError, Result};
pub use map::{FixedMap, Iter};

#[cfg(test)]
mod proptests;
