//! Key ordering capability.
//!
//! The map never inspects keys itself; every ordering decision goes through a
//! [`Compare`] implementation. It must be a strict weak order: irreflexive,
//! asymmetric and transitive, with transitive equivalence. Two keys `a` and
//! `b` are *equivalent* (the same map key) when neither `less(a, b)` nor
//! `less(b, a)` holds. Violating the contract does not cause memory unsafety,
//! but lookups and iteration order become unspecified.

/// Strict weak order over `K`.
pub trait Compare<K: ?Sized> {
    fn less(&self, a: &K, b: &K) -> bool;
}

/// Ascending order from [`Ord`]. The default comparator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Less;

impl<K: Ord + ?Sized> Compare<K> for Less {
    #[inline]
    fn less(&self, a: &K, b: &K) -> bool {
        a < b
    }
}

/// Descending order from [`Ord`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Greater;

impl<K: Ord + ?Sized> Compare<K> for Greater {
    #[inline]
    fn less(&self, a: &K, b: &K) -> bool {
        a > b
    }
}

/// Adapts a `Fn(&K, &K) -> bool` predicate.
///
/// ```rust
/// use fixed_rbmap::{FixedMap, FnCompare};
///
/// let by_len = FnCompare(|a: &&str, b: &&str| a.len() < b.len());
/// let mut map: FixedMap<&str, u32, 4, _> = FixedMap::with_comparator(by_len);
/// map.insert("ccc", 3).unwrap();
/// map.insert("a", 1).unwrap();
/// assert_eq!(map.keys().copied().collect::<Vec<_>>(), ["a", "ccc"]);
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct FnCompare<F>(pub F);

impl<K: ?Sized, F: Fn(&K, &K) -> bool> Compare<K> for FnCompare<F> {
    #[inline]
    fn less(&self, a: &K, b: &K) -> bool {
        (self.0)(a, b)
    }
}
