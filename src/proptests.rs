use super::*;

use proptest::prelude::*;
use proptest_derive::Arbitrary;
use std::collections::BTreeMap;

const CAP: usize = 32;

type Map = FixedMap<u8, u16, CAP>;
type Model = BTreeMap<u8, u16>;

/// Keys come from a domain larger than `CAP` so that the map regularly fills
/// up and duplicate inserts are common.
#[derive(Clone, Debug, Arbitrary)]
enum Op {
    #[proptest(weight = 6)]
    Insert(#[proptest(strategy = "0u8..48")] u8, u16),
    #[proptest(weight = 2)]
    InsertHint(
        #[proptest(strategy = "0u8..48")] u8,
        #[proptest(strategy = "0u8..48")] u8,
        u16,
    ),
    #[proptest(weight = 3)]
    Remove(#[proptest(strategy = "0u8..48")] u8),
    #[proptest(weight = 3)]
    EraseAt(#[proptest(strategy = "0u8..48")] u8),
    EraseRange(
        #[proptest(strategy = "0u8..48")] u8,
        #[proptest(strategy = "0u8..48")] u8,
    ),
    #[proptest(weight = 2)]
    GetOrDefault(#[proptest(strategy = "0u8..48")] u8),
    #[proptest(weight = 2)]
    Bounds(#[proptest(strategy = "0u8..48")] u8),
    Clear,
    Assign(
        #[proptest(strategy = "proptest::collection::vec((0u8..48, any::<u16>()), 0..40)")]
        Vec<(u8, u16)>,
    ),
}

/// Positions handed out so far: the live one per key and every one whose
/// element has since been erased.
#[derive(Default)]
struct Handles {
    live: BTreeMap<u8, Position>,
    stale: Vec<Position>,
}

impl Handles {
    fn retire(&mut self, key: u8) {
        if let Some(pos) = self.live.remove(&key) {
            self.stale.push(pos);
        }
    }

    fn retire_all(&mut self) {
        let live = std::mem::take(&mut self.live);
        self.stale.extend(live.into_values());
    }

    fn check(&self, t: &Map) {
        for (&key, &pos) in &self.live {
            let cursor = t.cursor_at(pos).expect("live position must resolve");
            assert_eq!(cursor.key(), Ok(&key), "position moved to another key");
        }
        for &pos in &self.stale {
            assert_eq!(
                t.cursor_at(pos).err(),
                Some(MapError::InvalidCursor),
                "erased position must not resolve"
            );
        }
    }
}

fn model_insert(t: &mut Map, m: &mut Model, h: &mut Handles, key: u8, value: u16, hint: Option<Position>) {
    let got = match hint {
        Some(hint) => t.insert_with_hint(hint, key, value),
        None => t.insert(key, value),
    };
    if m.contains_key(&key) {
        let (pos, inserted) = got.expect("existing key never fails");
        assert!(!inserted);
        assert_eq!(Some(&pos), h.live.get(&key));
    } else if m.len() == CAP {
        assert_eq!(got, Err(MapError::CapacityExceeded { capacity: CAP }));
    } else {
        let (pos, inserted) = got.expect("room left");
        assert!(inserted);
        m.insert(key, value);
        h.live.insert(key, pos);
    }
}

fn apply(t: &mut Map, m: &mut Model, h: &mut Handles, op: Op) {
    match op {
        Op::Insert(key, value) => model_insert(t, m, h, key, value, None),
        Op::InsertHint(near, key, value) => {
            let hint = t.lower_bound(&near).position();
            model_insert(t, m, h, key, value, Some(hint));
        }
        Op::Remove(key) => {
            assert_eq!(t.remove(&key), m.remove(&key));
            h.retire(key);
        }
        Op::EraseAt(key) => {
            let pos = t.find(&key).position();
            if !m.contains_key(&key) {
                assert_eq!(t.erase_at(pos), Err(MapError::InvalidCursor));
                return;
            }
            let next = t.erase_at(pos).expect("present key");
            m.remove(&key);
            h.retire(key);
            match m.range(key..).next() {
                Some((next_key, _)) => assert_eq!(Some(&next), h.live.get(next_key)),
                None => assert_eq!(next, Position::END),
            }
        }
        Op::EraseRange(a, b) => {
            let (lo, hi) = (a.min(b), a.max(b));
            let first = t.lower_bound(&lo).position();
            let last = t.lower_bound(&hi).position();
            assert_eq!(t.erase_range(first, last), Ok(last));
            let doomed: Vec<u8> = m.range(lo..hi).map(|(k, _)| *k).collect();
            for key in doomed {
                m.remove(&key);
                h.retire(key);
            }
        }
        Op::GetOrDefault(key) => {
            let got = t.get_or_insert_default(key).copied();
            match m.get(&key) {
                Some(&value) => assert_eq!(got, Ok(value)),
                None if m.len() == CAP => {
                    assert_eq!(got, Err(MapError::CapacityExceeded { capacity: CAP }))
                }
                None => {
                    assert_eq!(got, Ok(0));
                    m.insert(key, 0);
                    h.live.insert(key, t.find(&key).position());
                }
            }
        }
        Op::Bounds(key) => {
            let lower = t.lower_bound(&key).key().ok().copied();
            let upper = t.upper_bound(&key).key().ok().copied();
            assert_eq!(lower, m.range(key..).next().map(|(k, _)| *k));
            assert_eq!(
                upper,
                m.range((std::ops::Bound::Excluded(key), std::ops::Bound::Unbounded))
                    .next()
                    .map(|(k, _)| *k)
            );
            let (lo, hi) = t.equal_range(&key);
            assert_eq!((lo.key().ok().copied(), hi.key().ok().copied()), (lower, upper));
            assert_eq!(t.count(&key), usize::from(m.contains_key(&key)));
        }
        Op::Clear => {
            t.clear();
            m.clear();
            h.retire_all();
        }
        Op::Assign(pairs) => {
            let got = t.assign(pairs.iter().copied());
            m.clear();
            h.retire_all();
            let mut overflowed = false;
            for (key, value) in pairs {
                if m.contains_key(&key) {
                    continue;
                }
                if m.len() == CAP {
                    overflowed = true;
                    break;
                }
                m.insert(key, value);
                h.live.insert(key, t.find(&key).position());
            }
            assert_eq!(got.is_err(), overflowed);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence(ops in prop::collection::vec(any::<Op>(), 0..=400)) {
        let mut t = Map::new();
        let mut m = Model::new();
        let mut h = Handles::default();

        for op in ops {
            apply(&mut t, &mut m, &mut h, op);
            prop_assert_eq!(t.len(), m.len());
            prop_assert!(t.len() <= t.capacity());
            prop_assert_eq!(t.is_full(), m.len() == CAP);
        }

        t.tree.validate();
        h.check(&t);
        let got: Vec<(u8, u16)> = t.iter().map(|(k, v)| (*k, *v)).collect();
        let expected: Vec<(u8, u16)> = m.iter().map(|(k, v)| (*k, *v)).collect();
        prop_assert_eq!(&got, &expected);
        let got_rev: Vec<u8> = t.keys().rev().copied().collect();
        let expected_rev: Vec<u8> = m.keys().rev().copied().collect();
        prop_assert_eq!(got_rev, expected_rev);
    }

    #[test]
    fn prop_range_matches_model(
        keys in prop::collection::btree_set(0u8..64, 0..=CAP),
        a in 0u8..70,
        b in 0u8..70,
    ) {
        let t: Map = FixedMap::try_from_iter(keys.iter().map(|&k| (k, u16::from(k)))).unwrap();
        let (lo, hi) = (a.min(b), a.max(b));

        let got: Vec<u8> = t.range(lo..hi).map(|(k, _)| *k).collect();
        let expected: Vec<u8> = keys.range(lo..hi).copied().collect();
        prop_assert_eq!(got, expected);

        let got: Vec<u8> = t.range(lo..=hi).rev().map(|(k, _)| *k).collect();
        let expected: Vec<u8> = keys.range(lo..=hi).rev().copied().collect();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn prop_hint_never_changes_result(
        keys in prop::collection::vec(0u8..48, 0..=CAP),
        hints in prop::collection::vec(0u8..48, CAP),
    ) {
        let mut plain = Map::new();
        let mut hinted = Map::new();
        for (i, &key) in keys.iter().enumerate() {
            let value = i as u16;
            let a = plain.insert(key, value).map(|(_, inserted)| inserted);
            let hint = hinted.lower_bound(&hints[i]).position();
            let b = hinted.insert_with_hint(hint, key, value).map(|(_, inserted)| inserted);
            prop_assert_eq!(a, b);
        }
        hinted.tree.validate();
        prop_assert!(plain == hinted);
    }
}

fn for_each_permutation<T: Clone>(items: &[T], mut f: impl FnMut(Vec<T>)) {
    fn rec<T: Clone>(items: &[T], used: &mut [bool], out: &mut Vec<T>, f: &mut impl FnMut(Vec<T>)) {
        if out.len() == items.len() {
            f(out.clone());
            return;
        }
        for i in 0..items.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            out.push(items[i].clone());
            rec(items, used, out, f);
            out.pop();
            used[i] = false;
        }
    }

    let mut used = vec![false; items.len()];
    let mut out = Vec::with_capacity(items.len());
    rec(items, &mut used, &mut out, &mut f);
}

const PERMUTED_KEYS: [u8; 7] = [10, 20, 30, 40, 50, 60, 70];

#[test]
fn exhaustive_insert_order_small_set() {
    for_each_permutation(&PERMUTED_KEYS, |perm| {
        let mut t: FixedMap<u8, u16, 7> = FixedMap::new();
        for (i, k) in perm.into_iter().enumerate() {
            assert!(t.insert(k, i as u16).unwrap().1);
            t.tree.validate();
        }
        assert!(t.is_full());
        assert_eq!(t.keys().copied().collect::<Vec<_>>(), PERMUTED_KEYS.to_vec());
    });
}

#[test]
fn exhaustive_erase_order_small_set() {
    let base: FixedMap<u8, u16, 7> =
        FixedMap::try_from_iter(PERMUTED_KEYS.iter().map(|&k| (k, u16::from(k)))).unwrap();

    for_each_permutation(&PERMUTED_KEYS, |perm| {
        let mut t = base.clone();
        let mut m: Model = PERMUTED_KEYS.iter().map(|&k| (k, u16::from(k))).collect();
        let positions: BTreeMap<u8, Position> =
            PERMUTED_KEYS.iter().map(|&k| (k, t.find(&k).position())).collect();

        for k in perm {
            let next = t.erase_at(positions[&k]).unwrap();
            m.remove(&k);
            match m.range(k..).next() {
                Some((next_key, _)) => assert_eq!(next, positions[next_key]),
                None => assert!(next.is_end()),
            }
            t.tree.validate();
            for key in m.keys() {
                assert_eq!(t.cursor_at(positions[key]).unwrap().key(), Ok(key));
            }
        }
        assert!(t.is_empty());
    });
}
