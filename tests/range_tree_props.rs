use std::collections::BTreeSet;

use bmesh::range_tree::RangeTreeUInt;
use proptest::prelude::*;

const MAX: u32 = 63;

#[derive(Debug, Clone)]
enum Op {
    Take(u32),
    Retake(u32),
    TakeAny,
    Release(u32),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..=MAX).prop_map(Op::Take),
        (0..=MAX).prop_map(Op::Retake),
        Just(Op::TakeAny),
        (0..=MAX).prop_map(Op::Release),
    ]
}

/// Free ranges must be sorted, inside the domain and never touch.
fn assert_compact(tree: &RangeTreeUInt) {
    let ranges: Vec<_> = tree.free_ranges().collect();
    for &(s, e) in &ranges {
        assert!(s <= e);
        assert!(s >= tree.min() && e <= tree.max());
    }
    for pair in ranges.windows(2) {
        assert!(pair[0].1 + 1 < pair[1].0, "ranges {pair:?} should be merged");
    }
}

proptest! {
    #[test]
    fn matches_a_plain_set(ops in prop::collection::vec(op(), 0..200)) {
        let mut tree = RangeTreeUInt::alloc(0, MAX);
        let mut free: BTreeSet<u32> = (0..=MAX).collect();

        for op in ops {
            match op {
                Op::Take(v) => {
                    if tree.has(v) {
                        tree.take(v);
                        free.remove(&v);
                    }
                }
                Op::Retake(v) => {
                    prop_assert_eq!(tree.retake(v), free.remove(&v));
                }
                Op::TakeAny => {
                    let lowest = free.iter().next().copied();
                    prop_assert_eq!(tree.take_any(), lowest);
                    if let Some(v) = lowest {
                        free.remove(&v);
                    }
                }
                Op::Release(v) => {
                    if !tree.has(v) {
                        tree.release(v);
                        free.insert(v);
                    }
                }
            }
            assert_compact(&tree);
        }

        for v in 0..=MAX {
            prop_assert_eq!(tree.has(v), free.contains(&v));
        }
        prop_assert_eq!(tree.is_empty(), free.is_empty());
        prop_assert_eq!(tree.is_full(), free.len() == (MAX + 1) as usize);
    }

    #[test]
    fn copy_is_independent(taken in prop::collection::btree_set(0..=MAX, 0..32)) {
        let mut tree = RangeTreeUInt::alloc(0, MAX);
        for &v in &taken {
            tree.take(v);
        }
        let copy = tree.copy();
        while tree.take_any().is_some() {}

        prop_assert!(tree.is_empty());
        for v in 0..=MAX {
            prop_assert_eq!(copy.has(v), !taken.contains(&v));
        }
    }
}
