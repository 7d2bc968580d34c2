use std::collections::BTreeMap;

use proptest::prelude::*;

use crate::avl::Avl;
use crate::record::{Key, Record};

#[derive(Clone, Debug)]
enum Op {
    Insert(Key, u64),
    Remove(Key),
    Find(Key),
}

// Narrow key range so that removes and duplicate inserts hit often.
fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    let key = -64_i64..64;
    let op = prop_oneof![
        50 => (key.clone(), any::<u64>()).prop_map(|(k, v)| Op::Insert(k, v)),
        30 => key.clone().prop_map(Op::Remove),
        20 => key.prop_map(Op::Find),
    ];
    prop::collection::vec(op, 0..=1000)
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

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence(ops in ops_strategy()) {
        let mut t: Avl<u64> = Avl::new("prop-avl");
        let mut m: BTreeMap<Key, u64> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert(key, value) => {
                    prop_assert!(t.insert(key, value).is_ok());
                    m.entry(key).or_insert(value);
                }
                Op::Remove(key) => {
                    prop_assert_eq!(t.remove(key), m.remove(&key));
                }
                Op::Find(key) => {
                    prop_assert_eq!(t.find(key), m.get(&key).copied());
                }
            }

            let stats = t.validate();
            prop_assert!(stats.is_ok(), "{:?}", stats.err());
            prop_assert_eq!(t.len(), m.len());
            prop_assert_eq!(t.is_empty(), m.is_empty());
        }

        let expected: Vec<(Key, u64)> = m.iter().map(|(k, v)| (*k, *v)).collect();
        prop_assert_eq!(t.to_vec(), expected);
        prop_assert_eq!(t.find_min(), m.iter().next().map(|(k, v)| (*k, *v)));
        prop_assert_eq!(t.find_max(), m.iter().next_back().map(|(k, v)| (*k, *v)));
    }

    #[test]
    fn prop_in_order_and_height(keys in prop::collection::vec(any::<i64>(), 1..=2000)) {
        let mut t: Avl<Record> = Avl::new("prop-avl");
        for key in keys.iter() {
            t.insert(*key, Record::new(0, 0, 0, *key)).unwrap();
        }

        let got: Vec<Key> = t.to_vec().into_iter().map(|(k, _)| k).collect();
        prop_assert!(got.windows(2).all(|w| w[0] < w[1]));

        let stats = t.validate().unwrap();
        let n = got.len() as f64;
        prop_assert!(f64::from(stats.height()) <= 1.45 * (n + 2.0).log2());

        let (min, _) = t.find_min().unwrap();
        let (max, _) = t.find_max().unwrap();
        prop_assert_eq!(Some(&min), keys.iter().min());
        prop_assert_eq!(Some(&max), keys.iter().max());
    }

    #[test]
    fn prop_round_trip(keys in prop::collection::btree_set(any::<i64>(), 1..=500)) {
        let mut t: Avl<Record> = Avl::new("prop-avl");
        for key in keys.iter() {
            let record = Record::new(1, 2, 3, *key);
            t.insert(*key, record).unwrap();
            prop_assert_eq!(t.find(*key), Some(record));
        }
        for (i, key) in keys.iter().enumerate() {
            prop_assert_eq!(t.remove(*key), Some(Record::new(1, 2, 3, *key)));
            prop_assert_eq!(t.find(*key), None);
            prop_assert!(t.validate().is_ok());
            prop_assert_eq!(t.len(), keys.len() - i - 1);
        }
        prop_assert!(t.is_empty());
    }
}

#[test]
fn exhaustive_insert_remove_order_small_set() {
    let keys: Vec<Key> = vec![10, 20, 30, 40, 50, 60];

    for_each_permutation(&keys, |perm| {
        let mut t: Avl<Key> = Avl::new("exhaustive-avl");
        for k in perm.iter() {
            t.insert(*k, *k * 10).unwrap();
            assert!(t.validate().is_ok());
        }
        assert_eq!(t.len(), keys.len());

        for (i, k) in perm.iter().rev().enumerate() {
            assert_eq!(t.remove(*k), Some(*k * 10));
            assert!(t.validate().is_ok());
            assert_eq!(t.len(), keys.len() - i - 1);
        }
        assert!(t.is_empty());
    });
}
