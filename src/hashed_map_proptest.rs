#![cfg(test)]

// Property tests for HashedMap kept inside the crate so they can walk the
// bucket chains after every operation.

use crate::error::ContainerError;
use crate::hash::KeyHasher;
use crate::hashed_map::HashedMap;
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::cell::Cell;
use hashbrown::HashMap;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{BuildHasher, Hasher};

// Key newtype with Borrow<str> to exercise borrowed lookup.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
struct Key(String);
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl std::borrow::Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// Pool-indexed operations: indices shrink to earlier keys.
#[derive(Clone, Debug)]
enum Op {
    Insert(usize, i32),
    GetOrInsert(usize, i32),
    Erase(usize),
    Extract(usize),
    Get(usize),
    Contains(String),
    Mutate(usize, i32),
    Rehash(usize),
    Clear,
    Iterate,
}

fn key_from(pool: &[String], i: usize) -> Key {
    Key(pool[i].clone())
}

fn arb_scenario() -> impl Strategy<Value = (usize, Vec<String>, Vec<Op>)> {
    let pool = proptest::collection::vec("[a-z]{0,4}", 1..=10);
    (1usize..=6, pool).prop_flat_map(|(buckets, pool)| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let contains_pool = proptest::sample::select(pool.clone());
        let op = prop_oneof![
            4 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Insert(i, v)),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::GetOrInsert(i, v)),
            2 => idx.clone().prop_map(Op::Erase),
            2 => idx.clone().prop_map(Op::Extract),
            2 => idx.clone().prop_map(Op::Get),
            1 => prop_oneof![contains_pool, "[a-z]{0,4}"].prop_map(Op::Contains),
            1 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| Op::Mutate(i, d)),
            1 => (0usize..24).prop_map(Op::Rehash),
            1 => Just(Op::Clear),
            1 => Just(Op::Iterate),
        ];
        proptest::collection::vec(op, 1..80)
            .prop_map(move |ops| (buckets, pool.clone(), ops))
    })
}

// Drive `sut` and a hashbrown HashMap model through `ops`, checking parity and the
// chain invariants (head policy, bucket placement, uniqueness, len) after
// every step.
fn run_state_machine<H>(
    mut sut: HashedMap<Key, i32, H>,
    pool: &[String],
    ops: Vec<Op>,
) -> Result<(), TestCaseError>
where
    H: KeyHasher<Key> + KeyHasher<str>,
{
    let mut model: HashMap<Key, i32> = HashMap::new();
    let default_calls = Cell::new(0);

    for op in ops {
        match op {
            Op::Insert(i, v) => {
                let k = key_from(pool, i);
                let already = model.contains_key(&k);
                match sut.insert(k.clone(), v) {
                    Ok(slot) => {
                        prop_assert!(!already, "insert must fail on duplicate");
                        prop_assert_eq!(*slot, v);
                        model.insert(k, v);
                    }
                    Err(ContainerError::DuplicateKey) => {
                        prop_assert!(already, "duplicate error only when key exists");
                    }
                    Err(e) => prop_assert!(false, "unexpected error {}", e),
                }
            }
            Op::GetOrInsert(i, v) => {
                let k = key_from(pool, i);
                let before = default_calls.get();
                let expected = *model.entry(k.clone()).or_insert(v);
                let got = *sut.get_or_insert_with(k, || {
                    default_calls.set(default_calls.get() + 1);
                    v
                });
                prop_assert_eq!(got, expected);
                let inserted = default_calls.get() - before;
                prop_assert!(inserted <= 1, "default must run at most once");
            }
            Op::Erase(i) => {
                let k = key_from(pool, i);
                let expected = usize::from(model.remove(&k).is_some());
                prop_assert_eq!(sut.erase(k.0.as_str()), expected);
            }
            Op::Extract(i) => {
                let k = key_from(pool, i);
                match (sut.extract(&k), model.remove(&k)) {
                    (Some(node), Some(mv)) => {
                        let (kk, vv) = node.into_parts();
                        prop_assert_eq!(kk, k);
                        prop_assert_eq!(vv, mv);
                    }
                    (None, None) => {}
                    (s, m) => prop_assert!(false, "extract mismatch: {:?} vs {:?}", s, m),
                }
            }
            Op::Get(i) => {
                let k = key_from(pool, i);
                prop_assert_eq!(sut.get(&k), model.get(&k));
                prop_assert_eq!(sut.at(&k).ok(), model.get(&k));
                prop_assert_eq!(sut.count(&k), usize::from(model.contains_key(&k)));
            }
            Op::Contains(s) => {
                let has_model = model.keys().any(|k| k.0 == s);
                prop_assert_eq!(sut.contains(s.as_str()), has_model);
                let h = sut.hash_key(s.as_str());
                prop_assert_eq!(sut.contains_hashed(s.as_str(), h), has_model);
            }
            Op::Mutate(i, d) => {
                let k = key_from(pool, i);
                if let Some(vr) = sut.get_mut(&k) {
                    *vr = vr.saturating_add(d);
                    let mv = model.get_mut(&k).expect("present in model");
                    *mv = mv.saturating_add(d);
                } else {
                    prop_assert!(!model.contains_key(&k));
                }
            }
            Op::Rehash(n) => {
                sut.rehash(n);
                let floor = (sut.len() as f32 / sut.max_load_factor()).ceil() as usize;
                prop_assert!(sut.bucket_count() >= n.max(floor).max(1));
            }
            Op::Clear => {
                let buckets = sut.bucket_count();
                sut.clear();
                model.clear();
                prop_assert_eq!(sut.bucket_count(), buckets);
            }
            Op::Iterate => {
                let pairs: Vec<(Key, i32)> = sut.iter().map(|(k, v)| (k.clone(), *v)).collect();
                let s_keys: BTreeSet<_> = pairs.iter().map(|(k, _)| k.clone()).collect();
                let m_keys: BTreeSet<_> = model.keys().cloned().collect();
                prop_assert_eq!(pairs.len(), model.len(), "iteration repeats an entry");
                prop_assert_eq!(s_keys, m_keys);
                for (k, v) in &pairs {
                    prop_assert_eq!(model.get(k), Some(v));
                }
            }
        }

        sut.check_invariants();
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
    }
    Ok(())
}

// Property: state-machine equivalence against hashbrown::HashMap
// with the default hasher and a small bucket count, so chains form.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((buckets, pool, ops) in arb_scenario()) {
        let sut: HashedMap<Key, i32> = HashedMap::with_buckets(buckets);
        run_state_machine(sut, &pool, ops)?;
    }
}

// Collision variant using a constant hasher: every key shares one chain.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

// Property: same invariants under worst-case collisions.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((buckets, pool, ops) in arb_scenario()) {
        let sut: HashedMap<Key, i32, ConstBuildHasher> =
            HashedMap::with_buckets_and_hasher(buckets, ConstBuildHasher);
        run_state_machine(sut, &pool, ops)?;
    }
}

// Property: a clone is an independent deep copy.
proptest! {
    #![proptest_config(ProptestConfig { cases: 32, .. ProptestConfig::default() })]
    #[test]
    fn prop_clone_is_independent(keys in proptest::collection::btree_set("[a-z]{1,4}", 0..30)) {
        let mut a: HashedMap<Key, usize> = HashedMap::with_buckets(3);
        for (i, k) in keys.iter().enumerate() {
            a.insert(Key(k.clone()), i).unwrap();
        }
        let mut b = a.clone();
        b.check_invariants();
        for k in &keys {
            prop_assert_eq!(a.get(k.as_str()), b.get(k.as_str()));
            b.erase(k.as_str());
        }
        prop_assert!(b.is_empty());
        prop_assert_eq!(a.len(), keys.len());
        a.check_invariants();
    }
}
