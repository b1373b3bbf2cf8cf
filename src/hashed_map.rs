//! HashedMap: separate chaining over a fixed bucket array.
//!
//! Layout
//! - `BucketTable` is the structural layer. Each bucket head stores its
//!   first entry inline; further colliding entries live in a `NodeArena`
//!   and are linked by generational keys. The head array and the arena
//!   both draw storage from the map's allocator.
//! - `HashedMap` adds the hasher, load-factor bookkeeping and the debug
//!   scan guard, and is the only place user `Hash`/`Eq` code is invoked.
//!
//! Head policy: a bucket head is either unassigned with an empty chain, or
//! it holds the first live entry of its chain. Removing an assigned head
//! promotes its successor into the head slot.
//!
//! Each entry keeps the `u64` hash computed at insertion; rehashing reuses
//! it and never calls the hasher again. The bucket count only changes on
//! an explicit `rehash` or `reserve`.

use crate::alloc::{Allocator, Global};
use crate::debug_guard::ScanTracker;
use crate::error::ContainerError;
use crate::hash::{bucket_of, DefaultHashBuilder, HashValue, KeyHasher};
use crate::node_arena::{NodeArena, NodeKey};
use crate::vector::Vector;
use core::borrow::Borrow;
use core::fmt;
use core::mem;

/// Bucket count used by `new` and `Default`.
pub const DEFAULT_BUCKET_COUNT: usize = 10;

/// Initial ceiling on `len / bucket_count`, consulted by `rehash` and
/// `reserve`.
pub const DEFAULT_MAX_LOAD_FACTOR: f32 = 2.0;

#[derive(Clone, Debug)]
struct Entry<K, V> {
    key: K,
    value: V,
    hash: u64,
}

impl<K, V> Entry<K, V> {
    fn matches<Q>(&self, q: &Q, hash: u64) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        self.hash == hash && q.eq(self.key.borrow())
    }
}

#[derive(Clone, Debug)]
struct ChainNode<K, V> {
    entry: Entry<K, V>,
    next: Option<NodeKey>,
}

#[derive(Clone, Debug)]
struct Bucket<K, V> {
    head: Option<Entry<K, V>>,
    next: Option<NodeKey>,
}

impl<K, V> Bucket<K, V> {
    fn empty() -> Self {
        Bucket {
            head: None,
            next: None,
        }
    }
}

/// Where a located entry lives. `prev == None` means the predecessor is the
/// bucket head.
#[derive(Clone, Copy, Debug)]
enum Loc {
    Head(usize),
    Chained {
        bucket: usize,
        prev: Option<NodeKey>,
        node: NodeKey,
    },
}

/// Entry removed from a map by `HashedMap::extract`; the caller owns it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node<K, V> {
    key: K,
    value: V,
}

impl<K, V> Node<K, V> {
    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut V {
        &mut self.value
    }

    pub fn into_parts(self) -> (K, V) {
        (self.key, self.value)
    }
}

#[derive(Clone)]
struct BucketTable<K, V, A: Allocator> {
    buckets: Vector<Bucket<K, V>, A>,
    nodes: NodeArena<ChainNode<K, V>, A>,
    len: usize,
}

impl<K, V, A: Allocator> BucketTable<K, V, A> {
    fn with_buckets_in(bucket_count: usize, alloc: A) -> Self
    where
        A: Clone,
    {
        let nodes = NodeArena::new_in(alloc.clone());
        let mut buckets = Vector::with_capacity_in(bucket_count, alloc);
        buckets.resize_with(bucket_count, Bucket::empty);
        Self {
            buckets,
            nodes,
            len: 0,
        }
    }

    fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    fn locate<Q>(&self, q: &Q, hash: u64) -> Option<Loc>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let b = bucket_of(hash, self.bucket_count());
        let bucket = &self.buckets[b];
        let head = bucket.head.as_ref()?;
        if head.matches(q, hash) {
            return Some(Loc::Head(b));
        }
        let mut prev = None;
        let mut cur = bucket.next;
        while let Some(k) = cur {
            let node = &self.nodes[k];
            if node.entry.matches(q, hash) {
                return Some(Loc::Chained {
                    bucket: b,
                    prev,
                    node: k,
                });
            }
            prev = Some(k);
            cur = node.next;
        }
        None
    }

    fn entry(&self, loc: Loc) -> &Entry<K, V> {
        match loc {
            Loc::Head(b) => self.buckets[b]
                .head
                .as_ref()
                .expect("located head must be assigned"),
            Loc::Chained { node, .. } => &self.nodes[node].entry,
        }
    }

    fn entry_mut(&mut self, loc: Loc) -> &mut Entry<K, V> {
        match loc {
            Loc::Head(b) => self.buckets[b]
                .head
                .as_mut()
                .expect("located head must be assigned"),
            Loc::Chained { node, .. } => &mut self.nodes[node].entry,
        }
    }

    /// Link a new entry: into the head if it is free, else right behind it.
    /// The caller guarantees the key is absent.
    fn push_new(&mut self, entry: Entry<K, V>) -> Loc {
        let b = bucket_of(entry.hash, self.bucket_count());
        self.len += 1;
        let bucket = &mut self.buckets[b];
        if bucket.head.is_none() {
            debug_assert!(bucket.next.is_none(), "unassigned head with a chain");
            bucket.head = Some(entry);
            return Loc::Head(b);
        }
        let node = self.nodes.insert(ChainNode {
            entry,
            next: bucket.next,
        });
        bucket.next = Some(node);
        Loc::Chained {
            bucket: b,
            prev: None,
            node,
        }
    }

    /// Detach the entry at `loc`, keeping the head policy.
    fn unlink(&mut self, loc: Loc) -> Entry<K, V> {
        self.len -= 1;
        match loc {
            Loc::Head(b) => {
                let bucket = &mut self.buckets[b];
                match bucket.next {
                    Some(k) => {
                        let successor = self
                            .nodes
                            .remove(k)
                            .expect("chain link must refer to a live node");
                        bucket.next = successor.next;
                        bucket
                            .head
                            .replace(successor.entry)
                            .expect("located head must be assigned")
                    }
                    None => bucket.head.take().expect("located head must be assigned"),
                }
            }
            Loc::Chained { bucket, prev, node } => {
                let removed = self
                    .nodes
                    .remove(node)
                    .expect("located node must be live");
                match prev {
                    None => self.buckets[bucket].next = removed.next,
                    Some(p) => self.nodes[p].next = removed.next,
                }
                removed.entry
            }
        }
    }

    /// Drop every entry; the head array keeps its size.
    fn clear(&mut self) {
        self.nodes.clear();
        for bucket in self.buckets.iter_mut() {
            bucket.head = None;
            bucket.next = None;
        }
        self.len = 0;
    }

    fn heads_unassigned(&self) -> bool {
        self.buckets.iter().all(|b| b.head.is_none())
    }

    /// Redistribute every entry over `bucket_count` fresh buckets by its
    /// stored hash.
    fn rebuild(&mut self, bucket_count: usize)
    where
        A: Clone,
    {
        let fresh = Self::with_buckets_in(bucket_count, self.buckets.allocator().clone());
        let mut old = mem::replace(self, fresh);
        for bucket in old.buckets.iter_mut() {
            if let Some(entry) = bucket.head.take() {
                self.push_new(entry);
            }
            bucket.next = None;
        }
        for node in old.nodes.drain() {
            self.push_new(node.entry);
        }
    }

    fn entries(&self) -> impl Iterator<Item = &Entry<K, V>> {
        self.buckets
            .iter()
            .filter_map(|b| b.head.as_ref())
            .chain(self.nodes.values().map(|n| &n.entry))
    }

    fn entries_mut(&mut self) -> impl Iterator<Item = &mut Entry<K, V>> {
        self.buckets
            .iter_mut()
            .filter_map(|b| b.head.as_mut())
            .chain(self.nodes.values_mut().map(|n| &mut n.entry))
    }

    /// Walk every chain and assert the structural invariants.
    #[cfg(test)]
    pub(crate) fn check_invariants(&self)
    where
        K: Eq + fmt::Debug,
    {
        let mut seen = 0;
        for (b, bucket) in self.buckets.iter().enumerate() {
            let Some(head) = bucket.head.as_ref() else {
                assert!(bucket.next.is_none(), "bucket {b}: unassigned head with a chain");
                continue;
            };
            let mut chain = vec![head];
            let mut cur = bucket.next;
            while let Some(k) = cur {
                let node = self.nodes.get(k).expect("dangling chain link");
                chain.push(&node.entry);
                cur = node.next;
            }
            for (i, e) in chain.iter().enumerate() {
                assert_eq!(bucket_of(e.hash, self.bucket_count()), b, "entry {:?} in wrong bucket", e.key);
                for other in &chain[i + 1..] {
                    assert!(e.key != other.key, "duplicate key {:?}", e.key);
                }
            }
            seen += chain.len();
        }
        assert_eq!(seen, self.len, "len disagrees with chain walk");
        assert_eq!(
            self.nodes.len(),
            self.len - self.buckets.iter().filter(|b| b.head.is_some()).count(),
            "unreachable chain nodes"
        );
    }
}

/// Hash map with separate chaining, a pluggable hash capability and a
/// pluggable allocator for its bucket array and chain nodes.
pub struct HashedMap<K, V, H = DefaultHashBuilder, A: Allocator = Global> {
    table: BucketTable<K, V, A>,
    hasher: H,
    max_load_factor: f32,
    scan: ScanTracker,
}

impl<K, V> HashedMap<K, V> {
    /// Empty map with `DEFAULT_BUCKET_COUNT` buckets.
    pub fn new() -> Self {
        Self::with_buckets(DEFAULT_BUCKET_COUNT)
    }

    pub fn with_buckets(bucket_count: usize) -> Self {
        Self::with_buckets_and_hasher(bucket_count, DefaultHashBuilder::default())
    }
}

impl<K, V> Default for HashedMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, H> HashedMap<K, V, H> {
    pub fn with_buckets_and_hasher(bucket_count: usize, hasher: H) -> Self {
        Self::with_buckets_hasher_in(bucket_count, hasher, Global)
    }
}

impl<K, V, H, A: Allocator + Clone> HashedMap<K, V, H, A> {
    /// A bucket count of zero is raised to one. The head array is
    /// allocated here; chain storage waits for the first collision.
    pub fn with_buckets_hasher_in(bucket_count: usize, hasher: H, alloc: A) -> Self {
        Self {
            table: BucketTable::with_buckets_in(bucket_count.max(1), alloc),
            hasher,
            max_load_factor: DEFAULT_MAX_LOAD_FACTOR,
            scan: ScanTracker::new(),
        }
    }
}

impl<K, V, H, A: Allocator> HashedMap<K, V, H, A> {

    pub fn len(&self) -> usize {
        self.table.len
    }

    /// True iff no bucket head is assigned.
    pub fn is_empty(&self) -> bool {
        debug_assert_eq!(self.table.len == 0, self.table.heads_unassigned());
        self.table.len == 0
    }

    pub fn bucket_count(&self) -> usize {
        self.table.bucket_count()
    }

    /// `len / bucket_count`.
    pub fn load_factor(&self) -> f32 {
        self.table.len as f32 / self.table.bucket_count() as f32
    }

    pub fn max_load_factor(&self) -> f32 {
        self.max_load_factor
    }

    /// Panics unless `factor` is positive and finite.
    pub fn set_max_load_factor(&mut self, factor: f32) {
        assert!(
            factor.is_finite() && factor > 0.0,
            "max load factor must be positive and finite, got {factor}"
        );
        self.max_load_factor = factor;
    }

    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    /// Drop every entry. The bucket array is kept.
    pub fn clear(&mut self) {
        let _s = self.scan.enter("clear");
        self.table.clear();
    }

    /// Exchange contents, hashers and allocators in O(1).
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    /// All entries, in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.table.entries().map(|e| (&e.key, &e.value))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&K, &mut V)> {
        self.table.entries_mut().map(|e| (&e.key, &mut e.value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.table.entries().map(|e| &e.key)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.table.entries().map(|e| &e.value)
    }

    /// Rebuild with `max(bucket_count, ceil(len / max_load_factor), 1)`
    /// buckets, redistributing every entry by its stored hash.
    pub fn rehash(&mut self, bucket_count: usize)
    where
        A: Clone,
    {
        let _s = self.scan.enter("rehash");
        let needed = (self.table.len as f32 / self.max_load_factor).ceil() as usize;
        let target = bucket_count.max(needed).max(1);
        if target != self.table.bucket_count() {
            self.table.rebuild(target);
        }
    }

    /// Make room for `count` entries without exceeding the max load factor.
    /// Never reduces the bucket count.
    pub fn reserve(&mut self, count: usize)
    where
        A: Clone,
    {
        let target = (count as f32 / self.max_load_factor).ceil() as usize;
        if target > self.table.bucket_count() {
            self.rehash(target);
        }
    }
}

impl<K: Eq, V, H, A: Allocator> HashedMap<K, V, H, A> {
    #[cfg(test)]
    pub(crate) fn check_invariants(&self)
    where
        K: fmt::Debug,
    {
        self.table.check_invariants();
    }

    /// The hash this map uses for `q`, for the `*_hashed` lookups.
    pub fn hash_key<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized,
        H: KeyHasher<Q>,
    {
        self.hasher.hash_key(q).to_u64()
    }

    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
        H: KeyHasher<Q>,
    {
        let _s = self.scan.enter("get");
        let hash = self.hasher.hash_key(q).to_u64();
        let loc = self.table.locate(q, hash)?;
        Some(&self.table.entry(loc).value)
    }

    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
        H: KeyHasher<Q>,
    {
        let _s = self.scan.enter("get_mut");
        let hash = self.hasher.hash_key(q).to_u64();
        let loc = self.table.locate(q, hash)?;
        Some(&mut self.table.entry_mut(loc).value)
    }

    /// Checked lookup: `KeyNotFound` when absent.
    pub fn at<Q>(&self, q: &Q) -> Result<&V, ContainerError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
        H: KeyHasher<Q>,
    {
        self.get(q).ok_or(ContainerError::KeyNotFound)
    }

    pub fn at_mut<Q>(&mut self, q: &Q) -> Result<&mut V, ContainerError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
        H: KeyHasher<Q>,
    {
        self.get_mut(q).ok_or(ContainerError::KeyNotFound)
    }

    pub fn contains<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
        H: KeyHasher<Q>,
    {
        let _s = self.scan.enter("contains");
        let hash = self.hasher.hash_key(q).to_u64();
        self.table.locate(q, hash).is_some()
    }

    /// `contains` with a hash from `hash_key`; a mismatched hash reports
    /// the key as absent.
    pub fn contains_hashed<Q>(&self, q: &Q, hash: u64) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let _s = self.scan.enter("contains_hashed");
        self.table.locate(q, hash).is_some()
    }

    /// 1 if `q` is present, else 0.
    pub fn count<Q>(&self, q: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
        H: KeyHasher<Q>,
    {
        usize::from(self.contains(q))
    }

    pub fn count_hashed<Q>(&self, q: &Q, hash: u64) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        usize::from(self.contains_hashed(q, hash))
    }

    /// Insert a new entry. A present key is rejected with `DuplicateKey`
    /// and the map is left unchanged.
    pub fn insert(&mut self, key: K, value: V) -> Result<&mut V, ContainerError>
    where
        H: KeyHasher<K>,
    {
        let _s = self.scan.enter("insert");
        let hash = self.hasher.hash_key(&key).to_u64();
        if self.table.locate(&key, hash).is_some() {
            return Err(ContainerError::DuplicateKey);
        }
        let loc = self.table.push_new(Entry { key, value, hash });
        Ok(&mut self.table.entry_mut(loc).value)
    }

    /// Re-insert a node taken out by `extract`.
    pub fn insert_node(&mut self, node: Node<K, V>) -> Result<&mut V, ContainerError>
    where
        H: KeyHasher<K>,
    {
        self.insert(node.key, node.value)
    }

    /// Value for `key`, inserting `default()` first when absent. `default`
    /// only runs on insertion.
    pub fn get_or_insert_with<F>(&mut self, key: K, default: F) -> &mut V
    where
        H: KeyHasher<K>,
        F: FnOnce() -> V,
    {
        let _s = self.scan.enter("get_or_insert_with");
        let hash = self.hasher.hash_key(&key).to_u64();
        let loc = match self.table.locate(&key, hash) {
            Some(loc) => loc,
            None => self.table.push_new(Entry {
                key,
                value: default(),
                hash,
            }),
        };
        &mut self.table.entry_mut(loc).value
    }

    /// Indexing-with-insert: value for `key`, default-inserted when absent.
    pub fn get_or_insert_default(&mut self, key: K) -> &mut V
    where
        H: KeyHasher<K>,
        V: Default,
    {
        self.get_or_insert_with(key, V::default)
    }

    /// Remove `q`; returns 1 if it was present, else 0.
    pub fn erase<Q>(&mut self, q: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
        H: KeyHasher<Q>,
    {
        // The node drops here, after the scan scope has closed.
        match self.extract(q) {
            Some(_node) => 1,
            None => 0,
        }
    }

    /// Unlink `q` and hand its entry to the caller.
    pub fn extract<Q>(&mut self, q: &Q) -> Option<Node<K, V>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
        H: KeyHasher<Q>,
    {
        let _s = self.scan.enter("extract");
        let hash = self.hasher.hash_key(q).to_u64();
        let loc = self.table.locate(q, hash)?;
        let Entry { key, value, .. } = self.table.unlink(loc);
        Some(Node { key, value })
    }
}

impl<K, V, H, A> Clone for HashedMap<K, V, H, A>
where
    K: Clone,
    V: Clone,
    H: Clone,
    A: Allocator + Clone,
{
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            hasher: self.hasher.clone(),
            max_load_factor: self.max_load_factor,
            scan: ScanTracker::new(),
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug, H, A: Allocator> fmt::Debug for HashedMap<K, V, H, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::CountingAllocator;
    use std::cell::Cell;
    use std::collections::BTreeSet;
    use std::hash::{BuildHasher, Hasher};

    /// Hash of a `u32` key is the key itself, so bucket placement is exact.
    #[derive(Clone, Default)]
    struct IdentityHash;

    impl KeyHasher<u32> for IdentityHash {
        type Output = u32;
        fn hash_key(&self, key: &u32) -> u32 {
            *key
        }
    }

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
        } // every key lands in bucket 0
    }

    fn chained(keys: &[u32]) -> HashedMap<u32, String, IdentityHash> {
        // Bucket count 4: keys congruent mod 4 share a chain.
        let mut m = HashedMap::with_buckets_and_hasher(4, IdentityHash);
        for &k in keys {
            m.insert(k, format!("v{k}")).unwrap();
        }
        m.table.check_invariants();
        m
    }

    /// Invariant: a fresh map is empty and reports the default bucket count.
    #[test]
    fn fresh_map_is_empty() {
        let m: HashedMap<String, i32> = HashedMap::new();
        assert!(m.is_empty());
        assert_eq!(m.len(), 0);
        assert_eq!(m.bucket_count(), DEFAULT_BUCKET_COUNT);
        assert_eq!(m.max_load_factor(), DEFAULT_MAX_LOAD_FACTOR);
        assert_eq!(m.load_factor(), 0.0);
    }

    /// Invariant: the first entry of a bucket occupies the head; later ones
    /// go to the arena.
    #[test]
    fn first_entry_fills_head_then_chain() {
        let m = chained(&[1, 5, 9]);
        let bucket = &m.table.buckets[1];
        assert_eq!(bucket.head.as_ref().map(|e| e.key), Some(1));
        assert_eq!(m.table.nodes.len(), 2);
        for k in [1, 5, 9] {
            assert_eq!(m.get(&k), Some(&format!("v{k}")));
        }
        assert_eq!(m.get(&13), None);
    }

    /// Invariant: erasing a chain head promotes its successor into the head.
    #[test]
    fn erase_head_promotes_successor() {
        let mut m = chained(&[2, 6, 10]);
        assert_eq!(m.erase(&2), 1);
        m.table.check_invariants();
        let head = m.table.buckets[2].head.as_ref().map(|e| e.key);
        assert!(matches!(head, Some(6) | Some(10)));
        assert_eq!(m.table.nodes.len(), 1);
        assert!(m.contains(&6) && m.contains(&10));

        assert_eq!(m.erase(&6), 1);
        assert_eq!(m.erase(&10), 1);
        m.table.check_invariants();
        assert!(m.table.buckets[2].head.is_none());
        assert!(m.is_empty());
    }

    /// Invariant: erasing a middle or tail node relinks its neighbours.
    #[test]
    fn erase_chained_node_relinks() {
        let mut m = chained(&[3, 7, 11, 15]);
        // Chain order behind the head is most-recent first: 15, 11, 7.
        assert_eq!(m.erase(&11), 1);
        m.table.check_invariants();
        assert_eq!(m.erase(&7), 1);
        m.table.check_invariants();
        assert_eq!(m.erase(&7), 0);
        let left: BTreeSet<u32> = m.keys().copied().collect();
        assert_eq!(left, BTreeSet::from([3, 15]));
    }

    /// Invariant: `extract` hands back ownership and the key disappears.
    #[test]
    fn extract_returns_owned_node() {
        let mut m = chained(&[0, 4]);
        let node = m.extract(&4).expect("present");
        assert_eq!(node.key(), &4);
        assert_eq!(node.value(), "v4");
        assert!(!m.contains(&4));
        assert!(m.extract(&4).is_none());

        m.insert_node(node).unwrap();
        assert_eq!(m.at(&4), Ok(&"v4".to_string()));
        m.table.check_invariants();
    }

    /// Invariant: duplicates are rejected and leave the map unchanged.
    #[test]
    fn duplicate_insert_rejected() {
        let mut m: HashedMap<String, i32> = HashedMap::new();
        m.insert("dup".to_string(), 1).unwrap();
        match m.insert("dup".to_string(), 2) {
            Err(ContainerError::DuplicateKey) => {}
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(m.get("dup"), Some(&1));
        assert_eq!(m.len(), 1);
    }

    /// Invariant: `get_or_insert_with` runs `default` only on insertion.
    #[test]
    fn get_or_insert_with_is_lazy() {
        let mut m: HashedMap<&'static str, i32> = HashedMap::new();
        let calls = Cell::new(0);
        *m.get_or_insert_with("k", || {
            calls.set(calls.get() + 1);
            10
        }) += 1;
        let v = *m.get_or_insert_with("k", || {
            calls.set(calls.get() + 1);
            99
        });
        assert_eq!(v, 11);
        assert_eq!(calls.get(), 1);
        assert_eq!(*m.get_or_insert_default("fresh"), 0);
        assert_eq!(m.len(), 2);
    }

    /// Invariant: `clear` keeps the bucket array and empties every chain.
    #[test]
    fn clear_keeps_buckets() {
        let mut m = chained(&[1, 2, 5, 6, 9]);
        m.clear();
        assert!(m.is_empty());
        assert_eq!(m.bucket_count(), 4);
        assert_eq!(m.table.nodes.len(), 0);
        m.table.check_invariants();
        m.insert(5, "again".into()).unwrap();
        assert_eq!(m.len(), 1);
    }

    /// Invariant: rehash keeps every pair and honours the load factor floor.
    #[test]
    fn rehash_redistributes_by_stored_hash() {
        let keys: Vec<u32> = (0..40).collect();
        let mut m = chained(&keys);
        assert_eq!(m.load_factor(), 10.0);

        m.rehash(64);
        assert_eq!(m.bucket_count(), 64);
        m.table.check_invariants();
        for &k in &keys {
            assert_eq!(m.get(&k), Some(&format!("v{k}")));
        }

        // Too few buckets for the load factor: raised to ceil(40 / 2).
        m.rehash(1);
        assert_eq!(m.bucket_count(), 20);
        m.table.check_invariants();
        assert_eq!(m.len(), 40);
    }

    /// Invariant: `reserve` sizes for the max load factor and never shrinks.
    #[test]
    fn reserve_grows_only() {
        let mut m: HashedMap<u32, u32, IdentityHash> =
            HashedMap::with_buckets_and_hasher(10, IdentityHash);
        m.reserve(100);
        assert_eq!(m.bucket_count(), 50);
        m.reserve(10);
        assert_eq!(m.bucket_count(), 50);
        m.set_max_load_factor(0.5);
        m.reserve(100);
        assert_eq!(m.bucket_count(), 200);
    }

    /// Invariant: a precomputed hash gives the same answer as hashing again.
    #[test]
    fn hashed_lookups_match_plain_ones() {
        let mut m: HashedMap<String, i32> = HashedMap::new();
        m.insert("a".to_string(), 1).unwrap();
        let h = m.hash_key("a");
        assert!(m.contains_hashed("a", h));
        assert_eq!(m.count_hashed("a", h), 1);
        assert_eq!(m.count("a"), 1);
        assert_eq!(m.count("b"), 0);
        let hb = m.hash_key("b");
        assert!(!m.contains_hashed("b", hb));
    }

    /// Invariant: `at` reports missing keys as `KeyNotFound`.
    #[test]
    fn at_missing_key() {
        let mut m: HashedMap<String, i32> = HashedMap::new();
        assert_eq!(m.at("nope"), Err(ContainerError::KeyNotFound));
        m.insert("yes".to_string(), 3).unwrap();
        *m.at_mut("yes").unwrap() += 1;
        assert_eq!(m.at("yes"), Ok(&4));
    }

    /// Invariant: full collisions still resolve by key equality.
    #[test]
    fn all_keys_colliding() {
        let mut m: HashedMap<String, usize, ConstBuildHasher> =
            HashedMap::with_buckets_and_hasher(8, ConstBuildHasher);
        for i in 0..20 {
            m.insert(format!("k{i}"), i).unwrap();
        }
        m.table.check_invariants();
        assert_eq!(m.table.nodes.len(), 19);
        for i in 0..20 {
            assert_eq!(m.get(format!("k{i}").as_str()), Some(&i));
        }
        for i in (0..20).step_by(3) {
            assert_eq!(m.erase(format!("k{i}").as_str()), 1);
            m.table.check_invariants();
        }
        assert_eq!(m.len(), 13);
    }

    /// Invariant: iteration visits each entry exactly once; `iter_mut`
    /// updates are visible to lookups.
    #[test]
    fn iteration_and_mutation() {
        let mut m = chained(&[1, 2, 3, 5, 9]);
        let seen: BTreeSet<u32> = m.iter().map(|(k, _)| *k).collect();
        assert_eq!(seen, BTreeSet::from([1, 2, 3, 5, 9]));
        for (_, v) in m.iter_mut() {
            v.push('!');
        }
        assert_eq!(m.get(&9).map(String::as_str), Some("v9!"));
        assert_eq!(m.values().filter(|v| v.ends_with('!')).count(), 5);
    }

    /// Invariant: clones are deep and independent; swap exchanges contents.
    #[test]
    fn clone_and_swap() {
        let mut a = chained(&[1, 5]);
        let mut b = a.clone();
        b.erase(&1);
        assert!(a.contains(&1));
        assert!(!b.contains(&1));

        let mut c = HashedMap::with_buckets_and_hasher(16, IdentityHash);
        c.insert(100, "c".to_string()).unwrap();
        a.swap(&mut c);
        assert_eq!(a.bucket_count(), 16);
        assert!(a.contains(&100));
        assert_eq!(c.len(), 2);
    }

    /// Invariant: the head array goes through the map's allocator and is
    /// released on drop; rehash returns the old array.
    #[test]
    fn bucket_array_uses_allocator() {
        let alloc = CountingAllocator::new();
        {
            let mut m = HashedMap::with_buckets_hasher_in(8, IdentityHash, alloc.clone());
            for i in 0..8u32 {
                m.insert(i, i * 2).unwrap();
            }
            m.rehash(32);
            // No collisions, so the chain arena never allocated.
            assert_eq!(alloc.stats().live_slots, 32);
        }
        assert!(alloc.stats().is_balanced());
    }

    /// Invariant: colliding entries are stored through the map's allocator
    /// and every chain node is returned on erase, clear and drop.
    #[test]
    fn chain_nodes_use_allocator() {
        let alloc = CountingAllocator::new();
        {
            let mut m: HashedMap<String, usize, ConstBuildHasher, _> =
                HashedMap::with_buckets_hasher_in(1, ConstBuildHasher, alloc.clone());
            let before = alloc.stats();
            assert_eq!(before.allocations, 1);

            for i in 0..100 {
                m.insert(format!("k{i}"), i).unwrap();
            }
            let after = alloc.stats();
            assert!(after.allocations > before.allocations);
            assert!(after.live_slots >= 1 + 99);
            m.table.check_invariants();

            for i in (0..100).step_by(2) {
                assert_eq!(m.erase(format!("k{i}").as_str()), 1);
            }
            m.table.check_invariants();
            // Freed slots are reused before the arena grows again.
            let slots = alloc.stats().live_slots;
            for i in 100..140 {
                m.insert(format!("k{i}"), i).unwrap();
            }
            assert_eq!(alloc.stats().live_slots, slots);

            m.rehash(7);
            m.table.check_invariants();
            m.clear();
            assert!(m.is_empty());
        }
        assert!(alloc.stats().is_balanced());
    }

    /// Invariant (debug-only): a key whose `Eq` reenters the map during a
    /// scan panics instead of observing a half-finished operation.
    #[cfg(debug_assertions)]
    #[test]
    fn reentrant_eq_panics() {
        use std::hash::Hash;

        struct Sneaky {
            id: u32,
            map: *const HashedMap<Sneaky, (), ConstBuildHasher>,
        }
        impl PartialEq for Sneaky {
            fn eq(&self, other: &Self) -> bool {
                let map = if self.map.is_null() { other.map } else { self.map };
                if !map.is_null() {
                    unsafe {
                        let m = &*map;
                        let _ = m.len();
                        let probe = Sneaky {
                            id: 0,
                            map: core::ptr::null(),
                        };
                        let _ = m.contains(&probe);
                    }
                }
                self.id == other.id
            }
        }
        impl Eq for Sneaky {}
        impl Hash for Sneaky {
            fn hash<S: Hasher>(&self, state: &mut S) {
                self.id.hash(state);
            }
        }

        let mut m: HashedMap<Sneaky, (), ConstBuildHasher> =
            HashedMap::with_buckets_and_hasher(2, ConstBuildHasher);
        m.insert(
            Sneaky {
                id: 1,
                map: core::ptr::null(),
            },
            (),
        )
        .unwrap();
        let query = Sneaky {
            id: 2,
            map: &m as *const _,
        };
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = m.contains(&query);
        }));
        assert!(res.is_err(), "expected reentrancy to panic in debug builds");
    }
}
