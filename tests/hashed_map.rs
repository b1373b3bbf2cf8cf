use std::cell::Cell;
use std::rc::Rc;
use stl_container::{
    ContainerError, CountingAllocator, DefaultHashBuilder, HashedMap, KeyHasher,
    DEFAULT_BUCKET_COUNT,
};

// Hash of a key is its last byte as `u8`: a narrow integral hasher that
// makes collisions easy to arrange.
#[derive(Clone, Default)]
struct LastByte;

impl KeyHasher<str> for LastByte {
    type Output = u8;
    fn hash_key(&self, key: &str) -> u8 {
        key.as_bytes().last().copied().unwrap_or(0)
    }
}

impl KeyHasher<String> for LastByte {
    type Output = u8;
    fn hash_key(&self, key: &String) -> u8 {
        KeyHasher::<str>::hash_key(self, key.as_str())
    }
}

#[test]
fn ten_bucket_scenario() {
    let mut m: HashedMap<String, i32> = HashedMap::with_buckets(10);
    assert!(m.is_empty());
    assert_eq!(m.len(), 0);

    m.insert("key".to_string(), 7).expect("insert ok");
    assert!(m.contains("key"));
    assert_eq!(m.erase("key"), 1);
    assert!(!m.contains("key"));
    assert!(m.is_empty());
}

#[test]
fn default_map_shape() {
    let m: HashedMap<u64, u64> = HashedMap::default();
    assert_eq!(m.bucket_count(), DEFAULT_BUCKET_COUNT);
    assert_eq!(m.max_load_factor(), 2.0);
    let zero: HashedMap<u64, u64> = HashedMap::with_buckets(0);
    assert_eq!(zero.bucket_count(), 1);
}

#[test]
fn duplicate_insert_rejected() {
    let mut m = HashedMap::new();
    m.insert("dup".to_string(), 1).unwrap();
    let e = m.insert("dup".to_string(), 2);
    match e {
        Err(ContainerError::DuplicateKey) => {}
        other => panic!("expected duplicate insert to error, got {:?}", other),
    }
    assert_eq!(m.at("dup"), Ok(&1));
}

#[test]
fn colliding_keys_resolve_by_equality() {
    // "a1", "b1", "c1" share hash b'1' and therefore one chain.
    let mut m: HashedMap<String, usize, LastByte> = HashedMap::with_buckets_and_hasher(7, LastByte);
    for (i, k) in ["a1", "b1", "c1", "z2"].iter().enumerate() {
        m.insert(k.to_string(), i).unwrap();
    }
    assert_eq!(m.get("b1"), Some(&1));
    assert_eq!(m.get("d1"), None);

    // Removing the head of the shared chain keeps the rest reachable.
    assert_eq!(m.erase("a1"), 1);
    assert_eq!(m.get("b1"), Some(&1));
    assert_eq!(m.get("c1"), Some(&2));
    assert_eq!(m.erase("c1"), 1);
    assert_eq!(m.erase("b1"), 1);
    assert_eq!(m.erase("b1"), 0);
    assert_eq!(m.len(), 1);
    assert_eq!(m.get("z2"), Some(&3));
}

#[test]
fn narrow_hash_values_are_widened() {
    let m: HashedMap<String, (), LastByte> = HashedMap::with_buckets_and_hasher(4, LastByte);
    assert_eq!(m.hash_key("x"), u64::from(b'x'));
}

#[test]
fn count_and_hashed_lookups() {
    let mut m: HashedMap<String, i32> = HashedMap::new();
    m.insert("a".to_string(), 1).unwrap();
    assert_eq!(m.count("a"), 1);
    assert_eq!(m.count("b"), 0);
    let h = m.hash_key("a");
    assert!(m.contains_hashed("a", h));
    assert_eq!(m.count_hashed("a", h), 1);
}

#[test]
fn index_style_insertion() {
    let mut m: HashedMap<&str, Vec<u32>> = HashedMap::new();
    m.get_or_insert_default("evens").push(2);
    m.get_or_insert_default("evens").push(4);
    m.get_or_insert_with("odds", || vec![1]).push(3);
    assert_eq!(m.len(), 2);
    assert_eq!(m.at(&"evens").unwrap(), &vec![2, 4]);
    assert_eq!(m.get(&"odds"), Some(&vec![1, 3]));
    assert_eq!(m.at(&"none"), Err(ContainerError::KeyNotFound));
}

#[test]
fn extract_then_reinsert() {
    let mut m: HashedMap<String, String> = HashedMap::with_buckets(3);
    m.insert("k".to_string(), "v".to_string()).unwrap();
    let mut node = m.extract("k").expect("present");
    assert!(m.is_empty());
    node.value_mut().push('2');
    m.insert_node(node).unwrap();
    assert_eq!(m.get("k").map(String::as_str), Some("v2"));

    let (k, v) = m.extract("k").unwrap().into_parts();
    assert_eq!((k.as_str(), v.as_str()), ("k", "v2"));
    assert!(m.extract("k").is_none());
}

#[test]
fn clear_drops_every_value_once() {
    let drops = Rc::new(Cell::new(0));
    struct D(Rc<Cell<usize>>);
    impl Drop for D {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    let mut m: HashedMap<u32, D> = HashedMap::with_buckets(2);
    for i in 0..9 {
        m.insert(i, D(drops.clone())).unwrap();
    }
    assert_eq!(m.erase(&4), 1);
    assert_eq!(drops.get(), 1);
    m.clear();
    assert_eq!(drops.get(), 9);
    assert!(m.is_empty());
    assert_eq!(m.bucket_count(), 2);

    m.insert(1, D(drops.clone())).unwrap();
    drop(m);
    assert_eq!(drops.get(), 10);
}

#[test]
fn load_factor_and_rehash() {
    let mut m: HashedMap<u32, u32> = HashedMap::with_buckets(4);
    for i in 0..12 {
        m.insert(i, i * i).unwrap();
    }
    // No automatic growth.
    assert_eq!(m.bucket_count(), 4);
    assert_eq!(m.load_factor(), 3.0);

    m.rehash(24);
    assert_eq!(m.bucket_count(), 24);
    assert_eq!(m.load_factor(), 0.5);
    for i in 0..12 {
        assert_eq!(m.get(&i), Some(&(i * i)));
    }

    m.rehash(0);
    assert_eq!(m.bucket_count(), 6);

    m.set_max_load_factor(1.0);
    m.reserve(30);
    assert_eq!(m.bucket_count(), 30);
    assert!(m.load_factor() <= m.max_load_factor());
}

#[test]
#[should_panic(expected = "max load factor must be positive")]
fn non_positive_max_load_factor_panics() {
    let mut m: HashedMap<u32, u32> = HashedMap::new();
    m.set_max_load_factor(0.0);
}

#[test]
fn swap_and_clone() {
    let mut a: HashedMap<String, i32> = HashedMap::with_buckets(5);
    a.insert("x".to_string(), 1).unwrap();
    let mut b: HashedMap<String, i32> = HashedMap::with_buckets(9);
    b.insert("y".to_string(), 2).unwrap();
    b.insert("z".to_string(), 3).unwrap();

    a.swap(&mut b);
    assert_eq!((a.len(), a.bucket_count()), (2, 9));
    assert_eq!((b.len(), b.bucket_count()), (1, 5));
    assert!(a.contains("y") && b.contains("x"));

    let mut c = a.clone();
    *c.get_mut("y").unwrap() = 20;
    assert_eq!(a.get("y"), Some(&2));
    assert_eq!(c.get("y"), Some(&20));
}

#[test]
fn iteration_covers_every_entry() {
    let mut m: HashedMap<u32, u32> = HashedMap::with_buckets(3);
    for i in 0..20 {
        m.insert(i, 0).unwrap();
    }
    for (k, v) in m.iter_mut() {
        *v = k * 2;
    }
    let mut keys: Vec<u32> = m.keys().copied().collect();
    keys.sort_unstable();
    assert_eq!(keys, (0..20).collect::<Vec<_>>());
    assert_eq!(m.values().sum::<u32>(), (0..20).map(|k| k * 2).sum());
    assert_eq!(m.iter().count(), 20);
}

#[test]
fn debug_lists_entries() {
    let mut m: HashedMap<&str, i32> = HashedMap::with_buckets(1);
    m.insert("only", 1).unwrap();
    assert_eq!(format!("{:?}", m), r#"{"only": 1}"#);
}

#[test]
fn buckets_and_chains_are_released_through_allocator() {
    let alloc = CountingAllocator::new();
    {
        let mut m: HashedMap<u32, u32, DefaultHashBuilder, _> =
            HashedMap::with_buckets_hasher_in(16, DefaultHashBuilder::default(), alloc.clone());
        for i in 0..40 {
            m.insert(i, i).unwrap();
        }
        // 40 keys over 16 buckets must collide, so chain storage exists.
        let filled = alloc.stats();
        assert!(filled.allocations >= 2, "{:?}", filled);
        assert!(filled.live_slots > 16, "{:?}", filled);

        m.reserve(100);
        assert_eq!(m.bucket_count(), 50);
        m.clear();
        assert!(alloc.stats().allocations > filled.allocations);
    }
    assert!(alloc.stats().is_balanced());
}
