use shroud::{HazardPointer, Leaking, Reclaimer};
use shroud_map::HashMap;
use std::hash::{BuildHasher, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Pass-through hasher so tests can pin keys to buckets (`bucket = k % B`).
#[derive(Default, Clone)]
struct IdentityState;

struct IdentityHasher(u64);

impl Hasher for IdentityHasher {
    fn finish(&self) -> u64 {
        self.0
    }
    fn write(&mut self, bytes: &[u8]) {
        let mut buf = [0u8; 8];
        let n = bytes.len().min(8);
        buf[..n].copy_from_slice(&bytes[..n]);
        self.0 = u64::from_le_bytes(buf);
    }
}

impl BuildHasher for IdentityState {
    type Hasher = IdentityHasher;
    fn build_hasher(&self) -> IdentityHasher {
        IdentityHasher(0)
    }
}

#[test]
fn test_insert_and_get() {
    let map: HashMap<&str, i32, HazardPointer, 64> = HashMap::new();
    assert!(map.insert("a", 1));
    assert!(map.insert("b", 2));
    assert_eq!(map.get(&"a"), Some(1));
    assert_eq!(map.get(&"b"), Some(2));
    assert_eq!(map.get(&"c"), None);
}

#[test]
fn test_insert_never_replaces() {
    let map: HashMap<u64, &str, HazardPointer, 64> = HashMap::new();
    assert!(map.insert(7, "a"));
    assert!(!map.insert(7, "z"));
    assert_eq!(map.get(&7), Some("a"));

    let it = map.find(&7);
    assert_eq!(it.value().map(|(_, v)| *v), Some("a"));
}

#[test]
fn test_remove() {
    let map: HashMap<u64, u64, HazardPointer, 64> = HashMap::new();
    map.insert(1, 100);
    map.insert(2, 200);

    assert!(map.remove(&1));
    assert_eq!(map.get(&1), None);
    assert!(!map.remove(&1));
    assert_eq!(map.get(&2), Some(200));
}

#[test]
fn test_contains() {
    let map: HashMap<u64, &str, HazardPointer, 64> = HashMap::new();
    map.insert(42, "hello");
    assert!(map.contains(&42));
    assert!(!map.contains(&99));
}

#[test]
fn test_len_and_is_empty() {
    let map: HashMap<u64, u64, HazardPointer, 64> = HashMap::new();
    assert!(map.is_empty());
    assert_eq!(map.len(), 0);

    map.insert(1, 1);
    map.insert(2, 2);
    assert!(!map.is_empty());
    assert_eq!(map.len(), 2);

    map.remove(&1);
    assert_eq!(map.len(), 1);
}

#[test]
fn test_colliding_keys_stay_sorted() {
    // With identity hashing and four buckets, 3, 7 and 11 all land in
    // bucket 3 and must come out in key order.
    let map: HashMap<u64, &str, HazardPointer, 4, shroud::NoBackoff, IdentityState> =
        HashMap::new();
    assert!(map.insert(7, "a"));
    assert!(map.insert(3, "b"));
    assert!(map.insert(11, "c"));

    assert!(map.contains(&3));
    assert!(map.contains(&7));
    assert!(map.contains(&11));

    let entries: Vec<(u64, &str)> = map.iter().collect();
    assert_eq!(entries, vec![(3, "b"), (7, "a"), (11, "c")]);
}

#[test]
fn test_many_entries() {
    let map: HashMap<u64, u64, HazardPointer, 256> = HashMap::new();
    for i in 0..10_000 {
        assert!(map.insert(i, i * 3));
    }
    for i in 0..10_000 {
        assert_eq!(map.get(&i), Some(i * 3));
    }
    assert_eq!(map.len(), 10_000);
}

#[test]
fn test_string_keys() {
    let map: HashMap<String, u64, HazardPointer, 64> = HashMap::new();
    map.insert("hello".to_string(), 1);
    map.insert("world".to_string(), 2);
    assert_eq!(map.get(&"hello".to_string()), Some(1));
    assert_eq!(map.get(&"world".to_string()), Some(2));
}

#[test]
fn test_single_bucket_map() {
    // B = 1 degenerates to one sorted list; everything must still work.
    let map: HashMap<u64, u64, HazardPointer, 1> = HashMap::new();
    for k in [5, 1, 9, 3, 7] {
        map.insert(k, k * 10);
    }
    let keys: Vec<u64> = map.iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec![1, 3, 5, 7, 9]);
    assert!(map.remove(&5));
    let keys: Vec<u64> = map.iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec![1, 3, 7, 9]);
}

#[test]
#[cfg_attr(miri, ignore)] // Leaking never frees, so Miri reports the leak
fn test_works_with_leaking_reclaimer() {
    let map: HashMap<u64, u64, Leaking, 8> = HashMap::new();
    for i in 0..100 {
        map.insert(i, i);
    }
    for i in 0..100 {
        assert!(map.remove(&i));
    }
    assert!(map.is_empty());
}

struct Counted {
    drops: Arc<AtomicUsize>,
}

impl Drop for Counted {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_drop_frees_every_value() {
    let drops = Arc::new(AtomicUsize::new(0));
    {
        let map: HashMap<u64, Counted, HazardPointer, 16> = HashMap::new();
        for i in 0..1_000 {
            map.insert(
                i,
                Counted {
                    drops: drops.clone(),
                },
            );
        }
        // Half through the two-phase remove path, half through Drop.
        for i in 0..500 {
            assert!(map.remove(&i));
        }
    }
    // A scan can transiently retain a node when a sibling test publishes a
    // hazard mid-validation; retry until the count settles.
    for _ in 0..10_000 {
        HazardPointer::flush();
        if drops.load(Ordering::SeqCst) == 1_000 {
            break;
        }
        std::thread::yield_now();
    }
    assert_eq!(drops.load(Ordering::SeqCst), 1_000);
}
