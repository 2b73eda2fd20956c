use shroud::HazardPointer;
use shroud_map::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread;

#[test]
fn test_insert_or_get_returns_existing_entry() {
    let map: HashMap<&str, Arc<AtomicU64>, HazardPointer, 16> = HashMap::new();

    let first = Arc::new(AtomicU64::new(1));
    let (entry, inserted) = map.insert_or_get("key", first.clone());
    assert!(inserted);
    entry.value().unwrap().1.store(100, Ordering::Relaxed);
    drop(entry);

    // The second call must surface the stored Arc, not the rejected one.
    let rejected = Arc::new(AtomicU64::new(999));
    let (entry, inserted) = map.insert_or_get("key", rejected);
    assert!(!inserted);
    let stored = entry.value().unwrap().1.clone();
    assert!(Arc::ptr_eq(&stored, &first));
    assert_eq!(stored.load(Ordering::Relaxed), 100);
}

#[test]
fn test_get_or_insert_defers_nothing_observable() {
    let map: HashMap<u64, u64, HazardPointer, 16> = HashMap::new();
    let (entry, inserted) = map.get_or_insert(5, 50);
    assert!(inserted);
    assert_eq!(entry.value().map(|(k, v)| (*k, *v)), Some((5, 50)));
    drop(entry);

    let (entry, inserted) = map.get_or_insert(5, 51);
    assert!(!inserted);
    assert_eq!(entry.value().map(|(_, v)| *v), Some(50));
}

#[test]
fn test_factory_not_called_when_present() {
    let map: HashMap<u64, u64, HazardPointer, 16> = HashMap::new();
    map.insert(5, 50);

    let calls = AtomicUsize::new(0);
    let (entry, inserted) = map.get_or_insert_with(5, || {
        calls.fetch_add(1, Ordering::SeqCst);
        99
    });
    assert!(!inserted);
    assert_eq!(entry.value().map(|(_, v)| *v), Some(50));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_losing_value_is_dropped() {
    struct Counted {
        drops: Arc<AtomicUsize>,
    }
    impl Drop for Counted {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    let drops = Arc::new(AtomicUsize::new(0));
    let map: HashMap<u64, Counted, HazardPointer, 16> = HashMap::new();

    assert!(
        map.insert(
            1,
            Counted {
                drops: drops.clone()
            }
        )
    );
    assert_eq!(drops.load(Ordering::SeqCst), 0);

    // Loses to the existing entry: the new value must be dropped, the
    // stored one untouched.
    assert!(
        !map.insert(
            1,
            Counted {
                drops: drops.clone()
            }
        )
    );
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_racing_factories_store_exactly_one_value() {
    const THREADS: u64 = 16;

    let map: Arc<HashMap<u64, Arc<AtomicU64>, HazardPointer, 16>> = Arc::new(HashMap::new());
    let factory_calls = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for tid in 0..THREADS {
        let map = map.clone();
        let factory_calls = factory_calls.clone();
        handles.push(thread::spawn(move || {
            let (entry, _) = map.get_or_insert_with(5, || {
                factory_calls.fetch_add(1, Ordering::SeqCst);
                Arc::new(AtomicU64::new(tid))
            });
            entry.value().unwrap().1.clone()
        }));
    }

    let returned: Vec<Arc<AtomicU64>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    // The factory ran somewhere between once and once per thread, but only
    // one built value made it in: every caller sees the same allocation.
    let calls = factory_calls.load(Ordering::SeqCst);
    assert!((1..=THREADS as usize).contains(&calls), "calls = {calls}");
    for arc in &returned[1..] {
        assert!(Arc::ptr_eq(&returned[0], arc));
    }
    let stored = map.get(&5).unwrap();
    assert!(Arc::ptr_eq(&stored, &returned[0]));
}
