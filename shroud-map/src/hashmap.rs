//! Lock-free concurrent hash map over Harris–Michael ordered lists.
//!
//! # Architecture
//!
//! - **Buckets**: a fixed array of `B` atomic head pointers; each bucket is
//!   an independent key-sorted singly-linked list. Two buckets never
//!   interact, so throughput scales with `B` under uniform hashing.
//! - **Deletion**: two-phase. A CAS sets the mark bit on the victim's own
//!   next pointer (logical delete), a second CAS swings the predecessor
//!   past it (physical unlink). Every walker that encounters a marked node
//!   unlinks it before moving on.
//! - **Reclamation**: pluggable through the `shroud` interface. Walkers
//!   hold two protection handles (the current node and its predecessor)
//!   so both ends of the link being inspected stay alive.
//!
//! The map is less compact than open-addressing designs, but it is
//! lock-free for all operations, fully generic in `K` and `V`, and never
//! invalidates iterators or references on concurrent insert/remove.
//!
//! No dynamic resizing: `B` is fixed at the type level. Layer a
//! split-ordered structure on top if you need growth.

use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::marker::PhantomData;
use core::mem;
use core::ptr;
use core::sync::atomic::Ordering;
use foldhash::fast::FixedState;
use shroud::{Backoff, MarkedAtomic, MarkedPtr, NoBackoff, Protect, Reclaimer};

struct Node<K, V> {
    value: (K, V),
    next: MarkedAtomic<Node<K, V>>,
}

unsafe impl<K: Send, V: Send> Send for Node<K, V> {}
unsafe impl<K: Sync, V: Sync> Sync for Node<K, V> {}

/// Working position inside one bucket list.
///
/// `prev` points at the atomic slot whose value is `cur`: either the
/// bucket head or the next-field of the node protected by `save`. The
/// `save` handle is load-bearing: it keeps the storage behind `prev` alive
/// while the walker reads through it, even if that node gets marked and
/// unlinked concurrently.
struct Cursor<K, V, R>
where
    K: Send + 'static,
    V: Send + 'static,
    R: Reclaimer,
{
    prev: *const MarkedAtomic<Node<K, V>>,
    next: MarkedPtr<Node<K, V>>,
    cur: R::Guard<Node<K, V>>,
    save: R::Guard<Node<K, V>>,
}

impl<K, V, R> Cursor<K, V, R>
where
    K: Send + 'static,
    V: Send + 'static,
    R: Reclaimer,
{
    fn start(head: &MarkedAtomic<Node<K, V>>) -> Self {
        Self {
            prev: head,
            next: MarkedPtr::null(),
            cur: Default::default(),
            save: Default::default(),
        }
    }

    fn detached() -> Self {
        Self {
            prev: ptr::null(),
            next: MarkedPtr::null(),
            cur: Default::default(),
            save: Default::default(),
        }
    }
}

/// A lock-free hash map with `B` buckets, generic over the reclamation
/// scheme `R`, the contention backoff `BO`, and the hasher `S`.
///
/// Keys are `Ord + Hash`; each bucket keeps its entries key-sorted, which
/// bounds every operation to a single monotone walk. Values are immutable
/// once published; there is no `insert`-as-replace, remove and re-insert
/// instead.
///
/// The hasher must be deterministic for the lifetime of one map instance;
/// with the default [`FixedState`] it is. All operations are lock-free.
///
/// # Example
///
/// ```rust
/// use shroud::HazardPointer;
/// use shroud_map::HashMap;
///
/// let map: HashMap<u64, &str, HazardPointer, 64> = HashMap::new();
/// assert!(map.insert(1, "one"));
/// assert!(!map.insert(1, "uno"));
/// assert_eq!(map.get(&1), Some("one"));
/// assert!(map.remove(&1));
/// ```
pub struct HashMap<K, V, R, const B: usize, BO = NoBackoff, S = FixedState>
where
    R: Reclaimer,
{
    buckets: Box<[MarkedAtomic<Node<K, V>>]>,
    hasher: S,
    _marker: PhantomData<(R, BO)>,
}

unsafe impl<K, V, R, const B: usize, BO, S> Send for HashMap<K, V, R, B, BO, S>
where
    K: Send,
    V: Send,
    R: Reclaimer,
    S: Send,
{
}

unsafe impl<K, V, R, const B: usize, BO, S> Sync for HashMap<K, V, R, B, BO, S>
where
    K: Send + Sync,
    V: Send + Sync,
    R: Reclaimer,
    S: Sync,
{
}

impl<K, V, R, const B: usize, BO, S> HashMap<K, V, R, B, BO, S>
where
    R: Reclaimer,
{
    /// Creates an empty map with the default hasher.
    pub fn new() -> Self
    where
        S: Default,
    {
        Self::with_hasher(S::default())
    }

    /// Creates an empty map with the given hasher.
    pub fn with_hasher(hasher: S) -> Self {
        const {
            assert!(B > 0, "HashMap needs at least one bucket");
        }
        let mut buckets = Vec::with_capacity(B);
        for _ in 0..B {
            buckets.push(MarkedAtomic::null());
        }
        Self {
            buckets: buckets.into_boxed_slice(),
            hasher,
            _marker: PhantomData,
        }
    }
}

impl<K, V, R, const B: usize, BO, S> Default for HashMap<K, V, R, B, BO, S>
where
    R: Reclaimer,
    S: Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, R, const B: usize, BO, S> HashMap<K, V, R, B, BO, S>
where
    K: Ord + Hash + Clone + Send + 'static,
    V: Send + 'static,
    R: Reclaimer,
    BO: Backoff,
    S: BuildHasher,
{
    #[inline]
    fn bucket_of(&self, key: &K) -> usize {
        (self.hasher.hash_one(key) as usize) % B
    }

    /// Walks `bucket` for the first node with a key >= `key`, returning
    /// `true` on an exact match. On return the cursor is positioned with
    /// `prev` at the slot holding `cur` and `save` protecting the slot's
    /// owner.
    ///
    /// Resumes from the cursor's current position when the predecessor is
    /// still unmarked, otherwise re-anchors at the bucket head. Marked
    /// nodes encountered on the way are unlinked and retired: helping is
    /// mandatory, a walker never leaves a marked node between itself and
    /// its target.
    fn locate(
        &self,
        key: &K,
        bucket: usize,
        c: &mut Cursor<K, V, R>,
        backoff: &mut BO,
    ) -> bool {
        let head: &MarkedAtomic<Node<K, V>> = &self.buckets[bucket];
        debug_assert!({
            let save = c.save.get();
            if save.is_null() {
                ptr::eq(c.prev, head)
            } else {
                ptr::eq(c.prev, &unsafe { save.deref() }.next)
            }
        });

        let mut start = c.prev;
        let mut start_guard = c.save.clone();
        'retry: loop {
            c.prev = start;
            c.save = start_guard.clone();
            // SAFETY: prev is the bucket head (alive with the map) or the
            // next-field of the node protected by save.
            c.next = unsafe { &*c.prev }.load(Ordering::Relaxed);
            if c.next.mark() != 0 {
                // The start node is itself marked for removal: re-anchor
                // at the bucket head. Bucket heads are never marked.
                debug_assert!(!ptr::eq(c.prev, head));
                start = head;
                start_guard.reset();
                continue 'retry;
            }

            loop {
                // (1) acquire pairs with every release-CAS installing a
                // next pointer; a protected node is seen fully initialized.
                // SAFETY: as above, prev's storage is pinned.
                if !c
                    .cur
                    .acquire_if_equal(unsafe { &*c.prev }, c.next, Ordering::Acquire)
                {
                    continue 'retry;
                }

                let cur = c.cur.get();
                if cur.is_null() {
                    return false;
                }
                // SAFETY: cur is protected by c.cur.
                let cur_ref: &Node<K, V> = unsafe { cur.deref() };

                c.next = cur_ref.next.load(Ordering::Relaxed);
                if c.next.mark() != 0 {
                    // cur is logically deleted: splice it out before
                    // stepping past. Re-read with acquire so the successor
                    // pointer we install is a published one.
                    let succ = cur_ref.next.load(Ordering::Acquire).unmarked();
                    c.next = succ;
                    // SAFETY: prev's storage is pinned (head or save).
                    if unsafe { &*c.prev }
                        .compare_exchange_weak(cur, succ, Ordering::Release, Ordering::Relaxed)
                        .is_err()
                    {
                        backoff.backoff();
                        continue 'retry;
                    }
                    // SAFETY: the CAS above removed the only remaining
                    // link to cur; nobody can reach it anew.
                    unsafe { c.cur.reclaim() };
                } else {
                    // SAFETY: prev's storage is pinned.
                    if unsafe { &*c.prev }.load(Ordering::Relaxed) != cur {
                        // cur may have been spliced out from under us.
                        continue 'retry;
                    }
                    match cur_ref.value.0.cmp(key) {
                        core::cmp::Ordering::Equal => return true,
                        core::cmp::Ordering::Greater => return false,
                        core::cmp::Ordering::Less => {
                            c.prev = &cur_ref.next;
                            mem::swap(&mut c.save, &mut c.cur);
                        }
                    }
                }
            }
        }
    }

    /// Returns `true` if the map holds an entry for `key`.
    ///
    /// Never allocates.
    pub fn contains(&self, key: &K) -> bool {
        let bucket = self.bucket_of(key);
        let mut backoff = BO::default();
        let mut cursor = Cursor::start(&self.buckets[bucket]);
        self.locate(key, bucket, &mut cursor, &mut backoff)
    }

    /// Returns a clone of the value stored for `key`.
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        let it = self.find(key);
        it.value().map(|(_, v)| v.clone())
    }

    /// Returns an iterator positioned at `key`, or the end iterator if the
    /// key is absent.
    pub fn find(&self, key: &K) -> Iter<'_, K, V, R, B, BO, S> {
        let bucket = self.bucket_of(key);
        let mut backoff = BO::default();
        let mut cursor = Cursor::start(&self.buckets[bucket]);
        if self.locate(key, bucket, &mut cursor, &mut backoff) {
            Iter {
                map: self,
                bucket,
                cursor,
            }
        } else {
            Iter::end(self)
        }
    }

    /// Inserts `key -> value` if the key is absent. Returns `true` if the
    /// entry was inserted. Existing entries are never replaced.
    pub fn insert(&self, key: K, value: V) -> bool {
        self.insert_or_get(key, value).1
    }

    /// Inserts `key -> value` if the key is absent; either way returns an
    /// iterator at the entry, plus whether the insertion happened.
    ///
    /// The node is allocated up front; if the key turns out to be present
    /// (or a racing insert wins), the freshly built node is dropped.
    pub fn insert_or_get(&self, key: K, value: V) -> (Iter<'_, K, V, R, B, BO, S>, bool) {
        let node = Box::into_raw(Box::new(Node {
            value: (key, value),
            next: MarkedAtomic::null(),
        }));
        // SAFETY: node is ours until the linking CAS publishes it.
        let bucket = self.bucket_of(unsafe { &(*node).value.0 });
        let mut backoff = BO::default();
        let mut cursor = Cursor::start(&self.buckets[bucket]);
        loop {
            // SAFETY: node is unpublished, the key reference stays valid.
            if self.locate(unsafe { &(*node).value.0 }, bucket, &mut cursor, &mut backoff) {
                // SAFETY: never published, we still own it.
                drop(unsafe { Box::from_raw(node) });
                return (
                    Iter {
                        map: self,
                        bucket,
                        cursor,
                    },
                    false,
                );
            }
            if self.try_link(node, &mut cursor) {
                return (
                    Iter {
                        map: self,
                        bucket,
                        cursor,
                    },
                    true,
                );
            }
            backoff.backoff();
        }
    }

    /// Like [`insert_or_get`](HashMap::insert_or_get), but defers the node
    /// allocation until the key is first seen to be absent. The fast
    /// already-present path allocates nothing.
    pub fn get_or_insert(&self, key: K, value: V) -> (Iter<'_, K, V, R, B, BO, S>, bool) {
        self.get_or_insert_with(key, move || value)
    }

    /// Inserts a value built by `make_value` if `key` is absent.
    ///
    /// The factory is not called when the key is already present. Under
    /// contention the factory may run even though the insertion ultimately
    /// loses to a racing insert of the same key; the built value is then
    /// dropped. Across racing callers the factory therefore runs at least
    /// once and at most once per caller.
    pub fn get_or_insert_with<F>(&self, key: K, make_value: F) -> (Iter<'_, K, V, R, B, BO, S>, bool)
    where
        F: FnOnce() -> V,
    {
        let bucket = self.bucket_of(&key);
        let mut backoff = BO::default();
        let mut cursor = Cursor::start(&self.buckets[bucket]);
        let mut pending = Some((key, make_value));
        let mut node: *mut Node<K, V> = ptr::null_mut();
        loop {
            // Once the key has moved into the node, probe through the node.
            let probe: &K = match pending.as_ref() {
                Some((key, _)) => key,
                // SAFETY: node is unpublished, we still own it.
                None => unsafe { &(*node).value.0 },
            };
            if self.locate(probe, bucket, &mut cursor, &mut backoff) {
                if !node.is_null() {
                    // SAFETY: never published, we still own it.
                    drop(unsafe { Box::from_raw(node) });
                }
                return (
                    Iter {
                        map: self,
                        bucket,
                        cursor,
                    },
                    false,
                );
            }
            if node.is_null() {
                let (key, make_value) = pending.take().expect("value factory consumed twice");
                node = Box::into_raw(Box::new(Node {
                    value: (key, make_value()),
                    next: MarkedAtomic::null(),
                }));
            }
            if self.try_link(node, &mut cursor) {
                return (
                    Iter {
                        map: self,
                        bucket,
                        cursor,
                    },
                    true,
                );
            }
            backoff.backoff();
        }
    }

    /// Attempts the linking CAS of `node` at the cursor position. On
    /// success the cursor protects the node and `true` is returned.
    fn try_link(&self, node: *mut Node<K, V>, c: &mut Cursor<K, V, R>) -> bool {
        let cur = c.cur.get();
        c.cur.reset();
        c.cur.protect(MarkedPtr::new(node));
        // SAFETY: node is unpublished, we still own it.
        unsafe { &(*node).next }.store(cur, Ordering::Relaxed);
        // (2) release: a walker acquiring this pointer sees value and next
        // fully initialized.
        // SAFETY: prev's storage is pinned by the cursor.
        unsafe { &*c.prev }
            .compare_exchange_weak(
                cur,
                MarkedPtr::new(node),
                Ordering::Release,
                Ordering::Relaxed,
            )
            .is_ok()
    }

    /// Removes the entry for `key`. Returns `false` if the key is absent.
    ///
    /// Two phases: a CAS marks the node's own next pointer (logical
    /// delete), a second CAS unlinks it from the predecessor. If the
    /// unlink loses a race, the bucket is re-walked before returning so
    /// this thread never sees its own marked node again.
    pub fn remove(&self, key: &K) -> bool {
        let bucket = self.bucket_of(key);
        let mut backoff = BO::default();
        let mut cursor = Cursor::start(&self.buckets[bucket]);
        loop {
            if !self.locate(key, bucket, &mut cursor, &mut backoff) {
                return false;
            }
            // SAFETY: cur is protected by the cursor.
            let cur_ref: &Node<K, V> = unsafe { cursor.cur.get().deref() };
            // (3) acquire on success: participates in the release sequence
            // headed by the CAS that installed this next pointer.
            if cur_ref
                .next
                .compare_exchange_weak(
                    cursor.next,
                    cursor.next.marked(),
                    Ordering::Acquire,
                    Ordering::Relaxed,
                )
                .is_ok()
            {
                break;
            }
            // A racer changed cur's successor: rewalk and retry.
        }

        debug_assert_eq!(cursor.next.mark(), 0);
        debug_assert_eq!(cursor.cur.get().mark(), 0);
        let expected = cursor.cur.get();
        // SAFETY: prev's storage is pinned by the cursor.
        if unsafe { &*cursor.prev }
            .compare_exchange_weak(
                expected,
                cursor.next,
                Ordering::Release,
                Ordering::Relaxed,
            )
            .is_ok()
        {
            // SAFETY: unlinked by the CAS above.
            unsafe { cursor.cur.reclaim() };
        } else {
            // A helper or inserter interfered. Rewalk so the marked node
            // is unlinked before we return.
            self.locate(key, bucket, &mut cursor, &mut backoff);
        }
        true
    }

    /// Removes the entry the iterator is positioned at and returns an
    /// iterator to the following entry.
    ///
    /// # Panics
    ///
    /// Panics if `pos` is the end iterator or belongs to another map.
    pub fn remove_at<'a>(
        &'a self,
        mut pos: Iter<'a, K, V, R, B, BO, S>,
    ) -> Iter<'a, K, V, R, B, BO, S> {
        assert!(ptr::eq(pos.map, self), "iterator belongs to another map");
        assert!(!pos.cursor.cur.get().is_null(), "remove_at on end iterator");

        let mut backoff = BO::default();
        // SAFETY: cur is protected by the iterator's cursor.
        let cur_ref: &Node<K, V> = unsafe { pos.cursor.cur.get().deref() };

        // Phase one: set the deletion mark, unless someone else already did.
        let mut next = cur_ref.next.load(Ordering::Relaxed);
        while next.mark() == 0 {
            // (4) acquire on success, as in remove().
            match cur_ref.next.compare_exchange_weak(
                next,
                next.marked(),
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => {
                    next = observed;
                    backoff.backoff();
                }
            }
        }

        // The successor is reachable only through cur while cur stays
        // linked, so protecting it without revalidation is fine: if cur got
        // unlinked meanwhile, the CAS below fails and the guard is dropped
        // without ever being dereferenced.
        let mut next_guard: R::Guard<Node<K, V>> = Default::default();
        next_guard.protect(next.unmarked());

        debug_assert_eq!(pos.cursor.cur.get().mark(), 0);
        let expected = pos.cursor.cur.get();
        // SAFETY: prev's storage is pinned by the cursor.
        if unsafe { &*pos.cursor.prev }
            .compare_exchange_weak(
                expected,
                next.unmarked(),
                Ordering::Release,
                Ordering::Relaxed,
            )
            .is_ok()
        {
            // SAFETY: unlinked by the CAS above.
            unsafe { pos.cursor.cur.reclaim() };
            pos.cursor.cur = next_guard;
        } else {
            next_guard.reset();
            let key = cur_ref.value.0.clone();
            // Another thread interfered: rewalk to finish the unlink and
            // reposition the cursor at the key's live successor.
            self.locate(&key, pos.bucket, &mut pos.cursor, &mut backoff);
        }

        if pos.cursor.cur.get().is_null() {
            pos.move_to_next_bucket();
        }
        pos
    }

    /// Returns an iterator over all entries, bucket by bucket, key-sorted
    /// within each bucket. No order across buckets.
    ///
    /// The iterator stays valid across concurrent inserts and removes; see
    /// [`Iter`] for the traversal guarantees.
    pub fn iter(&self) -> Iter<'_, K, V, R, B, BO, S> {
        Iter::begin(self)
    }

    /// Counts the entries with a full protected traversal. O(n), and a
    /// snapshot only: concurrent mutation can change the count before the
    /// call returns.
    pub fn len(&self) -> usize {
        let mut n = 0;
        let mut it = self.iter();
        while it.value().is_some() {
            n += 1;
            it.advance();
        }
        n
    }

    /// Returns `true` if a protected traversal finds no entries.
    pub fn is_empty(&self) -> bool {
        self.iter().value().is_none()
    }
}

impl<K, V, R, const B: usize, BO, S> Drop for HashMap<K, V, R, B, BO, S>
where
    R: Reclaimer,
{
    fn drop(&mut self) {
        // Exclusive access: free nodes directly, no retire needed.
        for head in self.buckets.iter() {
            let mut p = head.load(Ordering::Acquire);
            while !p.is_null() {
                // SAFETY: no concurrent access during drop; every node was
                // allocated via Box and is reachable exactly once.
                let next = unsafe { p.deref() }.next.load(Ordering::Acquire);
                drop(unsafe { Box::from_raw(p.as_raw()) });
                p = next;
            }
        }
        // Nodes retired by earlier removes on this thread can go now.
        R::flush();
    }
}

impl<K, V, R, const B: usize, BO, S> fmt::Debug for HashMap<K, V, R, B, BO, S>
where
    R: Reclaimer,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashMap").field("buckets", &B).finish()
    }
}

/// A forward cursor over the map.
///
/// Holds two protection handles (current node and predecessor), so the
/// entry returned by [`value`](Iter::value) can never be freed while the
/// borrow lives. Not invalidated by concurrent inserts or removes;
/// conflicting removes only cost a bucket re-walk on the next advance.
///
/// No multi-pass guarantee: `a == b` does not imply that advancing both
/// yields equal iterators again.
pub struct Iter<'a, K, V, R, const B: usize, BO = NoBackoff, S = FixedState>
where
    K: Send + 'static,
    V: Send + 'static,
    R: Reclaimer,
{
    map: &'a HashMap<K, V, R, B, BO, S>,
    bucket: usize,
    cursor: Cursor<K, V, R>,
}

impl<'a, K, V, R, const B: usize, BO, S> Iter<'a, K, V, R, B, BO, S>
where
    K: Ord + Hash + Clone + Send + 'static,
    V: Send + 'static,
    R: Reclaimer,
    BO: Backoff,
    S: BuildHasher,
{
    fn begin(map: &'a HashMap<K, V, R, B, BO, S>) -> Self {
        let head = &map.buckets[0];
        let mut it = Self {
            map,
            bucket: 0,
            cursor: Cursor::start(head),
        };
        // (5) acquire pairs with the release-CASes installing heads.
        it.cursor.cur.acquire(head, Ordering::Acquire);
        if it.cursor.cur.get().is_null() {
            it.move_to_next_bucket();
        }
        it
    }

    fn end(map: &'a HashMap<K, V, R, B, BO, S>) -> Self {
        Self {
            map,
            bucket: B,
            cursor: Cursor::detached(),
        }
    }

    /// The entry at the current position, or `None` at the end.
    ///
    /// The borrow keeps the iterator (and with it the entry's protection)
    /// pinned; copy what you need out before advancing.
    pub fn value(&self) -> Option<&(K, V)> {
        let cur = self.cursor.cur.get();
        if cur.is_null() {
            None
        } else {
            // SAFETY: cur is protected by the cursor for &self's lifetime.
            Some(&unsafe { cur.deref() }.value)
        }
    }

    /// Returns `true` once the iterator has moved past the last bucket.
    pub fn is_end(&self) -> bool {
        self.cursor.cur.get().is_null()
    }

    /// Steps to the next entry.
    ///
    /// If the current node was concurrently marked for removal, the bucket
    /// is re-walked (unlinking the node on the way) and the iterator lands
    /// on the key's live successor.
    ///
    /// # Panics
    ///
    /// Panics at the end iterator.
    pub fn advance(&mut self) {
        let cur = self.cursor.cur.get();
        assert!(!cur.is_null(), "advance past the end iterator");
        // SAFETY: cur is protected by the cursor.
        let cur_ref: &Node<K, V> = unsafe { cur.deref() };

        let next = cur_ref.next.load(Ordering::Relaxed);
        let mut step: R::Guard<Node<K, V>> = Default::default();
        // (6) acquire as in locate().
        if next.mark() == 0 && step.acquire_if_equal(&cur_ref.next, next, Ordering::Acquire) {
            self.cursor.prev = &cur_ref.next;
            mem::swap(&mut self.cursor.save, &mut self.cursor.cur);
            self.cursor.cur = step;
        } else {
            // cur is being removed: let locate() unlink it and position us
            // at the first live key >= cur's key.
            let key = cur_ref.value.0.clone();
            let mut backoff = BO::default();
            self.map
                .locate(&key, self.bucket, &mut self.cursor, &mut backoff);
        }

        debug_assert!(
            ptr::eq(self.cursor.prev, &self.map.buckets[self.bucket])
                || self.cursor.cur.get().is_null()
                || (!self.cursor.save.get().is_null()
                    && ptr::eq(
                        self.cursor.prev,
                        &unsafe { self.cursor.save.get().deref() }.next
                    ))
        );

        if self.cursor.cur.get().is_null() {
            self.move_to_next_bucket();
        }
    }

    fn move_to_next_bucket(&mut self) {
        self.cursor.save.reset();
        while self.cursor.cur.get().is_null() && self.bucket + 1 < B {
            self.bucket += 1;
            let head = &self.map.buckets[self.bucket];
            self.cursor.prev = head;
            // (7) acquire as in begin().
            self.cursor.cur.acquire(head, Ordering::Acquire);
        }
        if self.cursor.cur.get().is_null() {
            self.bucket = B;
            self.cursor.prev = ptr::null();
        }
    }

    /// Detaches the iterator, releasing both protection handles.
    pub fn reset(&mut self) {
        self.bucket = B;
        self.cursor.prev = ptr::null();
        self.cursor.cur.reset();
        self.cursor.save.reset();
    }
}

impl<K, V, R, const B: usize, BO, S> PartialEq for Iter<'_, K, V, R, B, BO, S>
where
    K: Send + 'static,
    V: Send + 'static,
    R: Reclaimer,
{
    fn eq(&self, other: &Self) -> bool {
        self.cursor.cur.get().as_raw() == other.cursor.cur.get().as_raw()
    }
}

impl<K, V, R, const B: usize, BO, S> Iterator for Iter<'_, K, V, R, B, BO, S>
where
    K: Ord + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
    R: Reclaimer,
    BO: Backoff,
    S: BuildHasher,
{
    type Item = (K, V);

    fn next(&mut self) -> Option<(K, V)> {
        let item = self.value().cloned()?;
        self.advance();
        Some(item)
    }
}
