//! Hazard-pointer reclamation.
//!
//! Each [`HazardGuard`] publishes the address it protects into a
//! cache-line-aligned slot visible to every thread. Retiring threads batch
//! unlinked nodes locally and periodically scan the published hazards,
//! freeing every retired node whose address nobody protects.
//!
//! The slot list only grows; released slots are recycled through a
//! per-thread cache first and a CAS on the slot's `active` flag second.
//! Retire lists abandoned by exiting threads are handed to a global orphan
//! list and adopted by the next scan on any thread.

use crate::atomic::MarkedAtomic;
use crate::marked::MarkedPtr;
use crate::reclaim::{Protect, Reclaimer};
use core::cell::{Cell, RefCell};
use core::mem;
use core::ptr;
use core::sync::atomic::{AtomicPtr, AtomicUsize, Ordering, fence};
use once_cell::race::OnceBox;
use std::sync::Mutex;

/// Scan the hazard slots every this many retired nodes.
const RETIRE_THRESHOLD: usize = 64;

/// One published hazard. Aligned to its own cache line so scans and
/// publications on different slots do not contend.
#[repr(align(128))]
struct HazardSlot {
    /// Address currently protected by the owning guard (0 = none).
    protected: AtomicUsize,
    /// 1 while the slot is owned by some thread (in a guard or cached).
    active: AtomicUsize,
    /// Next slot in the global list. Written once at publication.
    next: AtomicPtr<HazardSlot>,
}

struct Retired {
    addr: usize,
    drop_fn: unsafe fn(usize),
}

struct HazardState {
    /// Head of the grow-only slot list.
    head: AtomicPtr<HazardSlot>,
    /// Retired nodes whose owning thread has exited.
    orphans: Mutex<Vec<Retired>>,
}

static GLOBAL: OnceBox<HazardState> = OnceBox::new();

#[inline]
fn global() -> &'static HazardState {
    GLOBAL.get_or_init(|| {
        Box::new(HazardState {
            head: AtomicPtr::new(ptr::null_mut()),
            orphans: Mutex::new(Vec::new()),
        })
    })
}

impl HazardState {
    /// Claims a slot: recycle an inactive one or grow the list.
    fn acquire_slot(&self) -> &'static HazardSlot {
        let mut p = self.head.load(Ordering::Acquire);
        while !p.is_null() {
            // SAFETY: slots are Box::leak'd and never freed.
            let slot = unsafe { &*p };
            if slot.active.load(Ordering::Relaxed) == 0
                && slot
                    .active
                    .compare_exchange(0, 1, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok()
            {
                return slot;
            }
            p = slot.next.load(Ordering::Acquire);
        }

        let slot: &'static HazardSlot = Box::leak(Box::new(HazardSlot {
            protected: AtomicUsize::new(0),
            active: AtomicUsize::new(1),
            next: AtomicPtr::new(ptr::null_mut()),
        }));
        let mut head = self.head.load(Ordering::Relaxed);
        loop {
            slot.next.store(head, Ordering::Relaxed);
            match self.head.compare_exchange_weak(
                head,
                slot as *const _ as *mut _,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => return slot,
                Err(h) => head = h,
            }
        }
    }
}

/// Thread-local state: cached slots and the pending retire batch.
struct Handle {
    cache: RefCell<Vec<&'static HazardSlot>>,
    retired: RefCell<Vec<Retired>>,
    /// Suppresses re-entrant scans when a destructor retires more nodes.
    scanning: Cell<bool>,
}

impl Handle {
    const fn new() -> Self {
        Self {
            cache: RefCell::new(Vec::new()),
            retired: RefCell::new(Vec::new()),
            scanning: Cell::new(false),
        }
    }

    fn acquire_slot(&self) -> &'static HazardSlot {
        match self.cache.borrow_mut().pop() {
            Some(slot) => slot,
            None => global().acquire_slot(),
        }
    }

    fn retire(&self, node: Retired) {
        let len = {
            let mut retired = self.retired.borrow_mut();
            retired.push(node);
            retired.len()
        };
        if len >= RETIRE_THRESHOLD {
            self.scan();
        }
    }

    /// Frees every pending retired node whose address no slot protects.
    fn scan(&self) {
        if self.scanning.replace(true) {
            return;
        }

        let state = global();
        let mut pending = mem::take(&mut *self.retired.borrow_mut());
        {
            let mut orphans = state
                .orphans
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            pending.append(&mut orphans);
        }

        // Pairs with the SeqCst publication store in HazardGuard::publish:
        // any protection published before a node was unlinked is visible
        // here, so the node survives the scan.
        fence(Ordering::SeqCst);

        let mut hazards = Vec::new();
        let mut p = state.head.load(Ordering::Acquire);
        while !p.is_null() {
            // SAFETY: slots are never freed.
            let slot = unsafe { &*p };
            let addr = slot.protected.load(Ordering::Acquire);
            if addr != 0 {
                hazards.push(addr);
            }
            p = slot.next.load(Ordering::Acquire);
        }
        hazards.sort_unstable();

        let mut kept = Vec::new();
        for node in pending {
            if hazards.binary_search(&node.addr).is_ok() {
                kept.push(node);
            } else {
                // SAFETY: the node was unlinked before retirement and no
                // hazard protects it, so this thread owns it exclusively.
                unsafe { (node.drop_fn)(node.addr) };
            }
        }
        self.retired.borrow_mut().append(&mut kept);

        self.scanning.set(false);
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.scan();
        // Whatever is still protected by other threads outlives this one:
        // hand it to the orphan list for adoption by a later scan.
        let mut leftovers = mem::take(&mut *self.retired.borrow_mut());
        if !leftovers.is_empty() {
            let mut orphans = global()
                .orphans
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            orphans.append(&mut leftovers);
        }
        for slot in self.cache.borrow_mut().drain(..) {
            slot.active.store(0, Ordering::Release);
        }
    }
}

thread_local! {
    static HANDLE: Handle = const { Handle::new() };
}

/// Hands a node to this thread's retire batch.
///
/// During process teardown TLS may already be destroyed; the node then goes
/// straight to the orphan list so another thread can free it.
fn retire_addr<T: Send + 'static>(addr: usize) {
    unsafe fn drop_box<T>(addr: usize) {
        // SAFETY: retire_addr is only reached through Protect::reclaim,
        // whose contract requires a Box-allocated, unlinked, once-retired
        // pointee of type T.
        unsafe { drop(Box::from_raw(addr as *mut T)) };
    }
    let mut node = Some(Retired {
        addr,
        drop_fn: drop_box::<T>,
    });
    let handed_off = HANDLE
        .try_with(|handle| handle.retire(node.take().expect("retired node consumed twice")))
        .is_ok();
    if !handed_off {
        if let Some(node) = node.take() {
            let mut orphans = global()
                .orphans
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            orphans.push(node);
        }
    }
}

/// The hazard-pointer reclamation scheme.
///
/// Reads publish per-pointer protection; reclamation cost is amortized over
/// batches of retired nodes. Use this scheme whenever erased entries must
/// actually be freed while other threads keep reading.
pub struct HazardPointer;

unsafe impl Reclaimer for HazardPointer {
    type Guard<T: Send + 'static> = HazardGuard<T>;

    fn flush() {
        let _ = HANDLE.try_with(|handle| handle.scan());
    }
}

/// A hazard-pointer protection handle for one pointee of type `T`.
///
/// The slot is acquired lazily on first protection and returned to the
/// thread's cache on drop. `!Send`: the slot belongs to this thread.
pub struct HazardGuard<T> {
    slot: Option<&'static HazardSlot>,
    ptr: MarkedPtr<T>,
}

impl<T> HazardGuard<T> {
    #[inline]
    fn publish(&mut self, addr: usize) {
        let slot = match self.slot {
            Some(slot) => slot,
            None => {
                let slot = HANDLE
                    .try_with(|handle| handle.acquire_slot())
                    .unwrap_or_else(|_| global().acquire_slot());
                self.slot = Some(slot);
                slot
            }
        };
        slot.protected.store(addr, Ordering::SeqCst);
        // The publication must be globally visible before the caller's
        // revalidating load; pairs with the fence in scan().
        fence(Ordering::SeqCst);
    }

    #[inline]
    fn clear_protection(&mut self) {
        if let Some(slot) = self.slot {
            slot.protected.store(0, Ordering::Release);
        }
    }
}

impl<T> Default for HazardGuard<T> {
    fn default() -> Self {
        Self {
            slot: None,
            ptr: MarkedPtr::null(),
        }
    }
}

impl<T> Clone for HazardGuard<T> {
    fn clone(&self) -> Self {
        let mut dup = Self::default();
        if !self.ptr.is_null() {
            // The pointee is already protected by `self` on this thread, so
            // publication needs no revalidation.
            dup.publish(self.ptr.as_raw() as usize);
        }
        dup.ptr = self.ptr;
        dup
    }
}

impl<T> Drop for HazardGuard<T> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            slot.protected.store(0, Ordering::Release);
            if HANDLE
                .try_with(|handle| handle.cache.borrow_mut().push(slot))
                .is_err()
            {
                // TLS already torn down: release the slot globally.
                slot.active.store(0, Ordering::Release);
            }
        }
    }
}

unsafe impl<T: Send + 'static> Protect<T> for HazardGuard<T> {
    fn acquire(&mut self, src: &MarkedAtomic<T>, order: Ordering) -> MarkedPtr<T> {
        let mut current = src.load(order);
        loop {
            if current.is_null() {
                self.clear_protection();
                self.ptr = current;
                return current;
            }
            self.publish(current.as_raw() as usize);
            let reread = src.load(order);
            if reread == current {
                self.ptr = current;
                return current;
            }
            current = reread;
        }
    }

    fn acquire_if_equal(
        &mut self,
        src: &MarkedAtomic<T>,
        expected: MarkedPtr<T>,
        order: Ordering,
    ) -> bool {
        let current = src.load(order);
        if current != expected {
            self.clear_protection();
            self.ptr = MarkedPtr::null();
            return false;
        }
        if current.is_null() {
            self.clear_protection();
            self.ptr = current;
            return true;
        }
        self.publish(current.as_raw() as usize);
        if src.load(order) != expected {
            self.clear_protection();
            self.ptr = MarkedPtr::null();
            return false;
        }
        self.ptr = current;
        true
    }

    fn protect(&mut self, ptr: MarkedPtr<T>) {
        if ptr.is_null() {
            self.reset();
            return;
        }
        self.publish(ptr.as_raw() as usize);
        self.ptr = ptr;
    }

    #[inline]
    fn get(&self) -> MarkedPtr<T> {
        self.ptr
    }

    fn reset(&mut self) {
        self.clear_protection();
        self.ptr = MarkedPtr::null();
    }

    unsafe fn reclaim(&mut self) {
        debug_assert!(!self.ptr.is_null());
        let addr = self.ptr.as_raw() as usize;
        // Our own protection is dropped first so the node does not survive
        // the very scan its retirement triggers.
        self.reset();
        retire_addr::<T>(addr);
    }
}
