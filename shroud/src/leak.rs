//! A reclamation scheme that never reclaims.
//!
//! [`Leaking`] satisfies the full [`Reclaimer`]/[`Protect`] contract by
//! letting retired nodes leak. Protection is trivially upheld (nothing is
//! ever freed), which makes it useful for tests, for single-shot tools
//! where the OS reclaims memory at exit, and as the simplest possible
//! reference implementation of the interface.

use crate::atomic::MarkedAtomic;
use crate::marked::MarkedPtr;
use crate::reclaim::{Protect, Reclaimer};
use core::sync::atomic::Ordering;

/// The leaking reclamation scheme: `reclaim` is a no-op.
pub struct Leaking;

unsafe impl Reclaimer for Leaking {
    type Guard<T: Send + 'static> = LeakGuard<T>;
}

/// Protection handle of [`Leaking`]. Just remembers the pointer.
pub struct LeakGuard<T> {
    ptr: MarkedPtr<T>,
}

impl<T> Default for LeakGuard<T> {
    fn default() -> Self {
        Self {
            ptr: MarkedPtr::null(),
        }
    }
}

impl<T> Clone for LeakGuard<T> {
    fn clone(&self) -> Self {
        Self { ptr: self.ptr }
    }
}

unsafe impl<T: Send + 'static> Protect<T> for LeakGuard<T> {
    fn acquire(&mut self, src: &MarkedAtomic<T>, order: Ordering) -> MarkedPtr<T> {
        self.ptr = src.load(order);
        self.ptr
    }

    fn acquire_if_equal(
        &mut self,
        src: &MarkedAtomic<T>,
        expected: MarkedPtr<T>,
        order: Ordering,
    ) -> bool {
        let current = src.load(order);
        if current != expected {
            self.ptr = MarkedPtr::null();
            return false;
        }
        self.ptr = current;
        true
    }

    fn protect(&mut self, ptr: MarkedPtr<T>) {
        self.ptr = ptr;
    }

    #[inline]
    fn get(&self) -> MarkedPtr<T> {
        self.ptr
    }

    fn reset(&mut self) {
        self.ptr = MarkedPtr::null();
    }

    unsafe fn reclaim(&mut self) {
        // The node is unlinked and will never be freed. That is the deal.
        self.ptr = MarkedPtr::null();
    }
}
