//! The reclamation interface consumed by lock-free data structures.
//!
//! A structure that unlinks nodes while readers traverse them cannot free
//! those nodes immediately: a reader may have loaded the pointer just before
//! the unlink. The structure therefore works against two traits:
//!
//! - [`Reclaimer`] names a reclamation scheme and supplies its guard type.
//! - [`Protect`] is a per-thread handle that pins one pointee at a time,
//!   deferring its reclamation for as long as the handle holds it.
//!
//! Data structures stay fully generic over the scheme: the same map code
//! runs under [`HazardPointer`](crate::HazardPointer) in production and
//! [`Leaking`](crate::Leaking) in tests.

use crate::atomic::MarkedAtomic;
use crate::marked::MarkedPtr;
use core::sync::atomic::Ordering;

/// A safe memory reclamation scheme.
///
/// # Safety
///
/// Implementations must guarantee that a pointee protected by one of the
/// scheme's guards is not freed until every guard protecting it has been
/// reset or dropped, given that [`Protect::reclaim`] is only ever called on
/// fully unlinked nodes.
pub unsafe trait Reclaimer: Sized + 'static {
    /// The protection handle type for pointees of type `T`.
    type Guard<T: Send + 'static>: Protect<T>;

    /// Eagerly processes nodes retired by the calling thread, freeing any
    /// that are no longer protected. A no-op for schemes that reclaim
    /// nothing or reclaim inline.
    fn flush() {}
}

/// A per-thread handle protecting at most one pointee from reclamation.
///
/// An empty handle is created with `Default`; `Clone` duplicates the
/// protection on the same thread. Handles are not meant to cross threads;
/// concrete guard types are `!Send`.
///
/// # Safety
///
/// Implementations must uphold the protection contract of [`Reclaimer`]:
/// after a successful [`acquire`](Protect::acquire) or
/// [`acquire_if_equal`](Protect::acquire_if_equal), the pointee stays alive
/// until the handle stops protecting it.
pub unsafe trait Protect<T>: Clone + Default {
    /// Loads from `src` and protects the loaded pointee, revalidating
    /// internally until the published protection covers the pointer that is
    /// actually in `src`. Returns the protected value.
    fn acquire(&mut self, src: &MarkedAtomic<T>, order: Ordering) -> MarkedPtr<T>;

    /// Protects the pointee of `src` only if `src` still contains
    /// `expected` (including the mark). On success the handle protects
    /// `expected` and `true` is returned; on failure the handle is left
    /// empty and `false` is returned.
    ///
    /// This is what linked-list kernels need: protection for the *specific*
    /// pointer they already observed in the predecessor, not whatever the
    /// slot holds by now.
    fn acquire_if_equal(
        &mut self,
        src: &MarkedAtomic<T>,
        expected: MarkedPtr<T>,
        order: Ordering,
    ) -> bool;

    /// Publishes protection for a pointer the caller knows to be alive:
    /// a freshly allocated, not-yet-published node, or a node transitively
    /// pinned by another handle on this thread. No revalidation is
    /// performed; dereferencing remains gated on the caller's reasoning.
    fn protect(&mut self, ptr: MarkedPtr<T>);

    /// The currently protected pointer (null if the handle is empty).
    fn get(&self) -> MarkedPtr<T>;

    /// Drops protection, leaving the handle empty.
    fn reset(&mut self);

    /// Retires the currently protected pointee and leaves the handle empty.
    /// The scheme frees it once no other handle protects it.
    ///
    /// # Safety
    ///
    /// The pointee must be fully unlinked: no thread may be able to acquire
    /// a *new* reference to it. It must have been allocated via `Box` and
    /// must not be retired more than once.
    unsafe fn reclaim(&mut self);
}
