//! Shroud: safe memory reclamation primitives for lock-free data structures.
//!
//! Lock-free structures unlink nodes while other threads may still be
//! reading them; freeing those nodes needs coordination. Shroud provides
//! the pieces a structure needs to stay generic over *how* that
//! coordination happens:
//!
//! - [`MarkedPtr`] / [`MarkedAtomic`]: pointers carrying a one-bit deletion
//!   mark in the low address bit, CAS-able as a single word.
//! - [`Reclaimer`] / [`Protect`]: the reclamation interface: per-thread
//!   handles that pin one pointee each and retire unlinked nodes.
//! - [`HazardPointer`]: a hazard-pointer implementation of the interface.
//! - [`Leaking`]: a no-op implementation for tests and throwaway processes.
//! - [`Backoff`] strategies for contended CAS loops.
//!
//! # Example
//!
//! ```rust
//! use std::sync::atomic::Ordering;
//! use shroud::{HazardGuard, MarkedAtomic, MarkedPtr, Protect};
//!
//! let slot = MarkedAtomic::new(MarkedPtr::new(Box::into_raw(Box::new(42))));
//!
//! // Protect the pointee before dereferencing it.
//! let mut guard = HazardGuard::<i32>::default();
//! let ptr = guard.acquire(&slot, Ordering::Acquire);
//! assert_eq!(unsafe { *ptr.deref() }, 42);
//!
//! // Unlink, then retire through the guard.
//! slot.store(MarkedPtr::null(), Ordering::Release);
//! unsafe { guard.reclaim() };
//! ```

#![warn(missing_docs)]

mod atomic;
mod backoff;
mod hazard;
mod leak;
mod marked;
mod reclaim;

pub use atomic::MarkedAtomic;
pub use backoff::{Backoff, ExponentialBackoff, NoBackoff};
pub use hazard::{HazardGuard, HazardPointer};
pub use leak::{LeakGuard, Leaking};
pub use marked::MarkedPtr;
pub use reclaim::{Protect, Reclaimer};

// Re-export for convenience
pub use core::sync::atomic::Ordering;
