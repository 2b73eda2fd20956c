//! Backoff strategies for contended compare-exchange loops.
//!
//! Lock-free operations invoke backoff exactly when a CAS fails, never on
//! successful progress. Which strategy wins depends on the workload: under
//! light contention [`NoBackoff`] avoids any latency, under heavy contention
//! [`ExponentialBackoff`] takes pressure off the contended cache line.

use crossbeam_utils::Backoff as CrossbeamBackoff;

/// A contention backoff strategy.
pub trait Backoff: Default {
    /// Called after a failed CAS.
    fn backoff(&mut self);
}

/// No backoff at all: retry immediately. The default.
#[derive(Default)]
pub struct NoBackoff;

impl Backoff for NoBackoff {
    #[inline]
    fn backoff(&mut self) {}
}

/// Exponential spinning that eventually yields to the scheduler.
pub struct ExponentialBackoff {
    inner: CrossbeamBackoff,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            inner: CrossbeamBackoff::new(),
        }
    }
}

impl Backoff for ExponentialBackoff {
    #[inline]
    fn backoff(&mut self) {
        self.inner.snooze();
    }
}
