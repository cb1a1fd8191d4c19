//! Critical section protected cell
//!
//! Kernel state shared between thread code and PendSV lives in a `CsCell`;
//! the only safe accessor demands a live [`CriticalSection`] guard.

use core::cell::UnsafeCell;
use crate::critical::CriticalSection;

/// A cell that can only be accessed within a kernel critical section.
pub struct CsCell<T>(UnsafeCell<T>);

// Single core: holding the kernel lock excludes every other accessor.
unsafe impl<T> Sync for CsCell<T> {}

impl<T> CsCell<T> {
    #[inline(always)]
    pub const fn new(value: T) -> Self {
        Self(UnsafeCell::new(value))
    }

    /// Borrow the inner value for the lifetime of the guard
    #[inline(always)]
    #[allow(clippy::mut_from_ref)]
    pub fn get<'cs>(&'cs self, _cs: &'cs CriticalSection) -> &'cs mut T {
        unsafe { &mut *self.0.get() }
    }
}
