//! Critical section handling for the kernel
//!
//! Mutual exclusion comes from the interrupt controller, not from software
//! locks. Graded cores raise BASEPRI to the kernel ceiling, so interrupts
//! more urgent than the ceiling keep running; armv6m cores can only clear
//! PRIMASK. Every call site keeps the value it has to restore, which makes
//! nested lock/unlock pairs compose without a nesting counter.
//!
//! Unbalanced lock/unlock is a caller bug and is not detected here.

use core::marker::PhantomData;

use crate::port::{Arch, Cpu, PriorityCeiling};
use crate::prio;
use crate::types::LockFlags;

/// One way of entering and leaving a kernel critical section
pub trait SchedLock {
    /// Enter the section and return what `unlock` must restore
    fn lock() -> LockFlags;

    /// Leave the section entered by the matching `lock`
    ///
    /// # Safety
    /// `flags` must come from the matching `lock` call, and pairs must be
    /// released in reverse order of acquisition.
    unsafe fn unlock(flags: LockFlags);
}

/// Lock that raises the priority ceiling to the kernel level
pub struct GradedLock<A>(PhantomData<A>);

impl<A: PriorityCeiling> SchedLock for GradedLock<A> {
    #[inline(always)]
    fn lock() -> LockFlags {
        let flags = A::read_priority_ceiling() as LockFlags;
        unsafe { A::write_priority_ceiling(prio::lock_ceiling_hw()) };
        flags
    }

    #[inline(always)]
    unsafe fn unlock(flags: LockFlags) {
        unsafe { A::write_priority_ceiling(flags as u8) };
    }
}

/// Lock that uses the global interrupt enable bit only
pub struct MaskLock<A>(PhantomData<A>);

impl<A: Arch> SchedLock for MaskLock<A> {
    /// Returns the PRIMASK value (1 = interrupts were already off)
    #[inline(always)]
    fn lock() -> LockFlags {
        let flags = !A::interrupts_enabled() as LockFlags;
        A::disable_interrupts();
        flags
    }

    /// Re-enables only if interrupts were enabled before the lock
    #[inline(always)]
    unsafe fn unlock(flags: LockFlags) {
        if flags == 0 {
            unsafe { A::enable_interrupts() };
        }
    }
}

/// Lock protecting kernel data on this build's core
#[cfg(not(armv6m))]
pub type KernelLock = GradedLock<Cpu>;

/// Lock protecting kernel data on this build's core
#[cfg(armv6m)]
pub type KernelLock = MaskLock<Cpu>;

/// Full disable, used for sections that must exclude every interrupt
pub type IrqLock = MaskLock<Cpu>;

/// Enter a kernel critical section
#[inline(always)]
pub fn enter_critical_section() -> LockFlags {
    KernelLock::lock()
}

/// Leave a kernel critical section
///
/// # Safety
/// See [`SchedLock::unlock`].
#[inline(always)]
pub unsafe fn leave_critical_section(flags: LockFlags) {
    unsafe { KernelLock::unlock(flags) }
}

/// Disable every configurable interrupt, including those above the ceiling
///
/// May be taken inside a kernel critical section and vice versa, as long
/// as the two are released in reverse order.
#[inline(always)]
pub fn disable_all_interrupts() -> LockFlags {
    IrqLock::lock()
}

/// Undo [`disable_all_interrupts`]
///
/// # Safety
/// See [`SchedLock::unlock`].
#[inline(always)]
pub unsafe fn restore_all_interrupts(flags: LockFlags) {
    unsafe { IrqLock::unlock(flags) }
}

/// RAII guard for kernel critical sections
///
/// While this guard exists the kernel lock is held. Dropping it restores
/// the ceiling that was in effect when it was created.
pub struct CriticalSection {
    flags: LockFlags,
    // Must be released on the context that took it
    _not_send: PhantomData<*const ()>,
}

impl CriticalSection {
    /// Enter a kernel critical section.
    #[inline(always)]
    pub fn enter() -> Self {
        CriticalSection {
            flags: enter_critical_section(),
            _not_send: PhantomData,
        }
    }

    /// Value restored when the guard drops
    #[inline(always)]
    pub fn saved(&self) -> LockFlags {
        self.flags
    }
}

impl Drop for CriticalSection {
    #[inline(always)]
    fn drop(&mut self) {
        unsafe { leave_critical_section(self.flags) };
    }
}

/// Execute a closure inside a kernel critical section
///
/// The closure receives a reference to the critical section guard,
/// which can be used to access [`CsCell`](crate::cs_cell::CsCell) protected data.
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(&CriticalSection) -> R,
{
    let cs = CriticalSection::enter();
    f(&cs)
}

/// Check if currently executing in an ISR context
#[inline]
pub fn is_isr_context() -> bool {
    #[cfg(target_arch = "arm")]
    {
        let ipsr: u32;
        unsafe {
            core::arch::asm!(
                "mrs {}, IPSR",
                out(reg) ipsr,
                options(nomem, nostack, preserves_flags)
            );
        }
        ipsr != 0
    }

    #[cfg(not(target_arch = "arm"))]
    {
        crate::port::sim::Sim::in_exception()
    }
}
