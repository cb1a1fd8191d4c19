//! Port layer - CPU-specific implementations
//!
//! Each supported core variant implements [`Arch`]; cores with a graded
//! priority mask additionally implement [`PriorityCeiling`]. The variant is
//! picked at build time through [`Cpu`], never by a runtime flag.

use crate::context::TaskContext;
use crate::prio::PrioScheme;

/// Operations the kernel needs from the core it runs on
pub trait Arch {
    /// Push the software-saved register group of the interrupted task below
    /// the hardware frame on the process stack.
    ///
    /// Returns the address of the complete [`TaskContext`].
    ///
    /// # Safety
    /// Only valid inside the deferred-switch exception, with the process
    /// stack pointer addressing a valid hardware frame.
    unsafe extern "C" fn save_context() -> *mut TaskContext;

    /// Load the context at `ctx` into the core and return from the exception
    /// into it. On silicon this never comes back to the caller.
    ///
    /// # Safety
    /// `ctx` must point at a context produced by [`Arch::save_context`] or
    /// by task stack initialization, and must be reached by a tail branch
    /// from the deferred-switch exception.
    unsafe extern "C" fn restore_context(ctx: *mut TaskContext);

    /// Global interrupt enable bit (PRIMASK clear)
    fn interrupts_enabled() -> bool;

    /// Mask every configurable-priority exception
    fn disable_interrupts();

    /// Clear the global interrupt mask
    ///
    /// # Safety
    /// Must not be used inside a section that relies on interrupts staying off.
    unsafe fn enable_interrupts();

    /// Pend the deferred-switch exception
    fn pend_switch();

    /// Number of priority bits implemented by the interrupt controller
    fn priority_bits() -> u8;

    /// Program SVCall, SysTick and PendSV priorities from `scheme`
    ///
    /// # Safety
    /// Changing exception priorities while the kernel runs breaks its
    /// locking assumptions.
    unsafe fn set_kernel_priorities(scheme: &PrioScheme);

    /// Park the core until the next interrupt
    fn idle();
}

/// Cores that can mask interrupts below a priority threshold
pub trait PriorityCeiling: Arch {
    /// Current priority ceiling register (BASEPRI), hardware encoding
    fn read_priority_ceiling() -> u8;

    /// Replace the priority ceiling; 0 disables masking
    ///
    /// # Safety
    /// Lowering the ceiling can end a critical section held by the caller.
    unsafe fn write_priority_ceiling(ceiling: u8);
}

#[cfg(target_arch = "arm")]
pub mod cortex_m;

#[cfg(all(target_arch = "arm", armv6m))]
pub use cortex_m::CortexM0 as Cpu;

#[cfg(all(target_arch = "arm", not(armv6m)))]
pub use cortex_m::CortexM3 as Cpu;

// Simulated core for non-ARM targets (for testing)
#[cfg(not(target_arch = "arm"))]
pub mod sim;

#[cfg(not(target_arch = "arm"))]
pub use sim::Sim as Cpu;
