//! ARMv7-M / ARMv8-M mainline: BASEPRI graded masking

use core::arch::naked_asm;

use cortex_m::register::{basepri, primask};

use crate::context::{TaskContext, EXC_RETURN_THREAD_PSP};
use crate::port::{Arch, PriorityCeiling};
use crate::prio::PrioScheme;

/// Cortex-M3 and up
pub struct CortexM3;

impl Arch for CortexM3 {
    /// Pushes BASEPRI and r4-r11 below the hardware frame, returns in r0
    #[unsafe(naked)]
    unsafe extern "C" fn save_context() -> *mut TaskContext {
        naked_asm!(
            "mrs r0, psp",
            "mrs r3, basepri",
            "stmdb r0!, {{r3-r11}}",
            "bx lr",
        )
    }

    /// Pops BASEPRI and r4-r11 and returns into the task
    #[unsafe(naked)]
    unsafe extern "C" fn restore_context(ctx: *mut TaskContext) {
        naked_asm!(
            "ldmia r0!, {{r3-r11}}",
            "msr psp, r0",
            "msr basepri, r3",
            "isb",
            "ldr lr, ={exc_return}",
            "bx lr",
            exc_return = const EXC_RETURN_THREAD_PSP,
        )
    }

    #[inline(always)]
    fn interrupts_enabled() -> bool {
        primask::read().is_active()
    }

    #[inline(always)]
    fn disable_interrupts() {
        cortex_m::interrupt::disable();
    }

    #[inline(always)]
    unsafe fn enable_interrupts() {
        unsafe { cortex_m::interrupt::enable() };
    }

    #[inline(always)]
    fn pend_switch() {
        super::pend_pendsv();
    }

    fn priority_bits() -> u8 {
        super::probe_priority_bits()
    }

    unsafe fn set_kernel_priorities(scheme: &PrioScheme) {
        unsafe { super::program_kernel_priorities(scheme) };
    }

    #[inline]
    fn idle() {
        cortex_m::asm::wfi();
    }
}

impl PriorityCeiling for CortexM3 {
    #[inline(always)]
    fn read_priority_ceiling() -> u8 {
        basepri::read()
    }

    #[inline(always)]
    unsafe fn write_priority_ceiling(ceiling: u8) {
        unsafe { basepri::write(ceiling) };
        cortex_m::asm::isb();
    }
}

/// PendSV exception handler - performs the deferred context switch
///
/// 1. Save the outgoing context (skipped while PSP is 0, before the first task)
/// 2. Let the switch engine pick the incoming stack pointer
/// 3. Tail-branch into restore, which performs the exception return
#[no_mangle]
#[unsafe(naked)]
pub unsafe extern "C" fn PendSV() {
    naked_asm!(
        "push {{r3, lr}}",
        "mrs r0, psp",
        "cbz r0, 1f",
        "bl {save}",
        "1:",
        "bl {switch}",
        "pop {{r3, lr}}",
        "cbz r0, 2f",
        "b {restore}",
        "2:",
        "bx lr",
        save = sym <CortexM3 as Arch>::save_context,
        switch = sym crate::switch::os_switch_context,
        restore = sym <CortexM3 as Arch>::restore_context,
    );
}
