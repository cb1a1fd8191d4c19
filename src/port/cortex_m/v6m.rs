//! ARMv6-M: PRIMASK only
//!
//! Thumb-1 can only store/load r0-r7 in bulk, so r8-r11 are shuffled
//! through r4-r7. The mask slot of the context holds PRIMASK.

use core::arch::naked_asm;

use cortex_m::register::primask;

use crate::context::{TaskContext, EXC_RETURN_THREAD_PSP};
use crate::port::Arch;
use crate::prio::PrioScheme;

/// Cortex-M0 / M0+
pub struct CortexM0;

impl Arch for CortexM0 {
    #[unsafe(naked)]
    unsafe extern "C" fn save_context() -> *mut TaskContext {
        naked_asm!(
            "mrs r0, psp",
            "subs r0, #36",
            "mov r1, r0",
            "mrs r3, primask",
            "stmia r1!, {{r3-r7}}",
            "mov r4, r8",
            "mov r5, r9",
            "mov r6, r10",
            "mov r7, r11",
            "stmia r1!, {{r4-r7}}",
            "bx lr",
        )
    }

    #[unsafe(naked)]
    unsafe extern "C" fn restore_context(ctx: *mut TaskContext) {
        naked_asm!(
            "mov r1, r0",
            "adds r1, #20",
            "ldmia r1!, {{r4-r7}}",
            "mov r8, r4",
            "mov r9, r5",
            "mov r10, r6",
            "mov r11, r7",
            "ldmia r0!, {{r3-r7}}",
            "msr psp, r1",
            "msr primask, r3",
            "ldr r0, ={exc_return}",
            "bx r0",
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

/// PendSV exception handler - performs the deferred context switch
#[no_mangle]
#[unsafe(naked)]
pub unsafe extern "C" fn PendSV() {
    naked_asm!(
        "push {{r2, lr}}",
        "mrs r0, psp",
        "cmp r0, #0",
        "beq 1f",
        "bl {save}",
        "1:",
        "bl {switch}",
        "pop {{r2, r3}}",
        "mov lr, r3",
        "cmp r0, #0",
        "beq 2f",
        "ldr r1, ={restore}",
        "bx r1",
        "2:",
        "bx lr",
        save = sym <CortexM0 as Arch>::save_context,
        switch = sym crate::switch::os_switch_context,
        restore = sym <CortexM0 as Arch>::restore_context,
    );
}
