//! Cortex-M port implementation
//!
//! Context switching via the PendSV exception. Common pieces (SCB priority
//! programming, priority-width probing, SysTick) live here; the register
//! save/restore sequences differ per architecture profile:
//!
//! - `v7m`: Cortex-M3/M4/M7/M33, BASEPRI based kernel lock
//! - `v6m`: Cortex-M0/M0+, PRIMASK only

use cortex_m::peripheral::scb::SystemHandler;
use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::SCB;

use crate::prio::PrioScheme;

#[cfg(not(armv6m))]
mod v7m;
#[cfg(not(armv6m))]
pub use v7m::CortexM3;

#[cfg(armv6m)]
mod v6m;
#[cfg(armv6m)]
pub use v6m::CortexM0;

/// Initialize SysTick timer for system tick generation
///
/// # Arguments
/// * `cnts` - Core clock cycles per tick
///
/// # Example
/// For 16MHz clock with 1000Hz tick rate: cnts = 16_000_000 / 1000 = 16_000
pub fn systick_init(cnts: u32) {
    let mut p = unsafe { cortex_m::Peripherals::steal() };

    p.SYST.set_reload(cnts - 1);
    p.SYST.clear_current();
    p.SYST.set_clock_source(SystClkSource::Core);
    p.SYST.enable_interrupt();
    p.SYST.enable_counter();
}

/// Count the priority bits the NVIC implements
///
/// Unimplemented low bits of a priority register read as zero, so writing
/// 0xFF and counting the ones that stick gives the width.
pub(crate) fn probe_priority_bits() -> u8 {
    let mut scb = unsafe { cortex_m::Peripherals::steal() }.SCB;

    let old = SCB::get_priority(SystemHandler::PendSV);
    unsafe { scb.set_priority(SystemHandler::PendSV, 0xFF) };
    let probed = SCB::get_priority(SystemHandler::PendSV);
    unsafe { scb.set_priority(SystemHandler::PendSV, old) };

    probed.leading_ones() as u8
}

/// Program the three kernel exceptions
pub(crate) unsafe fn program_kernel_priorities(scheme: &PrioScheme) {
    let mut scb = unsafe { cortex_m::Peripherals::steal() }.SCB;

    unsafe {
        scb.set_priority(SystemHandler::SVCall, scheme.to_hw(scheme.svcall()));
        scb.set_priority(SystemHandler::SysTick, scheme.to_hw(scheme.systick()));
        scb.set_priority(SystemHandler::PendSV, scheme.to_hw(scheme.pendsv()));
    }
}

/// Stop the core from stacking extended FP frames
///
/// Tasks then share s0-s31 and FPSCR unprotected: on hard-float builds at
/// most one task may use floating point.
#[cfg(fpu)]
pub(crate) fn disable_fp_stacking() {
    let fpu = unsafe { cortex_m::Peripherals::steal() }.FPU;

    let fpccr = fpu.fpccr.read();
    unsafe { fpu.fpccr.write(crate::context::fpccr_basic_frames(fpccr)) };
    cortex_m::asm::dsb();
    cortex_m::asm::isb();
}

#[inline(always)]
pub(crate) fn pend_pendsv() {
    SCB::set_pendsv();
}
