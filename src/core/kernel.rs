//! Port initialization and start-up
//!
//! `os_init` derives the exception priority scheme from the hardware and
//! programs it; `os_start` hands the core to the first task through the
//! same PendSV path every later switch uses.

use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::critical::critical_section;
use crate::error::{OsError, OsResult};
use crate::port::{Arch, Cpu};
use crate::prio::{self, PrioScheme};
use crate::switch::CONTEXT;
use crate::task::OsTcb;

// ============ Kernel State ============

/// Atomic port flags
pub struct KernelFlags {
    initialized: AtomicBool,
    running: AtomicBool,
}

impl KernelFlags {
    const fn new() -> Self {
        Self {
            initialized: AtomicBool::new(false),
            running: AtomicBool::new(false),
        }
    }

    /// Check if the OS is running
    #[inline(always)]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Check if the port is initialized
    #[inline(always)]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    #[inline(always)]
    pub(crate) fn set_initialized(&self, val: bool) {
        self.initialized.store(val, Ordering::SeqCst);
    }

    #[inline(always)]
    pub(crate) fn set_running(&self, val: bool) {
        self.running.store(val, Ordering::SeqCst);
    }
}

/// Global port state instance
pub static KERNEL: KernelFlags = KernelFlags::new();

// ============ Public API ============

/// Initialize the port
///
/// Reads the implemented priority width, derives the kernel exception
/// priorities and programs SVCall, SysTick and PendSV. On hard-float builds
/// it also turns off FP state stacking, since task contexts hold integer
/// registers only. Call once before any task is started.
///
/// # Returns
/// * `Ok(scheme)` - The installed priority scheme
/// * `Err(OsError::OsRunning)` - OS is already running
/// * `Err(OsError::PrioBitsInvalid)` - Too few priority bits for the scheme
pub fn os_init() -> OsResult<PrioScheme> {
    if KERNEL.is_running() {
        return Err(OsError::OsRunning);
    }

    let bits = Cpu::priority_bits();
    let scheme = PrioScheme::try_new(bits).inspect_err(|_| {
        crate::error!("unsupported NVIC priority width: {} bits", bits);
    })?;

    prio::install(scheme);
    unsafe { Cpu::set_kernel_priorities(&scheme) };

    #[cfg(all(target_arch = "arm", fpu))]
    crate::port::cortex_m::disable_fp_stacking();

    KERNEL.set_initialized(true);

    crate::info!(
        "port init: {} prio bits, svcall={} systick={} pendsv={}",
        bits,
        scheme.svcall(),
        scheme.systick(),
        scheme.pendsv()
    );

    Ok(scheme)
}

/// Start multitasking with `first`
///
/// On silicon this function does not return: the pended PendSV switches to
/// `first` as soon as interrupts open.
///
/// # Returns
/// * `Err(OsError::OsNotInit)` - `os_init` has not run
/// * `Err(OsError::OsRunning)` - OS is already running
pub fn os_start(first: NonNull<OsTcb>) -> OsResult<()> {
    if !KERNEL.is_initialized() {
        return Err(OsError::OsNotInit);
    }

    if KERNEL.is_running() {
        return Err(OsError::OsRunning);
    }

    critical_section(|cs| CONTEXT.get(cs).request_switch(first, cs));
    KERNEL.set_running(true);

    crate::info!("starting first task");

    #[cfg(target_arch = "arm")]
    {
        // PSP 0 tells PendSV there is no outgoing context
        unsafe { cortex_m::register::psp::write(0) };
        unsafe { Cpu::enable_interrupts() };
        loop {
            Cpu::idle();
        }
    }

    #[cfg(not(target_arch = "arm"))]
    Ok(())
}

/// Hook for the kernel's idle condition
#[inline]
pub fn os_idle_hook() {
    Cpu::idle();
}
