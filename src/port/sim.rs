//! Simulated Cortex-M core for non-ARM hosts
//!
//! Models the registers the port touches (r0-r12, lr, pc, xPSR, BASEPRI,
//! PRIMASK, PSP), the PendSV pending bit and the three kernel system handler
//! priorities. Context save/restore operate on real task stack memory with
//! the same layout the assembly uses, and exception entry/return push and
//! pop the hardware frame, so switch logic can be exercised on the host.
//!
//! State is per thread: every test gets its own core.

use core::cell::RefCell;
use std::thread_local;

use crate::config::CFG_NVIC_PRIO_BITS;
use crate::context::{TaskContext, HW_FRAME_WORDS, SW_FRAME_WORDS};
use crate::prio::PrioScheme;
use crate::switch::{os_switch_context, ContextManager};
use crate::types::OsStkElement;

use super::{Arch, PriorityCeiling};

/// Index of each kernel handler in the simulated priority registers
const SVCALL: usize = 0;
const SYSTICK: usize = 1;
const PENDSV: usize = 2;

/// Core registers visible to a task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Registers {
    /// r0-r12
    pub r: [u32; 13],
    pub lr: u32,
    pub pc: u32,
    pub xpsr: u32,
}

impl Registers {
    /// Every register set to `value`
    pub fn splat(value: u32) -> Self {
        Registers {
            r: [value; 13],
            lr: value,
            pc: value,
            xpsr: value,
        }
    }
}

struct Core {
    regs: Registers,
    basepri: u8,
    primask: bool,
    psp: *mut OsStkElement,
    pendsv: bool,
    handler: bool,
    prio_bits: u8,
    shpr: [u8; 3],
}

impl Core {
    const fn new(prio_bits: u8) -> Self {
        Core {
            regs: Registers {
                r: [0; 13],
                lr: 0,
                pc: 0,
                xpsr: 0,
            },
            basepri: 0,
            primask: false,
            psp: core::ptr::null_mut(),
            pendsv: false,
            handler: false,
            prio_bits,
            shpr: [0; 3],
        }
    }

    /// Bits of a priority register that are actually implemented
    fn prio_mask(&self) -> u8 {
        (0xFF00u16 >> self.prio_bits) as u8
    }

    /// Whether an exception at encoded priority `hw` may be taken now
    fn can_take(&self, hw: u8) -> bool {
        !self.primask && (self.basepri == 0 || hw < self.basepri)
    }

    /// Stack the basic frame on the process stack
    unsafe fn exception_entry(&mut self) {
        if self.psp.is_null() {
            return;
        }
        let r = &self.regs;
        let frame = [r.r[0], r.r[1], r.r[2], r.r[3], r.r[12], r.lr, r.pc, r.xpsr];
        unsafe {
            self.psp = self.psp.sub(HW_FRAME_WORDS);
            for (i, word) in frame.iter().enumerate() {
                self.psp.add(i).write(*word);
            }
        }
    }

    /// Unstack the basic frame from the process stack
    unsafe fn exception_return(&mut self) {
        if self.psp.is_null() {
            return;
        }
        let mut frame = [0u32; HW_FRAME_WORDS];
        for (i, word) in frame.iter_mut().enumerate() {
            *word = unsafe { self.psp.add(i).read() };
        }
        let r = &mut self.regs;
        r.r[0] = frame[0];
        r.r[1] = frame[1];
        r.r[2] = frame[2];
        r.r[3] = frame[3];
        r.r[12] = frame[4];
        r.lr = frame[5];
        r.pc = frame[6];
        r.xpsr = frame[7];
        self.psp = unsafe { self.psp.add(HW_FRAME_WORDS) };
    }
}

thread_local! {
    static CORE: RefCell<Core> = const { RefCell::new(Core::new(CFG_NVIC_PRIO_BITS)) };
}

fn with_core<R>(f: impl FnOnce(&mut Core) -> R) -> R {
    CORE.with(|core| f(&mut core.borrow_mut()))
}

/// Host stand-in for a graded-priority Cortex-M core
pub struct Sim;

impl Sim {
    /// Power-on state with `prio_bits` implemented priority bits
    pub fn reset(prio_bits: u8) {
        with_core(|c| *c = Core::new(prio_bits));
    }

    pub fn registers() -> Registers {
        with_core(|c| c.regs)
    }

    /// Load registers, as if the running task had computed them
    pub fn set_registers(regs: Registers) {
        with_core(|c| c.regs = regs);
    }

    pub fn basepri() -> u8 {
        with_core(|c| c.basepri)
    }

    /// PRIMASK; true means interrupts are masked
    pub fn primask() -> bool {
        with_core(|c| c.primask)
    }

    pub fn psp() -> *mut OsStkElement {
        with_core(|c| c.psp)
    }

    pub fn pendsv_pending() -> bool {
        with_core(|c| c.pendsv)
    }

    /// Encoded (SVCall, SysTick, PendSV) priorities
    pub fn exception_priorities() -> (u8, u8, u8) {
        with_core(|c| (c.shpr[SVCALL], c.shpr[SYSTICK], c.shpr[PENDSV]))
    }

    pub fn in_exception() -> bool {
        with_core(|c| c.handler)
    }

    /// Whether an interrupt at encoded priority `hw` would preempt now
    pub fn can_preempt(hw: u8) -> bool {
        with_core(|c| c.can_take(hw & c.prio_mask()))
    }

    /// Run `f` as an interrupt handler
    pub fn run_handler<R>(f: impl FnOnce() -> R) -> R {
        let outer = with_core(|c| core::mem::replace(&mut c.handler, true));
        let r = f();
        with_core(|c| c.handler = outer);
        r
    }

    /// Take PendSV if it is pending and not masked, switching through `mgr`
    ///
    /// Returns whether the exception ran.
    ///
    /// # Safety
    /// Every TCB known to `mgr` must be alive and its stack intact.
    pub unsafe fn pendsv(mgr: &mut ContextManager<Sim>) -> bool {
        unsafe { Self::take_pendsv(|saved| mgr.switch(saved)) }
    }

    /// Take PendSV the way the silicon handler does: the switch step runs
    /// on the global [`CONTEXT`](crate::switch::CONTEXT) under the kernel lock
    ///
    /// # Safety
    /// Every TCB known to [`CONTEXT`](crate::switch::CONTEXT) must be alive and its stack intact.
    pub unsafe fn run_pendsv() -> bool {
        unsafe { Self::take_pendsv(|saved| os_switch_context(saved)) }
    }

    /// Exception entry, save, `switch`, restore or plain exception return
    unsafe fn take_pendsv(
        switch: impl FnOnce(*mut TaskContext) -> *mut TaskContext,
    ) -> bool {
        let taken = with_core(|c| {
            if !c.pendsv || !c.can_take(c.shpr[PENDSV]) {
                return false;
            }
            c.pendsv = false;
            c.handler = true;
            unsafe { c.exception_entry() };
            true
        });
        if !taken {
            return false;
        }

        let saved = if Self::psp().is_null() {
            core::ptr::null_mut()
        } else {
            unsafe { Self::save_context() }
        };
        let next = switch(saved);
        if next.is_null() {
            with_core(|c| unsafe { c.exception_return() });
        } else {
            unsafe { Self::restore_context(next) };
        }

        with_core(|c| c.handler = false);
        true
    }
}

impl Arch for Sim {
    unsafe extern "C" fn save_context() -> *mut TaskContext {
        with_core(|c| unsafe {
            let sp = c.psp.sub(SW_FRAME_WORDS);
            sp.write(c.basepri as u32);
            for i in 0..8 {
                sp.add(1 + i).write(c.regs.r[4 + i]);
            }
            sp as *mut TaskContext
        })
    }

    unsafe extern "C" fn restore_context(ctx: *mut TaskContext) {
        with_core(|c| unsafe {
            let sp = ctx as *mut OsStkElement;
            c.basepri = sp.read() as u8 & c.prio_mask();
            for i in 0..8 {
                c.regs.r[4 + i] = sp.add(1 + i).read();
            }
            c.psp = TaskContext::hw_frame_ptr(ctx);
            c.exception_return();
        })
    }

    fn interrupts_enabled() -> bool {
        with_core(|c| !c.primask)
    }

    fn disable_interrupts() {
        with_core(|c| c.primask = true);
    }

    unsafe fn enable_interrupts() {
        with_core(|c| c.primask = false);
    }

    fn pend_switch() {
        with_core(|c| c.pendsv = true);
    }

    fn priority_bits() -> u8 {
        with_core(|c| c.prio_bits)
    }

    unsafe fn set_kernel_priorities(scheme: &PrioScheme) {
        with_core(|c| {
            let mask = c.prio_mask();
            c.shpr[SVCALL] = scheme.to_hw(scheme.svcall()) & mask;
            c.shpr[SYSTICK] = scheme.to_hw(scheme.systick()) & mask;
            c.shpr[PENDSV] = scheme.to_hw(scheme.pendsv()) & mask;
        });
    }

    fn idle() {
        core::hint::spin_loop();
    }
}

impl PriorityCeiling for Sim {
    fn read_priority_ceiling() -> u8 {
        with_core(|c| c.basepri)
    }

    unsafe fn write_priority_ceiling(ceiling: u8) {
        with_core(|c| c.basepri = ceiling & c.prio_mask());
    }
}
