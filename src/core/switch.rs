//! Context switch engine
//!
//! The scheduler decides *which* task runs next and hands it over with
//! [`ContextManager::request_switch`]; the switch itself is deferred to
//! PendSV, which runs at the lowest priority so all pending interrupt work
//! finishes first and a burst of interrupts costs one switch.
//!
//! Inside PendSV each port does: save the outgoing context, call
//! [`ContextManager::switch`], tail-branch into restore.

use core::marker::PhantomData;
use core::ptr::NonNull;

use crate::config::CFG_STACK_CHECK;
use crate::context::TaskContext;
use crate::critical::{critical_section, CriticalSection};
use crate::cs_cell::CsCell;
use crate::fatal::port_assert;
use crate::port::{Arch, Cpu};
use crate::task::OsTcb;
use crate::types::{OsTaskState, StackCheck};

/// Current-task bookkeeping for the switch engine
///
/// Initialized once at kernel start, mutated only under the kernel lock,
/// read by PendSV.
pub struct ContextManager<A> {
    current: Option<NonNull<OsTcb>>,
    next: Option<NonNull<OsTcb>>,
    stack_check: StackCheck,
    _arch: PhantomData<A>,
}

impl<A: Arch> ContextManager<A> {
    pub const fn new() -> Self {
        Self::with_stack_check(CFG_STACK_CHECK)
    }

    pub const fn with_stack_check(stack_check: StackCheck) -> Self {
        ContextManager {
            current: None,
            next: None,
            stack_check,
            _arch: PhantomData,
        }
    }

    /// Task that owns the core
    #[inline]
    pub fn current(&self) -> Option<NonNull<OsTcb>> {
        self.current
    }

    /// Task waiting for the pending switch, if any
    #[inline]
    pub fn next(&self) -> Option<NonNull<OsTcb>> {
        self.next
    }

    #[inline]
    pub fn stack_check(&self) -> StackCheck {
        self.stack_check
    }

    /// Record `next` as the task to run and pend the deferred switch
    ///
    /// A later request before PendSV runs replaces the earlier one.
    pub fn request_switch(&mut self, next: NonNull<OsTcb>, _cs: &CriticalSection) {
        self.next = Some(next);
        crate::trace!("switch requested");
        A::pend_switch();
    }

    /// Body of the deferred-switch exception
    ///
    /// Stores `saved` as the outgoing task's stack pointer and returns the
    /// context to restore. `saved` is null when no task was running yet.
    /// Without a recorded target the current task is resumed; null is
    /// returned only when there is nothing to run at all.
    ///
    /// A trampled stack sentinel is fatal and does not return.
    ///
    /// # Safety
    /// Must run inside the deferred-switch exception with the kernel lock
    /// held; every TCB reachable from `self` must be alive.
    pub unsafe fn switch(&mut self, saved: *mut TaskContext) -> *mut TaskContext {
        if let Some(cur) = self.current {
            let tcb = unsafe { &mut *cur.as_ptr() };
            self.check_outgoing(tcb, saved);
            if !saved.is_null() {
                tcb.stk_ptr = saved;
            }
            tcb.state = OsTaskState::Suspended;
        }

        if let Some(next) = self.next.take() {
            self.current = Some(next);
        }

        match self.current {
            Some(cur) => {
                let tcb = unsafe { &mut *cur.as_ptr() };
                self.check_incoming(tcb);
                tcb.state = OsTaskState::Running;
                tcb.stk_ptr
            }
            None => core::ptr::null_mut(),
        }
    }

    fn check_outgoing(&self, tcb: &OsTcb, saved: *mut TaskContext) {
        if self.stack_check == StackCheck::Off {
            return;
        }
        let Some(stack) = tcb.stack() else { return };
        if stack.check().is_err() {
            port_assert("TStk");
        }
        if self.stack_check == StackCheck::Strict && !saved.is_null() && !stack.contains(saved) {
            port_assert("TStk");
        }
    }

    fn check_incoming(&self, tcb: &OsTcb) {
        if self.stack_check != StackCheck::Strict {
            return;
        }
        let Some(stack) = tcb.stack() else { return };
        if stack.check().is_err() || !stack.contains(tcb.stk_ptr) {
            port_assert("TStk");
        }
    }
}

impl<A: Arch> Default for ContextManager<A> {
    fn default() -> Self {
        Self::new()
    }
}

// ============ Global instance ============

/// Context manager driven by this build's PendSV handler
pub static CONTEXT: CsCell<ContextManager<Cpu>> = CsCell::new(ContextManager::new());

/// Switch step of the PendSV handler, run between save and restore
///
/// Takes the outgoing stack pointer (null before the first task) and
/// returns the context to restore, or null to resume without a switch.
///
/// # Safety
/// Only the deferred-switch exception may call this.
pub unsafe extern "C" fn os_switch_context(saved: *mut TaskContext) -> *mut TaskContext {
    critical_section(|cs| unsafe { CONTEXT.get(cs).switch(saved) })
}

/// Ask for a switch to `next` at the next PendSV
pub fn os_ctx_sw(next: NonNull<OsTcb>) {
    critical_section(|cs| CONTEXT.get(cs).request_switch(next, cs));
}

/// Task currently owning the core
pub fn os_current_task() -> Option<NonNull<OsTcb>> {
    critical_section(|cs| CONTEXT.get(cs).current())
}
