//! Unit tests for the port layer
//!
//! These tests run on the host against the simulated core, which keeps
//! its registers per test thread and stores contexts in real stack memory.

#[cfg(test)]
mod common {
    use picoport::port::sim::Sim;
    use picoport::port::Arch;
    use picoport::prio::PrioScheme;
    use picoport::task::{OsTaskFn, OsTcb, TaskStack};

    /// Reset the simulated core and program the kernel exceptions
    pub fn setup(bits: u8) {
        Sim::reset(bits);
        unsafe { Sim::set_kernel_priorities(&PrioScheme::new(bits)) };
    }

    pub fn leak_tcb() -> &'static mut OsTcb {
        Box::leak(Box::new(OsTcb::new()))
    }

    pub fn leak_stack(size: usize) -> TaskStack {
        TaskStack::External(Box::leak(vec![0u8; size].into_boxed_slice()))
    }

    pub fn task_a(_: *mut ()) -> ! {
        unreachable!()
    }

    pub fn task_b(_: *mut ()) -> ! {
        unreachable!()
    }

    pub const TASK_A: OsTaskFn = task_a;
    pub const TASK_B: OsTaskFn = task_b;
}

#[cfg(test)]
mod prio_tests {
    use picoport::prio::{self, PrioScheme};

    #[test]
    fn test_four_bit_scheme() {
        let s = PrioScheme::new(4);
        assert_eq!(s.svcall(), 7);
        assert_eq!(s.systick(), 8);
        assert_eq!(s.pendsv(), 15);
        assert_eq!(s.lock_ceiling(), 8);
    }

    #[test]
    fn test_two_bit_scheme() {
        let s = PrioScheme::new(2);
        assert_eq!((s.svcall(), s.systick(), s.pendsv()), (1, 2, 3));
    }

    #[test]
    fn test_all_widths() {
        for bits in 2..=8u8 {
            let s = PrioScheme::new(bits);
            let lowest = ((1u16 << bits) - 1) as u8;

            assert_eq!(s.pendsv(), lowest);
            assert_eq!(s.svcall(), lowest / 2);
            assert_eq!(s.systick(), s.svcall() + 1);

            // SVCall more urgent than SysTick, SysTick more urgent than PendSV
            assert!(s.svcall() < s.systick());
            assert!(s.systick() < s.pendsv());

            // The encoded ceiling always lands in the middle of the field
            assert_eq!(s.lock_ceiling_hw(), 0x80);
        }
    }

    #[test]
    fn test_hw_encoding() {
        let s = PrioScheme::new(3);
        assert_eq!(s.to_hw(s.pendsv()), 0xE0);
        assert_eq!(s.from_hw(0xE0), 7);
        // Bits below the implemented width are dropped
        assert_eq!(s.from_hw(0xFF), 7);
    }

    #[test]
    fn test_installed_ceiling() {
        assert_eq!(prio::lock_ceiling_hw(), 0x80);
        assert_eq!(prio::scheme().lock_ceiling_hw(), prio::lock_ceiling_hw());
    }
}

#[cfg(test)]
mod lock_tests {
    use super::common::setup;
    use picoport::critical::*;
    use picoport::port::sim::Sim;
    use picoport::port::Arch;

    #[test]
    fn test_graded_lock_sets_ceiling() {
        setup(4);
        assert_eq!(Sim::basepri(), 0);

        let flags = enter_critical_section();
        assert_eq!(flags, 0);
        assert_eq!(Sim::basepri(), 0x80);

        unsafe { leave_critical_section(flags) };
        assert_eq!(Sim::basepri(), 0);
    }

    #[test]
    fn test_graded_lock_nesting() {
        setup(4);

        let outer = enter_critical_section();
        let inner = enter_critical_section();
        assert_eq!(inner, 0x80);

        unsafe { leave_critical_section(inner) };
        // Still locked after the inner release
        assert_eq!(Sim::basepri(), 0x80);

        unsafe { leave_critical_section(outer) };
        assert_eq!(Sim::basepri(), 0);
    }

    #[test]
    fn test_urgent_interrupts_preempt_lock() {
        setup(4);
        let _cs = CriticalSection::enter();

        // Logical 0..=7 stays live, 8..=15 is held off
        assert!(Sim::can_preempt(0x00));
        assert!(Sim::can_preempt(0x40));
        assert!(Sim::can_preempt(0x70));
        assert!(!Sim::can_preempt(0x80));
        assert!(!Sim::can_preempt(0xF0));
    }

    #[test]
    fn test_guard_restores_on_drop() {
        setup(2);
        {
            let cs = CriticalSection::enter();
            assert_eq!(cs.saved(), 0);
            assert_eq!(Sim::basepri(), 0x80);
        }
        assert_eq!(Sim::basepri(), 0);

        let r = critical_section(|_| Sim::basepri());
        assert_eq!(r, 0x80);
        assert_eq!(Sim::basepri(), 0);
    }

    #[test]
    fn test_mask_lock_preserves_disabled_state() {
        setup(4);
        Sim::disable_interrupts();

        let flags = MaskLock::<Sim>::lock();
        assert_eq!(flags, 1);
        unsafe { MaskLock::<Sim>::unlock(flags) };

        // Interrupts were off before, so they must stay off
        assert!(Sim::primask());
    }

    #[test]
    fn test_mask_lock_reenables() {
        setup(4);

        let flags = MaskLock::<Sim>::lock();
        assert_eq!(flags, 0);
        assert!(Sim::primask());

        unsafe { MaskLock::<Sim>::unlock(flags) };
        assert!(!Sim::primask());
    }

    #[test]
    fn test_disable_all_nesting() {
        setup(4);

        let outer = disable_all_interrupts();
        let inner = disable_all_interrupts();
        assert_eq!((outer, inner), (0, 1));

        unsafe { restore_all_interrupts(inner) };
        assert!(Sim::primask());

        unsafe { restore_all_interrupts(outer) };
        assert!(!Sim::primask());
    }

    #[test]
    fn test_disable_all_inside_kernel_lock() {
        setup(4);

        let kernel = enter_critical_section();
        let all = disable_all_interrupts();
        assert!(!Sim::can_preempt(0x00));

        unsafe { restore_all_interrupts(all) };
        assert!(Sim::can_preempt(0x00));
        assert_eq!(Sim::basepri(), 0x80);

        unsafe { leave_critical_section(kernel) };
        assert_eq!(Sim::basepri(), 0);
    }

    #[test]
    fn test_isr_context() {
        setup(4);
        assert!(!is_isr_context());
        assert!(Sim::run_handler(is_isr_context));
        assert!(!is_isr_context());
    }
}

#[cfg(test)]
mod task_tests {
    use super::common::*;
    use picoport::context::{TaskContext, INITIAL_XPSR};
    use picoport::error::OsError;
    use picoport::port::sim::Sim;
    use picoport::task::*;
    use picoport::types::OsTaskState;

    #[test]
    fn test_create_builds_initial_frame() {
        setup(4);
        let arg = 0x2000_1234usize as *mut ();
        let tcb = os_task_create(leak_tcb(), "A", TASK_A, arg, leak_stack(512)).unwrap();
        let tcb = unsafe { tcb.as_ref() };

        assert_eq!(tcb.name, "A");
        assert_eq!(tcb.state, OsTaskState::Suspended);

        let stack = tcb.stack().unwrap();
        assert_eq!(
            tcb.stk_ptr as usize,
            stack.top() as usize - core::mem::size_of::<TaskContext>()
        );

        let ctx = tcb.context().unwrap();
        assert_eq!(ctx.prio_mask, 0);
        assert_eq!(ctx.r0, 0x2000_1234);
        assert_eq!(ctx.r4, 0x0404_0404);
        assert_eq!(ctx.r11, 0x1111_1111);
        assert_eq!(ctx.r12, 0x1212_1212);
        assert_eq!(ctx.pc, (TASK_A as usize as u32) & !1);
        assert_eq!(ctx.pc & 1, 0);
        assert_eq!(ctx.xpsr, INITIAL_XPSR);
        assert_ne!(ctx.lr, 0);
    }

    #[test]
    fn test_create_paints_stack() {
        setup(4);
        let tcb = os_task_create(leak_tcb(), "A", TASK_A, core::ptr::null_mut(), leak_stack(512))
            .unwrap();
        let tcb = unsafe { tcb.as_ref() };
        let stack = tcb.stack().unwrap();

        assert!(stack.check().is_ok());
        // Everything below the initial frame is untouched
        assert_eq!(tcb.free_stack(), tcb.stk_ptr as usize - stack.base() as usize);

        unsafe { *stack.base().add(8) = 0 };
        assert_eq!(tcb.free_stack(), 8);
    }

    #[test]
    fn test_create_stack_too_small() {
        setup(4);
        let r = os_task_create(leak_tcb(), "A", TASK_A, core::ptr::null_mut(), leak_stack(64));
        assert_eq!(r.err(), Some(OsError::StkSizeInvalid));
    }

    #[test]
    fn test_create_from_isr() {
        setup(4);
        let tcb = leak_tcb();
        let stack = leak_stack(512);
        let r = Sim::run_handler(|| os_task_create(tcb, "A", TASK_A, core::ptr::null_mut(), stack));
        assert_eq!(r.err(), Some(OsError::TaskCreateIsr));
    }

    #[cfg(feature = "embedded-stack")]
    #[test]
    fn test_create_embedded_stack() {
        setup(4);
        let tcb = os_task_create(
            leak_tcb(),
            "E",
            TASK_A,
            core::ptr::null_mut(),
            TaskStack::Embedded,
        )
        .unwrap();
        let tcb = unsafe { tcb.as_ref() };
        let stack = tcb.stack().unwrap();

        let tcb_lo = tcb as *const OsTcb as usize;
        let tcb_hi = tcb_lo + core::mem::size_of::<OsTcb>();
        assert!((stack.base() as usize) >= tcb_lo);
        assert!((stack.top() as usize) <= tcb_hi);
        assert!(stack.contains(tcb.stk_ptr));
    }

    #[cfg(feature = "alloc")]
    #[test]
    fn test_create_dynamic_stack() {
        setup(4);
        let tcb = os_task_create(
            leak_tcb(),
            "D",
            TASK_A,
            core::ptr::null_mut(),
            TaskStack::Dynamic(0),
        )
        .unwrap();
        let size = unsafe { tcb.as_ref() }.stack().unwrap().size();
        assert_eq!(size, picoport::config::CFG_DEFAULT_STACK_SIZE);

        unsafe { os_task_destroy(tcb) }.unwrap();
        assert!(unsafe { tcb.as_ref() }.stack().is_none());
    }

    #[test]
    fn test_destroy() {
        setup(4);
        let tcb = os_task_create(leak_tcb(), "A", TASK_A, core::ptr::null_mut(), leak_stack(512))
            .unwrap();

        unsafe { (*tcb.as_ptr()).state = OsTaskState::Running };
        assert_eq!(unsafe { os_task_destroy(tcb) }, Err(OsError::TaskRunning));

        unsafe { (*tcb.as_ptr()).state = OsTaskState::Suspended };
        assert_eq!(
            Sim::run_handler(|| unsafe { os_task_destroy(tcb) }),
            Err(OsError::TaskDelIsr)
        );

        assert_eq!(unsafe { os_task_destroy(tcb) }, Ok(()));
        assert!(unsafe { tcb.as_ref() }.stk_ptr.is_null());
        assert_eq!(unsafe { os_task_destroy(tcb) }, Err(OsError::TcbInvalid));
    }
}

#[cfg(test)]
mod switch_tests {
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::common::*;
    use picoport::context::TaskContext;
    use picoport::critical::CriticalSection;
    use picoport::fatal::{set_assert_hook, AssertInfo};
    use picoport::port::sim::{Registers, Sim};
    use picoport::switch::ContextManager;
    use picoport::task::os_task_create;
    use picoport::types::{OsTaskState, StackCheck};

    fn request(mgr: &mut ContextManager<Sim>, next: core::ptr::NonNull<picoport::task::OsTcb>) {
        let cs = CriticalSection::enter();
        mgr.request_switch(next, &cs);
    }

    #[test]
    fn test_first_switch() {
        setup(4);
        let mut mgr = ContextManager::<Sim>::new();
        let arg = 0xCAFE_0000usize as *mut ();
        let a = os_task_create(leak_tcb(), "A", TASK_A, arg, leak_stack(512)).unwrap();
        let top = unsafe { a.as_ref() }.stack().unwrap().top();

        request(&mut mgr, a);
        assert!(Sim::pendsv_pending());
        assert!(unsafe { Sim::pendsv(&mut mgr) });

        let regs = Sim::registers();
        assert_eq!(regs.r[0], 0xCAFE_0000);
        assert_eq!(regs.r[4], 0x0404_0404);
        assert_eq!(regs.pc, (TASK_A as usize as u32) & !1);
        assert_eq!(Sim::psp() as usize, top as usize);
        assert_eq!(Sim::psp(), TaskContext::stack_after(unsafe { a.as_ref() }.stk_ptr));
        assert_eq!(Sim::basepri(), 0);
        assert!(!Sim::in_exception());

        assert_eq!(mgr.current(), Some(a));
        assert_eq!(unsafe { a.as_ref() }.state, OsTaskState::Running);
    }

    #[test]
    fn test_round_trip_preserves_registers() {
        setup(4);
        let mut mgr = ContextManager::<Sim>::new();
        let a = os_task_create(leak_tcb(), "A", TASK_A, core::ptr::null_mut(), leak_stack(512))
            .unwrap();
        let b = os_task_create(leak_tcb(), "B", TASK_B, core::ptr::null_mut(), leak_stack(512))
            .unwrap();

        request(&mut mgr, a);
        unsafe { Sim::pendsv(&mut mgr) };

        for value in [0u32, 0xFFFF_FFFF, 0x1234_5678] {
            let mut regs_a = Registers::splat(value);
            regs_a.r[7] = !value;
            Sim::set_registers(regs_a);
            let psp_a = Sim::psp();

            request(&mut mgr, b);
            unsafe { Sim::pendsv(&mut mgr) };
            assert_eq!(mgr.current(), Some(b));
            assert_eq!(unsafe { a.as_ref() }.state, OsTaskState::Suspended);

            // B scribbles over everything
            Sim::set_registers(Registers::splat(0x5A5A_5A5A));

            request(&mut mgr, a);
            unsafe { Sim::pendsv(&mut mgr) };
            assert_eq!(mgr.current(), Some(a));
            assert_eq!(Sim::registers(), regs_a);
            assert_eq!(Sim::psp(), psp_a);
        }
    }

    #[test]
    fn test_saved_context_layout() {
        setup(4);
        let mut mgr = ContextManager::<Sim>::new();
        let a = os_task_create(leak_tcb(), "A", TASK_A, core::ptr::null_mut(), leak_stack(512))
            .unwrap();
        let b = os_task_create(leak_tcb(), "B", TASK_B, core::ptr::null_mut(), leak_stack(512))
            .unwrap();

        request(&mut mgr, a);
        unsafe { Sim::pendsv(&mut mgr) };

        let mut regs = Registers::default();
        for (i, r) in regs.r.iter_mut().enumerate() {
            *r = 0x100 + i as u32;
        }
        regs.lr = 0xEEEE_0001;
        regs.pc = 0x0800_0100;
        regs.xpsr = 0x2100_0000;
        Sim::set_registers(regs);
        let psp = Sim::psp();

        request(&mut mgr, b);
        unsafe { Sim::pendsv(&mut mgr) };

        let ctx = unsafe { a.as_ref() }.context().unwrap();
        assert_eq!(unsafe { a.as_ref() }.stk_ptr as usize, psp as usize - 68);
        assert_eq!(ctx.prio_mask, 0);
        assert_eq!((ctx.r4, ctx.r11), (0x104, 0x10B));
        assert_eq!((ctx.r0, ctx.r3, ctx.r12), (0x100, 0x103, 0x10C));
        assert_eq!((ctx.lr, ctx.pc, ctx.xpsr), (0xEEEE_0001, 0x0800_0100, 0x2100_0000));
    }

    #[test]
    fn test_switch_deferred_while_locked() {
        setup(4);
        let mut mgr = ContextManager::<Sim>::new();
        let a = os_task_create(leak_tcb(), "A", TASK_A, core::ptr::null_mut(), leak_stack(512))
            .unwrap();

        let cs = CriticalSection::enter();
        mgr.request_switch(a, &cs);
        assert!(!unsafe { Sim::pendsv(&mut mgr) });
        assert!(Sim::pendsv_pending());
        assert_eq!(mgr.current(), None);
        drop(cs);

        assert!(unsafe { Sim::pendsv(&mut mgr) });
        assert!(!Sim::pendsv_pending());
        assert_eq!(mgr.current(), Some(a));
    }

    #[test]
    fn test_latest_request_wins() {
        setup(4);
        let mut mgr = ContextManager::<Sim>::new();
        let a = os_task_create(leak_tcb(), "A", TASK_A, core::ptr::null_mut(), leak_stack(512))
            .unwrap();
        let b = os_task_create(leak_tcb(), "B", TASK_B, core::ptr::null_mut(), leak_stack(512))
            .unwrap();

        request(&mut mgr, a);
        request(&mut mgr, b);
        unsafe { Sim::pendsv(&mut mgr) };

        assert_eq!(mgr.current(), Some(b));
        assert_eq!(unsafe { a.as_ref() }.state, OsTaskState::Suspended);
    }

    #[test]
    fn test_pendsv_without_target_resumes_current() {
        setup(4);
        let mut mgr = ContextManager::<Sim>::new();
        let a = os_task_create(leak_tcb(), "A", TASK_A, core::ptr::null_mut(), leak_stack(512))
            .unwrap();

        request(&mut mgr, a);
        unsafe { Sim::pendsv(&mut mgr) };
        let regs = Registers::splat(0x7777_7777);
        Sim::set_registers(regs);
        let psp = Sim::psp();

        <Sim as picoport::port::Arch>::pend_switch();
        unsafe { Sim::pendsv(&mut mgr) };

        assert_eq!(mgr.current(), Some(a));
        assert_eq!(Sim::registers(), regs);
        assert_eq!(Sim::psp(), psp);
    }

    static HOOK_HITS: AtomicUsize = AtomicUsize::new(0);

    fn counting_hook(info: &AssertInfo) -> ! {
        HOOK_HITS.fetch_add(1, Ordering::SeqCst);
        panic!("{}", info.text)
    }

    #[test]
    fn test_stack_sentinel_fires_hook() {
        setup(4);
        let mut mgr = ContextManager::<Sim>::with_stack_check(StackCheck::Switch);
        let a = os_task_create(leak_tcb(), "A", TASK_A, core::ptr::null_mut(), leak_stack(512))
            .unwrap();
        let b = os_task_create(leak_tcb(), "B", TASK_B, core::ptr::null_mut(), leak_stack(512))
            .unwrap();

        request(&mut mgr, a);
        unsafe { Sim::pendsv(&mut mgr) };

        // A overruns its stack
        unsafe { *a.as_ref().stack().unwrap().base() = 0 };

        let previous = set_assert_hook(counting_hook);
        request(&mut mgr, b);
        let r = catch_unwind(AssertUnwindSafe(|| unsafe { Sim::pendsv(&mut mgr) }));
        set_assert_hook(previous);

        let text = r.unwrap_err().downcast::<String>().unwrap();
        assert_eq!(*text, "TStk");
        assert_eq!(HOOK_HITS.load(Ordering::SeqCst), 1);
        // The switch never took place
        assert_eq!(mgr.current(), Some(a));
        assert_eq!(unsafe { b.as_ref() }.state, OsTaskState::Suspended);
    }

    #[test]
    fn test_strict_check_passes_healthy_stacks() {
        setup(4);
        let mut mgr = ContextManager::<Sim>::with_stack_check(StackCheck::Strict);
        let a = os_task_create(leak_tcb(), "A", TASK_A, core::ptr::null_mut(), leak_stack(512))
            .unwrap();
        let b = os_task_create(leak_tcb(), "B", TASK_B, core::ptr::null_mut(), leak_stack(512))
            .unwrap();

        for next in [a, b, a, b] {
            request(&mut mgr, next);
            unsafe { Sim::pendsv(&mut mgr) };
            assert_eq!(mgr.current(), Some(next));
        }
        assert_eq!(mgr.stack_check(), StackCheck::Strict);
    }

    #[test]
    fn test_stack_check_off() {
        setup(4);
        let mut mgr = ContextManager::<Sim>::with_stack_check(StackCheck::Off);
        let a = os_task_create(leak_tcb(), "A", TASK_A, core::ptr::null_mut(), leak_stack(512))
            .unwrap();
        let b = os_task_create(leak_tcb(), "B", TASK_B, core::ptr::null_mut(), leak_stack(512))
            .unwrap();

        request(&mut mgr, a);
        unsafe { Sim::pendsv(&mut mgr) };
        unsafe { *a.as_ref().stack().unwrap().base() = 0 };

        request(&mut mgr, b);
        unsafe { Sim::pendsv(&mut mgr) };
        assert_eq!(mgr.current(), Some(b));
    }
}

#[cfg(test)]
mod kernel_tests {
    use picoport::port::sim::Sim;
    use picoport::{os_init, OsError};

    #[test]
    fn test_init_programs_priorities() {
        Sim::reset(4);
        let scheme = os_init().unwrap();

        assert_eq!((scheme.svcall(), scheme.systick(), scheme.pendsv()), (7, 8, 15));
        assert_eq!(Sim::exception_priorities(), (0x70, 0x80, 0xF0));
    }

    #[test]
    fn test_init_three_bits() {
        Sim::reset(3);
        let scheme = os_init().unwrap();

        assert_eq!((scheme.svcall(), scheme.systick(), scheme.pendsv()), (3, 4, 7));
        assert_eq!(Sim::exception_priorities(), (0x60, 0x80, 0xE0));
    }

    #[test]
    fn test_init_rejects_single_bit() {
        Sim::reset(1);
        assert_eq!(os_init().err(), Some(OsError::PrioBitsInvalid));
    }
}

#[cfg(test)]
mod error_tests {
    use picoport::error::OsError;

    #[test]
    fn test_error_variants() {
        assert_eq!(OsError::StkOvf, OsError::StkOvf);
        assert_ne!(OsError::StkOvf, OsError::StkSizeInvalid);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(OsError::OsRunning as u16, 24202);
        assert_eq!(OsError::StkOvf as u16, 28210);
        assert_eq!(OsError::TaskCreateIsr as u16, 29002);
    }

    #[test]
    fn test_error_debug() {
        let err = OsError::PrioBitsInvalid;
        let _ = format!("{:?}", err);
    }
}

#[cfg(test)]
mod config_tests {
    use picoport::config::*;
    use picoport::context::CONTEXT_WORDS;

    #[test]
    fn test_config_values() {
        assert!((2..=8).contains(&CFG_NVIC_PRIO_BITS));
        assert!(CFG_STK_SIZE_MIN > CONTEXT_WORDS * 4, "Stack cannot hold a context");
        assert!(CFG_DEFAULT_STACK_SIZE >= CFG_STK_SIZE_MIN);
        assert!(CFG_FIXED_STACK_SIZE >= CFG_STK_SIZE_MIN);
        assert!(CFG_STACK_ALIGN.is_power_of_two());
    }
}
