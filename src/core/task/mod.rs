//! Task creation and destruction (port part)
//!
//! Prepares a task's stack so that its first dispatch looks exactly like
//! resuming a task that was suspended by PendSV.

mod tcb;

#[cfg(feature = "embedded-stack")]
pub use tcb::FixedStack;
pub use tcb::OsTcb;

#[cfg(feature = "alloc")]
use alloc::vec::Vec;
use core::ptr::NonNull;

#[cfg(feature = "alloc")]
use crate::config::CFG_DEFAULT_STACK_SIZE;
use crate::context::{TaskContext, INITIAL_XPSR};
use crate::critical::{critical_section, is_isr_context};
use crate::error::{OsError, OsResult};
use crate::fatal::port_assert;
use crate::stack::StackRegion;
use crate::switch::CONTEXT;
use crate::types::OsTaskState;

/// Task entry point function type
pub type OsTaskFn = fn(*mut ()) -> !;

/// Where a task's stack memory comes from
pub enum TaskStack {
    /// Caller-supplied buffer
    External(&'static mut [u8]),
    /// Allocated by the port, freed by [`os_task_destroy`]; 0 picks the default size
    #[cfg(feature = "alloc")]
    Dynamic(usize),
    /// The buffer embedded in the TCB
    #[cfg(feature = "embedded-stack")]
    Embedded,
}

/// Create a task
///
/// Resolves `stack` into a [`StackRegion`], paints it with the stack magic
/// and builds the initial context. The returned handle stays valid for the
/// lifetime of the program; the task is suspended until a switch targets it.
///
/// # Example
/// ```ignore
/// static mut TASK_TCB: OsTcb = OsTcb::new();
/// static mut TASK_STK: [u8; 1024] = [0; 1024];
///
/// fn my_task(_: *mut ()) -> ! {
///     loop { /* ... */ }
/// }
///
/// let task = os_task_create(
///     unsafe { &mut *core::ptr::addr_of_mut!(TASK_TCB) },
///     "MyTask",
///     my_task,
///     core::ptr::null_mut(),
///     TaskStack::External(unsafe { &mut *core::ptr::addr_of_mut!(TASK_STK) }),
/// )?;
/// ```
pub fn os_task_create(
    tcb: &'static mut OsTcb,
    name: &'static str,
    task_fn: OsTaskFn,
    arg: *mut (),
    stack: TaskStack,
) -> OsResult<NonNull<OsTcb>> {
    if is_isr_context() {
        return Err(OsError::TaskCreateIsr);
    }

    tcb.init();

    let region = match stack {
        TaskStack::External(buf) => StackRegion::new(buf)?,
        #[cfg(feature = "alloc")]
        TaskStack::Dynamic(size) => {
            let size = if size == 0 { CFG_DEFAULT_STACK_SIZE } else { size };
            let mut buf = Vec::new();
            buf.try_reserve_exact(size).map_err(|_| OsError::StkAlloc)?;
            buf.resize(size, 0u8);
            let mut buf = buf.into_boxed_slice();
            let region = StackRegion::new(&mut buf)?;
            tcb.stack_owned = Some(buf);
            region
        }
        #[cfg(feature = "embedded-stack")]
        TaskStack::Embedded => StackRegion::new(&mut tcb.stack_embedded.0)?,
    };

    unsafe { region.fill() };
    tcb.stk_ptr = unsafe { os_task_stk_init(task_fn, arg, &region) };
    tcb.stack = Some(region);
    tcb.name = name;
    tcb.state = OsTaskState::Suspended;

    crate::debug!("task '{}' created, {} byte stack", name, region.size());

    Ok(NonNull::from(tcb))
}

/// Release a task's stack
///
/// Dynamically allocated stacks are freed; other buffers are just forgotten.
/// The task owning the core and the pending switch target are refused with
/// `TaskRunning`.
///
/// # Safety
/// `tcb` must come from [`os_task_create`].
pub unsafe fn os_task_destroy(tcb: NonNull<OsTcb>) -> OsResult<()> {
    if is_isr_context() {
        return Err(OsError::TaskDelIsr);
    }

    critical_section(|cs| {
        let tcb_ref = unsafe { &mut *tcb.as_ptr() };

        if tcb_ref.stack.is_none() {
            return Err(OsError::TcbInvalid);
        }

        let ctx = CONTEXT.get(cs);
        if tcb_ref.is_running() || ctx.current() == Some(tcb) || ctx.next() == Some(tcb) {
            return Err(OsError::TaskRunning);
        }

        tcb_ref.stk_ptr = core::ptr::null_mut();
        tcb_ref.stack = None;
        #[cfg(feature = "alloc")]
        {
            tcb_ref.stack_owned = None;
        }

        crate::debug!("task '{}' destroyed", tcb_ref.name);
        Ok(())
    })
}

/// Build the initial context at the top of `region`
///
/// # Safety
/// `region` must be writable and not hold a live context.
pub unsafe fn os_task_stk_init(
    task_fn: OsTaskFn,
    arg: *mut (),
    region: &StackRegion,
) -> *mut TaskContext {
    let frame_ptr = unsafe { (region.top() as *mut TaskContext).sub(1) };

    let ctx = TaskContext {
        prio_mask: 0,
        r4: 0x0404_0404,
        r5: 0x0505_0505,
        r6: 0x0606_0606,
        r7: 0x0707_0707,
        r8: 0x0808_0808,
        r9: 0x0909_0909,
        r10: 0x1010_1010,
        r11: 0x1111_1111,
        r0: arg as usize as u32,
        r1: 0,
        r2: 0,
        r3: 0,
        r12: 0x1212_1212,
        lr: os_task_return as *const () as usize as u32,
        // Exception return wants the Thumb bit in xPSR, not in the PC
        pc: (task_fn as *const () as usize as u32) & !1,
        xpsr: INITIAL_XPSR,
    };
    unsafe { frame_ptr.write(ctx) };

    frame_ptr
}

/// Landing pad for a task entry that returns
extern "C" fn os_task_return() -> ! {
    port_assert("TRet")
}
