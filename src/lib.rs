//! pico]OS port layer for ARM Cortex-M
//!
//! The architecture-specific half of the kernel:
//! - Task context layout and initial stack frames
//! - Deferred context switching through PendSV
//! - Priority-ceiling kernel lock (BASEPRI) with a PRIMASK fallback
//! - Kernel exception priorities derived from the NVIC width
//! - Stack sentinel checking on every switch
//!
//! On non-ARM hosts the silicon is replaced by [`port::sim::Sim`].

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

#[cfg(not(target_arch = "arm"))]
extern crate std;

#[cfg(feature = "alloc")]
extern crate alloc;

// ============ Critical Section ============

// `critical-section` users (portable-atomic, the assertion hook) get the
// full interrupt disable, which also excludes the kernel lock holders.
#[cfg(target_arch = "arm")]
mod cs_impl {
    use critical_section::{set_impl, Impl, RawRestoreState};

    use crate::critical::{disable_all_interrupts, restore_all_interrupts};

    struct SingleCoreCriticalSection;
    set_impl!(SingleCoreCriticalSection);

    unsafe impl Impl for SingleCoreCriticalSection {
        unsafe fn acquire() -> RawRestoreState {
            disable_all_interrupts() == 0
        }

        unsafe fn release(was_active: RawRestoreState) {
            unsafe { restore_all_interrupts(if was_active { 0 } else { 1 }) }
        }
    }
}

// ============ Modules ============

pub mod log;
mod lang_items;

pub mod core;
pub mod port;

// ============ Re-exports ============

pub use crate::core::config;
pub use crate::core::config::*;
pub use crate::core::context;
pub use crate::core::context::TaskContext;
pub use crate::core::critical;
pub use crate::core::cs_cell;
pub use crate::core::error;
pub use crate::core::error::{OsError, OsResult};
pub use crate::core::fatal;
pub use crate::core::kernel;
pub use crate::core::kernel::{os_idle_hook, os_init, os_start};
pub use crate::core::prio;
pub use crate::core::prio::PrioScheme;
pub use crate::core::stack;
pub use crate::core::switch;
pub use crate::core::switch::{os_ctx_sw, os_current_task};
pub use crate::core::task;
pub use crate::core::task::{os_task_create, os_task_destroy, OsTcb, TaskStack};
pub use crate::core::types;
pub use crate::core::types::*;

#[cfg(target_arch = "arm")]
pub use port::cortex_m::systick_init;
