//! Task Control Block (TCB) definition
//!
//! Only the port-facing part of a task lives here: the saved stack pointer
//! slot and the stack the context is parked on. Scheduling data belongs to
//! the kernel proper.

#[cfg(feature = "alloc")]
use alloc::boxed::Box;

#[cfg(feature = "embedded-stack")]
use crate::config::CFG_FIXED_STACK_SIZE;
use crate::context::TaskContext;
use crate::stack::StackRegion;
use crate::types::OsTaskState;

/// Stack buffer embedded in each TCB
#[cfg(feature = "embedded-stack")]
#[repr(C, align(8))]
pub struct FixedStack(pub [u8; CFG_FIXED_STACK_SIZE]);

/// Task Control Block
#[repr(C)]
pub struct OsTcb {
    // ============ Stack pointer ============
    /// Saved context while suspended; must stay the first field
    pub stk_ptr: *mut TaskContext,

    // ============ Stack information ============
    /// Region the context lives in
    pub(crate) stack: Option<StackRegion>,

    // ============ Task identification ============
    /// Task name
    pub name: &'static str,

    // ============ State ============
    /// Running or suspended
    pub state: OsTaskState,

    // ============ Stack memory ============
    /// Buffer allocated by the port, released on destroy
    #[cfg(feature = "alloc")]
    pub(crate) stack_owned: Option<Box<[u8]>>,

    /// Fixed-size buffer carried inside the TCB
    #[cfg(feature = "embedded-stack")]
    pub(crate) stack_embedded: FixedStack,
}

impl OsTcb {
    /// Create a new, uninitialized TCB
    pub const fn new() -> Self {
        OsTcb {
            stk_ptr: core::ptr::null_mut(),
            stack: None,
            name: "",
            state: OsTaskState::Suspended,
            #[cfg(feature = "alloc")]
            stack_owned: None,
            #[cfg(feature = "embedded-stack")]
            stack_embedded: FixedStack([0; CFG_FIXED_STACK_SIZE]),
        }
    }

    /// Reset the TCB to default values
    pub fn init(&mut self) {
        self.stk_ptr = core::ptr::null_mut();
        self.stack = None;
        self.name = "";
        self.state = OsTaskState::Suspended;
        #[cfg(feature = "alloc")]
        {
            self.stack_owned = None;
        }
    }

    /// Stack region, once the task has been created
    #[inline]
    pub fn stack(&self) -> Option<&StackRegion> {
        self.stack.as_ref()
    }

    /// Untouched stack bytes (high-water mark)
    pub fn free_stack(&self) -> usize {
        self.stack.as_ref().map_or(0, StackRegion::free_bytes)
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.state == OsTaskState::Running
    }

    /// Saved context of a suspended task
    #[inline]
    pub fn context(&self) -> Option<&TaskContext> {
        if self.is_running() || self.stk_ptr.is_null() {
            return None;
        }
        Some(unsafe { &*self.stk_ptr })
    }
}

impl Default for OsTcb {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl Send for OsTcb {}
unsafe impl Sync for OsTcb {}
