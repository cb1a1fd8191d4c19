//! Saved task context layout
//!
//! A suspended task keeps its registers on its own stack. The lower nine
//! words are pushed by software in PendSV, the upper eight by the core on
//! exception entry. The restore path and the hardware exception return both
//! read this layout directly, so field order is fixed.

use core::mem::{offset_of, size_of};

/// Words pushed by software (mask register + r4-r11)
pub const SW_FRAME_WORDS: usize = 9;

/// Words pushed by the core on exception entry
pub const HW_FRAME_WORDS: usize = 8;

/// Total saved context size in words
pub const CONTEXT_WORDS: usize = SW_FRAME_WORDS + HW_FRAME_WORDS;

/// EXC_RETURN: thread mode, process stack, basic frame
pub const EXC_RETURN_THREAD_PSP: u32 = 0xFFFF_FFFD;

/// FPCCR: automatic FP state preservation on exception entry
pub const FPCCR_ASPEN: u32 = 1 << 31;

/// FPCCR: lazy FP state preservation
pub const FPCCR_LSPEN: u32 = 1 << 30;

/// FPCCR value under which every exception stacks a basic frame
///
/// The saved context has no room for s0-s31, so extended frames must never
/// reach the task stacks.
#[inline]
pub const fn fpccr_basic_frames(fpccr: u32) -> u32 {
    fpccr & !(FPCCR_ASPEN | FPCCR_LSPEN)
}

/// Initial xPSR: only the Thumb bit set
pub const INITIAL_XPSR: u32 = 0x0100_0000;

/// Task stack frame for Cortex-M
#[repr(C, align(4))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskContext {
    // Saved by PendSV
    /// BASEPRI on graded cores, PRIMASK on armv6m
    pub prio_mask: u32,
    pub r4: u32,
    pub r5: u32,
    pub r6: u32,
    pub r7: u32,
    pub r8: u32,
    pub r9: u32,
    pub r10: u32,
    pub r11: u32,

    // Stacked by the core
    pub r0: u32,
    pub r1: u32,
    pub r2: u32,
    pub r3: u32,
    pub r12: u32,
    pub lr: u32,
    pub pc: u32,
    pub xpsr: u32,
}

const _: () = assert!(size_of::<TaskContext>() == CONTEXT_WORDS * 4);
const _: () = assert!(offset_of!(TaskContext, r4) == 4);
const _: () = assert!(offset_of!(TaskContext, r11) == 32);
const _: () = assert!(offset_of!(TaskContext, r0) == SW_FRAME_WORDS * 4);
const _: () = assert!(offset_of!(TaskContext, xpsr) == (CONTEXT_WORDS - 1) * 4);

impl TaskContext {
    /// Address of the hardware-stacked part of the frame
    #[inline]
    pub fn hw_frame_ptr(this: *mut TaskContext) -> *mut u32 {
        // SAFETY: stays within the same context object
        unsafe { (this as *mut u32).add(SW_FRAME_WORDS) }
    }

    /// Stack pointer value once the whole context has been popped
    #[inline]
    pub fn stack_after(this: *mut TaskContext) -> *mut u32 {
        // SAFETY: one-past-the-end of the context object
        unsafe { (this as *mut u32).add(CONTEXT_WORDS) }
    }
}
