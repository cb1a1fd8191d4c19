//! Compile-time configuration for the Cortex-M port
//!
//! These constants control stack handling and the fallback priority width.

use crate::types::StackCheck;

/// Implemented NVIC priority bits assumed until `os_init` probes the core
pub const CFG_NVIC_PRIO_BITS: u8 = 4;

/// Minimum task stack size in bytes
pub const CFG_STK_SIZE_MIN: usize = 128;

/// Stack size used for dynamically allocated stacks requested with size 0
pub const CFG_DEFAULT_STACK_SIZE: usize = 512;

/// Size of the stack buffer embedded in every TCB
pub const CFG_FIXED_STACK_SIZE: usize = 1024;

/// Required alignment of the initial stack top (AAPCS)
pub const CFG_STACK_ALIGN: usize = 8;

/// Stack overflow detection level
pub const CFG_STACK_CHECK: StackCheck = StackCheck::Switch;

/// Fill pattern written over a task stack at creation
pub const STACK_MAGIC: u8 = 0x56;
