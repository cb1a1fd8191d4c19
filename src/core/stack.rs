//! Task stack regions and the overflow guard
//!
//! Stacks grow downward, so the lowest byte of a region is the first one an
//! overflowing task tramples. The whole region is filled with
//! [`STACK_MAGIC`] at creation; the base byte doubles as the sentinel and the
//! run of untouched bytes above it gives the high-water mark.

use core::ptr::NonNull;

use crate::config::{CFG_STACK_ALIGN, CFG_STK_SIZE_MIN, STACK_MAGIC};
use crate::context::{TaskContext, CONTEXT_WORDS};
use crate::error::{OsError, OsResult};

/// Contiguous memory backing one task's context and call stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackRegion {
    base: NonNull<u8>,
    size: usize,
}

impl StackRegion {
    /// Describe the memory of `buf` as a stack region
    pub fn new(buf: &mut [u8]) -> OsResult<Self> {
        let base = NonNull::new(buf.as_mut_ptr()).ok_or(OsError::StkInvalid)?;
        unsafe { Self::from_raw(base, buf.len()) }
    }

    /// Describe raw memory as a stack region
    ///
    /// # Safety
    /// `base..base + size` must be writable and exclusively owned by one task
    /// for as long as the region is in use.
    pub unsafe fn from_raw(base: NonNull<u8>, size: usize) -> OsResult<Self> {
        let region = StackRegion { base, size };
        if size < CFG_STK_SIZE_MIN || region.top() as usize <= base.as_ptr() as usize {
            return Err(OsError::StkSizeInvalid);
        }
        Ok(region)
    }

    /// Lowest address of the region
    #[inline]
    pub fn base(&self) -> *mut u8 {
        self.base.as_ptr()
    }

    /// Size in bytes
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Initial stack pointer: end of the region rounded down to 8 bytes
    #[inline]
    pub fn top(&self) -> *mut u8 {
        let end = self.base.as_ptr() as usize + self.size;
        (end & !(CFG_STACK_ALIGN - 1)) as *mut u8
    }

    /// Whether a saved context at `sp` lies completely inside the region
    #[inline]
    pub fn contains(&self, sp: *const TaskContext) -> bool {
        let sp = sp as usize;
        let lo = self.base.as_ptr() as usize;
        sp >= lo && sp + CONTEXT_WORDS * 4 <= lo + self.size
    }

    /// Paint the whole region with the stack magic
    ///
    /// # Safety
    /// The region must not hold a live context.
    pub unsafe fn fill(&self) {
        unsafe { core::ptr::write_bytes(self.base.as_ptr(), STACK_MAGIC, self.size) };
    }

    /// Verify the sentinel at the base of the region
    #[inline]
    pub fn check(&self) -> OsResult<()> {
        // Volatile: the byte is written behind the compiler's back by the task
        let sentinel = unsafe { core::ptr::read_volatile(self.base.as_ptr()) };
        if sentinel == STACK_MAGIC {
            Ok(())
        } else {
            Err(OsError::StkOvf)
        }
    }

    /// Bytes never touched since creation, counted up from the base
    pub fn free_bytes(&self) -> usize {
        let mut free = 0;
        while free < self.size {
            let b = unsafe { core::ptr::read_volatile(self.base.as_ptr().add(free)) };
            if b != STACK_MAGIC {
                break;
            }
            free += 1;
        }
        free
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(align(8))]
    struct Buf([u8; 256]);

    #[test]
    fn test_fill_and_check() {
        let mut buf = Buf([0; 256]);
        let region = StackRegion::new(&mut buf.0).unwrap();
        assert_eq!(region.check(), Err(OsError::StkOvf));

        unsafe { region.fill() };
        assert_eq!(region.check(), Ok(()));
        assert_eq!(region.free_bytes(), 256);

        unsafe { *region.base() = 0 };
        assert_eq!(region.check(), Err(OsError::StkOvf));
        assert_eq!(region.free_bytes(), 0);
    }

    #[test]
    fn test_high_water_mark() {
        let mut buf = Buf([0; 256]);
        let region = StackRegion::new(&mut buf.0).unwrap();
        unsafe {
            region.fill();
            *region.base().add(200) = 0x11;
        }
        assert_eq!(region.free_bytes(), 200);
        assert_eq!(region.check(), Ok(()));
    }

    #[test]
    fn test_top_alignment() {
        let mut buf = Buf([0; 256]);
        let region = StackRegion::new(&mut buf.0[..250]).unwrap();
        assert_eq!(region.top() as usize % CFG_STACK_ALIGN, 0);
        assert!(region.top() as usize <= region.base() as usize + 250);
    }

    #[test]
    fn test_too_small() {
        let mut buf = Buf([0; 256]);
        assert_eq!(
            StackRegion::new(&mut buf.0[..CFG_STK_SIZE_MIN - 1]),
            Err(OsError::StkSizeInvalid)
        );
    }
}
