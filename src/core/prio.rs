//! Exception priority scheme for the kernel exceptions
//!
//! All three kernel exceptions and the critical-section ceiling are derived
//! from the number of priority bits the NVIC implements. The upper half of
//! the range stays free for interrupts that must preempt the kernel.
//!
//! | Exception | 4 bits | 2 bits |
//! |-----------|--------|--------|
//! | SVCall    | 7      | 1      |
//! | SysTick   | 8      | 2      |
//! | PendSV    | 15     | 3      |
//!
//! Numbers are logical (what `NVIC_SetPriority` takes), not the value
//! written into the priority registers; see [`PrioScheme::to_hw`].

use portable_atomic::{AtomicU8, Ordering};

use crate::config::CFG_NVIC_PRIO_BITS;
use crate::error::{OsError, OsResult};
use crate::types::OsPrio;

/// Smallest width that keeps SysTick strictly below SVCall and above PendSV
const PRIO_BITS_MIN: u8 = 2;

/// Priority registers are 8 bits wide
const PRIO_BITS_MAX: u8 = 8;

/// Kernel exception priorities for one implemented priority width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PrioScheme {
    bits: u8,
}

impl PrioScheme {
    /// Build the scheme for `bits` implemented priority bits.
    ///
    /// Panics (at compile time in const context) on an unsupported width.
    pub const fn new(bits: u8) -> Self {
        assert!(
            bits >= PRIO_BITS_MIN && bits <= PRIO_BITS_MAX,
            "unsupported NVIC priority width"
        );
        PrioScheme { bits }
    }

    /// Build the scheme for a width reported by the hardware
    pub fn try_new(bits: u8) -> OsResult<Self> {
        if !(PRIO_BITS_MIN..=PRIO_BITS_MAX).contains(&bits) {
            return Err(OsError::PrioBitsInvalid);
        }
        Ok(PrioScheme { bits })
    }

    /// Number of implemented priority bits
    #[inline]
    pub const fn bits(&self) -> u8 {
        self.bits
    }

    /// Least urgent logical priority
    #[inline]
    pub const fn lowest(&self) -> OsPrio {
        ((1u16 << self.bits) - 1) as OsPrio
    }

    /// SVCall priority, halfway through the range
    #[inline]
    pub const fn svcall(&self) -> OsPrio {
        self.lowest() / 2
    }

    /// SysTick priority, one step less urgent than SVCall
    #[inline]
    pub const fn systick(&self) -> OsPrio {
        self.svcall() + 1
    }

    /// PendSV priority, always the least urgent
    #[inline]
    pub const fn pendsv(&self) -> OsPrio {
        self.lowest()
    }

    /// Logical priority the kernel lock masks down to
    #[inline]
    pub const fn lock_ceiling(&self) -> OsPrio {
        self.svcall() + 1
    }

    /// Convert a logical priority into the packed register encoding.
    ///
    /// Implemented bits are the most significant ones of the 8-bit field.
    #[inline]
    pub const fn to_hw(&self, prio: OsPrio) -> u8 {
        (((prio as u32) << (8 - self.bits as u32)) & 0xff) as u8
    }

    /// Convert a packed register value back into a logical priority
    #[inline]
    pub const fn from_hw(&self, hw: u8) -> OsPrio {
        hw >> (8 - self.bits)
    }

    /// Register value for the kernel lock ceiling (BASEPRI)
    #[inline]
    pub const fn lock_ceiling_hw(&self) -> u8 {
        self.to_hw(self.lock_ceiling())
    }
}

impl Default for PrioScheme {
    fn default() -> Self {
        Self::new(CFG_NVIC_PRIO_BITS)
    }
}

// ============ Installed scheme ============

/// Priority width the kernel was initialized with
static PRIO_BITS: AtomicU8 = AtomicU8::new(CFG_NVIC_PRIO_BITS);

/// Pre-encoded BASEPRI value used by every kernel lock
static LOCK_CEILING: AtomicU8 = AtomicU8::new(PrioScheme::new(CFG_NVIC_PRIO_BITS).lock_ceiling_hw());

/// Make `scheme` the process-wide priority assignment
pub(crate) fn install(scheme: PrioScheme) {
    PRIO_BITS.store(scheme.bits(), Ordering::Relaxed);
    LOCK_CEILING.store(scheme.lock_ceiling_hw(), Ordering::Release);
}

/// Currently installed priority scheme
#[inline]
pub fn scheme() -> PrioScheme {
    PrioScheme {
        bits: PRIO_BITS.load(Ordering::Relaxed),
    }
}

/// Encoded ceiling written by the graded kernel lock
#[inline(always)]
pub fn lock_ceiling_hw() -> u8 {
    LOCK_CEILING.load(Ordering::Acquire)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_four_bits() {
        let s = PrioScheme::new(4);
        assert_eq!(s.lowest(), 15);
        assert_eq!((s.svcall(), s.systick(), s.pendsv()), (7, 8, 15));
        assert_eq!(s.to_hw(s.svcall()), 0x70);
        assert_eq!(s.to_hw(s.pendsv()), 0xF0);
    }

    #[test]
    fn test_two_bits() {
        let s = PrioScheme::new(2);
        assert_eq!((s.svcall(), s.systick(), s.pendsv()), (1, 2, 3));
        assert_eq!(s.to_hw(s.systick()), 0x80);
        assert_eq!(s.to_hw(s.pendsv()), 0xC0);
    }

    #[test]
    fn test_ceiling_above_svcall() {
        for bits in PRIO_BITS_MIN..=PRIO_BITS_MAX {
            let s = PrioScheme::new(bits);
            assert!(s.lock_ceiling() > s.svcall());
            assert!(s.lock_ceiling() <= s.pendsv());
            assert_eq!(s.from_hw(s.lock_ceiling_hw()), s.lock_ceiling());
        }
    }

    #[test]
    fn test_invalid_width() {
        assert_eq!(PrioScheme::try_new(0), Err(OsError::PrioBitsInvalid));
        assert_eq!(PrioScheme::try_new(1), Err(OsError::PrioBitsInvalid));
        assert_eq!(PrioScheme::try_new(9), Err(OsError::PrioBitsInvalid));
        assert!(PrioScheme::try_new(3).is_ok());
    }
}
