//! Core type definitions for the port layer

/// Logical exception priority (0 = most urgent)
pub type OsPrio = u8;

/// Stack element type
pub type OsStkElement = u32;

/// Value saved by a lock call site and handed back on unlock
pub type LockFlags = u32;

/// Port-level task state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum OsTaskState {
    /// Task owns the core
    Running = 0,
    /// Task context is parked on its own stack
    Suspended = 1,
}

/// How strictly stack sentinels are verified
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum StackCheck {
    /// No checking
    Off = 0,
    /// Check the outgoing task on every context save
    Switch = 1,
    /// Also check the incoming task and the saved stack pointer bounds
    Strict = 2,
}
