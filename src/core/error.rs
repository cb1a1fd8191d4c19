//! Error types for the port layer
//!
//! Uses Rust's Result pattern instead of C-style error pointers.
//! Stack overflow is fatal and goes through [`crate::fatal`]; the
//! `StkOvf` code is what the guard check reports before that happens.

/// Port error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum OsError {
    // ============ OS state errors ============
    /// OS is already running
    OsRunning = 24202,
    /// OS not initialized
    OsNotInit = 24203,

    // ============ Priority errors ============
    /// Implemented priority width cannot host the kernel scheme
    PrioBitsInvalid = 25204,

    // ============ Stack errors ============
    /// Invalid stack pointer or buffer
    StkInvalid = 28207,
    /// Invalid stack size
    StkSizeInvalid = 28208,
    /// Stack overflow detected
    StkOvf = 28210,
    /// Stack memory could not be allocated
    StkAlloc = 28211,

    // ============ Task errors ============
    /// Cannot create task from ISR
    TaskCreateIsr = 29002,
    /// Cannot destroy task from ISR
    TaskDelIsr = 29006,
    /// Task is running
    TaskRunning = 29016,

    // ============ TCB errors ============
    /// Invalid TCB pointer
    TcbInvalid = 29101,
}

/// Result type alias for port operations
pub type OsResult<T> = Result<T, OsError>;
