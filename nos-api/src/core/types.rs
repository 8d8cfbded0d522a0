//! Core types used throughout the NOS process core

use core::fmt;

/// Process identifier type
pub type Pid = u32;

/// CPU identifier type (0 is always the primary CPU)
pub type CpuId = usize;

/// Virtual address type
pub type VirtAddr = usize;

/// Size type
pub type Size = usize;

/// Error codes surfaced to system-call handlers
///
/// The process core never returns these itself; callers such as a `fork`
/// handler translate [`crate::Error`] into one of these at their boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// Resource temporarily unavailable (EAGAIN)
    TryAgain,
    /// Not enough memory (ENOMEM)
    OutOfMemory,
    /// No such process (ESRCH)
    NoProcess,
    /// Invalid argument (EINVAL)
    InvalidArgument,
}

impl KernelError {
    /// POSIX errno value for this error
    pub const fn errno(self) -> i32 {
        match self {
            KernelError::TryAgain => 11,
            KernelError::OutOfMemory => 12,
            KernelError::NoProcess => 3,
            KernelError::InvalidArgument => 22,
        }
    }
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::TryAgain => write!(f, "Resource temporarily unavailable"),
            KernelError::OutOfMemory => write!(f, "Not enough memory"),
            KernelError::NoProcess => write!(f, "No such process"),
            KernelError::InvalidArgument => write!(f, "Invalid argument"),
        }
    }
}
