//! Error handling module for the NOS process core

use core::fmt;

use crate::core::types::{KernelError, Pid};

/// Which half of an address space a mapping copy was working on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingKind {
    /// Kernel-space mappings (shared layout, present in every context)
    Kernel,
    /// User-space mappings
    User,
}

impl fmt::Display for MappingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingKind::Kernel => write!(f, "kernel"),
            MappingKind::User => write!(f, "user"),
        }
    }
}

/// Common error type used throughout the NOS process core
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The generic allocator or an object pool is exhausted
    OutOfMemory,
    /// Every PID in `1..=pid_max` is in use
    PidExhausted,
    /// The memory-context engine could not create another context
    ContextExhausted,
    /// Duplicating mappings into a child context failed
    MappingCopyFailed(MappingKind),
    /// Invalid argument
    InvalidArgument(&'static str),
    /// No process is registered under this PID
    NotFound(Pid),
    /// Object is not in a state that permits the operation
    InvalidState(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::OutOfMemory => write!(f, "Out of memory"),
            Error::PidExhausted => write!(f, "PID namespace exhausted"),
            Error::ContextExhausted => write!(f, "No memory context available"),
            Error::MappingCopyFailed(kind) => write!(f, "Failed to copy {} mappings", kind),
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::NotFound(pid) => write!(f, "No process with pid {}", pid),
            Error::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

impl From<Error> for KernelError {
    fn from(err: Error) -> Self {
        match err {
            Error::OutOfMemory | Error::ContextExhausted | Error::MappingCopyFailed(_) => {
                KernelError::OutOfMemory
            }
            Error::PidExhausted => KernelError::TryAgain,
            Error::NotFound(_) => KernelError::NoProcess,
            Error::InvalidArgument(_) | Error::InvalidState(_) => KernelError::InvalidArgument,
        }
    }
}

impl Error {
    /// True for the resource-exhaustion class: the caller may retry later
    pub fn is_exhaustion(&self) -> bool {
        matches!(
            self,
            Error::OutOfMemory
                | Error::PidExhausted
                | Error::ContextExhausted
                | Error::MappingCopyFailed(_)
        )
    }
}

/// Result type for operations that can fail
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fork_failures_map_to_errno() {
        assert_eq!(KernelError::from(Error::PidExhausted).errno(), 11);
        assert_eq!(
            KernelError::from(Error::MappingCopyFailed(MappingKind::User)),
            KernelError::OutOfMemory
        );
        assert_eq!(KernelError::from(Error::NotFound(7)), KernelError::NoProcess);
    }

    #[test]
    fn test_exhaustion_class() {
        assert!(Error::ContextExhausted.is_exhaustion());
        assert!(!Error::InvalidState("terminated").is_exhaustion());
    }
}
