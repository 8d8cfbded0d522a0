//! Virtual Memory module
//! Page entries stored in a memory context

/// Page table entry as stored by [`crate::PageTableEngine`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Frame address backing the page
    pub addr: usize,
    /// Mapping flags, see [`flags`]
    pub flags: u64,
}

impl Page {
    /// Creates an entry with `flags`
    pub fn with_flags(addr: usize, flags: u64) -> Self {
        Self {
            addr,
            flags,
        }
    }
}

/// Memory mapping flags
pub mod flags {
    /// Readable
    pub const READ: u64 = 0x1;
    /// Writable
    pub const WRITE: u64 = 0x2;
    /// Executable
    pub const EXEC: u64 = 0x4;
    /// Accessible from user mode
    pub const USER: u64 = 0x8;
    /// Global (not flushed on context switch)
    pub const GLOBAL: u64 = 0x10;
}
