//! NOS Memory Management
//!
//! This crate provides the memory collaborators the process core consumes:
//! an in-memory page-table engine implementing
//! [`MemoryContextEngine`](nos_api::MemoryContextEngine), typed object pools
//! with destruct-on-release, and the kernel heap allocator.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]

extern crate alloc;

/// Forwards to `log::debug!` when the `log` feature is enabled
macro_rules! mm_debug {
    ($($arg:tt)*) => {
        #[cfg(feature = "log")]
        log::debug!($($arg)*);
    };
}

// Memory management modules
pub mod allocator;
pub mod layout;
pub mod page_table;
pub mod vm;

// Re-export commonly used types
pub use allocator::heap::HeapAllocator;
pub use allocator::mempool::{Destruct, ObjectPool, PoolHandle, PoolStats};
pub use layout::{is_kernel_address, is_user_address, KERNEL_BASE, PAGE_SIZE, PERCPU_START};
pub use page_table::PageTableEngine;
pub use vm::Page;
