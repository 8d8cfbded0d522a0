//! Memory address space layout definitions
//!
//! The process core only needs a handful of fixed addresses: where kernel
//! space starts (to split kernel from user mappings), where the kernel heap
//! window lives, and the base of the primary CPU's per-CPU storage.

use static_assertions::const_assert;

/// Page size in bytes
pub const PAGE_SIZE: usize = 4096;

/// Lowest mappable user address (page 0 stays unmapped)
pub const USER_BASE: usize = 0x0000_0000_0000_1000;

/// Maximum user address (exclusive)
pub const USER_MAX: usize = 0x0000_8000_0000_0000;

/// Start of kernel space
pub const KERNEL_BASE: usize = 0xffff_8000_0000_0000;

/// Kernel heap window used by the generic allocator
pub const KERNEL_HEAP_BASE: usize = 0xffff_c000_0000_0000;

/// Size of the kernel heap window
pub const KERNEL_HEAP_SIZE: usize = 64 * 1024 * 1024;

/// Per-CPU storage base of the primary CPU (linker-reserved, static)
pub const PERCPU_START: usize = 0xffff_ff00_0000_0000;

const_assert!(USER_MAX <= KERNEL_BASE);
const_assert!(KERNEL_HEAP_BASE % PAGE_SIZE == 0);
const_assert!(PERCPU_START > KERNEL_HEAP_BASE + KERNEL_HEAP_SIZE);

/// Check if an address is in kernel space
#[inline]
pub const fn is_kernel_address(addr: usize) -> bool {
    addr >= KERNEL_BASE
}

/// Check if an address is in user space
#[inline]
pub const fn is_user_address(addr: usize) -> bool {
    addr >= USER_BASE && addr < USER_MAX
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_split() {
        assert!(is_user_address(0x40_0000));
        assert!(!is_kernel_address(0x40_0000));
        assert!(is_kernel_address(KERNEL_BASE));
        assert!(!is_user_address(0));
        assert!(!is_user_address(KERNEL_BASE + PAGE_SIZE));
    }
}
