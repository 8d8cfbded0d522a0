//! Kernel heap
//!
//! A bump allocator over a fixed virtual window. Kernel stacks and per-CPU
//! areas live as long as the kernel does, so blocks are never returned and
//! the window is never reused: every block comes out of untouched memory,
//! which already satisfies [`AllocFlags::ZERO`].

use nos_api::{AllocFlags, Block, Error, KernelAllocator, Result, Size, VirtAddr};
use spin::Mutex;

use crate::layout::{KERNEL_HEAP_BASE, KERNEL_HEAP_SIZE};

/// Minimum alignment of every block
pub const HEAP_ALIGN: usize = 16;

struct HeapState {
    next: VirtAddr,
    allocations: usize,
}

/// Bump allocator implementing [`KernelAllocator`]
pub struct HeapAllocator {
    base: VirtAddr,
    end: VirtAddr,
    state: Mutex<HeapState>,
}

impl HeapAllocator {
    /// Create an allocator over `[base, base + size)`
    pub const fn new(base: VirtAddr, size: Size) -> Self {
        Self {
            base,
            end: base + size,
            state: Mutex::new(HeapState {
                next: base,
                allocations: 0,
            }),
        }
    }

    /// Allocator over the kernel heap window
    pub const fn kernel() -> Self {
        Self::new(KERNEL_HEAP_BASE, KERNEL_HEAP_SIZE)
    }

    /// Start of the window
    pub fn base(&self) -> VirtAddr {
        self.base
    }

    /// Number of successful allocations
    pub fn allocations(&self) -> usize {
        self.state.lock().allocations
    }
}

impl KernelAllocator for HeapAllocator {
    fn alloc(&self, size: Size, flags: AllocFlags) -> Result<Block> {
        if size == 0 {
            return Err(Error::InvalidArgument("zero-sized allocation"));
        }

        let mut state = self.state.lock();
        let addr = (state.next + HEAP_ALIGN - 1) & !(HEAP_ALIGN - 1);
        let fits = addr
            .checked_add(size)
            .is_some_and(|block_end| block_end <= self.end);

        if !fits {
            if flags.contains(AllocFlags::NOFAIL) {
                panic!(
                    "kernel heap exhausted: {} bytes requested, {} available",
                    size,
                    self.end - state.next
                );
            }
            mm_debug!("heap: allocation of {} bytes failed", size);
            return Err(Error::OutOfMemory);
        }

        state.next = addr + size;
        state.allocations += 1;
        Ok(Block { addr, size })
    }

    fn available(&self) -> Size {
        self.end - self.state.lock().next
    }
}
