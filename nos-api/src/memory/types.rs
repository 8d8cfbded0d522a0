//! Memory management types

use alloc::vec::Vec;
use bitflags::bitflags;

use crate::core::types::{Size, VirtAddr};

/// Raw identifier of a memory context, as known to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub u64);

/// An exclusively-owned memory context (page-table root)
///
/// Deliberately neither `Clone` nor `Copy`: the only way to get rid of one is
/// to hand it back to [`super::MemoryContextEngine::destroy_context`], so a
/// context is destroyed at most once.
#[derive(Debug, PartialEq, Eq)]
pub struct MemoryContext {
    id: ContextId,
}

impl MemoryContext {
    /// Wraps a context identifier freshly produced by an engine
    pub const fn new(id: ContextId) -> Self {
        Self { id }
    }

    /// Identifier of this context
    pub const fn id(&self) -> ContextId {
        self.id
    }
}

/// One region of a process virtual address space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmRegion {
    /// Start address (inclusive)
    pub start: VirtAddr,
    /// End address (exclusive)
    pub end: VirtAddr,
}

impl VmRegion {
    /// Size of the region in bytes
    pub fn size(&self) -> Size {
        self.end - self.start
    }
}

/// Address-space map: bookkeeping of a process's virtual regions
///
/// Bound to exactly one memory context once initialized. Deinitializing a map
/// that was never initialized is a no-op.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AddressMap {
    context: Option<ContextId>,
    regions: Vec<VmRegion>,
}

impl AddressMap {
    /// An unbound, empty map
    pub const fn new() -> Self {
        Self {
            context: None,
            regions: Vec::new(),
        }
    }

    /// Binds the map to `context`, discarding any previous regions
    pub fn bind(&mut self, context: ContextId) {
        self.context = Some(context);
        self.regions.clear();
    }

    /// Unbinds the map and drops its regions
    pub fn unbind(&mut self) {
        self.context = None;
        self.regions.clear();
    }

    /// Context this map describes, if initialized
    pub fn context(&self) -> Option<ContextId> {
        self.context
    }

    /// True once bound to a context
    pub fn is_initialized(&self) -> bool {
        self.context.is_some()
    }

    /// Records a region
    pub fn insert(&mut self, region: VmRegion) {
        self.regions.push(region);
    }

    /// Recorded regions
    pub fn regions(&self) -> &[VmRegion] {
        &self.regions
    }
}

bitflags! {
    /// Flags for the generic kernel allocator
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AllocFlags: u32 {
        /// Zero-fill the returned block
        const ZERO = 0x1;
        /// Allocation must not fail; the allocator panics on exhaustion
        const NOFAIL = 0x2;
    }
}

/// A block handed out by the generic allocator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    /// Start address
    pub addr: VirtAddr,
    /// Size in bytes
    pub size: Size,
}

impl Block {
    /// One past the last byte of the block
    pub fn end(&self) -> VirtAddr {
        self.addr + self.size
    }
}
