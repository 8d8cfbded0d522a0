//! Memory management interface

use crate::core::types::Size;
use crate::error::Result;
use super::types::{AddressMap, AllocFlags, Block, ContextId, MemoryContext};

/// Trait for the memory-context (page-table) engine
///
/// The process core decides *when* contexts are created, copied and torn
/// down; implementations own *how*.
pub trait MemoryContextEngine: Send + Sync {
    /// Creates a fresh, empty memory context
    fn create_context(&self) -> Result<MemoryContext>;

    /// Destroys a context and every mapping it holds
    fn destroy_context(&self, ctx: MemoryContext);

    /// Duplicates the kernel-space mappings of `src` into `dst`
    fn copy_kernel_mappings(&self, dst: ContextId, src: ContextId) -> Result<()>;

    /// Duplicates the user-space mappings of `src` into `dst`
    ///
    /// `dst` must not share any page-table structure with `src` afterwards.
    fn copy_user_mappings(&self, dst: ContextId, src: ContextId) -> Result<()>;

    /// Initializes `map` as the address-space map of `ctx`
    fn init_address_map(&self, map: &mut AddressMap, ctx: ContextId);

    /// Tears down `map`; a no-op for a map that was never initialized
    fn deinit_address_map(&self, map: &mut AddressMap);
}

/// Trait for the generic kernel allocator
pub trait KernelAllocator: Send + Sync {
    /// Allocates `size` bytes
    ///
    /// With [`AllocFlags::NOFAIL`] the allocator panics instead of returning
    /// an error.
    fn alloc(&self, size: Size, flags: AllocFlags) -> Result<Block>;

    /// Bytes still available
    fn available(&self) -> Size;
}
