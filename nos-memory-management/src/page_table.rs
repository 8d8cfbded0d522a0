//! Page table management module
//!
//! [`PageTableEngine`] keeps one page table per memory context, split into a
//! kernel half (addresses at or above [`KERNEL_BASE`](crate::layout::KERNEL_BASE))
//! and a user half. Tables are plain ordered maps from page address to
//! [`Page`], so a copied context never shares structure with its source.
//!
//! Two budgets model the hardware limits the process core has to cope with:
//! a maximum number of live contexts and a maximum number of page entries
//! across all contexts.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use hashbrown::HashMap;
use nos_api::{
    AddressMap, ContextId, Error, MappingKind, MemoryContext, MemoryContextEngine, Result,
    VirtAddr, VmRegion,
};
use spin::Mutex;

use crate::layout::{is_kernel_address, is_user_address, PAGE_SIZE};
use crate::vm::Page;

/// Page table of a single memory context
#[derive(Debug, Default, Clone)]
struct PageTable {
    kernel: BTreeMap<VirtAddr, Page>,
    user: BTreeMap<VirtAddr, Page>,
}

impl PageTable {
    fn half(&self, kind: MappingKind) -> &BTreeMap<VirtAddr, Page> {
        match kind {
            MappingKind::Kernel => &self.kernel,
            MappingKind::User => &self.user,
        }
    }

    fn half_mut(&mut self, kind: MappingKind) -> &mut BTreeMap<VirtAddr, Page> {
        match kind {
            MappingKind::Kernel => &mut self.kernel,
            MappingKind::User => &mut self.user,
        }
    }

    fn len(&self) -> usize {
        self.kernel.len() + self.user.len()
    }
}

struct EngineState {
    tables: HashMap<ContextId, PageTable>,
    next_id: u64,
    max_contexts: usize,
    max_mappings: usize,
    mappings: usize,
}

impl EngineState {
    fn copy_half(&mut self, dst: ContextId, src: ContextId, kind: MappingKind) -> Result<()> {
        let entries = match self.tables.get(&src) {
            Some(table) => table.half(kind).clone(),
            None => return Err(Error::MappingCopyFailed(kind)),
        };

        let replaced = match self.tables.get(&dst) {
            Some(table) => table.half(kind).len(),
            None => return Err(Error::MappingCopyFailed(kind)),
        };

        let total = self.mappings - replaced + entries.len();
        if total > self.max_mappings {
            mm_debug!(
                "page table: copying {} {} mappings into {:?} exceeds budget",
                entries.len(),
                kind,
                dst
            );
            return Err(Error::MappingCopyFailed(kind));
        }

        if let Some(table) = self.tables.get_mut(&dst) {
            *table.half_mut(kind) = entries;
        }
        self.mappings = total;
        Ok(())
    }
}

/// In-memory page-table engine
pub struct PageTableEngine {
    state: Mutex<EngineState>,
}

impl PageTableEngine {
    /// Create an engine allowing at most `max_contexts` live contexts
    pub fn new(max_contexts: usize) -> Self {
        Self::with_limits(max_contexts, usize::MAX)
    }

    /// Create an engine with both a context and a page-entry budget
    pub fn with_limits(max_contexts: usize, max_mappings: usize) -> Self {
        Self {
            state: Mutex::new(EngineState {
                tables: HashMap::new(),
                next_id: 1,
                max_contexts,
                max_mappings,
                mappings: 0,
            }),
        }
    }

    /// Map the page at `va` to the frame at `frame`
    ///
    /// The half (kernel or user) is chosen from the address. Remapping an
    /// already-mapped page replaces the entry.
    pub fn map(&self, ctx: ContextId, va: VirtAddr, frame: usize, flags: u64) -> Result<()> {
        if va % PAGE_SIZE != 0 {
            return Err(Error::InvalidArgument("unaligned virtual address"));
        }
        let kind = if is_kernel_address(va) {
            MappingKind::Kernel
        } else if is_user_address(va) {
            MappingKind::User
        } else {
            return Err(Error::InvalidArgument("address outside kernel and user space"));
        };

        let mut state = self.state.lock();
        let at_budget = state.mappings >= state.max_mappings;
        let table = state
            .tables
            .get_mut(&ctx)
            .ok_or(Error::InvalidArgument("unknown memory context"))?;

        let half = table.half_mut(kind);
        let fresh = !half.contains_key(&va);
        if fresh && at_budget {
            return Err(Error::OutOfMemory);
        }
        half.insert(va, Page::with_flags(frame, flags));
        if fresh {
            state.mappings += 1;
        }
        Ok(())
    }

    /// Remove the mapping of `va`, returning the old entry
    pub fn unmap(&self, ctx: ContextId, va: VirtAddr) -> Option<Page> {
        let mut state = self.state.lock();
        let table = state.tables.get_mut(&ctx)?;
        let kind = if is_kernel_address(va) {
            MappingKind::Kernel
        } else {
            MappingKind::User
        };
        let page = table.half_mut(kind).remove(&va)?;
        state.mappings -= 1;
        Some(page)
    }

    /// Look up the entry mapping `va`
    pub fn translate(&self, ctx: ContextId, va: VirtAddr) -> Option<Page> {
        let state = self.state.lock();
        let table = state.tables.get(&ctx)?;
        let page_va = va & !(PAGE_SIZE - 1);
        table
            .kernel
            .get(&page_va)
            .or_else(|| table.user.get(&page_va))
            .copied()
    }

    /// Number of entries in one half of a context, `None` for an unknown context
    pub fn mapping_count(&self, ctx: ContextId, kind: MappingKind) -> Option<usize> {
        let state = self.state.lock();
        state.tables.get(&ctx).map(|table| table.half(kind).len())
    }

    /// Snapshot of one half of a context, in address order
    pub fn mappings(&self, ctx: ContextId, kind: MappingKind) -> Vec<(VirtAddr, Page)> {
        let state = self.state.lock();
        state
            .tables
            .get(&ctx)
            .map(|table| table.half(kind).iter().map(|(va, page)| (*va, *page)).collect())
            .unwrap_or_default()
    }

    /// Number of live contexts
    pub fn context_count(&self) -> usize {
        self.state.lock().tables.len()
    }

    /// True if `ctx` is live
    pub fn contains(&self, ctx: ContextId) -> bool {
        self.state.lock().tables.contains_key(&ctx)
    }

    /// Page entries held across all contexts
    pub fn total_mappings(&self) -> usize {
        self.state.lock().mappings
    }
}

impl MemoryContextEngine for PageTableEngine {
    fn create_context(&self) -> Result<MemoryContext> {
        let mut state = self.state.lock();
        if state.tables.len() >= state.max_contexts {
            mm_debug!("page table: context limit {} reached", state.max_contexts);
            return Err(Error::ContextExhausted);
        }
        state
            .tables
            .try_reserve(1)
            .map_err(|_| Error::ContextExhausted)?;

        let id = ContextId(state.next_id);
        state.next_id += 1;
        state.tables.insert(id, PageTable::default());
        mm_debug!("page table: created context {:?}", id);
        Ok(MemoryContext::new(id))
    }

    fn destroy_context(&self, ctx: MemoryContext) {
        let mut state = self.state.lock();
        if let Some(table) = state.tables.remove(&ctx.id()) {
            state.mappings -= table.len();
            mm_debug!("page table: destroyed context {:?}", ctx.id());
        }
    }

    fn copy_kernel_mappings(&self, dst: ContextId, src: ContextId) -> Result<()> {
        self.state.lock().copy_half(dst, src, MappingKind::Kernel)
    }

    fn copy_user_mappings(&self, dst: ContextId, src: ContextId) -> Result<()> {
        self.state.lock().copy_half(dst, src, MappingKind::User)
    }

    fn init_address_map(&self, map: &mut AddressMap, ctx: ContextId) {
        map.bind(ctx);
        let state = self.state.lock();
        let Some(table) = state.tables.get(&ctx) else {
            return;
        };

        // Coalesce contiguous user pages into regions
        let mut current: Option<VmRegion> = None;
        for va in table.user.keys() {
            match current.as_mut() {
                Some(region) if region.end == *va => region.end += PAGE_SIZE,
                _ => {
                    if let Some(region) = current.take() {
                        map.insert(region);
                    }
                    current = Some(VmRegion {
                        start: *va,
                        end: *va + PAGE_SIZE,
                    });
                }
            }
        }
        if let Some(region) = current {
            map.insert(region);
        }
    }

    fn deinit_address_map(&self, map: &mut AddressMap) {
        map.unbind();
    }
}
