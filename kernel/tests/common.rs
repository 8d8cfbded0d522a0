//! Common test utilities for kernel integration tests

#![allow(dead_code)]

use std::sync::Arc;

use kernel::arch::HostedArch;
use kernel::boot::{EarlyKernel, Kernel};
use kernel::config::KernelConfig;
use kernel::process::ProcessManager;
use mockall::mock;
use nos_api::{AddressMap, ContextId, MemoryContext, MemoryContextEngine, Pid, Result};
use nos_memory_management::vm::flags;
use nos_memory_management::{HeapAllocator, PageTableEngine, KERNEL_BASE, PAGE_SIZE};

/// User address mapped into the boot context
pub const USER_TEXT: usize = 0x40_0000;

mock! {
    pub Engine {}

    impl MemoryContextEngine for Engine {
        fn create_context(&self) -> Result<MemoryContext>;
        fn destroy_context(&self, ctx: MemoryContext);
        fn copy_kernel_mappings(&self, dst: ContextId, src: ContextId) -> Result<()>;
        fn copy_user_mappings(&self, dst: ContextId, src: ContextId) -> Result<()>;
        fn init_address_map(&self, map: &mut AddressMap, ctx: ContextId);
        fn deinit_address_map(&self, map: &mut AddressMap);
    }
}

/// A mock engine whose create/init/deinit behave like a real one
///
/// Contexts are numbered from 1. Tests add expectations for the copy and
/// destroy calls they care about.
pub fn mock_engine() -> MockEngine {
    let mut engine = MockEngine::new();
    let mut next = 0u64;
    engine.expect_create_context().returning(move || {
        next += 1;
        Ok(MemoryContext::new(ContextId(next)))
    });
    engine
        .expect_init_address_map()
        .returning(|map, ctx| map.bind(ctx));
    engine
        .expect_deinit_address_map()
        .returning(|map| map.unbind());
    engine
}

/// A boot context with two kernel pages and one user page
pub fn boot_engine(max_contexts: usize) -> (Arc<PageTableEngine>, MemoryContext) {
    let mm = Arc::new(PageTableEngine::new(max_contexts));
    let ctx = mm.create_context().expect("boot context");
    mm.map(ctx.id(), KERNEL_BASE, 0x10_0000, flags::READ | flags::EXEC | flags::GLOBAL)
        .expect("kernel text");
    mm.map(ctx.id(), KERNEL_BASE + PAGE_SIZE, 0x10_1000, flags::READ | flags::WRITE)
        .expect("kernel data");
    mm.map(ctx.id(), USER_TEXT, 0x20_0000, flags::READ | flags::EXEC | flags::USER)
        .expect("user text");
    (mm, ctx)
}

/// Boot a kernel through both phases on the hosted architecture
pub fn boot(config: KernelConfig) -> (Kernel, Arc<PageTableEngine>, Arc<HostedArch>) {
    let (mm, ctx) = boot_engine(256);
    let arch = Arc::new(HostedArch::new());
    let early = EarlyKernel::new(arch.clone(), mm.clone(), ctx);
    let kernel = early
        .init(Arc::new(HeapAllocator::kernel()), &config)
        .expect("boot");
    (kernel, mm, arch)
}

/// A manager over a fresh page-table engine, no bootstrap process
pub fn manager(pid_max: Pid) -> (ProcessManager, Arc<PageTableEngine>) {
    let mm = Arc::new(PageTableEngine::new(1024));
    let manager = ProcessManager::new(pid_max, 1024, mm.clone()).expect("manager");
    (manager, mm)
}
