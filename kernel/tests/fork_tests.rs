//! Fork tests
//! Tests for process duplication, mapping copies and failure rollback

mod common;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use kernel::config::KernelConfig;
use kernel::process::{ForkFlags, ProcessManager, ProcessState};
use nos_api::{ContextId, Error, MappingKind, MemoryContext};
use nos_memory_management::vm::flags;
use nos_memory_management::{KERNEL_BASE, PAGE_SIZE};

use common::USER_TEXT;

#[test]
fn test_fork_without_user_copy() {
    let (kernel, mm, _arch) = common::boot(KernelConfig::default());
    let parent = kernel.fork(kernel.bootstrap(), ForkFlags::COPY_USER).unwrap();
    let parent_ctx = kernel.processes().find(parent).unwrap().context_id().unwrap();
    let kernel_at_fork = mm.mappings(parent_ctx, MappingKind::Kernel);

    let child = kernel.fork(parent, ForkFlags::empty()).unwrap();
    let child_ctx = kernel.processes().find(child).unwrap().context_id().unwrap();

    assert_eq!(mm.mapping_count(child_ctx, MappingKind::User), Some(0));
    assert!(mm.translate(child_ctx, USER_TEXT).is_none());
    assert_eq!(mm.mappings(child_ctx, MappingKind::Kernel), kernel_at_fork);
    assert!(kernel.processes().find(child).unwrap().vmmap().regions().is_empty());
}

#[test]
fn test_child_address_space_is_independent() {
    let (kernel, mm, _arch) = common::boot(KernelConfig::default());
    let parent = kernel.fork(kernel.bootstrap(), ForkFlags::COPY_USER).unwrap();
    let child = kernel.fork(parent, ForkFlags::COPY_USER).unwrap();

    let (parent_ctx, child_ctx) = {
        let procs = kernel.processes();
        (
            procs.find(parent).unwrap().context_id().unwrap(),
            procs.find(child).unwrap().context_id().unwrap(),
        )
    };
    assert_ne!(parent_ctx, child_ctx);

    mm.map(child_ctx, USER_TEXT + PAGE_SIZE, 0x30_0000, flags::READ | flags::USER)
        .unwrap();
    mm.unmap(parent_ctx, USER_TEXT).unwrap();

    assert!(mm.translate(parent_ctx, USER_TEXT + PAGE_SIZE).is_none());
    assert!(mm.translate(child_ctx, USER_TEXT).is_some());
}

#[test]
fn test_child_links_exactly_once() {
    let (kernel, _mm, _arch) = common::boot(KernelConfig::default());
    let root = kernel.bootstrap();
    let a = kernel.fork(root, ForkFlags::COPY_USER).unwrap();
    let b = kernel.fork(root, ForkFlags::empty()).unwrap();

    let procs = kernel.processes();
    assert_eq!(procs.children(root), Some(&[a, b][..]));
    assert_eq!(procs.find(a).unwrap().ppid(), Some(root));
    assert_eq!(procs.get(root).unwrap().ppid(), None);
}

#[test]
fn test_fork_current_uses_running_process() {
    let (kernel, _mm, _arch) = common::boot(KernelConfig::default());
    let child = kernel.fork_current(ForkFlags::empty()).unwrap();
    assert_eq!(kernel.processes().find(child).unwrap().ppid(), Some(kernel.bootstrap()));
}

#[test]
fn test_failed_kernel_copy_rolls_back() {
    let mut engine = common::mock_engine();
    engine
        .expect_copy_kernel_mappings()
        .times(1)
        .returning(|_, _| Err(Error::MappingCopyFailed(MappingKind::Kernel)));
    engine.expect_copy_user_mappings().never();
    engine
        .expect_destroy_context()
        .withf(|ctx: &MemoryContext| ctx.id() == ContextId(2))
        .times(1)
        .return_const(());

    let mut procs = ProcessManager::new(16, 16, Arc::new(engine)).unwrap();
    let parent = procs.alloc_process().unwrap();

    let result = procs.copy_process(parent, ForkFlags::COPY_USER);
    assert_eq!(result, Err(Error::MappingCopyFailed(MappingKind::Kernel)));
    assert_eq!(procs.children(parent), Some(&[][..]));
    assert_eq!(procs.process_count(), 1);
    assert_eq!(procs.table().occupied(), 1);
    assert_eq!(procs.find(parent).unwrap().state(), ProcessState::Init);
}

#[test]
fn test_failed_user_copy_rolls_back() {
    let mut engine = common::mock_engine();
    engine.expect_copy_kernel_mappings().times(1).returning(|_, _| Ok(()));
    engine
        .expect_copy_user_mappings()
        .times(1)
        .returning(|_, _| Err(Error::MappingCopyFailed(MappingKind::User)));
    engine.expect_destroy_context().times(1).return_const(());

    let mut procs = ProcessManager::new(16, 16, Arc::new(engine)).unwrap();
    let parent = procs.alloc_process().unwrap();
    let stats_before = procs.pool_stats();

    assert!(procs.copy_process(parent, ForkFlags::COPY_USER).is_err());
    assert_eq!(procs.children(parent), Some(&[][..]));

    let stats = procs.pool_stats();
    assert_eq!(stats.live, stats_before.live);
    assert_eq!(stats.released, stats_before.released + 1);

    // The child's PID went back to the namespace
    assert!(procs.find(2).is_none());
}

#[test]
fn test_context_exhaustion_leaves_parent_alone() {
    let (mm, ctx) = common::boot_engine(2);
    let mut procs = ProcessManager::new(16, 16, mm.clone()).unwrap();
    procs
        .register_bootstrap(kernel::process::Process::bootstrap(ctx))
        .unwrap();
    procs.init_address_map(0).unwrap();

    let child = procs.copy_process(0, ForkFlags::COPY_USER).unwrap();
    assert_eq!(procs.copy_process(0, ForkFlags::empty()), Err(Error::ContextExhausted));
    assert_eq!(procs.children(0), Some(&[child][..]));
    assert_eq!(mm.context_count(), 2);
    assert_eq!(mm.mapping_count(ContextId(1), MappingKind::Kernel), Some(2));
    assert!(mm.translate(ContextId(1), KERNEL_BASE).is_some());
}

#[test]
fn test_fork_unknown_parent() {
    let (kernel, _mm, _arch) = common::boot(KernelConfig::default());
    assert_eq!(kernel.fork(500, ForkFlags::empty()), Err(Error::NotFound(500)));
    assert_eq!(kernel.processes().process_count(), 1);
}

#[test]
fn test_concurrent_forks_get_unique_pids() {
    const THREADS: usize = 8;
    const FORKS: usize = 25;

    let (kernel, _mm, _arch) = common::boot(KernelConfig::default());
    let kernel = Arc::new(kernel);
    let root = kernel.bootstrap();

    let workers: Vec<_> = (0..THREADS)
        .map(|_| {
            let kernel = Arc::clone(&kernel);
            thread::spawn(move || {
                (0..FORKS)
                    .map(|_| kernel.fork(root, ForkFlags::COPY_USER).unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();
    let pids: Vec<_> = workers
        .into_iter()
        .flat_map(|worker| worker.join().unwrap())
        .collect();

    let unique: BTreeSet<_> = pids.iter().copied().collect();
    assert_eq!(unique.len(), THREADS * FORKS);

    let procs = kernel.processes();
    let children = procs.children(root).unwrap();
    assert_eq!(children.len(), THREADS * FORKS);
    assert_eq!(children.iter().copied().collect::<BTreeSet<_>>(), unique);
    for &pid in &pids {
        assert_eq!(procs.find(pid).unwrap().ppid(), Some(root));
    }
}
