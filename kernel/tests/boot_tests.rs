//! Boot sequencing tests
//! Tests for the early and full boot phases

mod common;

use std::sync::Arc;

use kernel::arch::{HostedArch, HOSTED_ENTRY};
use kernel::boot::EarlyKernel;
use kernel::config::{KernelConfig, BOOTSTRAP_PID};
use kernel::process::ProcessState;
use nos_api::{AllocFlags, KernelAllocator};
use nos_memory_management::HeapAllocator;

#[test]
fn test_early_phase_needs_no_allocator() {
    let (mm, ctx) = common::boot_engine(8);
    let boot_id = ctx.id();
    let arch = Arc::new(HostedArch::new());
    let early = EarlyKernel::new(arch.clone(), mm, ctx);

    let bootstrap = early.bootstrap();
    assert_eq!(bootstrap.pid(), Some(BOOTSTRAP_PID));
    assert_eq!(bootstrap.ppid(), None);
    assert_eq!(bootstrap.state(), ProcessState::Init);
    assert_eq!(bootstrap.context_id(), Some(boot_id));
    assert_eq!(bootstrap.regs.pc, HOSTED_ENTRY);
    assert_eq!(early.cpus().cpu_count(), 1);
    assert_eq!(arch.captures(), 1);
}

#[test]
fn test_full_phase_registers_bootstrap() {
    let (kernel, mm, _arch) = common::boot(KernelConfig::default().with_cpus(2));
    let procs = kernel.processes();

    // PID 0 is reachable, but not through the PID lookup
    assert!(procs.find(BOOTSTRAP_PID).is_none());
    let bootstrap = procs.get(BOOTSTRAP_PID).unwrap();
    assert_eq!(bootstrap.pid(), Some(BOOTSTRAP_PID));

    let map = bootstrap.vmmap();
    assert_eq!(map.context(), bootstrap.context_id());
    assert_eq!(map.regions().len(), 1);
    assert_eq!(procs.process_count(), 1);
    assert_eq!(mm.context_count(), 1);
    drop(procs);

    assert_eq!(kernel.current_process(), Some(BOOTSTRAP_PID));
}

#[test]
fn test_secondaries_come_from_allocator() {
    let (mm, ctx) = common::boot_engine(8);
    let heap = Arc::new(HeapAllocator::new(0x1000_0000, 1 << 20));
    let early = EarlyKernel::new(Arc::new(HostedArch::new()), mm, ctx);
    let kernel = early
        .init(heap.clone(), &KernelConfig::default().with_cpus(4))
        .unwrap();

    assert_eq!(heap.allocations(), 6);
    assert!(kernel.cpus().get(3).kstack.base >= heap.base());
    assert!(kernel.allocator().available() < 1 << 20);
    assert!(kernel.allocator().alloc(64, AllocFlags::ZERO).is_ok());
}

#[test]
#[should_panic(expected = "kernel heap exhausted")]
fn test_secondary_registration_failure_is_fatal() {
    let (mm, ctx) = common::boot_engine(8);
    let early = EarlyKernel::new(Arc::new(HostedArch::new()), mm, ctx);
    let tiny = Arc::new(HeapAllocator::new(0x1000_0000, 1024));
    let _ = early.init(tiny, &KernelConfig::default().with_cpus(2));
}

#[test]
fn test_small_pid_space_boot() {
    let config = KernelConfig::default().with_pid_max(2).with_max_processes(8);
    let (kernel, _mm, _arch) = common::boot(config);
    let mut procs = kernel.processes();

    assert_eq!(procs.alloc_process(), Ok(1));
    assert_eq!(procs.alloc_process(), Ok(2));
    assert!(procs.alloc_process().unwrap_err().is_exhaustion());
    assert_eq!(procs.process_count(), 3);
}

#[test]
fn test_sys_fork_reports_errno() {
    let config = KernelConfig::default().with_pid_max(1).with_cpus(2);
    let (kernel, _mm, arch) = common::boot(config);

    assert_eq!(kernel.sys_fork(kernel::process::ForkFlags::empty()), Ok(1));
    let exhausted = kernel.sys_fork(kernel::process::ForkFlags::empty()).unwrap_err();
    assert_eq!(exhausted.errno(), 11);

    arch.switch_to_cpu(1);
    let idle = kernel.sys_fork(kernel::process::ForkFlags::empty()).unwrap_err();
    assert_eq!(idle.errno(), 22);
}
