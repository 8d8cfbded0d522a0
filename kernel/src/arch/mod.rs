//! Architecture abstraction layer
//!
//! The process core needs two things from the architecture: a snapshot of a
//! process's callee-saved registers, and per-CPU setup when a descriptor is
//! brought online. Both sit behind [`ArchOps`] so the core stays portable;
//! [`HostedArch`] is the implementation used on a hosted target.

use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};

use nos_api::sync::Mutex;
use nos_api::CpuId;

use crate::cpu::CpuDescriptor;
use crate::process::Process;

/// Saved register state of a process
///
/// Callee-saved registers plus stack and instruction pointers, the set a
/// context switch preserves. `retval` is the return-value register, cleared
/// in a forked child so the child observes a zero return.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegisterSnapshot {
    pub pc: usize,
    pub sp: usize,
    pub fp: usize,
    pub callee_saved: [usize; 8],
    pub retval: usize,
}

impl RegisterSnapshot {
    pub const fn new() -> Self {
        Self {
            pc: 0,
            sp: 0,
            fp: 0,
            callee_saved: [0; 8],
            retval: 0,
        }
    }
}

/// Architecture support consumed by the process core
pub trait ArchOps: Send + Sync {
    /// Capture the register state `process` will resume from
    fn capture_registers(&self, process: &Process) -> RegisterSnapshot;

    /// Program per-CPU state (stack, per-CPU base) for `cpu`
    fn setup_cpu(&self, cpu: &CpuDescriptor);

    /// Id of the CPU executing the caller
    fn current_cpu_id(&self) -> CpuId;
}

// ============================================================================
// Hosted implementation
// ============================================================================

/// Entry point recorded in captured snapshots on hosted builds
pub const HOSTED_ENTRY: usize = 0xffff_8000_0010_0000;

/// [`ArchOps`] for hosted builds
///
/// Records which CPUs were set up and lets the caller choose which CPU is
/// "executing", so multi-CPU paths can be driven from one thread.
pub struct HostedArch {
    current: AtomicUsize,
    captures: AtomicUsize,
    setups: Mutex<Vec<CpuId>>,
}

impl HostedArch {
    pub const fn new() -> Self {
        Self {
            current: AtomicUsize::new(0),
            captures: AtomicUsize::new(0),
            setups: Mutex::new(Vec::new()),
        }
    }

    /// Pretend the caller now runs on `cpu`
    pub fn switch_to_cpu(&self, cpu: CpuId) {
        self.current.store(cpu, Ordering::Release);
    }

    /// CPUs passed to `setup_cpu`, in call order
    pub fn setup_calls(&self) -> Vec<CpuId> {
        self.setups.lock().clone()
    }

    /// Number of register captures performed
    pub fn captures(&self) -> usize {
        self.captures.load(Ordering::Acquire)
    }
}

impl Default for HostedArch {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchOps for HostedArch {
    fn capture_registers(&self, process: &Process) -> RegisterSnapshot {
        self.captures.fetch_add(1, Ordering::AcqRel);
        let mut regs = process.regs;
        regs.pc = HOSTED_ENTRY;
        regs
    }

    fn setup_cpu(&self, cpu: &CpuDescriptor) {
        self.setups.lock().push(cpu.id);
    }

    fn current_cpu_id(&self) -> CpuId {
        self.current.load(Ordering::Acquire)
    }
}
