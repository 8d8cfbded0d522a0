//! Boot sequencing
//!
//! Boot runs in two phases, each its own type:
//!
//! 1. [`EarlyKernel`]: no allocator yet. The primary CPU is described from
//!    static resources and the bootstrap process is built directly around
//!    the boot memory context.
//! 2. [`Kernel`]: the allocator is up. The process pool and PID table exist,
//!    the bootstrap process is registered at PID 0 and secondary CPUs are
//!    registered.
//!
//! There is no process table before [`EarlyKernel::init`] returns, so no
//! table operation can run against an uninitialized table.

use alloc::sync::Arc;

use nos_api::{
    CpuId, Error, ForkFlags, KernelAllocator, KernelError, MemoryContext, MemoryContextEngine, Pid,
    Result,
};
use nos_api::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard};

use crate::arch::ArchOps;
use crate::config::{KernelConfig, BOOTSTRAP_PID};
use crate::cpu::CpuRegistry;
use crate::process::{Process, ProcessManager};

// ============================================================================
// Early phase
// ============================================================================

/// Kernel state before dynamic allocation is available
pub struct EarlyKernel {
    arch: Arc<dyn ArchOps>,
    mm: Arc<dyn MemoryContextEngine>,
    cpus: CpuRegistry,
    bootstrap: Process,
}

impl EarlyKernel {
    /// Run the early phase
    ///
    /// Describes the primary CPU, builds the bootstrap process around
    /// `boot_context` and captures the registers it will resume from.
    pub fn new(
        arch: Arc<dyn ArchOps>,
        mm: Arc<dyn MemoryContextEngine>,
        boot_context: MemoryContext,
    ) -> Self {
        let cpus = CpuRegistry::early_init(BOOTSTRAP_PID);
        arch.setup_cpu(cpus.primary());

        let mut bootstrap = Process::bootstrap(boot_context);
        bootstrap.regs.sp = cpus.primary().kstack.top();
        bootstrap.regs = arch.capture_registers(&bootstrap);
        log::info!("boot: early phase complete, bootstrap pid {}", BOOTSTRAP_PID);

        Self {
            arch,
            mm,
            cpus,
            bootstrap,
        }
    }

    /// The bootstrap process, not yet in any table
    pub fn bootstrap(&self) -> &Process {
        &self.bootstrap
    }

    /// CPU registry holding only the primary
    pub fn cpus(&self) -> &CpuRegistry {
        &self.cpus
    }

    /// Run the full phase
    ///
    /// In order: process pool and PID table, bootstrap registration at PID 0,
    /// bootstrap made current on CPU 0, its address map initialized, then
    /// secondary CPUs registered. Fails on an invalid `config` or when the
    /// table cannot be allocated; failing to register a CPU is fatal.
    pub fn init(
        self,
        allocator: Arc<dyn KernelAllocator>,
        config: &KernelConfig,
    ) -> Result<Kernel> {
        config.validate()?;

        let mut processes =
            ProcessManager::new(config.pid_max, config.max_processes, self.mm.clone())?;
        processes.register_bootstrap(self.bootstrap)?;

        let mut cpus = self.cpus;
        cpus.get_mut(0).current = Some(BOOTSTRAP_PID);
        processes.init_address_map(BOOTSTRAP_PID)?;

        cpus.init(config.num_cpus, &*allocator);
        log::info!(
            "boot: full phase complete, pid_max {}, {} CPU(s)",
            config.pid_max,
            config.num_cpus
        );

        Ok(Kernel {
            processes: Mutex::new(processes),
            cpus: RwLock::new(cpus),
            arch: self.arch,
            allocator,
        })
    }
}

// ============================================================================
// Full phase
// ============================================================================

/// The booted kernel core
///
/// Lock order: `processes` before `cpus`.
pub struct Kernel {
    processes: Mutex<ProcessManager>,
    cpus: RwLock<CpuRegistry>,
    arch: Arc<dyn ArchOps>,
    allocator: Arc<dyn KernelAllocator>,
}

impl Kernel {
    /// Fork `parent`; see [`ProcessManager::copy_process`]
    pub fn fork(&self, parent: Pid, flags: ForkFlags) -> Result<Pid> {
        self.processes.lock().copy_process(parent, flags)
    }

    /// Fork the process running on the calling CPU
    pub fn fork_current(&self, flags: ForkFlags) -> Result<Pid> {
        let cpu = self.arch.current_cpu_id();
        let current = self.cpus.read().get(cpu).current;
        match current {
            Some(pid) => self.fork(pid, flags),
            None => Err(Error::InvalidState("no process running on this CPU")),
        }
    }

    /// `fork` as seen by a system-call handler: errno-style failures
    pub fn sys_fork(&self, flags: ForkFlags) -> core::result::Result<Pid, KernelError> {
        self.fork_current(flags).map_err(KernelError::from)
    }

    /// Free a terminated process and clear it from any CPU running it
    pub fn free_process(&self, pid: Pid) -> Result<()> {
        let mut processes = self.processes.lock();
        processes.free_process(pid)?;

        let mut cpus = self.cpus.write();
        for id in 0..cpus.cpu_count() {
            let cpu = cpus.get_mut(id);
            if cpu.current == Some(pid) {
                cpu.current = None;
            }
        }
        Ok(())
    }

    /// Lock the process manager
    pub fn processes(&self) -> MutexGuard<'_, ProcessManager> {
        self.processes.lock()
    }

    /// Read access to the CPU registry
    pub fn cpus(&self) -> RwLockReadGuard<'_, CpuRegistry> {
        self.cpus.read()
    }

    /// PID of the bootstrap process
    pub fn bootstrap(&self) -> Pid {
        BOOTSTRAP_PID
    }

    /// Record `pid` as the process running on `cpu`
    ///
    /// `cpu` must be registered. An unknown `pid` is refused.
    pub fn set_current_process(&self, cpu: CpuId, pid: Option<Pid>) -> Result<()> {
        let processes = self.processes.lock();
        if let Some(pid) = pid {
            if warn_on!(processes.get(pid).is_none(), "sched: pid {} is not registered", pid) {
                return Err(Error::NotFound(pid));
            }
        }
        self.cpus.write().get_mut(cpu).current = pid;
        Ok(())
    }

    /// Process running on the calling CPU
    pub fn current_process(&self) -> Option<Pid> {
        let cpu = self.arch.current_cpu_id();
        self.cpus.read().get(cpu).current
    }

    /// Bring secondary CPU `id` online
    pub fn start_cpu(&self, id: CpuId) -> Result<()> {
        let mut cpus = self.cpus.write();
        let cpu = cpus.get_mut(id);
        if cpu.started {
            return Err(Error::InvalidState("cpu already started"));
        }
        self.arch.setup_cpu(cpu);
        cpu.started = true;
        log::info!("cpu: CPU {} started", id);
        Ok(())
    }

    /// Number of started CPUs, primary included
    pub fn cpus_started(&self) -> usize {
        self.cpus.read().started_count()
    }

    /// Generic allocator the kernel was booted with
    pub fn allocator(&self) -> &Arc<dyn KernelAllocator> {
        &self.allocator
    }
}
