//! Kernel configuration
//!
//! Compile-time sizing constants and the runtime [`KernelConfig`] handed to
//! the full boot phase.

use nos_api::{Error, Pid, Result};
use nos_memory_management::PAGE_SIZE;
use static_assertions::const_assert;

// ============================================================================
// Constants
// ============================================================================

/// Maximum number of CPUs supported
pub const MAX_CPUS: usize = 64;

/// Kernel stack size per CPU
pub const KSTACK_SIZE: usize = 4 * PAGE_SIZE;

/// Per-CPU storage block size
pub const PERCPU_SIZE: usize = PAGE_SIZE;

/// Default PID namespace capacity
pub const PID_MAX_DEFAULT: Pid = 65535;

/// Hard ceiling on the PID namespace; the table holds one slot per PID
pub const PID_MAX_LIMIT: Pid = 1 << 22;

/// Default upper bound on live process objects
pub const MAX_PROCESSES_DEFAULT: usize = 4096;

/// PID of the bootstrap process
pub const BOOTSTRAP_PID: Pid = 0;

const_assert!(KSTACK_SIZE % PAGE_SIZE == 0);
const_assert!(PERCPU_SIZE % PAGE_SIZE == 0);
const_assert!(MAX_CPUS >= 1);
const_assert!(PID_MAX_DEFAULT >= 1);
const_assert!(PID_MAX_DEFAULT <= PID_MAX_LIMIT);

// ============================================================================
// Runtime configuration
// ============================================================================

/// Configuration consumed by [`EarlyKernel::init`](crate::boot::EarlyKernel::init)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    /// Initial PID namespace capacity (`1..=pid_max`)
    pub pid_max: Pid,
    /// Number of CPUs to register, primary included
    pub num_cpus: usize,
    /// Upper bound on live process objects in the allocation pool
    pub max_processes: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            pid_max: PID_MAX_DEFAULT,
            num_cpus: 1,
            max_processes: MAX_PROCESSES_DEFAULT,
        }
    }
}

impl KernelConfig {
    /// Same configuration with `num_cpus` CPUs
    pub fn with_cpus(mut self, num_cpus: usize) -> Self {
        self.num_cpus = num_cpus;
        self
    }

    /// Same configuration with a PID namespace of `pid_max`
    pub fn with_pid_max(mut self, pid_max: Pid) -> Self {
        self.pid_max = pid_max;
        self
    }

    /// Same configuration with at most `max_processes` live processes
    pub fn with_max_processes(mut self, max_processes: usize) -> Self {
        self.max_processes = max_processes;
        self
    }

    /// Check that the configuration can boot
    pub fn validate(&self) -> Result<()> {
        if self.pid_max == 0 {
            return Err(Error::InvalidArgument("pid_max must be at least 1"));
        }
        if self.pid_max > PID_MAX_LIMIT {
            return Err(Error::InvalidArgument("pid_max exceeds PID_MAX_LIMIT"));
        }
        if self.num_cpus == 0 {
            return Err(Error::InvalidArgument("at least one CPU is required"));
        }
        if self.num_cpus > MAX_CPUS {
            return Err(Error::InvalidArgument("num_cpus exceeds MAX_CPUS"));
        }
        if self.max_processes == 0 {
            return Err(Error::InvalidArgument("max_processes must be at least 1"));
        }
        Ok(())
    }
}
