// SMP (Symmetric Multi-Processing) Support
// Per-CPU descriptors and multi-core registration

use alloc::vec::Vec;
use core::cell::UnsafeCell;

use nos_api::{AllocFlags, CpuId, KernelAllocator, Pid, Size, VirtAddr};
use nos_memory_management::PERCPU_START;

use crate::config::{KSTACK_SIZE, PERCPU_SIZE};

/// Kernel stack region of one CPU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelStack {
    pub base: VirtAddr,
    pub size: Size,
}

impl KernelStack {
    /// Initial stack pointer (stacks grow down)
    pub fn top(&self) -> VirtAddr {
        self.base + self.size
    }
}

/// Per-CPU storage block of one CPU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PercpuArea {
    pub base: VirtAddr,
    pub size: Size,
}

/// Per-CPU state
#[derive(Debug)]
pub struct CpuDescriptor {
    /// CPU ID, 0 for the primary
    pub id: CpuId,
    /// Kernel stack owned by this CPU
    pub kstack: KernelStack,
    /// Per-CPU storage owned by this CPU
    pub percpu: PercpuArea,
    /// Process currently executing here (None if idle)
    pub current: Option<Pid>,
    /// Is this CPU started?
    pub started: bool,
}

impl CpuDescriptor {
    pub fn is_primary(&self) -> bool {
        self.id == 0
    }
}

// ============================================================================
// Static boot stack
// ============================================================================

#[repr(C, align(16))]
struct BootStack(UnsafeCell<[u8; KSTACK_SIZE]>);

// Only the primary CPU runs on it, and only through its stack pointer.
unsafe impl Sync for BootStack {}

static BOOT_STACK: BootStack = BootStack(UnsafeCell::new([0; KSTACK_SIZE]));

fn boot_stack() -> KernelStack {
    KernelStack {
        base: BOOT_STACK.0.get() as VirtAddr,
        size: KSTACK_SIZE,
    }
}

// ============================================================================
// Registry
// ============================================================================

/// All registered CPUs: the static primary plus the heap-allocated secondaries
#[derive(Debug)]
pub struct CpuRegistry {
    primary: CpuDescriptor,
    secondaries: Vec<CpuDescriptor>,
}

impl CpuRegistry {
    /// Populate the primary descriptor without touching the allocator
    ///
    /// The primary runs on the static boot stack, uses the linker-reserved
    /// per-CPU block and is executing `bootstrap`.
    pub fn early_init(bootstrap: Pid) -> Self {
        let primary = CpuDescriptor {
            id: 0,
            kstack: boot_stack(),
            percpu: PercpuArea {
                base: PERCPU_START,
                size: PERCPU_SIZE,
            },
            current: Some(bootstrap),
            started: true,
        };
        log::info!("cpu: primary CPU 0 ready, stack top {:#x}", primary.kstack.top());

        Self {
            primary,
            secondaries: Vec::new(),
        }
    }

    /// Register `num_cpus - 1` secondary CPUs
    ///
    /// Each secondary gets a kernel stack and a per-CPU block from
    /// `allocator` and starts idle. Failure to allocate is fatal: a CPU that
    /// cannot be registered cannot be brought online.
    pub fn init(&mut self, num_cpus: usize, allocator: &dyn KernelAllocator) {
        bug_on!(num_cpus == 0, "cpu: init with zero CPUs");
        bug_on!(!self.secondaries.is_empty(), "cpu: secondaries already registered");

        let count = num_cpus - 1;
        if self.secondaries.try_reserve_exact(count).is_err() {
            panic!("cpu: cannot allocate descriptors for {} secondary CPUs", count);
        }

        let flags = AllocFlags::ZERO | AllocFlags::NOFAIL;
        for id in 1..num_cpus {
            let kstack = allocator
                .alloc(KSTACK_SIZE, flags)
                .unwrap_or_else(|err| panic!("cpu: no kernel stack for CPU {}: {}", id, err));
            let percpu = allocator
                .alloc(PERCPU_SIZE, flags)
                .unwrap_or_else(|err| panic!("cpu: no per-CPU block for CPU {}: {}", id, err));

            self.secondaries.push(CpuDescriptor {
                id,
                kstack: KernelStack {
                    base: kstack.addr,
                    size: kstack.size,
                },
                percpu: PercpuArea {
                    base: percpu.addr,
                    size: percpu.size,
                },
                current: None,
                started: false,
            });
        }

        log::info!("cpu: {} CPU(s) registered", self.cpu_count());
    }

    /// Descriptor of CPU `id`; `id` must be below [`cpu_count`](Self::cpu_count)
    pub fn get(&self, id: CpuId) -> &CpuDescriptor {
        bug_on!(id >= self.cpu_count(), "cpu: id {} out of range ({} CPUs)", id, self.cpu_count());
        if id == 0 {
            &self.primary
        } else {
            &self.secondaries[id - 1]
        }
    }

    /// Mutable descriptor of CPU `id`; same bounds rule as [`get`](Self::get)
    pub fn get_mut(&mut self, id: CpuId) -> &mut CpuDescriptor {
        bug_on!(id >= self.cpu_count(), "cpu: id {} out of range ({} CPUs)", id, self.cpu_count());
        if id == 0 {
            &mut self.primary
        } else {
            &mut self.secondaries[id - 1]
        }
    }

    /// The primary descriptor
    pub fn primary(&self) -> &CpuDescriptor {
        &self.primary
    }

    /// Number of registered CPUs, primary included
    pub fn cpu_count(&self) -> usize {
        self.secondaries.len() + 1
    }

    /// Number of CPUs marked started
    pub fn started_count(&self) -> usize {
        self.iter().filter(|cpu| cpu.started).count()
    }

    /// All descriptors in id order
    pub fn iter(&self) -> impl Iterator<Item = &CpuDescriptor> {
        core::iter::once(&self.primary).chain(self.secondaries.iter())
    }
}
