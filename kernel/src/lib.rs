//! NOS Kernel Library
//!
//! The process-lifecycle and CPU-bootstrap core of the NOS kernel.
//!
//! # Architecture
//!
//! - **CPU Registry** (`cpu`): per-CPU descriptors, kernel stacks and per-CPU storage
//! - **Process Management** (`process`): PID table, construction/destruction, fork
//! - **Boot** (`boot`): the two-phase bootstrap sequencer and the [`Kernel`] context
//! - **Arch** (`arch`): register capture and CPU setup seam
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use kernel::arch::HostedArch;
//! use kernel::boot::EarlyKernel;
//! use kernel::config::KernelConfig;
//! use nos_api::{ForkFlags, MemoryContextEngine};
//! use nos_memory_management::{HeapAllocator, PageTableEngine};
//!
//! let mm = Arc::new(PageTableEngine::new(64));
//! let boot_ctx = mm.create_context().unwrap();
//! let early = EarlyKernel::new(Arc::new(HostedArch::new()), mm, boot_ctx);
//! let kernel = early
//!     .init(Arc::new(HeapAllocator::kernel()), &KernelConfig::default())
//!     .unwrap();
//!
//! let child = kernel.fork(0, ForkFlags::COPY_USER).unwrap();
//! assert_eq!(child, 1);
//! ```

#![cfg_attr(not(test), no_std)]

extern crate alloc;

#[doc(hidden)]
pub use log;

#[macro_use]
pub mod error;

pub mod arch;
pub mod boot;
pub mod config;
pub mod cpu;
pub mod process;

// Re-export key types for external use
pub use crate::boot::{EarlyKernel, Kernel};
pub use crate::config::KernelConfig;
pub use crate::cpu::{CpuDescriptor, CpuRegistry};
pub use crate::process::{Process, ProcessManager};
