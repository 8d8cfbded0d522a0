//! NOS API - Shared types and collaborator interfaces for the NOS process core
//!
//! This crate provides the types and interfaces shared between the process
//! core (`kernel`) and the collaborators it consumes but does not own.
//!
//! # Architecture
//!
//! The API is organized into a few key modules:
//!
//! - **Core**: Identifier types and syscall-facing error codes
//! - **Error**: The common error type and `Result` alias
//! - **Memory**: Memory-context engine and allocator interfaces
//! - **Process**: Process state and fork request flags
//! - **Sync**: Lock types shared by every NOS crate
//!
//! # Usage
//!
//! ```rust
//! use nos_api::{Error, ForkFlags, KernelError};
//!
//! let flags = ForkFlags::COPY_USER;
//! assert!(flags.contains(ForkFlags::COPY_USER));
//!
//! let errno = KernelError::from(Error::PidExhausted).errno();
//! assert_eq!(errno, 11);
//! ```

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(missing_docs)]

extern crate alloc;

// Core modules
pub mod core;
pub mod error;
pub mod memory;
pub mod process;
pub mod sync;

// Re-export commonly used types
pub use crate::core::types::*;
pub use crate::error::{Error, MappingKind, Result};
pub use crate::memory::interface::{KernelAllocator, MemoryContextEngine};
pub use crate::memory::types::{
    AddressMap, AllocFlags, Block, ContextId, MemoryContext, VmRegion,
};
pub use crate::process::types::{ForkFlags, ProcessState};
