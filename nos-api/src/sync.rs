//! Synchronization primitives for the NOS process core
//!
//! This module provides the lock types shared by all NOS crates
//! for use in a no_std environment.

pub use spin::{Mutex, MutexGuard};
pub use spin::{RwLock, RwLockReadGuard, RwLockWriteGuard};
