//! Memory allocator module
//!
//! - [`mempool`]: typed object pools with generation-checked handles
//! - [`heap`]: the generic kernel heap

pub mod heap;
pub mod mempool;
