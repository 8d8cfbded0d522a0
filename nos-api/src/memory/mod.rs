//! Memory management module
//!
//! Interfaces the process core consumes from the memory-context engine and
//! the generic kernel allocator, plus the small value types they exchange.

pub mod interface;
pub mod types;

// Re-export commonly used items
pub use interface::*;
pub use types::*;
