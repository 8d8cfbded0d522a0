//! Process management types

use bitflags::bitflags;

bitflags! {
    /// Fork request flags, passed by value to `copy_process`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ForkFlags: u32 {
        /// Also duplicate the parent's user-space mappings
        const COPY_USER = 0x1;
    }
}

/// Process lifecycle state
///
/// The process core only ever writes `Init` (construction) and relies on
/// `Terminated` (destruction); every other transition belongs to the
/// scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessState {
    /// Freshly constructed, not yet handed to the scheduler
    #[default]
    Init,
    /// Ready to run
    Runnable,
    /// Running on some CPU
    Running,
    /// Waiting for an event
    Blocked,
    /// Finished; the only state from which the process may be freed
    Terminated,
}
