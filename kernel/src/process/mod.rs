//! Process management
//!
//! - [`table`]: PID namespace and the PID-to-process table
//! - [`manager`]: process construction, destruction and lookup
//! - [`fork`]: duplication of a process into a child

pub mod fork;
pub mod manager;
pub mod table;

pub use manager::ProcessManager;
pub use nos_api::{ForkFlags, Pid, ProcessState};
pub use table::PidTable;

use alloc::vec::Vec;

use nos_api::{AddressMap, ContextId, MemoryContext};

use crate::arch::RegisterSnapshot;
use crate::config::BOOTSTRAP_PID;

/// Process control block
///
/// Owned by the process pool. The PID table and CPU descriptors refer to it
/// by PID only; `children` holds PIDs, never references.
#[derive(Debug, Default)]
pub struct Process {
    pub(crate) pid: Option<Pid>,
    pub(crate) ppid: Option<Pid>,
    pub(crate) state: ProcessState,
    pub(crate) context: Option<MemoryContext>,
    pub(crate) vmmap: AddressMap,
    pub(crate) children: Vec<Pid>,
    /// Saved register state
    pub regs: RegisterSnapshot,
}

impl Process {
    /// The bootstrap process, built directly around the boot memory context
    ///
    /// Its address map stays uninitialized until the full boot phase.
    pub fn bootstrap(context: MemoryContext) -> Self {
        Self {
            pid: Some(BOOTSTRAP_PID),
            ppid: None,
            state: ProcessState::Init,
            context: Some(context),
            vmmap: AddressMap::new(),
            children: Vec::new(),
            regs: RegisterSnapshot::new(),
        }
    }

    /// Reset every field to its empty value
    ///
    /// Must only run on an object that holds no PID and no context.
    pub(crate) fn reset(&mut self) {
        self.pid = None;
        self.ppid = None;
        self.state = ProcessState::Init;
        self.context = None;
        self.vmmap = AddressMap::new();
        self.children.clear();
        self.regs = RegisterSnapshot::new();
    }

    pub fn pid(&self) -> Option<Pid> {
        self.pid
    }

    /// Parent PID, `None` for the bootstrap process
    pub fn ppid(&self) -> Option<Pid> {
        self.ppid
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Id of the owned memory context
    pub fn context_id(&self) -> Option<ContextId> {
        self.context.as_ref().map(MemoryContext::id)
    }

    /// Address-space map
    pub fn vmmap(&self) -> &AddressMap {
        &self.vmmap
    }

    /// PIDs of the children of this process
    pub fn children(&self) -> &[Pid] {
        &self.children
    }
}
