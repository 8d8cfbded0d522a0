//! Core Process Management
//!
//! This module provides the process lifecycle primitives:
//! - Process construction (`proc_init`) and destruction (`proc_deinit`)
//! - Process table registration and lookup
//! - Process release back to the allocation pool
//!
//! Every process object lives in an [`ObjectPool`]. Releasing an object runs
//! [`proc_deinit`] on it, which only tears down what the object actually
//! holds, so a construction that failed half-way is rolled back by simply
//! releasing it.

use alloc::sync::Arc;

use nos_api::{Error, MemoryContextEngine, Pid, ProcessState, Result};
use nos_memory_management::{Destruct, ObjectPool, PoolHandle, PoolStats};

use super::table::PidTable;
use super::Process;
use crate::config::BOOTSTRAP_PID;

// ============================================================================
// Construction / destruction
// ============================================================================

/// What a process needs to tear itself down
pub struct ProcEnv<'a> {
    pub table: &'a mut PidTable,
    pub mm: &'a dyn MemoryContextEngine,
}

impl<'a> Destruct<ProcEnv<'a>> for Process {
    fn destruct(&mut self, env: &mut ProcEnv<'a>) {
        proc_deinit(self, env.table, env.mm);
    }
}

/// Release everything `proc` holds outside the pool
///
/// Each step is guarded by whether the resource is actually held, so this is
/// safe on a partially constructed process and a no-op on an empty one.
fn proc_deinit(proc: &mut Process, table: &mut PidTable, mm: &dyn MemoryContextEngine) {
    if let Some(pid) = proc.pid.take() {
        table.unassign(pid);
    }
    if let Some(context) = proc.context.take() {
        mm.destroy_context(context);
    }
    mm.deinit_address_map(&mut proc.vmmap);
    proc.children.clear();
}

/// Process pool, PID table and the memory engine behind them
///
/// Callers serialize access with one lock around the whole manager; see
/// [`Kernel`](crate::boot::Kernel).
pub struct ProcessManager {
    pub(super) pool: ObjectPool<Process>,
    pub(super) table: PidTable,
    pub(super) mm: Arc<dyn MemoryContextEngine>,
}

impl ProcessManager {
    /// Create an empty manager with a zeroed table of `pid_max` PIDs
    pub fn new(
        pid_max: Pid,
        max_processes: usize,
        mm: Arc<dyn MemoryContextEngine>,
    ) -> Result<Self> {
        Ok(Self {
            pool: ObjectPool::new("process", max_processes),
            table: PidTable::new(pid_max)?,
            mm,
        })
    }

    /// Move the statically built bootstrap process into the pool and table
    pub fn register_bootstrap(&mut self, bootstrap: Process) -> Result<()> {
        bug_on!(
            bootstrap.pid != Some(BOOTSTRAP_PID),
            "proc: bootstrap process has pid {:?}",
            bootstrap.pid
        );
        bug_on!(
            self.table.slot(BOOTSTRAP_PID).is_some(),
            "proc: bootstrap process registered twice"
        );

        let handle = self.pool.insert(bootstrap)?;
        self.table.assign(BOOTSTRAP_PID, handle);
        log::info!("proc: bootstrap process registered as pid {}", BOOTSTRAP_PID);
        Ok(())
    }

    /// Bind the address-space map of `pid` to its memory context
    pub fn init_address_map(&mut self, pid: Pid) -> Result<()> {
        let handle = self.table.slot(pid).ok_or(Error::NotFound(pid))?;
        let proc = self.pool.get_mut(handle).ok_or(Error::NotFound(pid))?;
        let ctx = proc
            .context_id()
            .ok_or(Error::InvalidState("process has no memory context"))?;
        self.mm.init_address_map(&mut proc.vmmap, ctx);
        Ok(())
    }

    /// Construct the object behind `handle`: PID, state, memory context, map
    ///
    /// On failure the object keeps whatever was set up; the caller releases
    /// it and [`proc_deinit`] undoes exactly that.
    fn proc_init(&mut self, handle: PoolHandle) -> Result<Pid> {
        let proc = self
            .pool
            .get_mut(handle)
            .ok_or(Error::InvalidArgument("stale process handle"))?;
        proc.reset();

        let pid = self.table.next_pid().ok_or(Error::PidExhausted)?;
        self.table.assign(pid, handle);
        proc.pid = Some(pid);
        proc.state = ProcessState::Init;

        let context = match self.mm.create_context() {
            Ok(context) => context,
            Err(err) => {
                self.table.unassign(pid);
                proc.pid = None;
                return Err(err);
            }
        };
        let ctx = context.id();
        proc.context = Some(context);
        self.mm.init_address_map(&mut proc.vmmap, ctx);
        Ok(pid)
    }

    /// Acquire and construct a process, rolling back on failure
    pub(super) fn construct(&mut self) -> Result<(Pid, PoolHandle)> {
        let handle = self.pool.acquire(true)?;
        match self.proc_init(handle) {
            Ok(pid) => {
                log::debug!("proc: constructed pid {}", pid);
                Ok((pid, handle))
            }
            Err(err) => {
                log::warn!("proc: construction failed: {}", err);
                self.release(handle);
                Err(err)
            }
        }
    }

    /// Allocate and construct a new process in state `Init`
    pub fn alloc_process(&mut self) -> Result<Pid> {
        self.construct().map(|(pid, _)| pid)
    }

    pub(super) fn release(&mut self, handle: PoolHandle) {
        let mut env = ProcEnv {
            table: &mut self.table,
            mm: &*self.mm,
        };
        let released = self.pool.release(handle, &mut env);
        bug_on!(released.is_err(), "proc: releasing a stale process handle");
    }

    /// Unlink the process behind `handle` from its parent and its children,
    /// then release it
    pub(super) fn release_terminated(&mut self, handle: PoolHandle) {
        let Some(proc) = self.pool.get_mut(handle) else {
            return;
        };
        bug_on!(
            proc.state != ProcessState::Terminated,
            "proc: freeing pid {:?} in state {:?}",
            proc.pid,
            proc.state
        );
        let (pid, ppid) = (proc.pid, proc.ppid);
        let orphans = core::mem::take(&mut proc.children);

        if let (Some(pid), Some(ppid)) = (pid, ppid) {
            let parent = self.table.slot(ppid).and_then(|h| self.pool.get_mut(h));
            if let Some(parent) = parent {
                parent.children.retain(|&child| child != pid);
            }
        }
        // The freed PID can be reissued; orphans must not point at it
        for orphan in orphans {
            if let Some(child) = self.table.slot(orphan).and_then(|h| self.pool.get_mut(h)) {
                child.ppid = None;
            }
        }
        self.release(handle);
    }

    /// Free a terminated process
    ///
    /// Freeing a process in any other state is fatal. The PID becomes free
    /// and the process disappears from its parent's children. Its own
    /// children are orphaned: their `ppid` is cleared.
    pub fn free_process(&mut self, pid: Pid) -> Result<()> {
        let handle = self.table.slot(pid).ok_or(Error::NotFound(pid))?;
        self.release_terminated(handle);
        log::debug!("proc: freed pid {}", pid);
        Ok(())
    }

    /// Set the lifecycle state of `pid`
    pub fn set_state(&mut self, pid: Pid, state: ProcessState) -> Result<()> {
        let handle = self.table.slot(pid).ok_or(Error::NotFound(pid))?;
        let proc = self.pool.get_mut(handle).ok_or(Error::NotFound(pid))?;
        proc.state = state;
        Ok(())
    }

    /// Look up a process by PID; empty for PID 0 and out-of-range PIDs
    pub fn find(&self, pid: Pid) -> Option<&Process> {
        self.table.find(pid).and_then(|handle| self.pool.get(handle))
    }

    /// Mutable [`find`](Self::find)
    pub fn find_mut(&mut self, pid: Pid) -> Option<&mut Process> {
        let handle = self.table.find(pid)?;
        self.pool.get_mut(handle)
    }

    /// Any registered process, the bootstrap process included
    pub fn get(&self, pid: Pid) -> Option<&Process> {
        self.table.slot(pid).and_then(|handle| self.pool.get(handle))
    }

    /// Children of `pid`
    pub fn children(&self, pid: Pid) -> Option<&[Pid]> {
        self.get(pid).map(Process::children)
    }

    /// Grow the PID namespace; see [`PidTable::grow_capacity`]
    pub fn set_pid_max(&mut self, pid_max: Pid) -> Result<()> {
        self.table.grow_capacity(pid_max)
    }

    /// The PID table
    pub fn table(&self) -> &PidTable {
        &self.table
    }

    /// Live processes, the bootstrap process included
    pub fn process_count(&self) -> usize {
        self.pool.len()
    }

    /// Allocation pool statistics
    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }
}
