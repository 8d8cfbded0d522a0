//! PID namespace and process table
//!
//! A dense table from PID to the pool handle of the owning process. Slot 0
//! belongs to the bootstrap process; the allocator scan only ever issues
//! PIDs in `1..=pid_max`.

use alloc::vec::Vec;

use nos_api::{Error, Pid, Result};
use nos_memory_management::PoolHandle;

use crate::config::PID_MAX_LIMIT;

/// Process table with round-robin PID allocation
pub struct PidTable {
    slots: Vec<Option<PoolHandle>>,
    pid_max: Pid,
    last_pid: Pid,
}

impl PidTable {
    /// Create a table covering PIDs `0..=pid_max`, every slot empty
    ///
    /// `pid_max` above [`PID_MAX_LIMIT`] is rejected before anything is
    /// allocated.
    pub fn new(pid_max: Pid) -> Result<Self> {
        let mut table = Self {
            slots: Vec::new(),
            pid_max: 0,
            last_pid: 0,
        };
        table.resize(pid_max)?;
        table.pid_max = pid_max;
        Ok(table)
    }

    fn resize(&mut self, pid_max: Pid) -> Result<()> {
        if pid_max > PID_MAX_LIMIT {
            log::warn!("pid: pid_max {} above limit {}", pid_max, PID_MAX_LIMIT);
            return Err(Error::InvalidArgument("pid_max exceeds PID_MAX_LIMIT"));
        }
        let len = pid_max as usize + 1;
        self.slots
            .try_reserve_exact(len - self.slots.len())
            .map_err(|_| Error::OutOfMemory)?;
        self.slots.resize(len, None);
        Ok(())
    }

    /// Current capacity of the PID namespace
    pub fn pid_max(&self) -> Pid {
        self.pid_max
    }

    /// Last PID issued by [`next_pid`](Self::next_pid)
    pub fn last_pid(&self) -> Pid {
        self.last_pid
    }

    /// Grow the namespace to `new_max`
    ///
    /// Rejected with `InvalidArgument` unless `new_max` is strictly larger
    /// than the current capacity. Existing slots are untouched and the new
    /// ones start empty.
    pub fn grow_capacity(&mut self, new_max: Pid) -> Result<()> {
        if new_max <= self.pid_max {
            log::warn!("pid: refusing to shrink pid_max {} to {}", self.pid_max, new_max);
            return Err(Error::InvalidArgument("pid_max can only grow"));
        }
        self.resize(new_max)?;
        log::debug!("pid: pid_max {} -> {}", self.pid_max, new_max);
        self.pid_max = new_max;
        Ok(())
    }

    /// Point slot `pid` at `handle`
    pub fn assign(&mut self, pid: Pid, handle: PoolHandle) {
        bug_on!(pid > self.pid_max, "pid: assign {} beyond pid_max {}", pid, self.pid_max);
        self.slots[pid as usize] = Some(handle);
    }

    /// Clear slot `pid`
    pub fn unassign(&mut self, pid: Pid) {
        bug_on!(pid > self.pid_max, "pid: unassign {} beyond pid_max {}", pid, self.pid_max);
        self.slots[pid as usize] = None;
    }

    /// Next free PID after the last one issued, wrapping from `pid_max` to 1
    ///
    /// Advances the cursor to the returned PID. `None` once every PID in
    /// `1..=pid_max` is taken.
    pub fn next_pid(&mut self) -> Option<Pid> {
        let pid_max = u64::from(self.pid_max);
        let last = u64::from(self.last_pid);

        for step in 1..=pid_max {
            let mut candidate = last + step;
            if candidate > pid_max {
                candidate -= pid_max;
            }
            if self.slots[candidate as usize].is_none() {
                self.last_pid = candidate as Pid;
                return Some(self.last_pid);
            }
        }

        log::debug!("pid: namespace of {} exhausted", self.pid_max);
        None
    }

    /// Look up a process by PID
    ///
    /// Empty for PID 0 and for PIDs beyond `pid_max`.
    pub fn find(&self, pid: Pid) -> Option<PoolHandle> {
        if pid == 0 || pid > self.pid_max {
            return None;
        }
        self.slots[pid as usize]
    }

    /// Like [`find`](Self::find) but also reaches the bootstrap slot
    pub fn slot(&self, pid: Pid) -> Option<PoolHandle> {
        self.slots.get(pid as usize).copied().flatten()
    }

    /// Number of occupied slots, bootstrap included
    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}
