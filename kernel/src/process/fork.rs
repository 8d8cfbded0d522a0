//! Process duplication
//!
//! [`ProcessManager::copy_process`] builds a child completely before the
//! parent learns about it: the child joins `parent.children` only once every
//! mapping copy has succeeded, so a failed fork leaves the parent exactly as
//! it was.

use nos_api::{ContextId, Error, ForkFlags, Pid, ProcessState, Result};
use nos_memory_management::PoolHandle;

use super::manager::ProcessManager;
use crate::arch::RegisterSnapshot;

impl ProcessManager {
    /// Duplicate `parent_pid` into a new child in state `Init`
    ///
    /// The child gets its own memory context holding a copy of the parent's
    /// kernel mappings, plus its user mappings when `flags` has
    /// [`ForkFlags::COPY_USER`]. It resumes from the parent's registers with
    /// a zero return value. The bootstrap process (PID 0) can be forked.
    pub fn copy_process(&mut self, parent_pid: Pid, flags: ForkFlags) -> Result<Pid> {
        let Some(parent_handle) = self.table.slot(parent_pid) else {
            log::warn!("fork: no parent process with pid {}", parent_pid);
            return Err(Error::NotFound(parent_pid));
        };

        let (parent_ctx, parent_regs) = {
            let parent = self
                .pool
                .get_mut(parent_handle)
                .ok_or(Error::NotFound(parent_pid))?;
            let ctx = parent
                .context_id()
                .ok_or(Error::InvalidState("parent has no memory context"))?;
            // Room for the child link, so the final step cannot fail
            parent
                .children
                .try_reserve(1)
                .map_err(|_| Error::OutOfMemory)?;
            (ctx, parent.regs)
        };

        let (child_pid, child_handle) = self.construct()?;

        if let Err(err) =
            self.duplicate(child_handle, parent_pid, parent_ctx, parent_regs, flags)
        {
            log::warn!("fork: duplicating pid {} failed: {}", parent_pid, err);
            if let Some(child) = self.pool.get_mut(child_handle) {
                child.state = ProcessState::Terminated;
            }
            self.release_terminated(child_handle);
            return Err(err);
        }

        if let Some(parent) = self.pool.get_mut(parent_handle) {
            parent.children.push(child_pid);
        }
        log::debug!("fork: pid {} -> child {}", parent_pid, child_pid);
        Ok(child_pid)
    }

    fn duplicate(
        &mut self,
        child_handle: PoolHandle,
        parent_pid: Pid,
        parent_ctx: ContextId,
        parent_regs: RegisterSnapshot,
        flags: ForkFlags,
    ) -> Result<()> {
        let child = self
            .pool
            .get_mut(child_handle)
            .ok_or(Error::InvalidArgument("stale process handle"))?;
        child.ppid = Some(parent_pid);
        child.regs = parent_regs;
        child.regs.retval = 0;

        let child_ctx = child
            .context_id()
            .ok_or(Error::InvalidState("child has no memory context"))?;

        self.mm.copy_kernel_mappings(child_ctx, parent_ctx)?;
        if flags.contains(ForkFlags::COPY_USER) {
            self.mm.copy_user_mappings(child_ctx, parent_ctx)?;
        }

        // Rebuild the map so it describes the copied regions
        self.mm.deinit_address_map(&mut child.vmmap);
        self.mm.init_address_map(&mut child.vmmap, child_ctx);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;

    use super::*;
    use nos_api::MappingKind;
    use nos_memory_management::vm::flags;
    use nos_memory_management::{PageTableEngine, KERNEL_BASE};

    fn setup(max_mappings: usize) -> (ProcessManager, Arc<PageTableEngine>, Pid) {
        let mm = Arc::new(PageTableEngine::with_limits(8, max_mappings));
        let mut procs = ProcessManager::new(64, 16, mm.clone()).unwrap();
        let parent = procs.alloc_process().unwrap();
        let ctx = procs.find(parent).unwrap().context_id().unwrap();
        mm.map(ctx, KERNEL_BASE, 0x1000, flags::READ).unwrap();
        mm.map(ctx, 0x40_0000, 0x2000, flags::READ | flags::USER).unwrap();
        (procs, mm, parent)
    }

    #[test]
    fn test_fork_links_child_last() {
        let (mut procs, mm, parent) = setup(usize::MAX);
        procs.find_mut(parent).unwrap().regs.retval = 42;

        let child = procs.copy_process(parent, ForkFlags::COPY_USER).unwrap();
        let child_proc = procs.find(child).unwrap();
        assert_eq!(child_proc.ppid(), Some(parent));
        assert_eq!(child_proc.regs.retval, 0);
        assert_eq!(child_proc.vmmap().regions().len(), 1);

        let child_ctx = child_proc.context_id().unwrap();
        assert_ne!(Some(child_ctx), procs.find(parent).unwrap().context_id());
        assert_eq!(mm.mapping_count(child_ctx, MappingKind::User), Some(1));
        assert_eq!(procs.children(parent), Some(&[child][..]));
    }

    #[test]
    fn test_failed_user_copy_leaves_parent_untouched() {
        // Parent holds 2 entries; the kernel copy fits, the user copy does not
        let (mut procs, mm, parent) = setup(3);
        let count = procs.process_count();

        let result = procs.copy_process(parent, ForkFlags::COPY_USER);
        assert_eq!(result, Err(Error::MappingCopyFailed(MappingKind::User)));
        assert_eq!(procs.children(parent), Some(&[][..]));
        assert_eq!(procs.process_count(), count);
        assert_eq!(mm.context_count(), 1);
        assert_eq!(procs.table().occupied(), 1);
    }

    #[test]
    fn test_fork_of_missing_parent() {
        let (mut procs, _mm, _parent) = setup(usize::MAX);
        assert_eq!(
            procs.copy_process(33, ForkFlags::empty()),
            Err(Error::NotFound(33))
        );
        assert_eq!(procs.process_count(), 1);
    }

    #[test]
    fn test_freed_child_leaves_children_list() {
        let (mut procs, mm, parent) = setup(usize::MAX);
        let a = procs.copy_process(parent, ForkFlags::empty()).unwrap();
        let b = procs.copy_process(parent, ForkFlags::empty()).unwrap();

        procs.set_state(a, ProcessState::Terminated).unwrap();
        procs.free_process(a).unwrap();
        assert_eq!(procs.children(parent), Some(&[b][..]));
        assert_eq!(mm.context_count(), 2);
    }

    #[test]
    fn test_orphan_does_not_follow_reissued_pid() {
        let mm = Arc::new(PageTableEngine::new(8));
        let mut procs = ProcessManager::new(2, 16, mm).unwrap();
        let parent = procs.alloc_process().unwrap();
        let child = procs.copy_process(parent, ForkFlags::empty()).unwrap();

        procs.set_state(parent, ProcessState::Terminated).unwrap();
        procs.free_process(parent).unwrap();
        assert_eq!(procs.find(child).unwrap().ppid(), None);

        // PID 1 goes to an unrelated process
        assert_eq!(procs.alloc_process(), Ok(parent));
        assert_eq!(procs.find(child).unwrap().ppid(), None);
        assert_eq!(procs.children(parent), Some(&[][..]));
    }
}
