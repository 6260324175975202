//! Process lookup capability provided to the syscall boundary
//!
//! The scheduler collaborator registers processes here; the MMU side
//! only ever receives an already-resolved handle.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::task::ProcessControlBlock;
use crate::mm::Pid;

/// pid -> process handle map
pub struct ProcessRegistry {
    procs: BTreeMap<Pid, Arc<ProcessControlBlock>>,
}

impl ProcessRegistry {
    /// empty registry
    pub fn new() -> Self {
        Self {
            procs: BTreeMap::new(),
        }
    }

    /// register a process under its pid
    pub fn insert(&mut self, proc: Arc<ProcessControlBlock>) {
        self.procs.insert(proc.pid(), proc);
    }

    /// resolve a pid to its handle
    pub fn get(&self, pid: Pid) -> Option<Arc<ProcessControlBlock>> {
        self.procs.get(&pid).cloned()
    }

    /// drop a process from the registry
    pub fn remove(&mut self, pid: Pid) -> Option<Arc<ProcessControlBlock>> {
        self.procs.remove(&pid)
    }
}

impl Default for ProcessRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PAGE_SIZE, TLB_ENTRY_NUM};
    use crate::mm::{MemPhys, TlbCache};
    use crate::sync::UPSafeCell;

    #[test]
    fn lookup_by_pid() {
        let mut registry = ProcessRegistry::new();
        let proc = Arc::new(ProcessControlBlock::new(
            Arc::new(unsafe { UPSafeCell::new(MemPhys::new(4 * PAGE_SIZE)) }),
            Arc::new(unsafe { UPSafeCell::new(MemPhys::new(4 * PAGE_SIZE)) }),
            Arc::new(unsafe { UPSafeCell::new(TlbCache::new(TLB_ENTRY_NUM)) }),
        ));
        let pid = proc.pid();

        registry.insert(proc);
        assert!(registry.get(pid).is_some());
        assert!(registry.get(pid + 1000).is_none());

        registry.remove(pid);
        assert!(registry.get(pid).is_none());
    }
}
