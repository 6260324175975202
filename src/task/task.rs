//! Process control block and the ISA-level memory instructions

use std::cell::RefMut;
use std::sync::Arc;

use log::error;

use super::pid::{pid_alloc, PidHandle};
use crate::config::MAX_REG_NUM;
use crate::mm::{vm_alloc, vm_free, vm_read, vm_write, MemPhys, MemorySet, Pid, TlbCache};
use crate::sync::UPSafeCell;

/// struct of PCB
///
/// RAM, swap and the TLB are process-external shared resources, the PCB
/// holds references, never ownership.
pub struct ProcessControlBlock {
    // immutable
    /// Pid
    pub pid: PidHandle,
    /// per-process translation cache
    pub tlb: Arc<UPSafeCell<TlbCache>>,
    /// RAM device
    pub mram: Arc<UPSafeCell<MemPhys>>,
    /// active swap device
    pub mswp: Arc<UPSafeCell<MemPhys>>,
    // mutable
    inner: UPSafeCell<ProcessControlBlockInner>,
}

/// struct of PCB inner
pub struct ProcessControlBlockInner {
    /// address space
    pub memory_set: MemorySet,
    /// simulated CPU registers
    pub regs: [u32; MAX_REG_NUM],
}

impl ProcessControlBlock {
    /// 创建一个挂在给定设备上的新进程
    pub fn new(
        mram: Arc<UPSafeCell<MemPhys>>,
        mswp: Arc<UPSafeCell<MemPhys>>,
        tlb: Arc<UPSafeCell<TlbCache>>,
    ) -> Self {
        Self {
            pid: pid_alloc(),
            tlb,
            mram,
            mswp,
            inner: unsafe {
                UPSafeCell::new(ProcessControlBlockInner {
                    memory_set: MemorySet::new_bare(),
                    regs: [0; MAX_REG_NUM],
                })
            },
        }
    }

    /// raw pid value
    pub fn pid(&self) -> Pid {
        self.pid.0
    }

    /// 获取可变引用
    pub fn inner_exclusive_access(&self) -> RefMut<'_, ProcessControlBlockInner> {
        self.inner.exclusive_access()
    }

    /// ALLOC instruction: bind `size` bytes to symbol `region_id`
    ///
    /// Returns the region start, or -1 after a logged diagnostic; the
    /// process continues either way.
    pub fn exec_alloc(&self, size: usize, region_id: usize) -> isize {
        match vm_alloc(self, 0, region_id, size) {
            Ok(va) => va.0 as isize,
            Err(e) => {
                error!(
                    "[Kernel] Invalid allocation at region={} size={}: {}. ALLOC operation aborted.",
                    region_id, size, e
                );
                -1
            }
        }
    }

    /// FREE instruction: release symbol `region_id`
    pub fn exec_free(&self, region_id: usize) -> isize {
        match vm_free(self, region_id) {
            Ok(()) => 0,
            Err(e) => {
                error!(
                    "[Kernel] Invalid free at region={}: {}. FREE operation aborted.",
                    region_id, e
                );
                -1
            }
        }
    }

    /// READ instruction: byte at `source` + `offset` into register
    /// `destination`
    pub fn exec_read(&self, source: usize, offset: usize, destination: usize) -> isize {
        match vm_read(self, source, offset) {
            Ok(data) => {
                if destination < MAX_REG_NUM {
                    self.inner_exclusive_access().regs[destination] = data as u32;
                }
                data as isize
            }
            Err(e) => {
                error!(
                    "[Kernel] Invalid address at region={} offset={}: {}. READ operation aborted.",
                    source, offset, e
                );
                -1
            }
        }
    }

    /// WRITE instruction: byte `data` to `destination` + `offset`
    pub fn exec_write(&self, data: u8, destination: usize, offset: usize) -> isize {
        match vm_write(self, destination, offset, data) {
            Ok(()) => 0,
            Err(e) => {
                error!(
                    "[Kernel] Invalid address at region={} offset={}: {}. WRITE operation aborted.",
                    destination, offset, e
                );
                -1
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PAGE_SIZE, TLB_ENTRY_NUM};

    fn make_proc() -> ProcessControlBlock {
        ProcessControlBlock::new(
            Arc::new(unsafe { UPSafeCell::new(MemPhys::new(9 * PAGE_SIZE)) }),
            Arc::new(unsafe { UPSafeCell::new(MemPhys::new(9 * PAGE_SIZE)) }),
            Arc::new(unsafe { UPSafeCell::new(TlbCache::new(TLB_ENTRY_NUM)) }),
        )
    }

    #[test]
    fn read_deposits_into_register() {
        let proc = make_proc();
        assert_eq!(proc.exec_alloc(300, 0), 0);
        assert_eq!(proc.exec_write(0x7f, 0, 20), 0);

        assert_eq!(proc.exec_read(0, 20, 1), 0x7f);
        assert_eq!(proc.inner_exclusive_access().regs[1], 0x7f);
    }

    #[test]
    fn failed_instruction_returns_minus_one() {
        let proc = make_proc();
        // 未分配的region
        assert_eq!(proc.exec_read(0, 0, 1), -1);
        assert_eq!(proc.exec_write(1, 0, 0), -1);
        assert_eq!(proc.exec_free(0), -1);

        proc.exec_alloc(100, 0);
        // 越界
        assert_eq!(proc.exec_read(0, 100, 1), -1);
        assert_eq!(proc.exec_write(1, 0, 100), -1);
        // 寄存器不被失败的READ污染
        assert_eq!(proc.inner_exclusive_access().regs[1], 0);
    }

    #[test]
    fn free_then_access_fails() {
        let proc = make_proc();
        proc.exec_alloc(100, 0);
        assert_eq!(proc.exec_write(5, 0, 0), 0);
        assert_eq!(proc.exec_free(0), 0);
        assert_eq!(proc.exec_read(0, 0, 1), -1);
    }

    #[test]
    fn pids_are_distinct() {
        let a = make_proc();
        let b = make_proc();
        assert_ne!(a.pid(), b.pid());
    }
}
