//! memop dispatch behind the memory-management syscall

use log::{error, trace};

use crate::mm::{copy_page, PhysAddr, PhysPageNum, VirtAddr};
use crate::task::ProcessControlBlock;

/// bulk page-table population over a reserved range
pub const SYSMEM_MAP_OP: usize = 100;
/// grow a virtual area's limit
pub const SYSMEM_INC_OP: usize = 101;
/// explicit page copy from RAM to the active swap device
pub const SYSMEM_SWP_OP: usize = 102;
/// single-byte physical RAM read
pub const SYSMEM_IO_READ: usize = 103;
/// single-byte physical RAM write
pub const SYSMEM_IO_WRITE: usize = 104;

/// syscall argument block
///
/// `a1` selects the memop; `a2`/`a3` are operands. IO_READ writes its
/// result back through `a3`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScRegs {
    /// memop selector
    pub a1: usize,
    /// first operand
    pub a2: usize,
    /// second operand
    pub a3: usize,
}

/// 内存管理syscall入口
pub fn sys_memmap(proc: &ProcessControlBlock, regs: &mut ScRegs) -> isize {
    match regs.a1 {
        SYSMEM_MAP_OP => {
            trace!(
                "[Kernel] memop MAP: pid={} start_vaddr={:#x} count={}",
                proc.pid(),
                regs.a2,
                regs.a3
            );
            proc.inner_exclusive_access()
                .memory_set
                .page_table_mut()
                .mark_reserved_range(VirtAddr(regs.a2), regs.a3);
            0
        }
        SYSMEM_INC_OP => {
            let pid = proc.pid();
            let mut inner = proc.inner_exclusive_access();
            let mut ram = proc.mram.exclusive_access();
            let mut swap = proc.mswp.exclusive_access();
            let mut tlb = proc.tlb.exclusive_access();
            match inner
                .memory_set
                .inc_limit(regs.a2, regs.a3, &mut ram, &mut swap, &mut tlb, pid)
            {
                Ok(_) => 0,
                Err(e) => {
                    error!(
                        "[Kernel] memop INC failed: pid={} vma={} size={}: {}",
                        pid, regs.a2, regs.a3, e
                    );
                    -1
                }
            }
        }
        SYSMEM_SWP_OP => {
            let ram = proc.mram.exclusive_access();
            let mut swap = proc.mswp.exclusive_access();
            match copy_page(&ram, PhysPageNum(regs.a2), &mut swap, PhysPageNum(regs.a3)) {
                Ok(()) => 0,
                Err(e) => {
                    error!(
                        "[Kernel] memop SWP failed: src_fpn={} dst_fpn={}: {}",
                        regs.a2, regs.a3, e
                    );
                    -1
                }
            }
        }
        SYSMEM_IO_READ => match proc.mram.exclusive_access().read(PhysAddr(regs.a2)) {
            Ok(data) => {
                regs.a3 = data as usize;
                0
            }
            Err(e) => {
                error!("[Kernel] memop IO_READ failed: addr={:#x}: {}", regs.a2, e);
                -1
            }
        },
        SYSMEM_IO_WRITE => {
            match proc
                .mram
                .exclusive_access()
                .write(PhysAddr(regs.a2), regs.a3 as u8)
            {
                Ok(()) => 0,
                Err(e) => {
                    error!(
                        "[Kernel] memop IO_WRITE failed: addr={:#x}: {}",
                        regs.a2, e
                    );
                    -1
                }
            }
        }
        memop => {
            error!("[Kernel] Unsupported memop: {}", memop);
            -1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PAGE_SIZE, RESERVED_PTE_PATTERN, TLB_ENTRY_NUM};
    use crate::mm::{MemPhys, TlbCache, VirtPageNum};
    use crate::sync::UPSafeCell;
    use std::sync::Arc;

    fn make_proc() -> ProcessControlBlock {
        ProcessControlBlock::new(
            Arc::new(unsafe { UPSafeCell::new(MemPhys::new(9 * PAGE_SIZE)) }),
            Arc::new(unsafe { UPSafeCell::new(MemPhys::new(9 * PAGE_SIZE)) }),
            Arc::new(unsafe { UPSafeCell::new(TlbCache::new(TLB_ENTRY_NUM)) }),
        )
    }

    #[test]
    fn io_write_then_read_round_trips() {
        let proc = make_proc();
        let mut regs = ScRegs {
            a1: SYSMEM_IO_WRITE,
            a2: 2 * PAGE_SIZE + 5,
            a3: 0xab,
        };
        assert_eq!(sys_memmap(&proc, &mut regs), 0);

        regs.a1 = SYSMEM_IO_READ;
        regs.a3 = 0;
        assert_eq!(sys_memmap(&proc, &mut regs), 0);
        assert_eq!(regs.a3, 0xab);
    }

    #[test]
    fn io_out_of_bounds_fails() {
        let proc = make_proc();
        let mut regs = ScRegs {
            a1: SYSMEM_IO_READ,
            a2: 9 * PAGE_SIZE,
            a3: 0,
        };
        assert_eq!(sys_memmap(&proc, &mut regs), -1);
    }

    #[test]
    fn map_op_populates_raw_entries() {
        let proc = make_proc();
        let mut regs = ScRegs {
            a1: SYSMEM_MAP_OP,
            a2: 3 * PAGE_SIZE,
            a3: 2,
        };
        assert_eq!(sys_memmap(&proc, &mut regs), 0);

        let inner = proc.inner_exclusive_access();
        let pt = inner.memory_set.page_table();
        for pgn in 3..5 {
            let entry = pt.get_entry(VirtPageNum(pgn)).unwrap();
            assert_eq!(entry.bits, RESERVED_PTE_PATTERN);
            // 填充的pattern不是有效映射
            assert!(pt.translate(VirtPageNum(pgn)).is_none());
        }
    }

    #[test]
    fn inc_op_grows_area() {
        let proc = make_proc();
        let mut regs = ScRegs {
            a1: SYSMEM_INC_OP,
            a2: 0,
            a3: 2 * PAGE_SIZE,
        };
        assert_eq!(sys_memmap(&proc, &mut regs), 0);
        assert_eq!(
            proc.inner_exclusive_access().memory_set.area(0).unwrap().end,
            VirtAddr(2 * PAGE_SIZE)
        );
    }

    #[test]
    fn swp_op_copies_between_devices() {
        let proc = make_proc();
        proc.mram
            .exclusive_access()
            .write(PhysAddr(PAGE_SIZE + 7), 0x42)
            .unwrap();

        let mut regs = ScRegs {
            a1: SYSMEM_SWP_OP,
            a2: 1,
            a3: 3,
        };
        assert_eq!(sys_memmap(&proc, &mut regs), 0);
        assert_eq!(
            proc.mswp
                .exclusive_access()
                .read(PhysAddr(3 * PAGE_SIZE + 7))
                .unwrap(),
            0x42
        );
    }

    #[test]
    fn unknown_memop_fails() {
        let proc = make_proc();
        let mut regs = ScRegs {
            a1: 999,
            a2: 0,
            a3: 0,
        };
        assert_eq!(sys_memmap(&proc, &mut regs), -1);
    }
}
