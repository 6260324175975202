//! Two-process demo driving the simulated MMU
//!
//! Run with `LOG=trace` to watch TLB hits, page faults and swap traffic.

use std::sync::Arc;

use log::info;

use vmsim::config::{MEMRAM_SIZE, MEMSWP_SIZE, TLB_ENTRY_NUM};
use vmsim::mm::{MemPhys, TlbCache};
use vmsim::sync::UPSafeCell;
use vmsim::syscall::{syscall, ScRegs, SYSCALL_MEMMAP, SYSMEM_IO_READ, SYSMEM_IO_WRITE};
use vmsim::task::{ProcessControlBlock, ProcessRegistry};

fn main() {
    vmsim::logging::init();
    info!("[Kernel] Hello, world!");

    let mram = Arc::new(unsafe { UPSafeCell::new(MemPhys::new(MEMRAM_SIZE)) });
    let mswp = Arc::new(unsafe { UPSafeCell::new(MemPhys::new(MEMSWP_SIZE)) });
    let tlb = Arc::new(unsafe { UPSafeCell::new(TlbCache::new(TLB_ENTRY_NUM)) });

    let mut registry = ProcessRegistry::new();
    let p1 = Arc::new(ProcessControlBlock::new(
        mram.clone(),
        mswp.clone(),
        tlb.clone(),
    ));
    let p2 = Arc::new(ProcessControlBlock::new(
        mram.clone(),
        mswp.clone(),
        tlb.clone(),
    ));
    registry.insert(p1.clone());
    registry.insert(p2.clone());

    // p1通过指令边界分配并访问一个region
    let base = p1.exec_alloc(300, 0);
    info!("[Kernel] pid={} bound region 0 at {:#x}", p1.pid(), base);
    p1.exec_write(100, 0, 20);
    let val = p1.exec_read(0, 20, 1);
    info!("[Kernel] pid={} read back {}", p1.pid(), val);
    p1.inner_exclusive_access().memory_set.page_table().dump();
    p1.exec_free(0);

    // p2通过syscall边界直接访问物理RAM
    let proc = registry.get(p2.pid()).unwrap();
    let mut regs = ScRegs {
        a1: SYSMEM_IO_WRITE,
        a2: 0x100,
        a3: 0x55,
    };
    syscall(&proc, SYSCALL_MEMMAP, &mut regs);
    regs.a1 = SYSMEM_IO_READ;
    regs.a3 = 0;
    syscall(&proc, SYSCALL_MEMMAP, &mut regs);
    info!(
        "[Kernel] pid={} physical byte at {:#x} = {:#x}",
        proc.pid(),
        regs.a2,
        regs.a3
    );

    mram.exclusive_access().dump();
    info!("[Kernel] demo finished");
}
