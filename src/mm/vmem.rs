//! Memory access path and the ISA-level instruction boundary
//!
//! Read/write requests resolve bounds via the symbol table, probe the
//! TLB, fall back to the page table (swapping the page back in when
//! needed) and finally touch the RAM device, updating the TLB on the
//! way out.

use log::trace;

use super::address::{PhysAddr, VirtAddr};
use super::MmError;
use crate::config::PAGE_SIZE_BITS;
use crate::task::ProcessControlBlock;

/// ALLOC: bind a named region of `size` bytes inside area `vma_id`
pub fn vm_alloc(
    proc: &ProcessControlBlock,
    vma_id: usize,
    region_id: usize,
    size: usize,
) -> Result<VirtAddr, MmError> {
    let mut inner = proc.inner_exclusive_access();
    let mut ram = proc.mram.exclusive_access();
    let mut swap = proc.mswp.exclusive_access();
    let mut tlb = proc.tlb.exclusive_access();
    let pid = proc.pid();

    let start = inner.memory_set.alloc_region(
        vma_id, region_id, size, &mut ram, &mut swap, &mut tlb, pid,
    )?;

    // 为新区域的第一页预热TLB
    if size > 0 {
        let pgn = start.floor();
        let fpn = inner
            .memory_set
            .get_page(pgn, &mut ram, &mut swap, &mut tlb, pid)?;
        tlb.insert(pid, pgn, fpn);
    }

    Ok(start)
}

/// FREE: release a named region and flush this process's TLB entries
pub fn vm_free(proc: &ProcessControlBlock, region_id: usize) -> Result<(), MmError> {
    let mut inner = proc.inner_exclusive_access();
    let mut tlb = proc.tlb.exclusive_access();

    inner.memory_set.free_region(region_id)?;
    // 批量页表变更之后必须整体失效
    tlb.flush_process(proc.pid());
    Ok(())
}

/// READ: one byte at `region_id` + `offset`
pub fn vm_read(
    proc: &ProcessControlBlock,
    region_id: usize,
    offset: usize,
) -> Result<u8, MmError> {
    let mut inner = proc.inner_exclusive_access();
    let mut ram = proc.mram.exclusive_access();
    let mut swap = proc.mswp.exclusive_access();
    let mut tlb = proc.tlb.exclusive_access();
    let pid = proc.pid();

    let region = inner.memory_set.symbol_region(region_id)?;
    if offset >= region.len() {
        return Err(MmError::OutOfBounds);
    }

    let addr = VirtAddr(region.start.0 + offset);
    let pgn = addr.floor();

    let (fpn, hit) = match tlb.lookup(pid, pgn) {
        Some(fpn) => (fpn, true),
        None => {
            let fpn = inner
                .memory_set
                .get_page(pgn, &mut ram, &mut swap, &mut tlb, pid)?;
            tlb.insert(pid, pgn, fpn);
            (fpn, false)
        }
    };

    let pa = PhysAddr(fpn.0 << PAGE_SIZE_BITS | addr.page_offset());
    let data = ram.read(pa)?;
    trace!(
        "[Kernel] TLB {} at read region={} offset={} value={}",
        if hit { "hit" } else { "miss" },
        region_id,
        offset,
        data
    );
    Ok(data)
}

/// WRITE: one byte to `region_id` + `offset`
pub fn vm_write(
    proc: &ProcessControlBlock,
    region_id: usize,
    offset: usize,
    data: u8,
) -> Result<(), MmError> {
    let mut inner = proc.inner_exclusive_access();
    let mut ram = proc.mram.exclusive_access();
    let mut swap = proc.mswp.exclusive_access();
    let mut tlb = proc.tlb.exclusive_access();
    let pid = proc.pid();

    let region = inner.memory_set.symbol_region(region_id)?;
    if offset >= region.len() {
        return Err(MmError::OutOfBounds);
    }

    let addr = VirtAddr(region.start.0 + offset);
    let pgn = addr.floor();

    let (fpn, hit) = match tlb.lookup(pid, pgn) {
        Some(fpn) => (fpn, true),
        None => {
            let fpn = inner
                .memory_set
                .get_page(pgn, &mut ram, &mut swap, &mut tlb, pid)?;
            tlb.insert(pid, pgn, fpn);
            (fpn, false)
        }
    };

    let pa = PhysAddr(fpn.0 << PAGE_SIZE_BITS | addr.page_offset());
    ram.write(pa, data)?;
    inner.memory_set.page_table_mut().entry_mut(pgn)?.set_dirty();
    trace!(
        "[Kernel] TLB {} at write region={} offset={} value={}",
        if hit { "hit" } else { "miss" },
        region_id,
        offset,
        data
    );
    Ok(())
}
