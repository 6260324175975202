//! Address space: areas, regions, symbol table and the FIFO residency queue

use std::collections::VecDeque;

use log::{info, trace};

use super::address::{PhysPageNum, VPNRange, VirtAddr, VirtPageNum};
use super::frame_allocator::alloc_frames;
use super::memphy::{copy_page, MemPhys};
use super::page_table::PageTable;
use super::tlb::TlbCache;
use super::{MmError, Pid};
use crate::config::{MAX_PAGE_NUM, PAGE_SIZE, SYMBOL_TABLE_SIZE};

/// a `[start, end)` sub-range of an area
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VmRegion {
    /// inclusive lower bound
    pub start: VirtAddr,
    /// exclusive upper bound
    pub end: VirtAddr,
}

impl VmRegion {
    /// region length in bytes
    pub fn len(&self) -> usize {
        self.end.0 - self.start.0
    }

    /// 空区域任何偏移都越界
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// symbol table slot: a named, in-use region and its owning area
#[derive(Copy, Clone, Debug)]
struct SymbolEntry {
    vma_id: usize,
    region: VmRegion,
}

/// a contiguous, growable span of the address space
///
/// Holds the id of its owning address space implicitly by living in its
/// `areas` vector, index relations only, no back-pointers.
pub struct VmArea {
    /// area identifier
    pub id: usize,
    /// span start
    pub start: VirtAddr,
    /// current span end, moved forward by `sbrk` growth
    pub end: VirtAddr,
    /// growth boundary
    pub sbrk: VirtAddr,
    free_regions: Vec<VmRegion>,
}

impl VmArea {
    fn new(id: usize, start: VirtAddr) -> Self {
        Self {
            id,
            start,
            end: start,
            sbrk: start,
            free_regions: Vec::new(),
        }
    }

    /// first-fit scan of the free list
    fn take_first_fit(&mut self, size: usize) -> Option<VmRegion> {
        for i in 0..self.free_regions.len() {
            let rg = self.free_regions[i];
            if rg.len() >= size {
                let taken = VmRegion {
                    start: rg.start,
                    end: VirtAddr(rg.start.0 + size),
                };
                if taken.end < rg.end {
                    // 剩余部分原位保留
                    self.free_regions[i] = VmRegion {
                        start: taken.end,
                        end: rg.end,
                    };
                } else {
                    self.free_regions.remove(i);
                }
                return Some(taken);
            }
        }
        None
    }

    /// reinsert a freed region at the head of the free list
    // 不做相邻合并
    fn push_free_region(&mut self, region: VmRegion) {
        self.free_regions.insert(0, region);
    }
}

/// Address Space
///
/// Exclusively owns its page table, areas and FIFO queue; RAM, swap and
/// the TLB are process-external shared resources passed in per call.
pub struct MemorySet {
    page_table: PageTable,
    areas: Vec<VmArea>,
    symbols: Vec<Option<SymbolEntry>>,
    fifo_pages: VecDeque<VirtPageNum>,
}

impl MemorySet {
    /// 创建一个新的地址空间，自带一个默认area 0
    pub fn new_bare() -> Self {
        Self {
            page_table: PageTable::new(),
            areas: vec![VmArea::new(0, VirtAddr(0))],
            symbols: vec![None; SYMBOL_TABLE_SIZE],
            fifo_pages: VecDeque::new(),
        }
    }

    /// shared view of the page table
    pub fn page_table(&self) -> &PageTable {
        &self.page_table
    }

    /// exclusive view of the page table
    pub fn page_table_mut(&mut self) -> &mut PageTable {
        &mut self.page_table
    }

    /// area by id
    pub fn area(&self, vma_id: usize) -> Option<&VmArea> {
        self.areas.iter().find(|a| a.id == vma_id)
    }

    /// record that `pgn` just became resident
    pub fn enqueue_resident(&mut self, pgn: VirtPageNum) {
        self.fifo_pages.push_back(pgn);
    }

    /// oldest-resident page leaves the queue
    pub fn pop_victim(&mut self) -> Option<VirtPageNum> {
        self.fifo_pages.pop_front()
    }

    /// put an unevicted victim back where it was taken from
    pub fn requeue_victim_front(&mut self, pgn: VirtPageNum) {
        self.fifo_pages.push_front(pgn);
    }

    /// the in-use region bound to a symbol slot
    pub fn symbol_region(&self, region_id: usize) -> Result<VmRegion, MmError> {
        self.symbols
            .get(region_id)
            .and_then(|s| s.as_ref())
            .map(|s| s.region)
            .ok_or(MmError::RegionNotFound)
    }

    /// grow an area's limit by a page-aligned amount, mapping fresh
    /// frames and enlisting the grown span on the free list
    pub fn inc_limit(
        &mut self,
        vma_id: usize,
        size: usize,
        ram: &mut MemPhys,
        swap: &mut MemPhys,
        tlb: &mut TlbCache,
        pid: Pid,
    ) -> Result<VirtAddr, MmError> {
        let area_idx = self
            .areas
            .iter()
            .position(|a| a.id == vma_id)
            .ok_or(MmError::RegionNotFound)?;

        let old_end = self.areas[area_idx].end;
        let inc = size
            .checked_add(PAGE_SIZE - 1)
            .ok_or(MmError::InvalidPage)?
            / PAGE_SIZE
            * PAGE_SIZE;
        let npages = inc / PAGE_SIZE;
        let base_pgn = old_end.floor();
        // 增长后的范围必须留在页表容量内，越界在分配之前整体拒绝
        if base_pgn.0 + npages > MAX_PAGE_NUM {
            return Err(MmError::InvalidPage);
        }

        let frames = alloc_frames(npages, self, ram, swap, tlb, pid)?;
        let range = VPNRange::new(base_pgn, VirtPageNum(base_pgn.0 + npages));
        for (pgn, fpn) in range.into_iter().zip(frames) {
            self.page_table.set_mapped(pgn, fpn)?;
            // 新驻留页进入FIFO队列，之后的替换活动以此为序
            self.enqueue_resident(pgn);
        }

        let area = &mut self.areas[area_idx];
        area.end = VirtAddr(old_end.0 + inc);
        area.sbrk = area.end;
        area.push_free_region(VmRegion {
            start: old_end,
            end: area.end,
        });

        info!(
            "[Kernel] vma {} grown by {:#x} bytes, end={:#x}",
            vma_id, inc, area.end.0
        );
        Ok(old_end)
    }

    /// allocate a named region of `size` bytes inside an area
    ///
    /// First-fit over the area free list; on no fit the area limit is
    /// grown. The caller names the symbol slot; an out-of-range or
    /// already-bound slot fails with `NoFreeSymbolSlot`.
    pub fn alloc_region(
        &mut self,
        vma_id: usize,
        region_id: usize,
        size: usize,
        ram: &mut MemPhys,
        swap: &mut MemPhys,
        tlb: &mut TlbCache,
        pid: Pid,
    ) -> Result<VirtAddr, MmError> {
        if region_id >= self.symbols.len() || self.symbols[region_id].is_some() {
            return Err(MmError::NoFreeSymbolSlot);
        }

        let area_idx = self
            .areas
            .iter()
            .position(|a| a.id == vma_id)
            .ok_or(MmError::RegionNotFound)?;

        let mut taken = self.areas[area_idx].take_first_fit(size);
        if taken.is_none() {
            self.inc_limit(vma_id, size, ram, swap, tlb, pid)?;
            taken = self.areas[area_idx].take_first_fit(size);
        }
        // 增长之后first-fit必然成功
        let region = taken.ok_or(MmError::OutOfMemory)?;

        self.symbols[region_id] = Some(SymbolEntry { vma_id, region });
        trace!(
            "[Kernel] alloc region={} [{:#x}, {:#x}) pid={}",
            region_id,
            region.start.0,
            region.end.0,
            pid
        );
        Ok(region.start)
    }

    /// unbind a symbol slot, returning its region to the area free list
    pub fn free_region(&mut self, region_id: usize) -> Result<(), MmError> {
        let entry = self
            .symbols
            .get_mut(region_id)
            .ok_or(MmError::RegionNotFound)?
            .take()
            .ok_or(MmError::RegionNotFound)?;

        let area = self
            .areas
            .iter_mut()
            .find(|a| a.id == entry.vma_id)
            .ok_or(MmError::RegionNotFound)?;
        area.push_free_region(entry.region);

        trace!(
            "[Kernel] free region={} [{:#x}, {:#x})",
            region_id,
            entry.region.start.0,
            entry.region.end.0
        );
        Ok(())
    }

    /// page-table/fault path of the access sequence
    ///
    /// Mapped pages resolve directly; swapped-out pages are brought back
    /// into a freshly allocated RAM frame (possibly evicting another
    /// page) before the access proceeds.
    pub fn get_page(
        &mut self,
        pgn: VirtPageNum,
        ram: &mut MemPhys,
        swap: &mut MemPhys,
        tlb: &mut TlbCache,
        pid: Pid,
    ) -> Result<PhysPageNum, MmError> {
        let pte = self.page_table.get_entry(pgn)?;

        if pte.is_mapped() {
            return Ok(pte.fpn());
        }

        if pte.is_present() && pte.is_swapped() {
            // swap-in：先拿到一个RAM帧（可能触发另一次换出）
            let target = alloc_frames(1, self, ram, swap, tlb, pid)?
                .into_iter()
                .next()
                .ok_or(MmError::OutOfMemory)?;
            let swap_fpn = PhysPageNum(pte.swap_offset());

            copy_page(swap, swap_fpn, ram, target)?;
            swap.put_free_frame(swap_fpn);
            self.page_table.set_mapped(pgn, target)?;
            // 重新驻留，重新排队
            self.enqueue_resident(pgn);

            info!(
                "[Kernel] swap-in pid={} pgn={:#x} <- swap fpn={:#x}, fpn={:#x}",
                pid, pgn.0, swap_fpn.0, target.0
            );
            return Ok(target);
        }

        Err(MmError::InvalidPage)
    }
}
