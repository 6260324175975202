//! Frame allocation and FIFO page replacement

use log::{info, trace};

use super::address::{PhysPageNum, VirtPageNum};
use super::memory_set::MemorySet;
use super::memphy::{copy_page, MemPhys};
use super::tlb::TlbCache;
use super::{MmError, Pid};

/// swap type of the single active swap device
const ACTIVE_SWAP_TYPE: usize = 0;

/// satisfy a request of `count` RAM frames, evicting FIFO victims from
/// `mm` once the RAM free list runs dry
///
/// All-or-nothing: if neither a free frame nor a (victim, swap frame)
/// pair can be produced, every frame already collected for this request
/// goes back to the RAM free list and the whole call fails with
/// `OutOfMemory`.
pub fn alloc_frames(
    count: usize,
    mm: &mut MemorySet,
    ram: &mut MemPhys,
    swap: &mut MemPhys,
    tlb: &mut TlbCache,
    pid: Pid,
) -> Result<Vec<PhysPageNum>, MmError> {
    let mut allocated: Vec<PhysPageNum> = Vec::with_capacity(count);

    for _ in 0..count {
        if let Some(fpn) = ram.get_free_frame() {
            allocated.push(fpn);
            continue;
        }

        // RAM耗尽，挑选FIFO牺牲页
        let victim = match find_victim_page(mm) {
            Some(pgn) => pgn,
            None => {
                unwind(ram, allocated);
                return Err(MmError::OutOfMemory);
            }
        };

        let swap_fpn = match swap.get_free_frame() {
            Some(fpn) => fpn,
            None => {
                // swap也满了，牺牲页放回队首保持FIFO顺序
                mm.requeue_victim_front(victim);
                unwind(ram, allocated);
                return Err(MmError::OutOfMemory);
            }
        };

        match evict(victim, swap_fpn, mm, ram, swap, tlb, pid) {
            // 牺牲页腾出的帧直接复用
            Ok(vic_fpn) => allocated.push(vic_fpn),
            Err(e) => {
                // 未完成换出的牺牲页保持驻留身份
                mm.requeue_victim_front(victim);
                swap.put_free_frame(swap_fpn);
                unwind(ram, allocated);
                return Err(e);
            }
        }
    }

    Ok(allocated)
}

/// copy the victim page out, flip its PTE to swapped and hand back the
/// RAM frame it occupied
fn evict(
    victim: VirtPageNum,
    swap_fpn: PhysPageNum,
    mm: &mut MemorySet,
    ram: &mut MemPhys,
    swap: &mut MemPhys,
    tlb: &mut TlbCache,
    pid: Pid,
) -> Result<PhysPageNum, MmError> {
    let vic_pte = mm.page_table().get_entry(victim)?;
    let vic_fpn = vic_pte.fpn();

    copy_page(ram, vic_fpn, swap, swap_fpn)?;
    mm.page_table_mut()
        .set_swapped(victim, ACTIVE_SWAP_TYPE, swap_fpn.0)?;
    // 立刻失效牺牲页的TLB表项
    // 即使没有这步，访问路径也会经页表的swapped位兜底
    tlb.flush_entry(pid, victim);

    info!(
        "[Kernel] evict pid={} pgn={:#x} fpn={:#x} -> swap fpn={:#x}",
        pid, victim.0, vic_fpn.0, swap_fpn.0
    );
    Ok(vic_fpn)
}

/// pop the oldest resident page from the FIFO queue
///
/// Entries whose PTE is no longer mapped are stale and skipped.
pub fn find_victim_page(mm: &mut MemorySet) -> Option<VirtPageNum> {
    while let Some(pgn) = mm.pop_victim() {
        let mapped = mm
            .page_table()
            .get_entry(pgn)
            .map(|pte| pte.is_mapped())
            .unwrap_or(false);
        if mapped {
            trace!("[Kernel] victim pgn={:#x}", pgn.0);
            return Some(pgn);
        }
        // 陈旧队列项，丢弃
    }
    None
}

fn unwind(ram: &mut MemPhys, allocated: Vec<PhysPageNum>) {
    for fpn in allocated {
        ram.put_free_frame(fpn);
    }
}
