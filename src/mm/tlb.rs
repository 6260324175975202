//! Per-process translation lookaside cache

use log::trace;

use super::address::{PhysPageNum, VirtPageNum};
use super::Pid;
use crate::config::TLB_PID_STRIDE;

/// one cached translation fact
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TlbEntry {
    /// owning process
    pub pid: Pid,
    /// page number
    pub pgn: VirtPageNum,
    /// cached frame number
    pub fpn: PhysPageNum,
}

/// Fixed-capacity direct-overwrite translation cache
///
/// Never authoritative: every entry is reconstructible from the page
/// table, so a lost entry costs translation speed, never data.
pub struct TlbCache {
    slots: Vec<Option<TlbEntry>>,
    enabled: bool,
}

impl TlbCache {
    /// 创建有nslot个槽位的cache
    pub fn new(nslot: usize) -> Self {
        assert!(nslot > 0, "TLB needs at least one slot");
        Self {
            slots: vec![None; nslot],
            enabled: true,
        }
    }

    /// a disabled cache always misses and ignores inserts
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            for slot in self.slots.iter_mut() {
                *slot = None;
            }
        }
    }

    /// deterministic slot of (pid, pgn)
    // 同一页号的表项按stride=8摊开，pid低位选择其一
    // 冲突时直接覆盖，页表兜底
    fn slot_of(&self, pid: Pid, pgn: VirtPageNum) -> usize {
        (pgn.0 * TLB_PID_STRIDE + pid % TLB_PID_STRIDE) % self.slots.len()
    }

    /// cached frame for (pid, pgn), None signals a miss
    pub fn lookup(&self, pid: Pid, pgn: VirtPageNum) -> Option<PhysPageNum> {
        if !self.enabled {
            return None;
        }
        let slot = self.slot_of(pid, pgn);
        self.slots[slot]
            .filter(|e| e.pid == pid && e.pgn == pgn)
            .map(|e| e.fpn)
    }

    /// write/overwrite the slot for (pid, pgn)
    pub fn insert(&mut self, pid: Pid, pgn: VirtPageNum, fpn: PhysPageNum) {
        if !self.enabled {
            return;
        }
        let slot = self.slot_of(pid, pgn);
        self.slots[slot] = Some(TlbEntry { pid, pgn, fpn });
    }

    /// drop the entry for (pid, pgn) if cached
    pub fn flush_entry(&mut self, pid: Pid, pgn: VirtPageNum) {
        let slot = self.slot_of(pid, pgn);
        if let Some(e) = self.slots[slot] {
            if e.pid == pid && e.pgn == pgn {
                self.slots[slot] = None;
            }
        }
    }

    /// invalidate every slot belonging to `pid`
    ///
    /// Required after any bulk page-table change for that process,
    /// stale entries would otherwise resolve to frames the pages no
    /// longer own.
    pub fn flush_process(&mut self, pid: Pid) {
        trace!("[Kernel] TLB flush pid={}", pid);
        for slot in self.slots.iter_mut() {
            if slot.map_or(false, |e| e.pid == pid) {
                *slot = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TLB_ENTRY_NUM;

    #[test]
    fn lookup_after_insert() {
        let mut tlb = TlbCache::new(TLB_ENTRY_NUM);
        assert_eq!(tlb.lookup(1, VirtPageNum(3)), None);

        tlb.insert(1, VirtPageNum(3), PhysPageNum(7));
        assert_eq!(tlb.lookup(1, VirtPageNum(3)), Some(PhysPageNum(7)));
        // 其他进程的同一页号不命中
        assert_eq!(tlb.lookup(2, VirtPageNum(3)), None);
    }

    #[test]
    fn collision_overwrites_most_recent_wins() {
        let mut tlb = TlbCache::new(TLB_ENTRY_NUM);
        // pgn 0 和 pgn 8 对同一pid落在同一槽位
        tlb.insert(1, VirtPageNum(0), PhysPageNum(5));
        tlb.insert(1, VirtPageNum(8), PhysPageNum(6));

        assert_eq!(tlb.lookup(1, VirtPageNum(8)), Some(PhysPageNum(6)));
        assert_eq!(tlb.lookup(1, VirtPageNum(0)), None);
    }

    #[test]
    fn flush_process_is_selective() {
        let mut tlb = TlbCache::new(TLB_ENTRY_NUM);
        tlb.insert(1, VirtPageNum(0), PhysPageNum(5));
        tlb.insert(2, VirtPageNum(1), PhysPageNum(6));

        tlb.flush_process(1);
        assert_eq!(tlb.lookup(1, VirtPageNum(0)), None);
        assert_eq!(tlb.lookup(2, VirtPageNum(1)), Some(PhysPageNum(6)));
    }

    #[test]
    fn flush_entry_leaves_other_tags() {
        let mut tlb = TlbCache::new(TLB_ENTRY_NUM);
        tlb.insert(1, VirtPageNum(0), PhysPageNum(5));

        // 同槽不同tag不受影响
        tlb.flush_entry(1, VirtPageNum(8));
        assert_eq!(tlb.lookup(1, VirtPageNum(0)), Some(PhysPageNum(5)));

        tlb.flush_entry(1, VirtPageNum(0));
        assert_eq!(tlb.lookup(1, VirtPageNum(0)), None);
    }

    #[test]
    fn disabled_cache_always_misses() {
        let mut tlb = TlbCache::new(TLB_ENTRY_NUM);
        tlb.insert(1, VirtPageNum(0), PhysPageNum(5));
        tlb.set_enabled(false);

        assert_eq!(tlb.lookup(1, VirtPageNum(0)), None);
        tlb.insert(1, VirtPageNum(1), PhysPageNum(6));
        assert_eq!(tlb.lookup(1, VirtPageNum(1)), None);
    }
}
