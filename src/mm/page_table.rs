//! Flat page table with multi-level index decomposition

use bitflags::*;
use log::debug;

use super::address::{PhysPageNum, VirtAddr, VirtPageNum};
use super::MmError;
use crate::config::{FPN_INVALID, MAX_PAGE_NUM, RESERVED_PTE_PATTERN};

bitflags! {
    /// Page Table Entry Flags
    pub struct PteFlags: u64 {
        const PRESENT = 1 << 63;
        const SWAPPED = 1 << 62;
        const DIRTY = 1 << 61;
    }
}

/// FPN field, bits [0, 32)
const PTE_FPN_MASK: u64 = (1 << 32) - 1;
/// swap offset field, bits [0, 32), valid when SWAPPED
const PTE_SWPOFF_MASK: u64 = (1 << 32) - 1;
/// swap type field, bits [32, 40), valid when SWAPPED
const PTE_SWPTYP_LOBIT: u64 = 32;
const PTE_SWPTYP_MASK: u64 = 0xff << PTE_SWPTYP_LOBIT;

#[derive(Copy, Clone, PartialEq)]
/// Page Table Entry Structure
pub struct PageTableEntry {
    /// bits of pte
    pub bits: u64,
}

impl PageTableEntry {
    /// 创建一个空的PTE
    pub fn empty() -> Self {
        PageTableEntry { bits: 0 }
    }

    /// PTE for an on-line page bound to `fpn`
    pub fn new_mapped(fpn: PhysPageNum) -> Self {
        PageTableEntry {
            bits: PteFlags::PRESENT.bits() | (fpn.0 as u64 & PTE_FPN_MASK),
        }
    }

    /// PTE for a page swapped out to (swap_type, swap_offset)
    pub fn new_swapped(swap_type: usize, swap_offset: usize) -> Self {
        PageTableEntry {
            bits: (PteFlags::PRESENT | PteFlags::SWAPPED).bits()
                | (((swap_type as u64) << PTE_SWPTYP_LOBIT) & PTE_SWPTYP_MASK)
                | (swap_offset as u64 & PTE_SWPOFF_MASK),
        }
    }

    /// 获取PTE中的Flags字段
    pub fn flags(&self) -> PteFlags {
        PteFlags::from_bits_truncate(self.bits)
    }

    /// 获取PTE中的FPN字段
    /// 仅在mapped状态下有意义
    pub fn fpn(&self) -> PhysPageNum {
        PhysPageNum((self.bits & PTE_FPN_MASK) as usize)
    }

    /// swap type field
    pub fn swap_type(&self) -> usize {
        ((self.bits & PTE_SWPTYP_MASK) >> PTE_SWPTYP_LOBIT) as usize
    }

    /// swap offset field
    pub fn swap_offset(&self) -> usize {
        (self.bits & PTE_SWPOFF_MASK) as usize
    }

    /// 判断该PTE是否有效
    pub fn is_present(&self) -> bool {
        self.flags().contains(PteFlags::PRESENT)
    }

    /// 判断该PTE对应页是否已换出
    pub fn is_swapped(&self) -> bool {
        self.flags().contains(PteFlags::SWAPPED)
    }

    /// 判断该PTE对应页是否为脏页
    pub fn is_dirty(&self) -> bool {
        self.flags().contains(PteFlags::DIRTY)
    }

    /// present且未换出，FPN字段有效
    pub fn is_mapped(&self) -> bool {
        self.is_present() && !self.is_swapped()
    }

    /// mark the page dirty, keeps the rest of the entry
    pub fn set_dirty(&mut self) {
        self.bits |= PteFlags::DIRTY.bits();
    }
}

/// Page Table Structure
// 存储为按PGN索引的一维数组
// 五级目录的分解见address.rs，这是文档化的简化而非缺陷
pub struct PageTable {
    entries: Vec<PageTableEntry>,
}

impl PageTable {
    /// 创建一个新的空页表
    pub fn new() -> Self {
        PageTable {
            entries: vec![PageTableEntry::empty(); MAX_PAGE_NUM],
        }
    }

    fn check_pgn(&self, pgn: VirtPageNum) -> Result<(), MmError> {
        if pgn.0 >= self.entries.len() {
            return Err(MmError::InvalidPage);
        }
        Ok(())
    }

    /// bind `pgn` to an on-line frame
    /// 拒绝保留的无效帧号
    pub fn set_mapped(&mut self, pgn: VirtPageNum, fpn: PhysPageNum) -> Result<(), MmError> {
        self.check_pgn(pgn)?;
        if fpn.0 == FPN_INVALID {
            return Err(MmError::InvalidFrame);
        }
        self.entries[pgn.0] = PageTableEntry::new_mapped(fpn);
        Ok(())
    }

    /// mark `pgn` swapped out at (swap_type, swap_offset)
    pub fn set_swapped(
        &mut self,
        pgn: VirtPageNum,
        swap_type: usize,
        swap_offset: usize,
    ) -> Result<(), MmError> {
        self.check_pgn(pgn)?;
        self.entries[pgn.0] = PageTableEntry::new_swapped(swap_type, swap_offset);
        Ok(())
    }

    /// raw accessor, used for bulk save/restore and debugging
    pub fn get_entry(&self, pgn: VirtPageNum) -> Result<PageTableEntry, MmError> {
        self.check_pgn(pgn)?;
        Ok(self.entries[pgn.0])
    }

    /// raw accessor, writes the entry bits verbatim
    pub fn set_entry(&mut self, pgn: VirtPageNum, raw: u64) -> Result<(), MmError> {
        self.check_pgn(pgn)?;
        self.entries[pgn.0] = PageTableEntry { bits: raw };
        Ok(())
    }

    /// mutable entry access for in-place flag updates
    pub fn entry_mut(&mut self, pgn: VirtPageNum) -> Result<&mut PageTableEntry, MmError> {
        self.check_pgn(pgn)?;
        Ok(&mut self.entries[pgn.0])
    }

    /// 在当前页表中查找present的PTE
    pub fn translate(&self, pgn: VirtPageNum) -> Option<PageTableEntry> {
        self.entries
            .get(pgn.0)
            .copied()
            .filter(|pte| pte.is_present())
    }

    /// diagnostic dump of non-empty entries
    pub fn dump(&self) {
        debug!("[Kernel] PageTable dump ({} entries):", self.entries.len());
        for (pgn, pte) in self.entries.iter().enumerate() {
            if pte.bits != 0 {
                debug!("[Kernel]   pgn {:#06x}: {:#018x}", pgn, pte.bits);
            }
        }
    }

    /// bulk population with the reserved pattern, emulating page
    /// directory setup without real frame allocation (MAP op)
    pub fn mark_reserved_range(&mut self, start: VirtAddr, npages: usize) {
        let pgn = start.floor();
        for pgit in 0..npages {
            let cur = pgn.0 + pgit;
            if cur < self.entries.len() {
                // PRESENT位为0，保留项不参与翻译
                self.entries[cur] = PageTableEntry {
                    bits: RESERVED_PTE_PATTERN,
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapped_entry_roundtrip() {
        let mut pt = PageTable::new();
        pt.set_mapped(VirtPageNum(3), PhysPageNum(42)).unwrap();

        let pte = pt.get_entry(VirtPageNum(3)).unwrap();
        assert!(pte.is_present());
        assert!(!pte.is_swapped());
        assert!(pte.is_mapped());
        assert!(!pte.is_dirty());
        assert_eq!(pte.fpn(), PhysPageNum(42));
    }

    #[test]
    fn swapped_entry_roundtrip() {
        let mut pt = PageTable::new();
        pt.set_swapped(VirtPageNum(5), 1, 77).unwrap();

        let pte = pt.get_entry(VirtPageNum(5)).unwrap();
        assert!(pte.is_present());
        assert!(pte.is_swapped());
        assert!(!pte.is_mapped());
        assert_eq!(pte.swap_type(), 1);
        assert_eq!(pte.swap_offset(), 77);
    }

    #[test]
    fn rejects_sentinel_frame() {
        let mut pt = PageTable::new();
        assert_eq!(
            pt.set_mapped(VirtPageNum(0), PhysPageNum(FPN_INVALID)),
            Err(MmError::InvalidFrame)
        );
    }

    #[test]
    fn rejects_out_of_range_pgn() {
        let mut pt = PageTable::new();
        assert_eq!(
            pt.set_mapped(VirtPageNum(MAX_PAGE_NUM), PhysPageNum(1)),
            Err(MmError::InvalidPage)
        );
        assert!(pt.get_entry(VirtPageNum(MAX_PAGE_NUM)).is_err());
    }

    #[test]
    fn remap_clears_swap_state() {
        let mut pt = PageTable::new();
        pt.set_swapped(VirtPageNum(9), 0, 12).unwrap();
        pt.set_mapped(VirtPageNum(9), PhysPageNum(4)).unwrap();

        let pte = pt.get_entry(VirtPageNum(9)).unwrap();
        assert!(pte.is_mapped());
        assert_eq!(pte.fpn(), PhysPageNum(4));
    }

    #[test]
    fn reserved_range_does_not_translate() {
        let mut pt = PageTable::new();
        pt.mark_reserved_range(VirtAddr(0), 4);

        let pte = pt.get_entry(VirtPageNum(2)).unwrap();
        assert_eq!(pte.bits, RESERVED_PTE_PATTERN);
        assert!(pt.translate(VirtPageNum(2)).is_none());
    }

    #[test]
    fn dump_walks_sparse_table() {
        let mut pt = PageTable::new();
        pt.set_mapped(VirtPageNum(1), PhysPageNum(7)).unwrap();
        pt.set_swapped(VirtPageNum(2), 0, 12).unwrap();
        pt.mark_reserved_range(VirtAddr(0), 1);
        pt.dump();
    }

    #[test]
    fn dirty_bit_is_sticky() {
        let mut pt = PageTable::new();
        pt.set_mapped(VirtPageNum(1), PhysPageNum(7)).unwrap();
        pt.entry_mut(VirtPageNum(1)).unwrap().set_dirty();

        let pte = pt.get_entry(VirtPageNum(1)).unwrap();
        assert!(pte.is_dirty());
        assert_eq!(pte.fpn(), PhysPageNum(7));
    }
}
