//! Implementation of physical and virtual address and page number

use std::fmt::{self, Debug, Formatter};

use crate::config::{
    DIR_INDEX_BITS, P4D_LOBIT, PAGE_SIZE, PAGE_SIZE_BITS, PGD_LOBIT, PMD_LOBIT, PT_LOBIT,
    PUD_LOBIT,
};

/// physical address
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq)]
pub struct PhysAddr(pub usize);

/// virtual address
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq)]
pub struct VirtAddr(pub usize);

/// physical page number (FPN)
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub struct PhysPageNum(pub usize);

/// virtual page number (PGN)
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub struct VirtPageNum(pub usize);

impl Debug for VirtAddr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("VA: {:#x}", self.0))
    }
}

impl Debug for VirtPageNum {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("PGN: {:#x}", self.0))
    }
}

impl Debug for PhysAddr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("PA: {:#x}", self.0))
    }
}

impl Debug for PhysPageNum {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("FPN: {:#x}", self.0))
    }
}

impl PhysAddr {
    /// 计算页内偏移地址
    pub fn page_offset(&self) -> usize {
        self.0 & (PAGE_SIZE - 1)
    }

    /// 向下取页号
    pub fn floor(&self) -> PhysPageNum {
        PhysPageNum(self.0 / PAGE_SIZE)
    }

    /// 向上取页号
    pub fn ceil(&self) -> PhysPageNum {
        PhysPageNum((self.0 + PAGE_SIZE - 1) / PAGE_SIZE)
    }

    /// 判断地址是否页对齐
    pub fn aligned(&self) -> bool {
        self.page_offset() == 0
    }
}

impl VirtAddr {
    /// 向下取页号
    pub fn floor(&self) -> VirtPageNum {
        VirtPageNum(self.0 / PAGE_SIZE)
    }

    /// 向上取页号
    pub fn ceil(&self) -> VirtPageNum {
        VirtPageNum((self.0 + PAGE_SIZE - 1) / PAGE_SIZE)
    }

    /// 取页内偏移
    pub fn page_offset(&self) -> usize {
        self.0 & (PAGE_SIZE - 1)
    }

    /// 判断地址是否页对齐
    pub fn aligned(&self) -> bool {
        self.page_offset() == 0
    }

    /// split the address into the five directory indexes
    /// idx[0]: PGD, idx[1]: P4D, idx[2]: PUD, idx[3]: PMD, idx[4]: PT
    // 分解函数计算完整的五级索引
    // 实际存储是按PGN索引的一维数组，这里只为向前兼容保留分解口径
    pub fn directory_indexes(&self) -> [usize; 5] {
        let mask = (1usize << DIR_INDEX_BITS) - 1;
        [
            (self.0 >> PGD_LOBIT) & mask,
            (self.0 >> P4D_LOBIT) & mask,
            (self.0 >> PUD_LOBIT) & mask,
            (self.0 >> PMD_LOBIT) & mask,
            (self.0 >> PT_LOBIT) & mask,
        ]
    }
}

impl VirtPageNum {
    /// five directory indexes of the page number
    pub fn directory_indexes(&self) -> [usize; 5] {
        VirtAddr::from(*self).directory_indexes()
    }
}

impl From<usize> for PhysAddr {
    fn from(v: usize) -> Self {
        Self(v)
    }
}

impl From<usize> for VirtAddr {
    fn from(v: usize) -> Self {
        Self(v)
    }
}

impl From<usize> for PhysPageNum {
    fn from(v: usize) -> Self {
        Self(v)
    }
}

impl From<usize> for VirtPageNum {
    fn from(v: usize) -> Self {
        Self(v)
    }
}

impl From<PhysAddr> for PhysPageNum {
    fn from(v: PhysAddr) -> Self {
        assert_eq!(v.page_offset(), 0);
        v.floor()
    }
}

impl From<PhysPageNum> for PhysAddr {
    /// 给定物理页号转换出物理地址
    /// 填充`PAGE_SIZE_BITS`个0即可
    fn from(v: PhysPageNum) -> Self {
        Self(v.0 << PAGE_SIZE_BITS)
    }
}

impl From<VirtAddr> for VirtPageNum {
    fn from(v: VirtAddr) -> Self {
        assert_eq!(v.page_offset(), 0);
        v.floor()
    }
}

impl From<VirtPageNum> for VirtAddr {
    fn from(v: VirtPageNum) -> Self {
        Self(v.0 << PAGE_SIZE_BITS)
    }
}

impl From<PhysAddr> for usize {
    fn from(v: PhysAddr) -> Self {
        v.0
    }
}

impl From<PhysPageNum> for usize {
    fn from(v: PhysPageNum) -> Self {
        v.0
    }
}

impl From<VirtAddr> for usize {
    fn from(v: VirtAddr) -> Self {
        v.0
    }
}

impl From<VirtPageNum> for usize {
    fn from(v: VirtPageNum) -> Self {
        v.0
    }
}

/// iterator for phy/virt page number
pub trait StepByOne {
    /// +1
    fn step(&mut self);
}

impl StepByOne for VirtPageNum {
    fn step(&mut self) {
        self.0 += 1;
    }
}

impl StepByOne for PhysPageNum {
    fn step(&mut self) {
        self.0 += 1;
    }
}

#[derive(Copy, Clone)]
/// a simple range structure for page numbers
pub struct SimpleRange<T>
where
    T: StepByOne + Copy + PartialEq + PartialOrd + Debug,
{
    l: T,
    r: T,
}

impl<T> SimpleRange<T>
where
    T: StepByOne + Copy + PartialEq + PartialOrd + Debug,
{
    pub fn new(start: T, end: T) -> Self {
        assert!(start <= end, "start {:?} > end {:?}!", start, end);
        Self { l: start, r: end }
    }

    pub fn get_start(&self) -> T {
        self.l
    }

    pub fn get_end(&self) -> T {
        self.r
    }
}

impl<T> IntoIterator for SimpleRange<T>
where
    T: StepByOne + Copy + PartialEq + PartialOrd + Debug,
{
    type Item = T;
    type IntoIter = SimpleRangeIterator<T>;
    fn into_iter(self) -> Self::IntoIter {
        SimpleRangeIterator::new(self.l, self.r)
    }
}

/// iterator for the simple range structure
pub struct SimpleRangeIterator<T>
where
    T: StepByOne + Copy + PartialEq + PartialOrd + Debug,
{
    current: T,
    end: T,
}

impl<T> SimpleRangeIterator<T>
where
    T: StepByOne + Copy + PartialOrd + PartialEq + Debug,
{
    pub fn new(l: T, r: T) -> Self {
        Self { current: l, end: r }
    }
}

impl<T> Iterator for SimpleRangeIterator<T>
where
    T: StepByOne + Copy + PartialEq + PartialOrd + Debug,
{
    type Item = T;
    fn next(&mut self) -> Option<Self::Item> {
        if self.current == self.end {
            // 左闭右开
            None
        } else {
            let t = self.current;
            self.current.step();
            Some(t)
        }
    }
}

pub type VPNRange = SimpleRange<VirtPageNum>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PAGE_SIZE;

    #[test]
    fn floor_ceil_offset() {
        let va = VirtAddr(PAGE_SIZE * 3 + 7);
        assert_eq!(va.floor(), VirtPageNum(3));
        assert_eq!(va.ceil(), VirtPageNum(4));
        assert_eq!(va.page_offset(), 7);
        assert!(!va.aligned());
        assert!(VirtAddr(PAGE_SIZE * 3).aligned());
    }

    #[test]
    fn directory_decomposition() {
        // 偏移8位之上第一级是PT索引
        let va = VirtAddr(5 << PT_LOBIT | 0x21);
        assert_eq!(va.directory_indexes(), [0, 0, 0, 0, 5]);

        let va = VirtAddr((3 << PMD_LOBIT) | (511 << PT_LOBIT));
        assert_eq!(va.directory_indexes(), [0, 0, 0, 3, 511]);

        // 页号分解与地址分解一致
        assert_eq!(
            VirtPageNum(512 + 7).directory_indexes(),
            VirtAddr((512 + 7) * PAGE_SIZE).directory_indexes()
        );
    }

    #[test]
    fn vpn_range_iterates_half_open() {
        let r = VPNRange::new(VirtPageNum(2), VirtPageNum(5));
        let got: Vec<usize> = r.into_iter().map(|p| p.0).collect();
        assert_eq!(got, vec![2, 3, 4]);
    }
}
