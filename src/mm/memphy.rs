//! Byte-addressable physical memory device, used for both RAM and swap

use log::debug;

use super::address::{PhysAddr, PhysPageNum};
use super::MmError;
use crate::config::PAGE_SIZE;

/// A fixed-size physical memory device
///
/// Frame bookkeeping follows the stack allocator scheme: a watermark of
/// never-allocated frames plus a recycle stack. Frame 0 is reserved as
/// the invalid sentinel and is never handed out.
pub struct MemPhys {
    storage: Vec<u8>,
    current: usize,
    end: usize,
    recycled: Vec<usize>,
}

impl MemPhys {
    /// 创建给定字节容量的设备
    pub fn new(size: usize) -> Self {
        let nframe = size / PAGE_SIZE;
        Self {
            storage: vec![0; size],
            // frame 0 保留
            current: 1.min(nframe),
            end: nframe,
            recycled: Vec::new(),
        }
    }

    /// device capacity in bytes
    pub fn size(&self) -> usize {
        self.storage.len()
    }

    /// read one byte at an absolute physical address
    pub fn read(&self, addr: PhysAddr) -> Result<u8, MmError> {
        self.storage
            .get(addr.0)
            .copied()
            .ok_or(MmError::InvalidPhysAddr)
    }

    /// write one byte at an absolute physical address
    pub fn write(&mut self, addr: PhysAddr, data: u8) -> Result<(), MmError> {
        match self.storage.get_mut(addr.0) {
            Some(cell) => {
                *cell = data;
                Ok(())
            }
            None => Err(MmError::InvalidPhysAddr),
        }
    }

    /// take a frame off the free list
    pub fn get_free_frame(&mut self) -> Option<PhysPageNum> {
        if let Some(fpn) = self.recycled.pop() {
            // 先复用之前回收的帧
            Some(fpn.into())
        } else if self.current == self.end {
            None
        } else {
            self.current += 1;
            Some((self.current - 1).into())
        }
    }

    /// return a frame to the free list
    pub fn put_free_frame(&mut self, fpn: PhysPageNum) {
        let fpn = fpn.0;
        if fpn == 0 || fpn >= self.current || self.recycled.iter().any(|v| *v == fpn) {
            panic!("Frame fpn {:#x} has not been allocated!", fpn);
        }
        self.recycled.push(fpn);
    }

    /// number of frames currently free
    pub fn free_frame_count(&self) -> usize {
        (self.end - self.current) + self.recycled.len()
    }

    /// diagnostic dump of non-zero cells
    pub fn dump(&self) {
        debug!("[Kernel] MemPhys dump ({} bytes):", self.storage.len());
        for (addr, byte) in self.storage.iter().enumerate() {
            if *byte != 0 {
                debug!("[Kernel]   {:#07x}: {:#04x}", addr, byte);
            }
        }
    }
}

/// copy one full page between devices, byte for byte
///
/// Both frame ranges are validated up front so a failing copy never
/// leaves a partially mutated destination.
pub fn copy_page(
    src: &MemPhys,
    src_fpn: PhysPageNum,
    dst: &mut MemPhys,
    dst_fpn: PhysPageNum,
) -> Result<(), MmError> {
    let src_base = PhysAddr::from(src_fpn).0;
    let dst_base = PhysAddr::from(dst_fpn).0;
    if src_base + PAGE_SIZE > src.size() || dst_base + PAGE_SIZE > dst.size() {
        return Err(MmError::InvalidPhysAddr);
    }

    for cellidx in 0..PAGE_SIZE {
        let data = src.read(PhysAddr(src_base + cellidx))?;
        dst.write(PhysAddr(dst_base + cellidx), data)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_read_write() {
        let mut mp = MemPhys::new(4 * PAGE_SIZE);
        mp.write(PhysAddr(0x123), 0xab).unwrap();
        assert_eq!(mp.read(PhysAddr(0x123)).unwrap(), 0xab);
        assert_eq!(mp.read(PhysAddr(0x124)).unwrap(), 0);
    }

    #[test]
    fn device_bound_violation() {
        let mut mp = MemPhys::new(2 * PAGE_SIZE);
        assert_eq!(mp.read(PhysAddr(2 * PAGE_SIZE)), Err(MmError::InvalidPhysAddr));
        assert_eq!(
            mp.write(PhysAddr(2 * PAGE_SIZE), 1),
            Err(MmError::InvalidPhysAddr)
        );
    }

    #[test]
    fn frame_zero_is_reserved() {
        let mut mp = MemPhys::new(4 * PAGE_SIZE);
        assert_eq!(mp.free_frame_count(), 3);
        assert_eq!(mp.get_free_frame(), Some(PhysPageNum(1)));
    }

    #[test]
    fn free_list_recycles() {
        let mut mp = MemPhys::new(3 * PAGE_SIZE);
        let a = mp.get_free_frame().unwrap();
        let b = mp.get_free_frame().unwrap();
        assert_eq!(mp.get_free_frame(), None);

        mp.put_free_frame(a);
        assert_eq!(mp.free_frame_count(), 1);
        assert_eq!(mp.get_free_frame(), Some(a));
        assert_eq!(b, PhysPageNum(2));
    }

    #[test]
    fn page_copy_between_devices() {
        let mut ram = MemPhys::new(4 * PAGE_SIZE);
        let mut swp = MemPhys::new(4 * PAGE_SIZE);
        for i in 0..PAGE_SIZE {
            ram.write(PhysAddr(2 * PAGE_SIZE + i), (i % 251) as u8).unwrap();
        }

        copy_page(&ram, PhysPageNum(2), &mut swp, PhysPageNum(3)).unwrap();
        for i in 0..PAGE_SIZE {
            assert_eq!(
                swp.read(PhysAddr(3 * PAGE_SIZE + i)).unwrap(),
                (i % 251) as u8
            );
        }
    }

    #[test]
    fn page_copy_checks_bounds_first() {
        let ram = MemPhys::new(2 * PAGE_SIZE);
        let mut swp = MemPhys::new(2 * PAGE_SIZE);
        swp.write(PhysAddr(PAGE_SIZE), 9).unwrap();

        assert_eq!(
            copy_page(&ram, PhysPageNum(5), &mut swp, PhysPageNum(1)),
            Err(MmError::InvalidPhysAddr)
        );
        // 失败的拷贝不应产生部分写入
        assert_eq!(swp.read(PhysAddr(PAGE_SIZE)).unwrap(), 9);
    }
}
