//! Memory Management Implementation
//!
//! Paging-based virtual memory simulation: flat page table with
//! multi-level index decomposition, per-process TLB cache, FIFO page
//! replacement backed by a swap device, and region/area bookkeeping
//! over a growable address space.

mod address;
mod frame_allocator;
mod memory_set;
mod memphy;
mod page_table;
mod tlb;
mod vmem;

use std::fmt;

pub use address::{PhysAddr, PhysPageNum, StepByOne, VPNRange, VirtAddr, VirtPageNum};
pub use frame_allocator::alloc_frames;
pub use memory_set::{MemorySet, VmArea, VmRegion};
pub use memphy::{copy_page, MemPhys};
pub use page_table::{PageTable, PageTableEntry, PteFlags};
pub use tlb::{TlbCache, TlbEntry};
pub use vmem::{vm_alloc, vm_free, vm_read, vm_write};

/// process identifier
pub type Pid = usize;

/// Error taxonomy of the MMU core
///
/// All variants are local, recoverable-by-caller conditions: the
/// instruction layer aborts the single instruction and the simulated
/// process continues.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MmError {
    /// page number outside page-table capacity
    InvalidPage,
    /// reserved sentinel frame number passed to a mapping
    InvalidFrame,
    /// unbound symbol slot
    RegionNotFound,
    /// offset beyond region end
    OutOfBounds,
    /// both RAM and swap exhausted during allocation
    OutOfMemory,
    /// symbol table slot out of range or already bound
    NoFreeSymbolSlot,
    /// physical address beyond device capacity
    InvalidPhysAddr,
}

impl fmt::Display for MmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MmError::InvalidPage => write!(f, "invalid page access"),
            MmError::InvalidFrame => write!(f, "invalid frame number"),
            MmError::RegionNotFound => write!(f, "region not found"),
            MmError::OutOfBounds => write!(f, "out of bound"),
            MmError::OutOfMemory => write!(f, "out of memory"),
            MmError::NoFreeSymbolSlot => write!(f, "no free symbol slot"),
            MmError::InvalidPhysAddr => write!(f, "physical address out of range"),
        }
    }
}

impl std::error::Error for MmError {}
