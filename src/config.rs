//! Constants of the simulated architecture

/// PAGE SIZE
pub const PAGE_SIZE: usize = 256;
/// PAGE_SIZE_BITS
pub const PAGE_SIZE_BITS: usize = 8;

/// width of the logical address bus
pub const CPU_BUS_WIDTH: usize = 22;
/// capacity of the flat page table, in pages
pub const MAX_PAGE_NUM: usize = 1 << (CPU_BUS_WIDTH - PAGE_SIZE_BITS);

/// bits per directory index of the five-level decomposition
// 地址被切成 PGD/P4D/PUD/PMD/PT 五级，每级9 bit
// 存储仍然是按PGN索引的一维数组，见mm/page_table.rs
pub const DIR_INDEX_BITS: usize = 9;
/// lowest bit of the final page-table index
pub const PT_LOBIT: usize = PAGE_SIZE_BITS;
/// lowest bit of the PMD index
pub const PMD_LOBIT: usize = PT_LOBIT + DIR_INDEX_BITS;
/// lowest bit of the PUD index
pub const PUD_LOBIT: usize = PMD_LOBIT + DIR_INDEX_BITS;
/// lowest bit of the P4D index
pub const P4D_LOBIT: usize = PUD_LOBIT + DIR_INDEX_BITS;
/// lowest bit of the PGD index
pub const PGD_LOBIT: usize = P4D_LOBIT + DIR_INDEX_BITS;

/// reserved invalid frame number
// frame 0 在每个设备上保留，永远不会被分配出去
pub const FPN_INVALID: usize = 0;

/// number of slots in the TLB cache
pub const TLB_ENTRY_NUM: usize = 64;
/// slot layout stride, entries of one page number spread every 8 slots
pub const TLB_PID_STRIDE: usize = 8;

/// size of the per-process symbol region table
pub const SYMBOL_TABLE_SIZE: usize = 30;

/// default RAM device capacity, in bytes
pub const MEMRAM_SIZE: usize = 0x10000;
/// default swap device capacity, in bytes
pub const MEMSWP_SIZE: usize = 0x40000;

/// number of simulated CPU registers
pub const MAX_REG_NUM: usize = 10;

/// raw PTE pattern marking a reserved (bulk populated) entry
// 模拟页目录占位，PRESENT位为0，永远不参与翻译
pub const RESERVED_PTE_PATTERN: u64 = 0xDEAD_BEEF;
