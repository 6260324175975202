//! Implementation of syscalls
//!
//! The single supported syscall is the memory-management entry; its
//! memop argument selects the concrete operation. The caller resolves
//! a pid to a process handle via [`crate::task::ProcessRegistry`]
//! before crossing this boundary.

/// memmap syscall
pub const SYSCALL_MEMMAP: usize = 17;

mod mem;

pub use mem::{
    sys_memmap, ScRegs, SYSMEM_INC_OP, SYSMEM_IO_READ, SYSMEM_IO_WRITE, SYSMEM_MAP_OP,
    SYSMEM_SWP_OP,
};

use log::error;

use crate::task::ProcessControlBlock;

/// handle syscall exception with `syscall_id` and other arguments
pub fn syscall(proc: &ProcessControlBlock, syscall_id: usize, regs: &mut ScRegs) -> isize {
    match syscall_id {
        SYSCALL_MEMMAP => sys_memmap(proc, regs),
        _ => {
            error!("[Kernel] Unsupported syscall_id: {}", syscall_id);
            -1
        }
    }
}
