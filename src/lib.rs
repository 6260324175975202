//! A paging-based virtual memory simulator
//!
//! Processes own private page tables over a shared physical RAM device,
//! with a FIFO-replacement swap path and a per-process TLB in front of
//! translation. Program-visible entry points are the ISA-level memory
//! instructions on [`task::ProcessControlBlock`] and the memory
//! management syscall in [`syscall`].

#![warn(missing_docs)]

pub mod config;
pub mod logging;
pub mod mm;
pub mod sync;
pub mod syscall;
pub mod task;
