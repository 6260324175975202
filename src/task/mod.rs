//! Process handles and the scheduler-side registry

mod pid;
mod registry;
mod task;

pub use pid::{pid_alloc, PidHandle};
pub use registry::ProcessRegistry;
pub use task::{ProcessControlBlock, ProcessControlBlockInner};
