//! Synchronization primitives

mod up;

pub use up::UPSafeCell;
