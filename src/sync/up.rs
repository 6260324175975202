//! Uniprocessor interior mutability primitives

use std::cell::{RefCell, RefMut};

/// Wrapper granting exclusive access under the single kernel loop
// 模拟内核一次只推进一个进程，临界区由调用者保证
pub struct UPSafeCell<T> {
    inner: RefCell<T>,
}

unsafe impl<T> Sync for UPSafeCell<T> {}

impl<T> UPSafeCell<T> {
    /// caller must guarantee uniprocessor-style usage
    pub unsafe fn new(value: T) -> Self {
        Self {
            inner: RefCell::new(value),
        }
    }

    /// panic if the data has been borrowed
    pub fn exclusive_access(&self) -> RefMut<'_, T> {
        self.inner.borrow_mut()
    }
}
