//! Grand Central Dispatch (GCD) queue handling.
//!
//! VZVirtualMachine and VZMacOSInstaller must only be messaged from the
//! serial queue the VM was created with. This module wraps that queue.

use objc2::runtime::AnyObject;
use std::ffi::{CString, c_void};

// ============================================================================
// Dispatch FFI
// ============================================================================

unsafe extern "C" {
    fn dispatch_queue_create(label: *const std::ffi::c_char, attr: *const c_void)
    -> *mut AnyObject;
    fn dispatch_sync_f(
        queue: *mut AnyObject,
        context: *mut c_void,
        work: unsafe extern "C" fn(*mut c_void),
    );
    fn dispatch_release(object: *mut AnyObject);
}

// ============================================================================
// Dispatch Queue
// ============================================================================

/// An owned serial GCD dispatch queue.
pub struct DispatchQueue {
    inner: *mut AnyObject,
}

unsafe impl Send for DispatchQueue {}
unsafe impl Sync for DispatchQueue {}

impl DispatchQueue {
    /// Creates a new serial dispatch queue with the given label.
    pub fn new(label: &str) -> Self {
        let label_cstr = CString::new(label.replace('\0', ""))
            .unwrap_or_else(|_| CString::from(c"hyfervisor.vm"));
        let queue = unsafe {
            dispatch_queue_create(
                label_cstr.as_ptr(),
                std::ptr::null(), // DISPATCH_QUEUE_SERIAL
            )
        };
        Self { inner: queue }
    }

    /// Returns the raw queue pointer.
    pub fn as_ptr(&self) -> *mut AnyObject {
        self.inner
    }

    /// Executes a closure synchronously on this queue.
    ///
    /// This function blocks until the closure completes. It must not be
    /// called from the queue itself (that deadlocks, as with `dispatch_sync`).
    pub fn sync<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        if self.inner.is_null() {
            return f();
        }

        let mut result: Option<R> = None;
        let mut closure = Some(f);

        struct Context<'a, F, R> {
            closure: &'a mut Option<F>,
            result: &'a mut Option<R>,
        }

        unsafe extern "C" fn trampoline<F, R>(context: *mut c_void)
        where
            F: FnOnce() -> R,
        {
            unsafe {
                let ctx = &mut *(context as *mut Context<'_, F, R>);
                if let Some(f) = ctx.closure.take() {
                    *ctx.result = Some(f());
                }
            }
        }

        let mut context = Context {
            closure: &mut closure,
            result: &mut result,
        };

        unsafe {
            dispatch_sync_f(
                self.inner,
                &mut context as *mut Context<'_, F, R> as *mut c_void,
                trampoline::<F, R>,
            );
        }

        match result {
            Some(value) => value,
            // dispatch_sync_f always runs the work item before returning.
            None => unreachable!("dispatch_sync_f returned without running the closure"),
        }
    }
}

impl Drop for DispatchQueue {
    fn drop(&mut self) {
        if !self.inner.is_null() {
            unsafe {
                dispatch_release(self.inner);
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_queue_sync() {
        let queue = DispatchQueue::new("test.queue.sync");
        let result = queue.sync(|| 42);
        assert_eq!(result, 42);
    }

    #[test]
    fn test_dispatch_queue_sync_borrows() {
        let queue = DispatchQueue::new("test.queue.borrow");
        let mut values = vec![1, 2];
        queue.sync(|| values.push(3));
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn test_label_with_nul() {
        let queue = DispatchQueue::new("bad\0label");
        assert!(!queue.as_ptr().is_null());
    }
}
