//! Boot loader configurations.

use crate::error::VZResult;
use crate::ffi::{new_object, release};
use objc2::runtime::AnyObject;

// ============================================================================
// Boot Loader Trait
// ============================================================================

/// Trait for boot loader configurations.
pub trait BootLoader {
    /// Returns the underlying Objective-C object pointer.
    fn as_ptr(&self) -> *mut AnyObject;
}

// ============================================================================
// macOS Boot Loader
// ============================================================================

/// Boot loader for macOS guests (`VZMacOSBootLoader`).
///
/// It takes no parameters; the guest boots from the auxiliary storage and
/// disk image attached to the VM.
pub struct MacOSBootLoader {
    inner: *mut AnyObject,
}

unsafe impl Send for MacOSBootLoader {}

impl MacOSBootLoader {
    /// Creates a macOS boot loader.
    pub fn new() -> VZResult<Self> {
        Ok(Self {
            inner: new_object("VZMacOSBootLoader")?,
        })
    }
}

impl BootLoader for MacOSBootLoader {
    fn as_ptr(&self) -> *mut AnyObject {
        self.inner
    }
}

impl Drop for MacOSBootLoader {
    fn drop(&mut self) {
        if !self.inner.is_null() {
            release(self.inner);
        }
    }
}
