//! Entropy device configuration.

use crate::error::VZResult;
use crate::ffi::{new_object, release};
use objc2::runtime::AnyObject;

/// Configuration for a VirtIO entropy device.
///
/// This device provides random number generation to the guest OS.
pub struct EntropyDeviceConfiguration {
    inner: *mut AnyObject,
}

unsafe impl Send for EntropyDeviceConfiguration {}

impl EntropyDeviceConfiguration {
    /// Creates a new entropy device configuration.
    pub fn new() -> VZResult<Self> {
        Ok(Self {
            inner: new_object("VZVirtioEntropyDeviceConfiguration")?,
        })
    }

    /// Consumes the configuration and returns the raw pointer.
    pub fn into_ptr(self) -> *mut AnyObject {
        let ptr = self.inner;
        std::mem::forget(self);
        ptr
    }
}

impl Drop for EntropyDeviceConfiguration {
    fn drop(&mut self) {
        if !self.inner.is_null() {
            release(self.inner);
        }
    }
}
