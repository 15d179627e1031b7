//! Keyboard and pointing device configurations.

use crate::error::VZResult;
use crate::ffi::{new_object, release};
use objc2::runtime::AnyObject;

/// Configuration for a USB screen-coordinate pointing device.
pub struct PointingDeviceConfiguration {
    inner: *mut AnyObject,
}

unsafe impl Send for PointingDeviceConfiguration {}

impl PointingDeviceConfiguration {
    /// Creates a USB pointing device that reports absolute screen coordinates.
    pub fn usb_screen_coordinate() -> VZResult<Self> {
        Ok(Self {
            inner: new_object("VZUSBScreenCoordinatePointingDeviceConfiguration")?,
        })
    }

    /// Consumes the configuration and returns the raw pointer.
    pub fn into_ptr(self) -> *mut AnyObject {
        let ptr = self.inner;
        std::mem::forget(self);
        ptr
    }
}

impl Drop for PointingDeviceConfiguration {
    fn drop(&mut self) {
        if !self.inner.is_null() {
            release(self.inner);
        }
    }
}

/// Configuration for a USB keyboard.
pub struct KeyboardConfiguration {
    inner: *mut AnyObject,
}

unsafe impl Send for KeyboardConfiguration {}

impl KeyboardConfiguration {
    /// Creates a USB keyboard.
    pub fn usb() -> VZResult<Self> {
        Ok(Self {
            inner: new_object("VZUSBKeyboardConfiguration")?,
        })
    }

    /// Consumes the configuration and returns the raw pointer.
    pub fn into_ptr(self) -> *mut AnyObject {
        let ptr = self.inner;
        std::mem::forget(self);
        ptr
    }
}

impl Drop for KeyboardConfiguration {
    fn drop(&mut self) {
        if !self.inner.is_null() {
            release(self.inner);
        }
    }
}
