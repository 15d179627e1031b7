//! Graphics device configuration.

use crate::error::{VZError, VZResult};
use crate::ffi::{new_object, nsarray, release, require_class};
use crate::{msg_send, msg_send_void};
use objc2::runtime::{AnyObject, Sel};
use std::ffi::c_void;

/// Configuration for a Mac graphics device with a single display.
pub struct GraphicsDeviceConfiguration {
    inner: *mut AnyObject,
}

unsafe impl Send for GraphicsDeviceConfiguration {}

impl GraphicsDeviceConfiguration {
    /// Creates a Mac graphics device with one display of the given size.
    ///
    /// # Arguments
    ///
    /// * `width` - Display width in pixels
    /// * `height` - Display height in pixels
    /// * `pixels_per_inch` - Display density
    pub fn mac_display(width: u32, height: u32, pixels_per_inch: u32) -> VZResult<Self> {
        if width == 0 || height == 0 || pixels_per_inch == 0 {
            return Err(VZError::InvalidConfiguration(format!(
                "invalid display {width}x{height}@{pixels_per_inch}ppi"
            )));
        }

        let display = create_display(width, height, pixels_per_inch)?;
        let obj = new_object("VZMacGraphicsDeviceConfiguration")?;
        unsafe {
            let displays = nsarray(&[display]);
            msg_send_void!(obj, setDisplays: displays);
        }
        release(display);

        Ok(Self { inner: obj })
    }

    /// Consumes the configuration and returns the raw pointer.
    pub fn into_ptr(self) -> *mut AnyObject {
        let ptr = self.inner;
        std::mem::forget(self);
        ptr
    }
}

impl Drop for GraphicsDeviceConfiguration {
    fn drop(&mut self) {
        if !self.inner.is_null() {
            release(self.inner);
        }
    }
}

fn create_display(width: u32, height: u32, pixels_per_inch: u32) -> VZResult<*mut AnyObject> {
    let cls = require_class("VZMacGraphicsDisplayConfiguration")?;
    unsafe {
        let alloc = msg_send!(cls, alloc);
        let sel = objc2::sel!(initWithWidthInPixels:heightInPixels:pixelsPerInch:);
        let func: unsafe extern "C" fn(*mut AnyObject, Sel, i64, i64, i64) -> *mut AnyObject =
            std::mem::transmute(crate::ffi::runtime::objc_msgSend as *const c_void);
        let obj = func(
            alloc,
            sel,
            i64::from(width),
            i64::from(height),
            i64::from(pixels_per_inch),
        );

        if obj.is_null() {
            return Err(VZError::internal("Failed to create display configuration"));
        }
        Ok(obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_display() {
        let result = GraphicsDeviceConfiguration::mac_display(0, 1200, 80);
        assert!(matches!(result, Err(VZError::InvalidConfiguration(_))));
    }
}
