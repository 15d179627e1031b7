//! Storage device configuration.

use crate::error::{VZError, VZResult};
use crate::ffi::{extract_nserror, nsurl_file_path, release, require_class};
use crate::msg_send;
use objc2::runtime::{AnyObject, Bool, Sel};
use std::ffi::c_void;
use std::path::Path;
use std::ptr;

/// Configuration for a VirtIO block storage device.
pub struct StorageDeviceConfiguration {
    inner: *mut AnyObject,
}

unsafe impl Send for StorageDeviceConfiguration {}

impl StorageDeviceConfiguration {
    /// Creates a storage device from a disk image file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the disk image file
    /// * `read_only` - If true, the disk is attached read-only
    pub fn disk_image(path: impl AsRef<Path>, read_only: bool) -> VZResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(VZError::NotFound(path.display().to_string()));
        }

        let attachment = create_disk_attachment(path, read_only)?;
        let device = Self::with_attachment(attachment);
        release(attachment);
        device
    }

    /// Creates a storage device with the given attachment.
    fn with_attachment(attachment: *mut AnyObject) -> VZResult<Self> {
        let cls = require_class("VZVirtioBlockDeviceConfiguration")?;
        unsafe {
            let alloc = msg_send!(cls, alloc);
            let obj = msg_send!(alloc, initWithAttachment: attachment);

            if obj.is_null() {
                return Err(VZError::internal("Failed to create block device"));
            }

            Ok(Self { inner: obj })
        }
    }

    /// Consumes the configuration and returns the raw pointer.
    pub fn into_ptr(self) -> *mut AnyObject {
        let ptr = self.inner;
        std::mem::forget(self);
        ptr
    }
}

impl Drop for StorageDeviceConfiguration {
    fn drop(&mut self) {
        if !self.inner.is_null() {
            release(self.inner);
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn create_disk_attachment(path: &Path, read_only: bool) -> VZResult<*mut AnyObject> {
    let cls = require_class("VZDiskImageStorageDeviceAttachment")?;

    unsafe {
        let url = nsurl_file_path(path);
        let mut error: *mut AnyObject = ptr::null_mut();

        let sel = objc2::sel!(initWithURL:readOnly:error:);
        let alloc = msg_send!(cls, alloc);

        let func: unsafe extern "C" fn(
            *mut AnyObject,
            Sel,
            *mut AnyObject,
            Bool,
            *mut *mut AnyObject,
        ) -> *mut AnyObject =
            std::mem::transmute(crate::ffi::runtime::objc_msgSend as *const c_void);

        let obj = func(alloc, sel, url, Bool::new(read_only), &mut error);
        release(url);

        if obj.is_null() {
            return Err(extract_nserror(error));
        }

        Ok(obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_disk_image() {
        let result = StorageDeviceConfiguration::disk_image("/nonexistent/Disk.img", false);
        assert!(matches!(result, Err(VZError::NotFound(_))));
    }
}
