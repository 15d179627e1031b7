//! macOS restore images.
//!
//! A restore image (`.ipsw`) carries the macOS build to install and the
//! hardware requirements a VM must meet to run it.

use crate::configuration::MacHardwareModel;
use crate::error::{VZError, VZResult};
use crate::ffi::{
    ObjectPtr, await_completion, create_object_completion_block, nsstring_to_string,
    nsurl_absolute_string, nsurl_file_path, nsurl_path, release, release_block, require_class,
    retain,
};
use crate::{msg_send, msg_send_u64};
use objc2::runtime::{AnyObject, Sel};
use std::ffi::c_void;
use std::fmt;
use std::path::Path;
use tokio::sync::oneshot;

/// `NSOperatingSystemVersion`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct OperatingSystemVersion {
    /// Major version.
    pub major: i64,
    /// Minor version.
    pub minor: i64,
    /// Patch version.
    pub patch: i64,
}

impl fmt::Display for OperatingSystemVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

// ============================================================================
// Restore Image
// ============================================================================

/// A loaded `VZMacOSRestoreImage`.
pub struct MacOSRestoreImage {
    inner: ObjectPtr,
}

unsafe impl Sync for MacOSRestoreImage {}

impl MacOSRestoreImage {
    /// Loads a restore image from a local `.ipsw` file.
    pub async fn load(path: impl AsRef<Path>) -> VZResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(VZError::NotFound(format!(
                "restore image {}",
                path.display()
            )));
        }

        let cls = require_class("VZMacOSRestoreImage")?;
        let (tx, rx) = oneshot::channel();
        let block = create_object_completion_block(tx);
        let url = nsurl_file_path(path);
        unsafe {
            let sel = objc2::sel!(loadFileURL:completionHandler:);
            let func: unsafe extern "C" fn(*const AnyObject, Sel, *mut AnyObject, *const c_void) =
                std::mem::transmute(crate::ffi::runtime::objc_msgSend as *const c_void);
            func(cls as *const _ as *const AnyObject, sel, url, block);
        }
        release(url);
        release_block(block);

        let inner = await_completion(rx, "restore image load").await?;
        tracing::debug!("loaded restore image {}", path.display());
        Ok(Self { inner })
    }

    /// Asks Apple for the latest restore image supported by this host.
    ///
    /// The returned image is remote; its [`Self::url`] points at the
    /// download location.
    pub async fn fetch_latest_supported() -> VZResult<Self> {
        let cls = require_class("VZMacOSRestoreImage")?;
        let (tx, rx) = oneshot::channel();
        let block = create_object_completion_block(tx);
        unsafe {
            let sel = objc2::sel!(fetchLatestSupportedWithCompletionHandler:);
            let func: unsafe extern "C" fn(*const AnyObject, Sel, *const c_void) =
                std::mem::transmute(crate::ffi::runtime::objc_msgSend as *const c_void);
            func(cls as *const _ as *const AnyObject, sel, block);
        }
        release_block(block);

        let inner = await_completion(rx, "restore image fetch").await?;
        Ok(Self { inner })
    }

    /// Returns the image URL as a string.
    ///
    /// For local images this is the file path; for fetched images it is the
    /// remote download URL.
    pub fn url(&self) -> String {
        unsafe {
            let url = msg_send!(self.inner.as_ptr(), URL);
            let is_file = crate::msg_send_bool!(url, isFileURL).as_bool();
            if is_file {
                nsurl_path(url)
            } else {
                nsurl_absolute_string(url)
            }
        }
    }

    /// Returns the macOS build version, e.g. `24A335`.
    pub fn build_version(&self) -> String {
        unsafe { nsstring_to_string(msg_send!(self.inner.as_ptr(), buildVersion)) }
    }

    /// Returns the macOS version contained in the image.
    pub fn operating_system_version(&self) -> OperatingSystemVersion {
        unsafe {
            let sel = objc2::sel!(operatingSystemVersion);
            let func: unsafe extern "C" fn(*const AnyObject, Sel) -> OperatingSystemVersion =
                std::mem::transmute(crate::ffi::runtime::objc_msgSend as *const c_void);
            func(self.inner.as_ptr(), sel)
        }
    }

    /// Returns the most capable configuration this host supports for the
    /// image, or `None` if the host cannot run it at all.
    pub fn most_featured_supported_configuration(&self) -> Option<MacOSConfigurationRequirements> {
        let requirements = unsafe { msg_send!(self.inner.as_ptr(), mostFeaturedSupportedConfiguration) };
        if requirements.is_null() {
            return None;
        }
        Some(MacOSConfigurationRequirements {
            inner: ObjectPtr::from_retained(retain(requirements)),
        })
    }
}

impl fmt::Debug for MacOSRestoreImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MacOSRestoreImage")
            .field("url", &self.url())
            .field("build_version", &self.build_version())
            .finish()
    }
}

// ============================================================================
// Configuration Requirements
// ============================================================================

/// Hardware requirements of a restore image (`VZMacOSConfigurationRequirements`).
pub struct MacOSConfigurationRequirements {
    inner: ObjectPtr,
}

impl MacOSConfigurationRequirements {
    /// Returns the hardware model the guest must be installed with.
    pub fn hardware_model(&self) -> MacHardwareModel {
        let model = unsafe { msg_send!(self.inner.as_ptr(), hardwareModel) };
        MacHardwareModel::from_retained(retain(model))
    }

    /// Returns the minimum number of CPUs the guest needs.
    pub fn minimum_supported_cpu_count(&self) -> u64 {
        unsafe { msg_send_u64!(self.inner.as_ptr(), minimumSupportedCPUCount) }
    }

    /// Returns the minimum memory size in bytes the guest needs.
    pub fn minimum_supported_memory_size(&self) -> u64 {
        unsafe { msg_send_u64!(self.inner.as_ptr(), minimumSupportedMemorySize) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_display_and_order() {
        let sonoma = OperatingSystemVersion {
            major: 14,
            minor: 6,
            patch: 1,
        };
        let sequoia = OperatingSystemVersion {
            major: 15,
            minor: 0,
            patch: 0,
        };
        assert_eq!(sonoma.to_string(), "14.6.1");
        assert!(sonoma < sequoia);
    }

    #[tokio::test]
    async fn test_load_missing_image() {
        let result = MacOSRestoreImage::load("/nonexistent/RestoreImage.ipsw").await;
        assert!(matches!(result, Err(VZError::NotFound(_))));
    }
}
