//! Network device configuration.

use crate::error::{VZError, VZResult};
use crate::ffi::{new_object, release, require_class};
use crate::{msg_send, msg_send_void};
use objc2::runtime::AnyObject;

/// Configuration for a VirtIO network device.
pub struct NetworkDeviceConfiguration {
    inner: *mut AnyObject,
}

unsafe impl Send for NetworkDeviceConfiguration {}

impl NetworkDeviceConfiguration {
    /// Creates a network device with NAT attachment.
    ///
    /// NAT allows the guest to access external networks through the host.
    /// The device gets a random locally administered MAC address.
    pub fn nat() -> VZResult<Self> {
        let attachment = new_object("VZNATNetworkDeviceAttachment")?;
        let device = Self::with_attachment(attachment);
        release(attachment);
        device
    }

    /// Creates a network device with the given attachment.
    fn with_attachment(attachment: *mut AnyObject) -> VZResult<Self> {
        let obj = new_object("VZVirtioNetworkDeviceConfiguration")?;
        unsafe {
            msg_send_void!(obj, setAttachment: attachment);

            match create_random_mac() {
                Ok(mac) => msg_send_void!(obj, setMACAddress: mac),
                Err(e) => tracing::warn!("Keeping default MAC address: {}", e),
            }
        }
        Ok(Self { inner: obj })
    }

    /// Consumes the configuration and returns the raw pointer.
    pub fn into_ptr(self) -> *mut AnyObject {
        let ptr = self.inner;
        std::mem::forget(self);
        ptr
    }
}

impl Drop for NetworkDeviceConfiguration {
    fn drop(&mut self) {
        if !self.inner.is_null() {
            release(self.inner);
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Returns an autoreleased random locally administered `VZMACAddress`.
fn create_random_mac() -> VZResult<*mut AnyObject> {
    let cls = require_class("VZMACAddress")?;
    let obj = unsafe { msg_send!(cls, randomLocallyAdministeredAddress) };

    if obj.is_null() {
        return Err(VZError::internal("Failed to create random MAC"));
    }

    Ok(obj)
}
