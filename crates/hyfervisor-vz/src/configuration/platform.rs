//! Mac platform configuration and its identity artifacts.
//!
//! A macOS guest needs three pieces of identity that must stay stable for
//! the lifetime of the VM: the hardware model it was installed for, a unique
//! machine identifier, and auxiliary storage (NVRAM). The first two are
//! persisted as opaque byte blobs; the third is a file created by the framework.

use crate::error::{VZError, VZResult};
use crate::ffi::{
    ObjectPtr, extract_nserror, nsdata, nsdata_to_vec, nsurl_file_path, release, require_class,
    retain,
};
use crate::{msg_send, msg_send_bool, msg_send_void};
use objc2::runtime::{AnyObject, Sel};
use std::ffi::c_void;
use std::path::Path;
use std::ptr;

// ============================================================================
// Platform Trait
// ============================================================================

/// Trait for platform configurations.
pub trait Platform {
    /// Returns the underlying Objective-C object pointer.
    fn as_ptr(&self) -> *mut AnyObject;
}

/// `VZMacAuxiliaryStorageInitializationOptionAllowOverwrite`.
const AUXILIARY_STORAGE_ALLOW_OVERWRITE: u64 = 1 << 0;

// ============================================================================
// Hardware Model
// ============================================================================

/// The hardware model a macOS guest was installed for (`VZMacHardwareModel`).
pub struct MacHardwareModel {
    inner: ObjectPtr,
}

impl MacHardwareModel {
    /// Wraps a retained `VZMacHardwareModel`.
    pub(crate) fn from_retained(obj: *mut AnyObject) -> Self {
        Self {
            inner: ObjectPtr::from_retained(obj),
        }
    }

    /// Restores a hardware model from bytes previously produced by
    /// [`Self::data_representation`].
    pub fn from_data_representation(bytes: &[u8]) -> VZResult<Self> {
        let cls = require_class("VZMacHardwareModel")?;
        unsafe {
            let data = nsdata(bytes);
            let alloc = msg_send!(cls, alloc);
            let obj = msg_send!(alloc, initWithDataRepresentation: data);
            if obj.is_null() {
                return Err(VZError::InvalidConfiguration(
                    "Failed to create hardware model from data representation".into(),
                ));
            }
            Ok(Self::from_retained(obj))
        }
    }

    /// Returns whether this host can virtualize this hardware model.
    pub fn is_supported(&self) -> bool {
        unsafe { msg_send_bool!(self.inner.as_ptr(), isSupported).as_bool() }
    }

    /// Opaque bytes that can be stored and later passed to
    /// [`Self::from_data_representation`].
    pub fn data_representation(&self) -> Vec<u8> {
        unsafe { nsdata_to_vec(msg_send!(self.inner.as_ptr(), dataRepresentation)) }
    }

    /// Returns the underlying object pointer.
    pub fn as_ptr(&self) -> *mut AnyObject {
        self.inner.as_ptr()
    }
}

// ============================================================================
// Machine Identifier
// ============================================================================

/// A unique identity for one macOS guest (`VZMacMachineIdentifier`).
pub struct MacMachineIdentifier {
    inner: ObjectPtr,
}

impl MacMachineIdentifier {
    /// Creates a new, random machine identifier.
    pub fn new() -> VZResult<Self> {
        let obj = crate::ffi::new_object("VZMacMachineIdentifier")?;
        Ok(Self {
            inner: ObjectPtr::from_retained(obj),
        })
    }

    /// Restores a machine identifier from bytes previously produced by
    /// [`Self::data_representation`].
    pub fn from_data_representation(bytes: &[u8]) -> VZResult<Self> {
        let cls = require_class("VZMacMachineIdentifier")?;
        unsafe {
            let data = nsdata(bytes);
            let alloc = msg_send!(cls, alloc);
            let obj = msg_send!(alloc, initWithDataRepresentation: data);
            if obj.is_null() {
                return Err(VZError::InvalidConfiguration(
                    "Failed to create machine identifier from data representation".into(),
                ));
            }
            Ok(Self {
                inner: ObjectPtr::from_retained(obj),
            })
        }
    }

    /// Opaque bytes identifying this machine.
    pub fn data_representation(&self) -> Vec<u8> {
        unsafe { nsdata_to_vec(msg_send!(self.inner.as_ptr(), dataRepresentation)) }
    }

    /// Returns the underlying object pointer.
    pub fn as_ptr(&self) -> *mut AnyObject {
        self.inner.as_ptr()
    }
}

// ============================================================================
// Auxiliary Storage
// ============================================================================

/// NVRAM-like storage a macOS guest boots from (`VZMacAuxiliaryStorage`).
pub struct MacAuxiliaryStorage {
    inner: ObjectPtr,
}

impl MacAuxiliaryStorage {
    /// Creates a new auxiliary storage file at `path` for `hardware_model`,
    /// overwriting any existing file.
    pub fn create(path: impl AsRef<Path>, hardware_model: &MacHardwareModel) -> VZResult<Self> {
        let path = path.as_ref();
        let cls = require_class("VZMacAuxiliaryStorage")?;

        unsafe {
            let url = nsurl_file_path(path);
            let mut error: *mut AnyObject = ptr::null_mut();

            let sel = objc2::sel!(initCreatingStorageAtURL:hardwareModel:options:error:);
            let alloc = msg_send!(cls, alloc);
            let func: unsafe extern "C" fn(
                *mut AnyObject,
                Sel,
                *mut AnyObject,
                *mut AnyObject,
                u64,
                *mut *mut AnyObject,
            ) -> *mut AnyObject =
                std::mem::transmute(crate::ffi::runtime::objc_msgSend as *const c_void);

            let obj = func(
                alloc,
                sel,
                url,
                hardware_model.as_ptr(),
                AUXILIARY_STORAGE_ALLOW_OVERWRITE,
                &mut error,
            );
            release(url);

            if obj.is_null() {
                return Err(extract_nserror(error));
            }

            tracing::debug!("Created auxiliary storage at {}", path.display());
            Ok(Self {
                inner: ObjectPtr::from_retained(obj),
            })
        }
    }

    /// Opens an existing auxiliary storage file.
    pub fn open(path: impl AsRef<Path>) -> VZResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(VZError::NotFound(path.display().to_string()));
        }
        let cls = require_class("VZMacAuxiliaryStorage")?;

        unsafe {
            let url = nsurl_file_path(path);
            let alloc = msg_send!(cls, alloc);
            let obj = msg_send!(alloc, initWithContentsOfURL: url);
            release(url);

            if obj.is_null() {
                return Err(VZError::InvalidConfiguration(format!(
                    "Failed to open auxiliary storage: {}",
                    path.display()
                )));
            }
            Ok(Self {
                inner: ObjectPtr::from_retained(obj),
            })
        }
    }

    /// Returns the underlying object pointer.
    pub fn as_ptr(&self) -> *mut AnyObject {
        self.inner.as_ptr()
    }
}

// ============================================================================
// Mac Platform
// ============================================================================

/// Platform configuration for macOS guests (`VZMacPlatformConfiguration`).
pub struct MacPlatform {
    inner: *mut AnyObject,
}

unsafe impl Send for MacPlatform {}

impl MacPlatform {
    /// Creates a Mac platform from its three identity artifacts.
    ///
    /// The platform configuration retains each artifact, so they may be
    /// dropped afterwards.
    pub fn new(
        hardware_model: &MacHardwareModel,
        machine_identifier: &MacMachineIdentifier,
        auxiliary_storage: &MacAuxiliaryStorage,
    ) -> VZResult<Self> {
        let obj = crate::ffi::new_object("VZMacPlatformConfiguration")?;
        unsafe {
            msg_send_void!(obj, setHardwareModel: hardware_model.as_ptr());
            msg_send_void!(obj, setMachineIdentifier: machine_identifier.as_ptr());
            msg_send_void!(obj, setAuxiliaryStorage: auxiliary_storage.as_ptr());
        }
        Ok(Self { inner: obj })
    }
}

impl Platform for MacPlatform {
    fn as_ptr(&self) -> *mut AnyObject {
        self.inner
    }
}

impl Clone for MacPlatform {
    fn clone(&self) -> Self {
        Self {
            inner: retain(self.inner),
        }
    }
}

impl Drop for MacPlatform {
    fn drop(&mut self) {
        if !self.inner.is_null() {
            release(self.inner);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_machine_identifier_roundtrip() {
        if !crate::is_supported() {
            println!("Virtualization not supported, skipping");
            return;
        }
        let id = MacMachineIdentifier::new().expect("machine identifier");
        let bytes = id.data_representation();
        assert!(!bytes.is_empty());

        let restored = MacMachineIdentifier::from_data_representation(&bytes).expect("restore");
        assert_eq!(restored.data_representation(), bytes);
    }

    #[test]
    fn test_machine_identifiers_are_unique() {
        if !crate::is_supported() {
            println!("Virtualization not supported, skipping");
            return;
        }
        let a = MacMachineIdentifier::new().expect("machine identifier");
        let b = MacMachineIdentifier::new().expect("machine identifier");
        assert_ne!(a.data_representation(), b.data_representation());
    }

    #[test]
    fn test_hardware_model_from_garbage() {
        if !crate::is_supported() {
            println!("Virtualization not supported, skipping");
            return;
        }
        assert!(MacHardwareModel::from_data_representation(b"not a model").is_err());
    }

    #[test]
    fn test_open_missing_auxiliary_storage() {
        let result = MacAuxiliaryStorage::open("/nonexistent/AuxiliaryStorage");
        assert!(matches!(result, Err(VZError::NotFound(_))));
    }
}
