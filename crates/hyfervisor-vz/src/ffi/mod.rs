//! Raw Objective-C plumbing shared by the safe wrappers.
//!
//! `runtime` sends messages, `foundation` converts Foundation types,
//! `block` builds completion handlers and `dispatch` owns GCD queues.
//! Framework classes resolve only after [`framework_loaded`] has opened
//! Virtualization.framework, which [`runtime::get_class`] does on first use.

pub mod block;
pub mod dispatch;
pub mod foundation;
pub mod runtime;

pub use block::*;
pub use dispatch::*;
pub use foundation::*;
pub use runtime::*;

use crate::error::VZError;
use objc2::runtime::{AnyClass, AnyObject};
use std::ffi::CStr;
use std::sync::OnceLock;

const FRAMEWORK_PATH: &CStr = c"/System/Library/Frameworks/Virtualization.framework/Virtualization";

/// Opens Virtualization.framework once per process; later calls return the
/// cached outcome.
pub(crate) fn framework_loaded() -> bool {
    static LOADED: OnceLock<bool> = OnceLock::new();
    *LOADED.get_or_init(|| {
        // SAFETY: FRAMEWORK_PATH is NUL-terminated; dlerror is read on this thread.
        let handle = unsafe { libc::dlopen(FRAMEWORK_PATH.as_ptr(), libc::RTLD_NOW | libc::RTLD_GLOBAL) };
        if !handle.is_null() {
            tracing::debug!("opened {}", FRAMEWORK_PATH.to_string_lossy());
            return true;
        }
        let reason = unsafe {
            let err = libc::dlerror();
            if err.is_null() {
                "unknown dlopen failure".to_string()
            } else {
                CStr::from_ptr(err).to_string_lossy().into_owned()
            }
        };
        tracing::error!("cannot open Virtualization.framework: {}", reason);
        false
    })
}

/// `+[VZVirtualMachine isSupported]`, false if the framework is missing.
pub fn is_supported() -> bool {
    framework_loaded()
        && get_class("VZVirtualMachine")
            .is_some_and(|cls| unsafe { msg_send_bool!(cls, isSupported).as_bool() })
}

/// Reads one of the `VZVirtualMachineConfiguration` class limits, or 0
/// without the framework.
fn configuration_limit(read: impl FnOnce(&AnyClass) -> u64) -> u64 {
    get_class("VZVirtualMachineConfiguration").map_or(0, read)
}

/// Fewest CPUs a VM may be configured with.
pub fn min_cpu_count() -> u64 {
    configuration_limit(|cls| unsafe { msg_send_u64!(cls, minimumAllowedCPUCount) })
}

/// Most CPUs a VM may be configured with.
pub fn max_cpu_count() -> u64 {
    configuration_limit(|cls| unsafe { msg_send_u64!(cls, maximumAllowedCPUCount) })
}

/// Smallest VM memory size in bytes.
pub fn min_memory_size() -> u64 {
    configuration_limit(|cls| unsafe { msg_send_u64!(cls, minimumAllowedMemorySize) })
}

/// Largest VM memory size in bytes.
pub fn max_memory_size() -> u64 {
    configuration_limit(|cls| unsafe { msg_send_u64!(cls, maximumAllowedMemorySize) })
}

/// `(code, localizedDescription)` of an NSError; nil reads as `(-1, "Unknown error")`.
pub fn nserror_parts(error: *mut AnyObject) -> (i32, String) {
    if error.is_null() {
        return (-1, "Unknown error".to_string());
    }
    let (code, description) =
        unsafe { (msg_send_i64!(error, code), msg_send!(error, localizedDescription)) };
    (code as i32, nsstring_to_string(description))
}

/// Maps an NSError out-parameter or completion argument to [`VZError::Internal`].
pub fn extract_nserror(error: *mut AnyObject) -> VZError {
    let (code, message) = nserror_parts(error);
    VZError::Internal { code, message }
}

/// Looks up a framework class, mapping absence to an error.
pub fn require_class(name: &str) -> Result<&'static AnyClass, VZError> {
    get_class(name).ok_or_else(|| VZError::class_not_found(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_is_cached() {
        assert_eq!(framework_loaded(), framework_loaded());
        if !framework_loaded() {
            assert!(!is_supported());
        }
    }

    #[test]
    fn test_configuration_limits() {
        if !is_supported() {
            return;
        }
        let (min_cpus, max_cpus) = (min_cpu_count(), max_cpu_count());
        let (min_memory, max_memory) = (min_memory_size(), max_memory_size());
        assert!(min_cpus > 0 && max_cpus >= min_cpus);
        assert!(min_memory > 0 && max_memory >= min_memory);
    }

    #[test]
    fn test_nil_error() {
        assert!(matches!(
            extract_nserror(std::ptr::null_mut()),
            VZError::Internal { code: -1, message } if message == "Unknown error"
        ));
    }
}
