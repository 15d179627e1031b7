//! Safe Rust bindings for Apple's Virtualization.framework, focused on
//! installing and running macOS guests on Apple Silicon.
//!
//! This crate wraps the Objective-C classes needed to:
//!
//! - load a macOS restore image (IPSW) and read its hardware requirements,
//! - create the Mac platform artifacts (hardware model, machine identifier,
//!   auxiliary storage),
//! - configure and create a `VZVirtualMachine`,
//! - run `VZMacOSInstaller` with progress reporting,
//! - observe the VM lifecycle through a `VZVirtualMachineDelegate`.
//!
//! # Example
//!
//! ```rust,no_run
//! # #[cfg(all(target_os = "macos", target_arch = "aarch64"))]
//! # async fn example() -> Result<(), hyfervisor_vz::VZError> {
//! use hyfervisor_vz::MacOSRestoreImage;
//!
//! let image = MacOSRestoreImage::load("/path/to/UniversalMac.ipsw").await?;
//! let requirements = image
//!     .most_featured_supported_configuration()
//!     .ok_or(hyfervisor_vz::VZError::NotSupported)?;
//! println!(
//!     "needs at least {} CPUs and {} bytes of memory",
//!     requirements.minimum_supported_cpu_count(),
//!     requirements.minimum_supported_memory_size()
//! );
//! # Ok(())
//! # }
//! ```
//!
//! # Platform Support
//!
//! macOS guests can only be virtualized on Apple Silicon. Everything that
//! touches the Objective-C runtime is compiled only for
//! `target_os = "macos"` on `aarch64`; the state and event types and the
//! error type are available everywhere.
//!
//! # Entitlements
//!
//! Your application must have the `com.apple.security.virtualization` entitlement
//! to use this framework. See Apple's documentation for details.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
// FFI bindings require extensive pointer casts - these are intentional and safe.
#![allow(clippy::ptr_as_ptr)]
#![allow(clippy::ptr_cast_constness)]
#![allow(clippy::ref_as_ptr)]
#![allow(clippy::borrow_as_ptr)]
#![allow(clippy::unnecessary_cast)]
#![allow(clippy::missing_transmute_annotations)]
// Documentation lints - acceptable for FFI code.
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
// Code style lints - acceptable for FFI patterns.
#![allow(clippy::items_after_statements)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]

pub mod error;
pub mod event;

#[cfg(all(target_os = "macos", target_arch = "aarch64"))]
pub mod ffi;

#[cfg(all(target_os = "macos", target_arch = "aarch64"))]
pub mod configuration;
#[cfg(all(target_os = "macos", target_arch = "aarch64"))]
pub(crate) mod delegate;
#[cfg(all(target_os = "macos", target_arch = "aarch64"))]
pub mod device;
#[cfg(all(target_os = "macos", target_arch = "aarch64"))]
pub mod installer;
#[cfg(all(target_os = "macos", target_arch = "aarch64"))]
pub mod restore_image;
#[cfg(all(target_os = "macos", target_arch = "aarch64"))]
pub mod vm;

// Re-exports for convenience
pub use error::{VZError, VZResult};
pub use event::{VirtualMachineEvent, VirtualMachineState};

#[cfg(all(target_os = "macos", target_arch = "aarch64"))]
pub use configuration::{
    MacAuxiliaryStorage, MacHardwareModel, MacMachineIdentifier, MacOSBootLoader, MacPlatform,
    VirtualMachineConfiguration,
};

#[cfg(all(target_os = "macos", target_arch = "aarch64"))]
pub use device::{
    AudioDeviceConfiguration, EntropyDeviceConfiguration, GraphicsDeviceConfiguration,
    KeyboardConfiguration, NetworkDeviceConfiguration, PointingDeviceConfiguration,
    StorageDeviceConfiguration,
};

#[cfg(all(target_os = "macos", target_arch = "aarch64"))]
pub use installer::MacOSInstaller;

#[cfg(all(target_os = "macos", target_arch = "aarch64"))]
pub use restore_image::{MacOSConfigurationRequirements, MacOSRestoreImage, OperatingSystemVersion};

#[cfg(all(target_os = "macos", target_arch = "aarch64"))]
pub use vm::VirtualMachine;

/// Check if virtualization is supported on this system.
///
/// Returns `true` if the Virtualization.framework is available and the
/// hardware supports virtualization. Always `false` off Apple Silicon.
#[must_use]
pub fn is_supported() -> bool {
    #[cfg(all(target_os = "macos", target_arch = "aarch64"))]
    {
        ffi::is_supported()
    }
    #[cfg(not(all(target_os = "macos", target_arch = "aarch64")))]
    {
        false
    }
}

/// Get the minimum allowed CPU count for a virtual machine.
#[cfg(all(target_os = "macos", target_arch = "aarch64"))]
#[must_use]
pub fn min_cpu_count() -> u64 {
    ffi::min_cpu_count()
}

/// Get the maximum allowed CPU count for a virtual machine.
#[cfg(all(target_os = "macos", target_arch = "aarch64"))]
#[must_use]
pub fn max_cpu_count() -> u64 {
    ffi::max_cpu_count()
}

/// Get the minimum allowed memory size for a virtual machine (in bytes).
#[cfg(all(target_os = "macos", target_arch = "aarch64"))]
#[must_use]
pub fn min_memory_size() -> u64 {
    ffi::min_memory_size()
}

/// Get the maximum allowed memory size for a virtual machine (in bytes).
#[cfg(all(target_os = "macos", target_arch = "aarch64"))]
#[must_use]
pub fn max_memory_size() -> u64 {
    ffi::max_memory_size()
}
