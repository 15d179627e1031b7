//! VM configuration types.
//!
//! This module provides types for configuring macOS virtual machines:
//! the boot loader, the Mac platform and its identity artifacts, and the
//! top-level `VirtualMachineConfiguration` builder.

mod boot_loader;
mod platform;
mod vm_config;

pub use boot_loader::{BootLoader, MacOSBootLoader};
pub use platform::{
    MacAuxiliaryStorage, MacHardwareModel, MacMachineIdentifier, MacPlatform, Platform,
};
pub use vm_config::VirtualMachineConfiguration;
