//! Virtual machine configuration.

use crate::device::{
    AudioDeviceConfiguration, EntropyDeviceConfiguration, GraphicsDeviceConfiguration,
    KeyboardConfiguration, NetworkDeviceConfiguration, PointingDeviceConfiguration,
    StorageDeviceConfiguration,
};
use crate::error::{VZError, VZResult};
use crate::ffi::{DispatchQueue, new_object, nsarray, release, require_class};
use crate::vm::VirtualMachine;
use crate::{msg_send, msg_send_bool, msg_send_u64, msg_send_void, msg_send_void_u64};
use objc2::runtime::AnyObject;
use std::ptr;

use super::{BootLoader, Platform};

/// Label of the serial queue each VM is created with.
const VM_QUEUE_LABEL: &str = "hyfervisor.vm";

// ============================================================================
// VM Configuration
// ============================================================================

/// Configuration for creating a virtual machine.
///
/// Use the builder methods to configure the VM, then call `build()` to
/// create the `VirtualMachine` instance.
pub struct VirtualMachineConfiguration {
    inner: *mut AnyObject,
    storage_devices: Vec<*mut AnyObject>,
    network_devices: Vec<*mut AnyObject>,
    entropy_devices: Vec<*mut AnyObject>,
    graphics_devices: Vec<*mut AnyObject>,
    pointing_devices: Vec<*mut AnyObject>,
    keyboards: Vec<*mut AnyObject>,
    audio_devices: Vec<*mut AnyObject>,
}

unsafe impl Send for VirtualMachineConfiguration {}

impl VirtualMachineConfiguration {
    /// Creates a new VM configuration with default settings.
    pub fn new() -> VZResult<Self> {
        Ok(Self {
            inner: new_object("VZVirtualMachineConfiguration")?,
            storage_devices: Vec::new(),
            network_devices: Vec::new(),
            entropy_devices: Vec::new(),
            graphics_devices: Vec::new(),
            pointing_devices: Vec::new(),
            keyboards: Vec::new(),
            audio_devices: Vec::new(),
        })
    }

    /// Sets the number of CPUs for the VM.
    ///
    /// Values outside `min_cpu_count()..=max_cpu_count()` are rejected by
    /// `validate()`.
    pub fn set_cpu_count(&mut self, count: usize) -> &mut Self {
        unsafe {
            msg_send_void_u64!(self.inner, setCPUCount: count as u64);
        }
        self
    }

    /// Gets the configured CPU count.
    pub fn cpu_count(&self) -> u64 {
        unsafe { msg_send_u64!(self.inner, CPUCount) }
    }

    /// Sets the memory size in bytes.
    ///
    /// Values outside `min_memory_size()..=max_memory_size()` are rejected by
    /// `validate()`.
    pub fn set_memory_size(&mut self, bytes: u64) -> &mut Self {
        unsafe {
            msg_send_void_u64!(self.inner, setMemorySize: bytes);
        }
        self
    }

    /// Gets the configured memory size in bytes.
    pub fn memory_size(&self) -> u64 {
        unsafe { msg_send_u64!(self.inner, memorySize) }
    }

    /// Sets the boot loader for the VM.
    pub fn set_boot_loader(&mut self, boot_loader: impl BootLoader) -> &mut Self {
        unsafe {
            msg_send_void!(self.inner, setBootLoader: boot_loader.as_ptr());
        }
        self
    }

    /// Sets the platform configuration.
    pub fn set_platform(&mut self, platform: impl Platform) -> &mut Self {
        unsafe {
            msg_send_void!(self.inner, setPlatform: platform.as_ptr());
        }
        self
    }

    /// Adds a storage device to the VM.
    pub fn add_storage_device(&mut self, device: StorageDeviceConfiguration) -> &mut Self {
        self.storage_devices.push(device.into_ptr());
        self
    }

    /// Adds a network device to the VM.
    pub fn add_network_device(&mut self, device: NetworkDeviceConfiguration) -> &mut Self {
        self.network_devices.push(device.into_ptr());
        self
    }

    /// Adds an entropy device to the VM.
    pub fn add_entropy_device(&mut self, device: EntropyDeviceConfiguration) -> &mut Self {
        self.entropy_devices.push(device.into_ptr());
        self
    }

    /// Adds a graphics device to the VM.
    pub fn add_graphics_device(&mut self, device: GraphicsDeviceConfiguration) -> &mut Self {
        self.graphics_devices.push(device.into_ptr());
        self
    }

    /// Adds a pointing device to the VM.
    pub fn add_pointing_device(&mut self, device: PointingDeviceConfiguration) -> &mut Self {
        self.pointing_devices.push(device.into_ptr());
        self
    }

    /// Adds a keyboard to the VM.
    pub fn add_keyboard(&mut self, keyboard: KeyboardConfiguration) -> &mut Self {
        self.keyboards.push(keyboard.into_ptr());
        self
    }

    /// Adds an audio device to the VM.
    pub fn add_audio_device(&mut self, device: AudioDeviceConfiguration) -> &mut Self {
        self.audio_devices.push(device.into_ptr());
        self
    }

    /// Validates the configuration.
    ///
    /// This is called automatically by `build()`, but can be called
    /// manually to check for configuration errors early.
    pub fn validate(&mut self) -> VZResult<()> {
        self.apply_devices();
        unsafe {
            let mut error: *mut AnyObject = ptr::null_mut();
            let valid = msg_send_bool!(self.inner, validateWithError: &mut error);
            if valid.as_bool() {
                Ok(())
            } else {
                let (code, message) = crate::ffi::nserror_parts(error);
                tracing::debug!("configuration rejected ({}): {}", code, message);
                Err(VZError::InvalidConfiguration(message))
            }
        }
    }

    /// Builds the virtual machine from this configuration.
    ///
    /// This finalizes all device configurations and creates the
    /// `VirtualMachine` instance on its own serial queue.
    pub fn build(mut self) -> VZResult<VirtualMachine> {
        self.validate()?;

        let queue = DispatchQueue::new(VM_QUEUE_LABEL);
        let cls = require_class("VZVirtualMachine")?;
        let vm_ptr = unsafe {
            let alloc = msg_send!(cls, alloc);
            msg_send!(alloc, initWithConfiguration: self.inner, queue: queue.as_ptr())
        };
        if vm_ptr.is_null() {
            return Err(VZError::internal("Failed to create VZVirtualMachine"));
        }

        tracing::debug!(
            cpus = self.cpu_count(),
            memory = self.memory_size(),
            "virtual machine created"
        );
        Ok(VirtualMachine::from_raw(vm_ptr, queue))
    }

    /// Applies all device configurations to the VZ configuration.
    fn apply_devices(&mut self) {
        unsafe {
            if !self.storage_devices.is_empty() {
                let array = nsarray(&self.storage_devices);
                msg_send_void!(self.inner, setStorageDevices: array);
            }

            if !self.network_devices.is_empty() {
                let array = nsarray(&self.network_devices);
                msg_send_void!(self.inner, setNetworkDevices: array);
            }

            if !self.entropy_devices.is_empty() {
                let array = nsarray(&self.entropy_devices);
                msg_send_void!(self.inner, setEntropyDevices: array);
            }

            if !self.graphics_devices.is_empty() {
                let array = nsarray(&self.graphics_devices);
                msg_send_void!(self.inner, setGraphicsDevices: array);
            }

            if !self.pointing_devices.is_empty() {
                let array = nsarray(&self.pointing_devices);
                msg_send_void!(self.inner, setPointingDevices: array);
            }

            if !self.keyboards.is_empty() {
                let array = nsarray(&self.keyboards);
                msg_send_void!(self.inner, setKeyboards: array);
            }

            if !self.audio_devices.is_empty() {
                let array = nsarray(&self.audio_devices);
                msg_send_void!(self.inner, setAudioDevices: array);
            }
        }
    }
}

impl Drop for VirtualMachineConfiguration {
    fn drop(&mut self) {
        let devices = self
            .storage_devices
            .drain(..)
            .chain(self.network_devices.drain(..))
            .chain(self.entropy_devices.drain(..))
            .chain(self.graphics_devices.drain(..))
            .chain(self.pointing_devices.drain(..))
            .chain(self.keyboards.drain(..))
            .chain(self.audio_devices.drain(..));
        for device in devices {
            release(device);
        }

        if !self.inner.is_null() {
            release(self.inner);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::MacOSBootLoader;

    #[test]
    fn test_empty_configuration_is_rejected() {
        if !crate::is_supported() {
            return;
        }
        let mut config = VirtualMachineConfiguration::new().unwrap();
        config.set_boot_loader(MacOSBootLoader::new().unwrap());
        assert!(matches!(
            config.validate(),
            Err(VZError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_cpu_and_memory_round_trip() {
        if !crate::is_supported() {
            return;
        }
        let mut config = VirtualMachineConfiguration::new().unwrap();
        config.set_cpu_count(2).set_memory_size(4 * 1024 * 1024 * 1024);
        assert_eq!(config.cpu_count(), 2);
        assert_eq!(config.memory_size(), 4 * 1024 * 1024 * 1024);
    }
}
