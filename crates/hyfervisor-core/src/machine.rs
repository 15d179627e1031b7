//! macOS guest machine configuration.
//!
//! [`MachineSpec`] is the sized hardware description derived from the
//! user configuration. On Apple Silicon it is turned into a
//! `VirtualMachineConfiguration` together with the bundle's platform.

use crate::config::{DisplayConfig, MachineConfig};
use crate::resources::{Limits, compute_cpu_count, compute_memory_size};

/// Sized hardware for one VM.
#[derive(Debug, Clone)]
pub struct MachineSpec {
    /// CPU count, within framework bounds.
    pub cpu_count: u64,
    /// Memory size in bytes, within framework bounds.
    pub memory_size: u64,
    /// Display settings.
    pub display: DisplayConfig,
    /// Attach a NAT network device.
    pub network: bool,
    /// Attach a sound device.
    pub audio: bool,
}

impl MachineSpec {
    /// Sizes the machine from configuration and framework limits.
    pub fn from_config(machine: &MachineConfig, limits: &Limits, host_cpus: u64) -> Self {
        Self {
            cpu_count: compute_cpu_count(machine.cpus, host_cpus, limits),
            memory_size: compute_memory_size(machine.memory_bytes(), limits),
            display: machine.display.clone(),
            network: machine.network,
            audio: machine.audio,
        }
    }
}

#[cfg(all(target_os = "macos", target_arch = "aarch64"))]
pub use vz::{build_configuration, create_platform, load_platform};

#[cfg(all(target_os = "macos", target_arch = "aarch64"))]
mod vz {
    use super::MachineSpec;
    use crate::bundle::VmBundle;
    use crate::error::{CoreError, Result};
    use hyfervisor_vz::{
        AudioDeviceConfiguration, EntropyDeviceConfiguration, GraphicsDeviceConfiguration,
        KeyboardConfiguration, MacAuxiliaryStorage, MacHardwareModel, MacMachineIdentifier,
        MacOSBootLoader, MacPlatform, NetworkDeviceConfiguration, PointingDeviceConfiguration,
        StorageDeviceConfiguration, VirtualMachineConfiguration,
    };

    /// Creates fresh platform artifacts in `bundle` for `hardware_model`.
    ///
    /// Creates (overwriting) the auxiliary storage, persists the hardware
    /// model and a newly generated machine identifier.
    pub fn create_platform(
        bundle: &VmBundle,
        hardware_model: &MacHardwareModel,
    ) -> Result<MacPlatform> {
        if !hardware_model.is_supported() {
            return Err(CoreError::Unsupported(
                "the restore image's hardware model is not supported on this host".into(),
            ));
        }

        let auxiliary_storage =
            MacAuxiliaryStorage::create(bundle.auxiliary_storage_path(), hardware_model)?;
        bundle.write_hardware_model(&hardware_model.data_representation())?;

        let machine_identifier = MacMachineIdentifier::new()?;
        bundle.write_machine_identifier(&machine_identifier.data_representation())?;

        tracing::debug!("created platform artifacts in {}", bundle.root().display());
        Ok(MacPlatform::new(
            hardware_model,
            &machine_identifier,
            &auxiliary_storage,
        )?)
    }

    /// Loads the platform of an installed bundle.
    pub fn load_platform(bundle: &VmBundle) -> Result<MacPlatform> {
        bundle.ensure_installed()?;

        let hardware_model =
            MacHardwareModel::from_data_representation(&bundle.read_hardware_model()?)?;
        if !hardware_model.is_supported() {
            return Err(CoreError::Unsupported(
                "the bundle's hardware model is not supported on this host".into(),
            ));
        }
        let machine_identifier =
            MacMachineIdentifier::from_data_representation(&bundle.read_machine_identifier()?)?;
        let auxiliary_storage = MacAuxiliaryStorage::open(bundle.auxiliary_storage_path())?;

        Ok(MacPlatform::new(
            &hardware_model,
            &machine_identifier,
            &auxiliary_storage,
        )?)
    }

    /// Builds and validates the VM configuration for a macOS guest.
    pub fn build_configuration(
        spec: &MachineSpec,
        platform: MacPlatform,
        bundle: &VmBundle,
    ) -> Result<VirtualMachineConfiguration> {
        let mut config = VirtualMachineConfiguration::new()?;
        config
            .set_platform(platform)
            .set_boot_loader(MacOSBootLoader::new()?)
            .set_cpu_count(spec.cpu_count as usize)
            .set_memory_size(spec.memory_size)
            .add_graphics_device(GraphicsDeviceConfiguration::mac_display(
                spec.display.width_pixels,
                spec.display.height_pixels,
                spec.display.pixels_per_inch,
            )?)
            .add_storage_device(StorageDeviceConfiguration::disk_image(
                bundle.disk_image_path(),
                false,
            )?)
            .add_pointing_device(PointingDeviceConfiguration::usb_screen_coordinate()?)
            .add_keyboard(KeyboardConfiguration::usb()?)
            .add_entropy_device(EntropyDeviceConfiguration::new()?);

        if spec.network {
            config.add_network_device(NetworkDeviceConfiguration::nat()?);
        }
        if spec.audio {
            config.add_audio_device(AudioDeviceConfiguration::host_input_output()?);
        }

        config.validate()?;
        tracing::debug!(
            cpus = spec.cpu_count,
            memory = spec.memory_size,
            "VM configuration validated"
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GIB;

    #[test]
    fn test_spec_from_defaults() {
        let limits = Limits {
            min_cpus: 1,
            max_cpus: 8,
            min_memory: 2 * GIB,
            max_memory: 32 * GIB,
        };
        let spec = MachineSpec::from_config(&MachineConfig::default(), &limits, 10);
        assert_eq!(spec.cpu_count, 8);
        assert_eq!(spec.memory_size, 4 * GIB);
        assert_eq!(spec.display.width_pixels, 1920);
        assert!(spec.network);
    }

    #[test]
    fn test_spec_from_overrides() {
        let limits = Limits {
            min_cpus: 2,
            max_cpus: 8,
            min_memory: 2 * GIB,
            max_memory: 32 * GIB,
        };
        let machine = MachineConfig {
            cpus: Some(1),
            memory_gb: 64,
            audio: false,
            ..MachineConfig::default()
        };
        let spec = MachineSpec::from_config(&machine, &limits, 10);
        assert_eq!(spec.cpu_count, 2);
        assert_eq!(spec.memory_size, 32 * GIB);
        assert!(!spec.audio);
    }
}
