//! macOS installation into a VM bundle.
//!
//! Installation has two phases. [`HyfervisorInstaller::set_up_virtual_machine_artifacts`]
//! lays out the bundle directory and disk image; `install_macos` then loads
//! a restore image, creates the platform identity that matches it and runs
//! the framework installer against a freshly configured VM.

use crate::bundle::VmBundle;
use crate::config::MachineConfig;
use crate::error::Result;

/// Install progress callback, called with the completed percentage.
pub type InstallProgressCallback = Box<dyn Fn(u8) + Send + Sync>;

/// Installs macOS into a VM bundle.
pub struct HyfervisorInstaller {
    bundle: VmBundle,
    machine: MachineConfig,
    force: bool,
}

impl HyfervisorInstaller {
    /// Creates an installer for `bundle` with the given hardware settings.
    pub fn new(bundle: VmBundle, machine: MachineConfig) -> Self {
        Self {
            bundle,
            machine,
            force: false,
        }
    }

    /// Replace an existing bundle instead of failing.
    #[must_use]
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// The bundle being installed into.
    pub fn bundle(&self) -> &VmBundle {
        &self.bundle
    }

    /// Creates the bundle directory and an empty sparse disk image.
    pub fn set_up_virtual_machine_artifacts(&self) -> Result<()> {
        self.bundle.create(self.force)?;
        self.bundle
            .create_disk_image(self.machine.disk_size_bytes())?;
        tracing::info!(
            "VM bundle ready at {} ({} GiB disk)",
            self.bundle.root().display(),
            self.machine.disk_size_gb
        );
        Ok(())
    }
}

/// Turns fractional progress into whole-percent updates.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    last: Option<u8>,
}

impl ProgressTracker {
    /// Returns the new percentage if it moved forward since the last update.
    pub fn update(&mut self, fraction: f64) -> Option<u8> {
        let percent = (fraction.clamp(0.0, 1.0) * 100.0).floor() as u8;
        match self.last {
            Some(last) if percent <= last => None,
            _ => {
                self.last = Some(percent);
                Some(percent)
            }
        }
    }
}

#[cfg(all(target_os = "macos", target_arch = "aarch64"))]
mod vz {
    use super::{HyfervisorInstaller, InstallProgressCallback, ProgressTracker};
    use crate::download::{self, ProgressCallback};
    use crate::error::{CoreError, Result};
    use crate::machine::{MachineSpec, build_configuration, create_platform};
    use crate::resources::{Limits, check_requirements, host_cpu_count};
    use hyfervisor_vz::{MacOSInstaller, MacOSRestoreImage};
    use std::path::Path;

    impl HyfervisorInstaller {
        /// Installs macOS from the local restore image at `ipsw_path`.
        ///
        /// The bundle must have been set up with
        /// [`Self::set_up_virtual_machine_artifacts`].
        pub async fn install_macos(
            &self,
            ipsw_path: &Path,
            progress: Option<InstallProgressCallback>,
        ) -> Result<()> {
            if !ipsw_path.is_file() {
                return Err(CoreError::NotFound(format!(
                    "restore image {}",
                    ipsw_path.display()
                )));
            }
            if !self.bundle.exists() {
                return Err(CoreError::NotFound(format!(
                    "VM bundle {}",
                    self.bundle.root().display()
                )));
            }

            let image = MacOSRestoreImage::load(ipsw_path).await?;
            tracing::info!(
                "restore image macOS {} ({})",
                image.operating_system_version(),
                image.build_version()
            );

            let requirements = image.most_featured_supported_configuration().ok_or_else(|| {
                CoreError::Unsupported("no supported configuration available".into())
            })?;

            let spec = MachineSpec::from_config(
                &self.machine,
                &Limits::from_framework(),
                host_cpu_count(),
            );
            check_requirements(
                spec.cpu_count,
                spec.memory_size,
                requirements.minimum_supported_cpu_count(),
                requirements.minimum_supported_memory_size(),
            )?;

            self.bundle.clear_installed()?;
            let platform = create_platform(&self.bundle, &requirements.hardware_model())?;

            let vm = build_configuration(&spec, platform, &self.bundle)?.build()?;
            let installer = MacOSInstaller::new(&vm, ipsw_path)?;

            let mut tracker = ProgressTracker::default();
            installer
                .install(|fraction| {
                    if let Some(percent) = tracker.update(fraction) {
                        tracing::debug!("installation progress: {}%", percent);
                        if let Some(cb) = &progress {
                            cb(percent);
                        }
                    }
                })
                .await
                .map_err(|e| CoreError::Install(e.to_string()))?;

            self.bundle.mark_installed(&format!(
                "macOS {} ({})",
                image.operating_system_version(),
                image.build_version()
            ))?;
            tracing::info!("macOS installed into {}", self.bundle.root().display());
            Ok(())
        }

        /// Downloads the latest restore image supported by this host into the
        /// bundle and installs it.
        pub async fn install_latest(
            &self,
            download_progress: Option<ProgressCallback>,
            install_progress: Option<InstallProgressCallback>,
        ) -> Result<()> {
            let image = MacOSRestoreImage::fetch_latest_supported().await?;
            let url = image.url();
            tracing::info!(
                "latest supported restore image: macOS {} ({})",
                image.operating_system_version(),
                image.build_version()
            );

            let dest = self.bundle.restore_image_path();
            download::download_file(&url, &dest, download_progress.as_ref()).await?;

            self.install_macos(&dest, install_progress).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use tempfile::TempDir;

    #[test]
    fn test_set_up_artifacts() {
        let dir = TempDir::new().unwrap();
        let bundle = VmBundle::new(dir.path().join("VM.bundle"));
        let machine = MachineConfig {
            disk_size_gb: 1,
            ..MachineConfig::default()
        };

        let installer = HyfervisorInstaller::new(bundle.clone(), machine.clone());
        installer.set_up_virtual_machine_artifacts().unwrap();
        assert_eq!(
            std::fs::metadata(bundle.disk_image_path()).unwrap().len(),
            crate::config::GIB
        );

        assert!(matches!(
            installer.set_up_virtual_machine_artifacts(),
            Err(CoreError::AlreadyExists(_))
        ));

        HyfervisorInstaller::new(bundle.clone(), machine)
            .force(true)
            .set_up_virtual_machine_artifacts()
            .unwrap();
        assert!(bundle.disk_image_path().exists());
    }

    #[test]
    fn test_progress_tracker() {
        let mut tracker = ProgressTracker::default();
        assert_eq!(tracker.update(0.0), Some(0));
        assert_eq!(tracker.update(0.004), None);
        assert_eq!(tracker.update(0.25), Some(25));
        assert_eq!(tracker.update(0.2), None);
        assert_eq!(tracker.update(1.5), Some(100));
        assert_eq!(tracker.update(1.0), None);
    }
}
