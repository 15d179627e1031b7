//! VM bundle layout.
//!
//! A bundle is a directory holding everything one macOS VM needs to boot:
//!
//! ```text
//! VM.bundle/
//! ├── Disk.img             # sparse raw disk image
//! ├── AuxiliaryStorage     # NVRAM, created by the framework
//! ├── HardwareModel        # VZMacHardwareModel data representation
//! ├── MachineIdentifier    # VZMacMachineIdentifier data representation
//! ├── Installed            # written once the macOS installer succeeded
//! └── RestoreImage.ipsw    # only when the image was downloaded
//! ```
//!
//! The platform artifacts are written before the installer runs, so only
//! `Installed` tells a finished bundle apart from an interrupted install.

use crate::error::{CoreError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Disk image file name.
pub const DISK_IMAGE: &str = "Disk.img";
/// Auxiliary storage file name.
pub const AUXILIARY_STORAGE: &str = "AuxiliaryStorage";
/// Hardware model file name.
pub const HARDWARE_MODEL: &str = "HardwareModel";
/// Machine identifier file name.
pub const MACHINE_IDENTIFIER: &str = "MachineIdentifier";
/// Install completion marker file name.
pub const INSTALL_MARKER: &str = "Installed";
/// Downloaded restore image file name.
pub const RESTORE_IMAGE: &str = "RestoreImage.ipsw";

/// Artifacts an installed bundle must contain, in reporting order.
const REQUIRED_ARTIFACTS: [&str; 5] = [
    DISK_IMAGE,
    AUXILIARY_STORAGE,
    HARDWARE_MODEL,
    MACHINE_IDENTIFIER,
    INSTALL_MARKER,
];

/// A VM bundle directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmBundle {
    root: PathBuf,
}

impl VmBundle {
    /// Refers to the bundle at `root`. Nothing is touched on disk.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Bundle directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the disk image.
    pub fn disk_image_path(&self) -> PathBuf {
        self.root.join(DISK_IMAGE)
    }

    /// Path of the auxiliary storage.
    pub fn auxiliary_storage_path(&self) -> PathBuf {
        self.root.join(AUXILIARY_STORAGE)
    }

    /// Path of the persisted hardware model.
    pub fn hardware_model_path(&self) -> PathBuf {
        self.root.join(HARDWARE_MODEL)
    }

    /// Path of the persisted machine identifier.
    pub fn machine_identifier_path(&self) -> PathBuf {
        self.root.join(MACHINE_IDENTIFIER)
    }

    /// Path of the install completion marker.
    pub fn install_marker_path(&self) -> PathBuf {
        self.root.join(INSTALL_MARKER)
    }

    /// Path a downloaded restore image is stored at.
    pub fn restore_image_path(&self) -> PathBuf {
        self.root.join(RESTORE_IMAGE)
    }

    /// Returns true if the bundle directory exists.
    pub fn exists(&self) -> bool {
        self.root.is_dir()
    }

    /// Creates the bundle directory.
    ///
    /// Fails with `AlreadyExists` if the directory is there, unless `force`
    /// is set, in which case the old bundle is removed first.
    pub fn create(&self, force: bool) -> Result<()> {
        if self.root.exists() {
            if !force {
                return Err(CoreError::AlreadyExists(format!(
                    "VM bundle {}",
                    self.root.display()
                )));
            }
            tracing::warn!("removing existing VM bundle {}", self.root.display());
            if self.root.is_dir() {
                fs::remove_dir_all(&self.root)?;
            } else {
                fs::remove_file(&self.root)?;
            }
        }

        fs::create_dir_all(&self.root)?;
        tracing::debug!("created VM bundle {}", self.root.display());
        Ok(())
    }

    /// Creates an empty sparse disk image of `size_bytes`.
    pub fn create_disk_image(&self, size_bytes: u64) -> Result<()> {
        if size_bytes == 0 {
            return Err(CoreError::Config("disk size must be greater than zero".into()));
        }

        let path = self.disk_image_path();
        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;
        // Extending with set_len leaves a hole; no blocks are written.
        file.set_len(size_bytes)?;

        tracing::debug!("created {} byte disk image {}", size_bytes, path.display());
        Ok(())
    }

    /// Writes the hardware model data representation.
    pub fn write_hardware_model(&self, bytes: &[u8]) -> Result<()> {
        write_artifact(&self.hardware_model_path(), bytes)
    }

    /// Reads the hardware model data representation.
    pub fn read_hardware_model(&self) -> Result<Vec<u8>> {
        read_artifact(&self.hardware_model_path())
    }

    /// Writes the machine identifier data representation.
    pub fn write_machine_identifier(&self, bytes: &[u8]) -> Result<()> {
        write_artifact(&self.machine_identifier_path(), bytes)
    }

    /// Reads the machine identifier data representation.
    pub fn read_machine_identifier(&self) -> Result<Vec<u8>> {
        read_artifact(&self.machine_identifier_path())
    }

    /// Records a finished install of `description` (the guest OS and build).
    pub fn mark_installed(&self, description: &str) -> Result<()> {
        write_artifact(&self.install_marker_path(), format!("{description}\n").as_bytes())
    }

    /// Removes the install marker, if any, before a new install starts.
    pub fn clear_installed(&self) -> Result<()> {
        match fs::remove_file(self.install_marker_path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Required artifacts that are absent, in a fixed order.
    pub fn missing_artifacts(&self) -> Vec<&'static str> {
        REQUIRED_ARTIFACTS
            .into_iter()
            .filter(|name| !self.root.join(name).is_file())
            .collect()
    }

    /// Returns true if every required artifact exists.
    pub fn is_installed(&self) -> bool {
        self.missing_artifacts().is_empty()
    }

    /// Fails with `NotFound` naming the first missing artifact.
    pub fn ensure_installed(&self) -> Result<()> {
        match self.missing_artifacts().first() {
            None => Ok(()),
            Some(name) => Err(CoreError::NotFound(format!(
                "{} in {} (run `hyfervisor install` first)",
                name,
                self.root.display()
            ))),
        }
    }
}

fn write_artifact(path: &Path, bytes: &[u8]) -> Result<()> {
    if bytes.is_empty() {
        return Err(CoreError::Install(format!(
            "refusing to write empty {}",
            path.display()
        )));
    }
    fs::write(path, bytes)?;
    Ok(())
}

fn read_artifact(path: &Path) -> Result<Vec<u8>> {
    match fs::read(path) {
        Ok(bytes) if bytes.is_empty() => Err(CoreError::Config(format!(
            "{} is empty",
            path.display()
        ))),
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(CoreError::NotFound(path.display().to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn bundle_in(dir: &TempDir) -> VmBundle {
        VmBundle::new(dir.path().join("VM.bundle"))
    }

    #[test]
    fn test_paths() {
        let bundle = VmBundle::new("/vms/VM.bundle");
        assert_eq!(bundle.disk_image_path(), Path::new("/vms/VM.bundle/Disk.img"));
        assert_eq!(
            bundle.auxiliary_storage_path(),
            Path::new("/vms/VM.bundle/AuxiliaryStorage")
        );
        assert_eq!(
            bundle.restore_image_path(),
            Path::new("/vms/VM.bundle/RestoreImage.ipsw")
        );
    }

    #[test]
    fn test_create_twice_requires_force() {
        let dir = TempDir::new().unwrap();
        let bundle = bundle_in(&dir);

        bundle.create(false).unwrap();
        assert!(bundle.exists());
        assert!(matches!(
            bundle.create(false),
            Err(CoreError::AlreadyExists(_))
        ));

        fs::write(bundle.root().join("stale"), b"x").unwrap();
        bundle.create(true).unwrap();
        assert!(bundle.exists());
        assert!(!bundle.root().join("stale").exists());
    }

    #[test]
    fn test_disk_image_size() {
        let dir = TempDir::new().unwrap();
        let bundle = bundle_in(&dir);
        bundle.create(false).unwrap();

        let size = 2 * crate::config::GIB;
        bundle.create_disk_image(size).unwrap();
        let meta = fs::metadata(bundle.disk_image_path()).unwrap();
        assert_eq!(meta.len(), size);

        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            // A sparse file allocates far fewer blocks than its length.
            assert!(meta.blocks() * 512 < size);
        }

        assert!(bundle.create_disk_image(size).is_err());
    }

    #[test]
    fn test_zero_disk_size_rejected() {
        let dir = TempDir::new().unwrap();
        let bundle = bundle_in(&dir);
        bundle.create(false).unwrap();
        assert!(matches!(
            bundle.create_disk_image(0),
            Err(CoreError::Config(_))
        ));
    }

    #[test]
    fn test_installed_state() {
        let dir = TempDir::new().unwrap();
        let bundle = bundle_in(&dir);
        bundle.create(false).unwrap();

        assert!(!bundle.is_installed());
        assert_eq!(bundle.missing_artifacts(), REQUIRED_ARTIFACTS.to_vec());

        bundle.create_disk_image(1024 * 1024).unwrap();
        fs::write(bundle.auxiliary_storage_path(), b"aux").unwrap();
        bundle.write_hardware_model(b"model").unwrap();
        assert_eq!(bundle.missing_artifacts(), vec![MACHINE_IDENTIFIER]);
        assert!(matches!(
            bundle.ensure_installed(),
            Err(CoreError::NotFound(msg)) if msg.starts_with(MACHINE_IDENTIFIER)
        ));

        bundle.write_machine_identifier(b"id").unwrap();
        assert_eq!(bundle.missing_artifacts(), vec![INSTALL_MARKER]);

        bundle.mark_installed("macOS 15.0 (24A335)").unwrap();
        assert!(bundle.is_installed());
        bundle.ensure_installed().unwrap();
    }

    #[test]
    fn test_failed_install_is_not_installed() {
        let dir = TempDir::new().unwrap();
        let bundle = bundle_in(&dir);
        bundle.create(false).unwrap();
        bundle.create_disk_image(1024 * 1024).unwrap();
        bundle.mark_installed("macOS 14.6 (23G80)").unwrap();

        // A reinstall writes fresh platform artifacts, then the installer fails.
        bundle.clear_installed().unwrap();
        fs::write(bundle.auxiliary_storage_path(), b"aux").unwrap();
        bundle.write_hardware_model(b"model").unwrap();
        bundle.write_machine_identifier(b"id").unwrap();

        assert!(!bundle.is_installed());
        assert!(matches!(
            bundle.ensure_installed(),
            Err(CoreError::NotFound(msg)) if msg.starts_with(INSTALL_MARKER)
        ));
        bundle.clear_installed().unwrap();
    }

    #[test]
    fn test_artifact_round_trip() {
        let dir = TempDir::new().unwrap();
        let bundle = bundle_in(&dir);
        bundle.create(false).unwrap();

        assert!(matches!(
            bundle.read_hardware_model(),
            Err(CoreError::NotFound(_))
        ));
        bundle.write_hardware_model(&[1, 2, 3]).unwrap();
        assert_eq!(bundle.read_hardware_model().unwrap(), vec![1, 2, 3]);
        assert!(bundle.write_machine_identifier(&[]).is_err());
    }
}
