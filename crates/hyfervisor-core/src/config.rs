//! Configuration management.
//!
//! Hyfervisor configuration is loaded from multiple sources with the following priority:
//!
//! 1. Environment variables (`HYFERVISOR_*`, `__` separates nested keys)
//! 2. Configuration file (~/.config/hyfervisor/config.toml, or `--config`)
//! 3. System configuration file (/etc/hyfervisor/config.toml)
//! 4. Default values
//!
//! ## Example Configuration File
//!
//! ```toml
//! bundle_path = "~/VM.bundle"
//!
//! [machine]
//! cpus = 6
//! memory_gb = 8
//! disk_size_gb = 128
//! network = true
//! audio = true
//!
//! [machine.display]
//! width_pixels = 1920
//! height_pixels = 1200
//! pixels_per_inch = 80
//!
//! [logging]
//! level = "info"
//! format = "text"
//! ```
//!
//! `HYFERVISOR_MACHINE__MEMORY_GB=16` overrides `machine.memory_gb`.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "HYFERVISOR_";

/// Hyfervisor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// VM bundle directory. A leading `~` is expanded to the home directory.
    pub bundle_path: PathBuf,
    /// Virtual machine hardware.
    pub machine: MachineConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bundle_path: default_bundle_path(),
            machine: MachineConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from files and environment.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, figment::Error> {
        Self::figment(None).extract().map(Self::normalized)
    }

    /// Loads configuration from a specific file instead of the user file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, figment::Error> {
        Self::figment(Some(path.as_ref()))
            .extract()
            .map(Self::normalized)
    }

    /// Builds the provider chain.
    pub fn figment(config_file: Option<&Path>) -> Figment {
        let user_file = config_file.map_or_else(user_config_path, Path::to_path_buf);
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(system_config_path()))
            .merge(Toml::file(user_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    fn normalized(mut self) -> Self {
        self.bundle_path = expand_home(&self.bundle_path);
        self
    }
}

/// Virtual machine hardware configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// CPU count. Defaults to one less than the host's CPUs.
    pub cpus: Option<u32>,
    /// Memory in GiB.
    pub memory_gb: u64,
    /// Disk image size in GiB, used when the bundle is created.
    pub disk_size_gb: u64,
    /// Display settings.
    pub display: DisplayConfig,
    /// Attach a NAT network device.
    pub network: bool,
    /// Attach a sound device wired to the host's audio.
    pub audio: bool,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            cpus: None,
            memory_gb: 4,
            disk_size_gb: 128,
            display: DisplayConfig::default(),
            network: true,
            audio: true,
        }
    }
}

impl MachineConfig {
    /// Memory size in bytes.
    #[must_use]
    pub fn memory_bytes(&self) -> u64 {
        self.memory_gb.saturating_mul(GIB)
    }

    /// Disk image size in bytes.
    #[must_use]
    pub fn disk_size_bytes(&self) -> u64 {
        self.disk_size_gb.saturating_mul(GIB)
    }
}

/// One GiB in bytes.
pub const GIB: u64 = 1024 * 1024 * 1024;

/// Display configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Width in pixels.
    pub width_pixels: u32,
    /// Height in pixels.
    pub height_pixels: u32,
    /// Pixel density.
    pub pixels_per_inch: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width_pixels: 1920,
            height_pixels: 1200,
            pixels_per_inch: 80,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,
    /// Log format (text, json).
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

fn default_bundle_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("VM.bundle")
}

fn user_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("hyfervisor")
        .join("config.toml")
}

fn system_config_path() -> PathBuf {
    PathBuf::from("/etc/hyfervisor/config.toml")
}

/// Expands a leading `~` to the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.bundle_path.ends_with("VM.bundle"));
        assert_eq!(config.machine.cpus, None);
        assert_eq!(config.machine.memory_gb, 4);
        assert_eq!(config.machine.disk_size_gb, 128);
        assert_eq!(config.machine.display.width_pixels, 1920);
        assert_eq!(config.machine.display.height_pixels, 1200);
        assert_eq!(config.machine.display.pixels_per_inch, 80);
        assert!(config.machine.network);
        assert_eq!(config.logging.format, "text");
    }

    #[test]
    fn test_byte_sizes() {
        let machine = MachineConfig::default();
        assert_eq!(machine.memory_bytes(), 4 * GIB);
        assert_eq!(machine.disk_size_bytes(), 128 * GIB);
    }

    #[test]
    fn test_toml_overrides() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "hyfervisor.toml",
                r#"
                    bundle_path = "/tmp/Test.bundle"

                    [machine]
                    cpus = 2
                    memory_gb = 8

                    [machine.display]
                    width_pixels = 1280
                "#,
            )?;

            let config: Config = Config::figment(Some(Path::new("hyfervisor.toml")))
                .merge(Toml::string("[logging]\nformat = \"json\""))
                .extract()?;

            assert_eq!(config.bundle_path, PathBuf::from("/tmp/Test.bundle"));
            assert_eq!(config.machine.cpus, Some(2));
            assert_eq!(config.machine.memory_gb, 8);
            assert_eq!(config.machine.display.width_pixels, 1280);
            assert_eq!(config.machine.display.height_pixels, 1200);
            assert_eq!(config.machine.disk_size_gb, 128);
            assert_eq!(config.logging.format, "json");
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("hyfervisor.toml", "[machine]\ncpus = 2\nmemory_gb = 8")?;
            jail.set_env("HYFERVISOR_MACHINE__MEMORY_GB", "16");
            jail.set_env("HYFERVISOR_MACHINE__CPUS", "6");
            jail.set_env("HYFERVISOR_MACHINE__DISPLAY__PIXELS_PER_INCH", "144");
            jail.set_env("HYFERVISOR_LOGGING__LEVEL", "debug");

            let config = Config::load_from("hyfervisor.toml")?;

            assert_eq!(config.machine.memory_gb, 16);
            assert_eq!(config.machine.cpus, Some(6));
            assert_eq!(config.machine.display.pixels_per_inch, 144);
            assert_eq!(config.machine.display.width_pixels, 1920);
            assert_eq!(config.logging.level, "debug");
            Ok(())
        });
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load_from("/nonexistent/hyfervisor.toml").unwrap();
        assert_eq!(config.machine.disk_size_gb, 128);
    }

    #[test]
    fn test_expand_home() {
        let absolute = Path::new("/var/VM.bundle");
        assert_eq!(expand_home(absolute), absolute);

        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home(Path::new("~/VM.bundle")), home.join("VM.bundle"));
        }
    }
}
