//! CLI command implementations.
//!
//! - VM operations (install, run, status)
//! - System operations (info, version)

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hyfervisor_core::Config;
use std::path::{Path, PathBuf};

pub mod info;
pub mod install;
pub mod run;
pub mod status;
pub mod version;

/// Hyfervisor - install and run macOS virtual machines on Apple Silicon
#[derive(Parser)]
#[command(name = "hyfervisor")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (default: ~/.config/hyfervisor/config.toml)
    #[arg(long, global = true, env = "HYFERVISOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// VM bundle directory (default: ~/VM.bundle)
    #[arg(long, global = true)]
    pub bundle: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Create a VM bundle and install macOS into it
    Install(install::InstallArgs),

    /// Boot the installed VM until the guest shuts down
    Run,

    /// Show the VM bundle status
    Status,

    /// Display host virtualization information
    Info,

    /// Show version information
    Version,
}

/// Loads configuration, applying the command-line bundle override.
pub fn load_config(config_file: Option<&Path>, bundle: Option<PathBuf>) -> Result<Config> {
    let mut config = match config_file {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => Config::load().context("failed to load configuration")?,
    };

    if let Some(bundle) = bundle {
        config.bundle_path = hyfervisor_core::config::expand_home(&bundle);
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_install() {
        let cli = Cli::try_parse_from([
            "hyfervisor",
            "install",
            "--ipsw",
            "/tmp/UniversalMac.ipsw",
            "--force",
        ])
        .unwrap();
        match cli.command {
            Commands::Install(args) => {
                assert_eq!(args.ipsw, Some(PathBuf::from("/tmp/UniversalMac.ipsw")));
                assert!(args.force);
            }
            _ => panic!("expected install"),
        }
    }

    #[test]
    fn test_parse_install_defaults() {
        let cli = Cli::try_parse_from(["hyfervisor", "install"]).unwrap();
        match cli.command {
            Commands::Install(args) => {
                assert!(args.ipsw.is_none());
                assert!(!args.force);
            }
            _ => panic!("expected install"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["hyfervisor", "run", "--bundle", "/vms/Test.bundle", "--debug"])
                .unwrap();
        assert!(matches!(cli.command, Commands::Run));
        assert_eq!(cli.bundle, Some(PathBuf::from("/vms/Test.bundle")));
        assert!(cli.debug);
    }

    #[test]
    fn test_unknown_command_rejected() {
        assert!(Cli::try_parse_from(["hyfervisor", "destroy"]).is_err());
    }

    #[test]
    fn test_bundle_override() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("config.toml");
        let config = load_config(Some(&missing), Some(dir.path().join("Other.bundle"))).unwrap();
        assert_eq!(config.bundle_path, dir.path().join("Other.bundle"));
    }
}
