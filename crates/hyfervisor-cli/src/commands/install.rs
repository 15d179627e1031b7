//! Install command implementation.

use anyhow::Result;
use clap::Args;
use hyfervisor_core::Config;
use std::path::PathBuf;

/// Arguments for the install command.
#[derive(Args)]
pub struct InstallArgs {
    /// Local restore image to install (default: download the latest supported)
    #[arg(long)]
    pub ipsw: Option<PathBuf>,

    /// Replace an existing VM bundle
    #[arg(long, short)]
    pub force: bool,
}

/// Executes the install command.
#[cfg(all(target_os = "macos", target_arch = "aarch64"))]
pub async fn execute(args: InstallArgs, config: Config) -> Result<()> {
    use anyhow::Context;
    use hyfervisor_core::download::{DownloadProgress, format_bytes};
    use hyfervisor_core::{HyfervisorInstaller, VmBundle};
    use std::io::Write;

    if !hyfervisor_vz::is_supported() {
        anyhow::bail!("virtualization is not supported on this Mac");
    }
    if let Some(ipsw) = &args.ipsw {
        if !ipsw.is_file() {
            anyhow::bail!("restore image not found: {}", ipsw.display());
        }
    }

    let installer = HyfervisorInstaller::new(VmBundle::new(&config.bundle_path), config.machine)
        .force(args.force);

    installer
        .set_up_virtual_machine_artifacts()
        .context("failed to set up VM bundle")?;
    println!("✓ VM bundle created at {}", config.bundle_path.display());

    let install_progress = Box::new(|percent: u8| {
        print!("\rInstalling macOS... [{}%]", percent);
        let _ = std::io::stdout().flush();
    });

    match args.ipsw {
        Some(ipsw) => {
            installer
                .install_macos(&ipsw, Some(install_progress))
                .await?;
        }
        None => {
            println!("Fetching the latest supported restore image...");
            let download_progress = Box::new(|progress: DownloadProgress| {
                match progress.percentage() {
                    Some(pct) => print!(
                        "\rDownloading {} [{}%]",
                        format_bytes(progress.downloaded),
                        pct
                    ),
                    None => print!("\rDownloading {}", format_bytes(progress.downloaded)),
                }
                let _ = std::io::stdout().flush();
            });
            installer
                .install_latest(Some(download_progress), Some(install_progress))
                .await?;
        }
    }

    println!("\n✓ macOS installed. Start it with 'hyfervisor run'.");
    Ok(())
}

/// Executes the install command.
#[cfg(not(all(target_os = "macos", target_arch = "aarch64")))]
pub async fn execute(args: InstallArgs, config: Config) -> Result<()> {
    let _ = (args, config);
    anyhow::bail!("installing macOS guests requires an Apple Silicon Mac")
}
