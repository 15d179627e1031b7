//! Run command implementation.

use anyhow::Result;
use hyfervisor_core::Config;

/// Executes the run command.
#[cfg(all(target_os = "macos", target_arch = "aarch64"))]
pub async fn execute(config: Config) -> Result<()> {
    use hyfervisor_core::{RunOutcome, VmBundle};

    if !hyfervisor_vz::is_supported() {
        anyhow::bail!("virtualization is not supported on this Mac");
    }

    let bundle = VmBundle::new(&config.bundle_path);
    bundle.ensure_installed()?;

    println!("Starting VM from {}", bundle.root().display());
    println!("Press Ctrl-C to shut the guest down.");

    match hyfervisor_core::runner::run(&bundle, &config.machine).await? {
        RunOutcome::GuestStopped => println!("✓ Guest shut down"),
        RunOutcome::ForceStopped => println!("✓ VM stopped"),
    }
    Ok(())
}

/// Executes the run command.
#[cfg(not(all(target_os = "macos", target_arch = "aarch64")))]
pub async fn execute(config: Config) -> Result<()> {
    let _ = config;
    anyhow::bail!("running macOS guests requires an Apple Silicon Mac")
}
