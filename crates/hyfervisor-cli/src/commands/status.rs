//! Status command implementation.

use anyhow::Result;
use hyfervisor_core::bundle::{
    AUXILIARY_STORAGE, DISK_IMAGE, HARDWARE_MODEL, INSTALL_MARKER, MACHINE_IDENTIFIER,
    RESTORE_IMAGE,
};
use hyfervisor_core::download::format_bytes;
use hyfervisor_core::{Config, VmBundle};

/// Executes the status command.
pub fn execute(config: &Config) -> Result<()> {
    let bundle = VmBundle::new(&config.bundle_path);

    println!("VM Bundle Status");
    println!("================");
    println!();
    println!("Bundle: {}", bundle.root().display());

    if !bundle.exists() {
        println!("Status: ✗ Not created");
        println!();
        println!("Run 'hyfervisor install' to create it.");
        return Ok(());
    }

    for name in [
        DISK_IMAGE,
        AUXILIARY_STORAGE,
        HARDWARE_MODEL,
        MACHINE_IDENTIFIER,
        INSTALL_MARKER,
        RESTORE_IMAGE,
    ] {
        let path = bundle.root().join(name);
        match std::fs::metadata(&path) {
            Ok(meta) => println!("  ✓ {:<18} {}", name, format_bytes(meta.len())),
            Err(_) => println!("  ✗ {}", name),
        }
    }
    println!();

    if bundle.is_installed() {
        println!("Status: ✓ Installed");
    } else {
        println!("Status: ✗ Incomplete");
        println!();
        println!("Run 'hyfervisor install --force' to reinstall.");
    }

    Ok(())
}
