//! Version command implementation.

use anyhow::Result;

/// Executes the version command.
pub fn execute() -> Result<()> {
    println!("hyfervisor version {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Platform: {} / {}", std::env::consts::OS, std::env::consts::ARCH);

    Ok(())
}
