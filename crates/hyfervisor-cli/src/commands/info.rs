//! Info command implementation.

use anyhow::Result;
use hyfervisor_core::resources::host_cpu_count;

/// Displays host virtualization information.
pub fn execute() -> Result<()> {
    println!("OS: {}", std::env::consts::OS);
    println!("Arch: {}", std::env::consts::ARCH);
    println!("CPUs: {}", host_cpu_count());

    let supported = hyfervisor_vz::is_supported();
    println!(
        "Virtualization: {}",
        if supported { "supported" } else { "not supported" }
    );

    #[cfg(all(target_os = "macos", target_arch = "aarch64"))]
    if supported {
        use hyfervisor_core::download::format_bytes;
        use hyfervisor_core::resources::Limits;

        let limits = Limits::from_framework();
        println!("Guest CPUs: {} - {}", limits.min_cpus, limits.max_cpus);
        println!(
            "Guest memory: {} - {}",
            format_bytes(limits.min_memory),
            format_bytes(limits.max_memory)
        );
    }

    Ok(())
}
